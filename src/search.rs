//! Search orchestration.
//!
//! [`Search`] races a primary provider against a delayed secondary one:
//!
//! ```text
//! Idle -> PrimaryInFlight -+-> PrimaryWon
//!                          +-> GracePeriodElapsed -> BothInFlight -+-> PrimaryWon | SecondaryWon
//!                          |                                       +-> BothFailed -+
//!                          +-> PrimaryFailed (secondary never started) ------------+-> LastResort -> Resolved | Failed
//! ```
//!
//! A supplemental best-effort provider is queried separately and never blocks
//! or fails the race.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::{QueryLimits, RelayConfig};
use crate::providers::{BearerApi, Searxng, Tavily};
use crate::queue::ThrottledQueue;
use crate::{
    Aggregator, AttemptOutcome, BestEffortProvider, NormalizedSearchResult, Provider, ProviderAttempt,
    ProviderOutcome, Result, SearchError, SearchQuery,
};

/// Which path produced the results of a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceWinner {
    Primary,
    Secondary,
    /// The synchronous secondary call made after every racing side failed.
    LastResort,
}

/// Results of a race plus how they were obtained.
#[derive(Debug, Clone)]
pub struct RaceReport {
    pub results: NormalizedSearchResult,
    pub winner: RaceWinner,
    /// Every provider invocation, in start order.
    pub attempts: Vec<ProviderAttempt>,
    pub duration_ms: u64,
}

impl RaceReport {
    /// Whether the given provider was invoked at all.
    pub fn attempted(&self, provider_id: &str) -> bool {
        self.attempts.iter().any(|a| a.provider_id == provider_id)
    }
}

type Attempt = (ProviderAttempt, Result<NormalizedSearchResult>);

/// Provider-racing search orchestrator.
pub struct Search {
    primary: Option<Arc<dyn Provider>>,
    secondary: Option<Arc<dyn Provider>>,
    supplemental: Option<Arc<dyn BestEffortProvider>>,
    grace_period: Duration,
    limits: QueryLimits,
}

impl Search {
    /// Creates an orchestrator with no providers.
    pub fn new() -> Self {
        Self {
            primary: None,
            secondary: None,
            supplemental: None,
            grace_period: Duration::from_secs(5),
            limits: QueryLimits::default(),
        }
    }

    /// Builds the orchestrator and its providers from configuration.
    ///
    /// The primary provider gets `queue`; pass the same queue to anything
    /// else that spends the primary's quota.
    pub fn from_config(config: &RelayConfig, queue: Arc<ThrottledQueue>) -> Result<Self> {
        config.validate()?;
        let mut search = Self::new();
        search.set_grace_period(config.race.grace_period());
        search.set_limits(config.query);

        let providers = &config.providers;
        if let Some(key) = &providers.primary_api_key {
            let primary = BearerApi::new(key.clone(), providers.primary_url.clone(), queue)?
                .with_max_results(config.query.max_results);
            search.set_primary(primary);
        }
        if let Some(key) = &providers.tavily_api_key {
            let secondary = Tavily::new(key.clone(), providers.tavily_url.clone())?
                .with_max_results(config.query.max_results);
            search.set_secondary(secondary);
        }
        if let Some(url) = &providers.searxng_url {
            search.set_supplemental(Searxng::new(url.clone())?.with_max_results(config.query.max_results));
        }

        Ok(search)
    }

    /// Sets the primary provider.
    pub fn set_primary<P: Provider + 'static>(&mut self, provider: P) {
        self.primary = Some(Arc::new(provider));
    }

    /// Sets the secondary (fallback) provider.
    pub fn set_secondary<P: Provider + 'static>(&mut self, provider: P) {
        self.secondary = Some(Arc::new(provider));
    }

    /// Sets the supplemental best-effort provider.
    pub fn set_supplemental<P: BestEffortProvider + 'static>(&mut self, provider: P) {
        self.supplemental = Some(Arc::new(provider));
    }

    /// Sets how long the primary runs alone before the secondary starts.
    pub fn set_grace_period(&mut self, grace_period: Duration) {
        self.grace_period = grace_period;
    }

    /// Sets query and result limits.
    pub fn set_limits(&mut self, limits: QueryLimits) {
        self.limits = limits;
    }

    /// Number of configured providers, supplemental included.
    pub fn provider_count(&self) -> usize {
        [self.primary.is_some(), self.secondary.is_some(), self.supplemental.is_some()]
            .iter()
            .filter(|configured| **configured)
            .count()
    }

    /// Names of the configured providers, in race order.
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = [&self.primary, &self.secondary]
            .into_iter()
            .flatten()
            .map(|p| p.name().to_string())
            .collect();
        if let Some(supplemental) = &self.supplemental {
            names.push(supplemental.name().to_string());
        }
        names
    }

    /// Searches the racing providers and returns the winning results.
    pub async fn search(&self, query: SearchQuery) -> Result<NormalizedSearchResult> {
        self.search_with_report(query).await.map(|report| report.results)
    }

    /// Races the primary against the delayed secondary.
    pub async fn search_with_report(&self, query: SearchQuery) -> Result<RaceReport> {
        let primary = self.primary.as_ref().filter(|p| p.is_enabled());
        let secondary = self.secondary.as_ref().filter(|p| p.is_enabled());
        if primary.is_none() && secondary.is_none() {
            return Err(SearchError::NoProviders);
        }

        let query = query.normalized(&self.limits)?;
        let start = Instant::now();
        let mut attempts = Vec::new();

        let (results, winner) = match (primary, secondary) {
            (Some(primary), Some(secondary)) => {
                self.race(&**primary, &**secondary, &query, &mut attempts)
                    .await?
            }
            (Some(only), None) | (None, Some(only)) => {
                let (record, result) = attempt(&**only, &query).await;
                attempts.push(record);
                let winner = if primary.is_some() {
                    RaceWinner::Primary
                } else {
                    RaceWinner::Secondary
                };
                let results = result.map_err(|e| SearchError::AllProvidersFailed(format!("{}: {}", only.shortcut(), e)))?;
                (results, winner)
            }
            (None, None) => return Err(SearchError::NoProviders),
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(winner = ?winner, duration_ms, attempts = attempts.len(), "search resolved");
        Ok(RaceReport {
            results: results.normalize(self.limits.max_results),
            winner,
            attempts,
            duration_ms,
        })
    }

    async fn race(
        &self,
        primary: &dyn Provider,
        secondary: &dyn Provider,
        query: &SearchQuery,
        attempts: &mut Vec<ProviderAttempt>,
    ) -> Result<(NormalizedSearchResult, RaceWinner)> {
        let race_started = Instant::now();
        let primary_call = attempt(primary, query);
        tokio::pin!(primary_call);
        let grace = sleep(self.grace_period);
        tokio::pin!(grace);

        let within_grace = tokio::select! {
            biased;
            done = &mut primary_call => Some(done),
            _ = &mut grace => None,
        };

        let primary_error = match within_grace {
            Some((record, Ok(results))) => {
                attempts.push(record);
                return Ok((results, RaceWinner::Primary));
            }
            Some((record, Err(e))) => {
                attempts.push(record);
                warn!(provider = primary.shortcut(), error = %e, "primary failed before the grace period");
                e
            }
            None => {
                info!(
                    grace_ms = self.grace_period.as_millis() as u64,
                    provider = secondary.shortcut(),
                    "primary slow, starting secondary"
                );
                let secondary_started = Instant::now();
                let secondary_call = attempt(secondary, query);
                tokio::pin!(secondary_call);

                let (primary_err, secondary_err) = tokio::select! {
                    biased;
                    (record, result) = &mut primary_call => {
                        attempts.push(record);
                        match result {
                            Ok(results) => {
                                attempts.push(abandoned(secondary, secondary_started));
                                return Ok((results, RaceWinner::Primary));
                            }
                            Err(e) => {
                                debug!(error = %e, "primary failed, awaiting secondary");
                                let (record, result) = secondary_call.await;
                                attempts.push(record);
                                match result {
                                    Ok(results) => return Ok((results, RaceWinner::Secondary)),
                                    Err(se) => (e, se),
                                }
                            }
                        }
                    }
                    (record, result) = &mut secondary_call => {
                        match result {
                            Ok(results) => {
                                attempts.push(abandoned(primary, race_started));
                                attempts.push(record);
                                return Ok((results, RaceWinner::Secondary));
                            }
                            Err(se) => {
                                debug!(error = %se, "secondary failed, awaiting primary");
                                let (primary_record, primary_result) = primary_call.await;
                                attempts.push(primary_record);
                                attempts.push(record);
                                match primary_result {
                                    Ok(results) => return Ok((results, RaceWinner::Primary)),
                                    Err(e) => (e, se),
                                }
                            }
                        }
                    }
                };
                warn!(primary = %primary_err, secondary = %secondary_err, "both racing providers failed");
                primary_err
            }
        };

        self.last_resort(secondary, query, primary_error, attempts).await
    }

    /// One synchronous secondary call once the race has nothing left.
    async fn last_resort(
        &self,
        secondary: &dyn Provider,
        query: &SearchQuery,
        primary_error: SearchError,
        attempts: &mut Vec<ProviderAttempt>,
    ) -> Result<(NormalizedSearchResult, RaceWinner)> {
        info!(provider = secondary.shortcut(), "last resort call");
        let (record, result) = attempt(secondary, query).await;
        attempts.push(record);
        match result {
            Ok(results) => Ok((results, RaceWinner::LastResort)),
            Err(e) => Err(SearchError::AllProvidersFailed(format!(
                "primary: {}; secondary: {}",
                primary_error, e
            ))),
        }
    }

    /// Queries the supplemental provider; never fails.
    pub async fn search_supplemental(&self, query: SearchQuery) -> ProviderOutcome {
        let Some(provider) = &self.supplemental else {
            return ProviderOutcome::degraded("no supplemental provider configured");
        };
        let query = match query.normalized(&self.limits) {
            Ok(query) => query,
            Err(e) => return ProviderOutcome::degraded(e.to_string()),
        };

        match timeout(provider.config().timeout() * 2, provider.search(&query)).await {
            Ok(ProviderOutcome::Ok(results)) => ProviderOutcome::Ok(results.normalize(self.limits.max_results)),
            Ok(degraded) => {
                if let ProviderOutcome::Degraded { reason, .. } = &degraded {
                    warn!(provider = provider.name(), reason = %reason, "supplemental provider degraded");
                }
                degraded
            }
            Err(_) => {
                warn!(provider = provider.name(), "supplemental provider timed out");
                ProviderOutcome::degraded("timed out")
            }
        }
    }

    /// Runs the race and the supplemental provider together and merges them.
    ///
    /// Fails only if the race fails and the supplemental provider degraded.
    pub async fn search_all(&self, query: SearchQuery) -> Result<NormalizedSearchResult> {
        let (race, supplemental) = tokio::join!(
            self.search_with_report(query.clone()),
            self.search_supplemental(query)
        );

        let aggregator = Aggregator::new(self.limits.max_results);
        match (race, supplemental) {
            (Ok(report), ProviderOutcome::Ok(extra)) => Ok(aggregator.merge(vec![
                (format!("{:?}", report.winner), report.results),
                ("supplemental".to_string(), extra),
            ])),
            (Ok(report), ProviderOutcome::Degraded { .. }) => Ok(report.results),
            (Err(e), ProviderOutcome::Ok(extra)) => {
                warn!(error = %e, "racing providers failed, returning supplemental results only");
                Ok(extra)
            }
            (Err(e), ProviderOutcome::Degraded { .. }) => Err(e),
        }
    }
}

impl Default for Search {
    fn default() -> Self {
        Self::new()
    }
}

/// Invokes `provider` under its own timeout and records the attempt.
fn attempt<'a>(
    provider: &'a dyn Provider,
    query: &'a SearchQuery,
) -> impl Future<Output = Attempt> + Send + 'a {
    async move {
        let started_at = Instant::now();
        let config = provider.config();
        let result = match timeout(config.timeout(), provider.search(query)).await {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout(config.timeout().as_millis() as u64)),
        };
        let outcome = match &result {
            Ok(_) => AttemptOutcome::Success,
            Err(SearchError::Timeout(_)) => AttemptOutcome::Timeout,
            Err(_) => AttemptOutcome::Failure,
        };
        debug!(provider = provider.shortcut(), outcome = ?outcome, "provider attempt finished");
        (
            ProviderAttempt {
                provider_id: provider.shortcut().to_string(),
                started_at,
                outcome,
            },
            result,
        )
    }
}

fn abandoned(provider: &dyn Provider, started_at: Instant) -> ProviderAttempt {
    ProviderAttempt {
        provider_id: provider.shortcut().to_string(),
        started_at,
        outcome: AttemptOutcome::Abandoned,
    }
}
