//! Search provider implementations.

// Racing providers
mod bearer;
mod tavily;

// Best-effort providers
mod searxng;

mod json;

pub use bearer::BearerApi;
pub use searxng::Searxng;
pub use tavily::Tavily;
