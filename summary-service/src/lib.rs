pub mod catchup;
pub mod config;
pub mod curve;
pub mod directory;
pub mod http;
pub mod metrics_server;
pub mod observability;
pub mod period;
pub mod query;
pub mod scheduler;
pub mod scope;
pub mod store;
pub mod summarizer;
pub mod trend;
pub mod warmer;

pub use query::{Period, QueryRequest, QueryService};
pub use trend::QueryResponse;
