pub mod router_config;

pub use router_config::{BackendPaths, RetrySettings, RouterConfig};
