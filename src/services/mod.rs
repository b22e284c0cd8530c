pub mod health_service;
pub mod retry_policy;
pub mod router_service;

pub use health_service::HealthService;
pub use retry_policy::RetryPolicy;
pub use router_service::RouterService;
