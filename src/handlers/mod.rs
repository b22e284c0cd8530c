pub mod router_handlers;

pub use router_handlers::routes;
