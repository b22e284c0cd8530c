//! Pluggable discovery sources
//!
//! Each [`DiscoveryProvider`] owns exactly one external source of truth and
//! reports the servers it currently knows about. Providers never fail past
//! their boundary: any internal fault becomes an empty result, logged with
//! the provider's name.
//!
//! - [`MemoryProvider`] - servers registered explicitly through the router
//! - [`NamingProvider`] - instances published in a naming/service registry
//! - [`CatalogProvider`] - a remote search catalog of servers

pub mod catalog_provider;
pub mod memory_provider;
pub mod naming_provider;
pub mod scoring;

use async_trait::async_trait;

use crate::models::search::SearchRequest;
use crate::models::server::Server;

pub use catalog_provider::CatalogProvider;
pub use memory_provider::MemoryProvider;
pub use naming_provider::NamingProvider;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait DiscoveryProvider: Send + Sync {
    /// Returns the servers matching `request`, or an empty list on any fault.
    async fn search(&self, request: &SearchRequest) -> Vec<Server>;

    fn provider_name(&self) -> String;
}
