//! Registry aggregation, dispatch and the protocol bridge
//!
//! # Architecture
//!
//! - [`ServerRegistry`] - merges what every discovery provider reports
//! - [`ToolDispatcher`] - resolves a tool to a server and sends the call
//! - [`ProtocolBridge`] - picks the synchronous or event-stream strategy
//! - [`EventStreamTransport`] - one stream session per call, reduced to one reply
//!
//! # Example
//!
//! ```rust,no_run
//! use mcprouter::config::RouterConfig;
//! use mcprouter::mcp::{ProtocolBridge, ServerRegistry, ToolDispatcher};
//! use mcprouter::services::RetryPolicy;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RouterConfig::default();
//! let registry = Arc::new(ServerRegistry::new(config.provider_timeout));
//! let bridge = Arc::new(ProtocolBridge::from_config(&config));
//! let dispatcher = ToolDispatcher::new(registry, bridge, RetryPolicy::default());
//!
//! let result = dispatcher.invoke("getPersonById", json!({"id": 1}), None).await?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod dispatcher;
pub mod event_stream;
pub mod http_transport;
pub mod registry;
pub mod sse;

pub use bridge::{ProtocolBridge, Transport};
pub use dispatcher::{RequestIdGenerator, ToolDispatcher};
pub use event_stream::EventStreamTransport;
pub use http_transport::HttpTransport;
pub use registry::{ServerRegistry, SharedRegistry};
