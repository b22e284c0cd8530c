use async_trait::async_trait;
use std::sync::Arc;

use crate::config::RouterConfig;
use crate::error::Result;
use crate::mcp::event_stream::EventStreamTransport;
use crate::mcp::http_transport::HttpTransport;
use crate::models::envelope::{CallEnvelope, ReplyEnvelope};
use crate::models::server::{Server, TransportType};

/// Delivers one envelope to a backend and returns its reply envelope
///
/// A reply carrying a JSON-RPC `error` is still `Ok`; only failures to get a
/// reply at all are `Err`.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    async fn send(&self, server: &Server, envelope: &CallEnvelope) -> Result<ReplyEnvelope>;
}

/// Picks the strategy matching the server's declared transport
pub struct ProtocolBridge {
    synchronous: Arc<dyn Transport>,
    event_stream: Arc<dyn Transport>,
}

impl ProtocolBridge {
    pub fn new(synchronous: Arc<dyn Transport>, event_stream: Arc<dyn Transport>) -> Self {
        Self {
            synchronous,
            event_stream,
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(
            Arc::new(HttpTransport::new(&config.paths, config.call_timeout)),
            Arc::new(EventStreamTransport::new(
                &config.paths,
                config.stream_open_timeout,
                config.stream_session_timeout,
            )),
        )
    }

    fn strategy(&self, transport_type: TransportType) -> &dyn Transport {
        match transport_type {
            TransportType::Synchronous => self.synchronous.as_ref(),
            TransportType::EventStream => self.event_stream.as_ref(),
        }
    }
}

#[async_trait]
impl Transport for ProtocolBridge {
    async fn send(&self, server: &Server, envelope: &CallEnvelope) -> Result<ReplyEnvelope> {
        tracing::debug!(
            server = %server.name,
            transport = server.transport_type.as_str(),
            id = envelope.id,
            method = %envelope.method,
            "Dispatching envelope"
        );
        self.strategy(server.transport_type).send(server, envelope).await
    }
}
