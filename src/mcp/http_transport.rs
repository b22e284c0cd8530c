//! Synchronous HTTP transport
//!
//! One `POST <endpoint><call-path>` carries the envelope; the response body
//! is the reply envelope.
//!
//! ```http
//! POST /mcp
//! Content-Type: application/json
//!
//! {"id":1,"method":"tools/call","params":{"name":"getAllPersons","arguments":{}}}
//! ```
//!
//! Response:
//! ```http
//! HTTP/1.1 200 OK
//! Content-Type: application/json
//!
//! {"id":1,"result":{...}}
//! ```

use async_trait::async_trait;
use std::time::Duration;

use crate::config::BackendPaths;
use crate::error::{Result, RouterError};
use crate::mcp::bridge::Transport;
use crate::models::envelope::{CallEnvelope, ReplyEnvelope};
use crate::models::server::Server;

pub struct HttpTransport {
    client: reqwest::Client,
    call_path: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(paths: &BackendPaths, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            call_path: paths.call.clone(),
            timeout,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, server: &Server, envelope: &CallEnvelope) -> Result<ReplyEnvelope> {
        let url = server.url_for(&self.call_path);

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(envelope)
            .send()
            .await
            .map_err(|e| RouterError::from_reqwest(e, "tool call", self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(server = %server.name, url = %url, status = %status, "Backend call failed");
            return Err(RouterError::from_status(status, "tool call"));
        }

        let reply: ReplyEnvelope = response
            .json()
            .await
            .map_err(|e| RouterError::from_reqwest(e, "tool call", self.timeout))?;

        if reply.result.is_none() && reply.error.is_none() {
            return Err(RouterError::Transport(
                "tool call: reply has neither result nor error".to_string(),
            ));
        }

        Ok(reply)
    }
}
