//! Event-stream transport
//!
//! Some backends only answer over a long-lived event stream. One call runs
//! a whole session:
//!
//! 1. `GET <endpoint><stream-path>?clientId=<id>` opens the stream
//! 2. `POST <endpoint><message-path>?clientId=<id>` delivers the envelope
//! 3. frames are consumed until one carries `result` or `error`, or the
//!    session deadline passes
//!
//! Frames already buffered when the terminal one arrives are still read, and
//! the last terminal frame wins. No terminal frame means a synthesized
//! no-response envelope. Sessions are never reused.

use async_trait::async_trait;
use futures::{FutureExt, Stream, StreamExt};
use serde_json::Value;
use std::time::Duration;

use crate::config::BackendPaths;
use crate::error::{Result, RouterError};
use crate::mcp::bridge::Transport;
use crate::mcp::sse::{self, SseFrame};
use crate::models::envelope::{CallEnvelope, ReplyEnvelope, RpcError, CODE_INTERNAL_ERROR};
use crate::models::server::Server;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    AwaitingTerminal,
    Terminated,
    /// No terminal frame before the deadline or before the stream closed
    TimedOut,
}

impl SessionState {
    pub fn is_final(&self) -> bool {
        matches!(self, SessionState::Terminated | SessionState::TimedOut)
    }

    fn can_move_to(&self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Opening, SessionState::AwaitingTerminal)
                | (SessionState::Opening, SessionState::TimedOut)
                | (SessionState::AwaitingTerminal, SessionState::Terminated)
                | (SessionState::AwaitingTerminal, SessionState::TimedOut)
        )
    }
}

/// Per-call session lifecycle
///
/// States only move forward and exactly one final state is reached.
#[derive(Debug)]
pub struct Session {
    id: u64,
    state: SessionState,
}

impl Session {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: SessionState::Opening,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns false and leaves the state alone on an illegal move
    pub fn advance(&mut self, next: SessionState) -> bool {
        if !self.state.can_move_to(next) {
            tracing::warn!(id = self.id, from = ?self.state, to = ?next, "Ignored illegal session transition");
            return false;
        }
        tracing::debug!(id = self.id, from = ?self.state, to = ?next, "Session transition");
        self.state = next;
        true
    }
}

/// Reduces the frames of one session to a single reply
#[derive(Debug)]
pub struct EventReducer {
    expected_id: u64,
    terminal: Option<ReplyEnvelope>,
}

impl EventReducer {
    pub fn new(expected_id: u64) -> Self {
        Self {
            expected_id,
            terminal: None,
        }
    }

    /// Observes one frame payload; true when it was terminal for this call.
    ///
    /// Payloads that are not JSON objects, or that carry another call's id,
    /// are ignored.
    pub fn observe(&mut self, data: &str) -> bool {
        let Ok(Value::Object(payload)) = serde_json::from_str::<Value>(data) else {
            return false;
        };

        if let Some(id) = payload.get("id").and_then(Value::as_u64) {
            if id != self.expected_id {
                tracing::debug!(expected = self.expected_id, got = id, "Ignoring frame for another call");
                return false;
            }
        }

        if !payload.contains_key("result") && !payload.contains_key("error") {
            return false;
        }

        let error = payload.get("error").map(|raw| {
            serde_json::from_value::<RpcError>(raw.clone()).unwrap_or_else(|_| RpcError {
                code: CODE_INTERNAL_ERROR,
                message: match raw {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
                data: None,
            })
        });

        self.terminal = Some(ReplyEnvelope {
            id: Some(self.expected_id),
            result: if error.is_some() {
                None
            } else {
                payload.get("result").cloned()
            },
            error,
        });
        true
    }

    pub fn has_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn finish(self) -> Option<ReplyEnvelope> {
        self.terminal
    }
}

/// Consumes frames for call `expected_id` within `session_timeout`
///
/// Never waits past the bound: an expired or closed session yields a
/// no-response envelope. A read error is returned as-is.
pub async fn consume<S>(
    frames: S,
    session: &mut Session,
    expected_id: u64,
    session_timeout: Duration,
) -> Result<ReplyEnvelope>
where
    S: Stream<Item = Result<SseFrame>>,
{
    let mut frames = std::pin::pin!(frames);
    let mut reducer = EventReducer::new(expected_id);

    let read = tokio::time::timeout(session_timeout, async {
        while let Some(frame) = frames.next().await {
            if reducer.observe(&frame?.data) {
                return Ok(true);
            }
        }
        Ok::<bool, RouterError>(false)
    })
    .await;

    match read {
        Ok(Err(e)) => {
            session.advance(SessionState::TimedOut);
            return Err(e);
        }
        Ok(Ok(true)) => {
            // frames that were already delivered still count
            while let Some(Some(Ok(frame))) = frames.next().now_or_never() {
                reducer.observe(&frame.data);
            }
        }
        Ok(Ok(false)) | Err(_) => {}
    }

    match reducer.finish() {
        Some(reply) => {
            session.advance(SessionState::Terminated);
            Ok(reply)
        }
        None => {
            session.advance(SessionState::TimedOut);
            tracing::warn!(id = expected_id, "Event stream produced no terminal event");
            Ok(ReplyEnvelope::no_response(
                expected_id,
                format!(
                    "no terminal event within {}ms",
                    session_timeout.as_millis()
                ),
            ))
        }
    }
}

pub struct EventStreamTransport {
    client: reqwest::Client,
    client_id: String,
    stream_path: String,
    message_path: String,
    open_timeout: Duration,
    session_timeout: Duration,
}

impl EventStreamTransport {
    pub fn new(paths: &BackendPaths, open_timeout: Duration, session_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: uuid::Uuid::new_v4().to_string(),
            stream_path: paths.stream.clone(),
            message_path: paths.message.clone(),
            open_timeout,
            session_timeout,
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn open(&self, server: &Server) -> Result<reqwest::Response> {
        let request = self
            .client
            .get(server.url_for(&self.stream_path))
            .query(&[("clientId", self.client_id.as_str())])
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send();

        let response = tokio::time::timeout(self.open_timeout, request)
            .await
            .map_err(|_| RouterError::timeout("stream open", self.open_timeout))?
            .map_err(|e| RouterError::from_reqwest(e, "stream open", self.open_timeout))?;

        if !response.status().is_success() {
            return Err(RouterError::from_status(response.status(), "stream open"));
        }
        Ok(response)
    }

    async fn deliver(&self, server: &Server, envelope: &CallEnvelope) -> Result<()> {
        let response = self
            .client
            .post(server.url_for(&self.message_path))
            .query(&[("clientId", self.client_id.as_str())])
            .timeout(self.open_timeout)
            .json(envelope)
            .send()
            .await
            .map_err(|e| RouterError::from_reqwest(e, "message delivery", self.open_timeout))?;

        if !response.status().is_success() {
            return Err(RouterError::from_status(response.status(), "message delivery"));
        }
        Ok(())
    }
}

impl EventStreamTransport {
    /// Runs one call over `session`, which always ends in a final state
    pub async fn run_session(
        &self,
        server: &Server,
        envelope: &CallEnvelope,
        session: &mut Session,
    ) -> Result<ReplyEnvelope> {
        tracing::debug!(server = %server.name, id = envelope.id, client_id = %self.client_id, "Opening event stream");

        let response = match self.open(server).await {
            Ok(response) => response,
            Err(e) => {
                session.advance(SessionState::TimedOut);
                return Err(e);
            }
        };
        session.advance(SessionState::AwaitingTerminal);

        if let Err(e) = self.deliver(server, envelope).await {
            session.advance(SessionState::TimedOut);
            tracing::debug!(server = %server.name, id = envelope.id, state = ?session.state(), error = %e, "Message delivery failed");
            return Err(e);
        }

        let frames = sse::frames(response.bytes_stream());
        let reply = consume(frames, session, envelope.id, self.session_timeout).await?;

        tracing::debug!(server = %server.name, id = envelope.id, state = ?session.state(), "Event stream closed");
        Ok(reply)
    }
}

#[async_trait]
impl Transport for EventStreamTransport {
    async fn send(&self, server: &Server, envelope: &CallEnvelope) -> Result<ReplyEnvelope> {
        let mut session = Session::new(envelope.id);
        self.run_session(server, envelope, &mut session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;

    fn frame(data: &str) -> Result<SseFrame> {
        Ok(SseFrame {
            event: Some("message".to_string()),
            data: data.to_string(),
        })
    }

    #[test]
    fn test_session_moves_forward_only() {
        let mut session = Session::new(1);
        assert!(session.advance(SessionState::AwaitingTerminal));
        assert!(!session.advance(SessionState::Opening));
        assert!(session.advance(SessionState::Terminated));
        assert!(!session.advance(SessionState::TimedOut));
        assert_eq!(session.state(), SessionState::Terminated);
        assert!(session.state().is_final());
    }

    #[test]
    fn test_reducer_ignores_other_ids_and_noise() {
        let mut reducer = EventReducer::new(7);
        assert!(!reducer.observe("not json"));
        assert!(!reducer.observe(r#"{"id": 8, "result": "other"}"#));
        assert!(!reducer.observe(r#"{"progress": 0.5}"#));
        assert!(!reducer.has_terminal());

        assert!(reducer.observe(r#"{"id": 7, "error": "boom"}"#));
        let reply = reducer.finish().unwrap();
        assert_eq!(reply.error.unwrap().message, "boom");
    }

    #[tokio::test]
    async fn test_terminal_in_the_middle_wins() {
        let frames = stream::iter(vec![frame("{}"), frame(r#"{"result":"ok"}"#), frame("{}")]);
        let mut session = Session::new(7);
        session.advance(SessionState::AwaitingTerminal);

        let reply = consume(frames, &mut session, 7, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(reply.result, Some(json!("ok")));
        assert_eq!(reply.id, Some(7));
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[tokio::test]
    async fn test_last_buffered_terminal_wins() {
        let frames = stream::iter(vec![
            frame(r#"{"result":"first"}"#),
            frame(r#"{"result":"second"}"#),
        ]);
        let mut session = Session::new(1);
        session.advance(SessionState::AwaitingTerminal);

        let reply = consume(frames, &mut session, 1, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply.result, Some(json!("second")));
    }

    #[tokio::test]
    async fn test_silent_stream_times_out_with_no_response() {
        let frames = stream::iter(vec![frame("{}")]).chain(stream::pending());
        let mut session = Session::new(3);
        session.advance(SessionState::AwaitingTerminal);

        let started = std::time::Instant::now();
        let reply = consume(frames, &mut session, 3, Duration::from_millis(50))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(session.state(), SessionState::TimedOut);
        let err = RouterError::from_rpc(&reply.error.unwrap());
        assert!(matches!(err, RouterError::NoResponse(_)));
    }

    #[tokio::test]
    async fn test_endless_chatter_is_bounded() {
        let frames = stream::repeat(()).then(|_| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            frame(r#"{"progress": 0.1}"#)
        });
        let mut session = Session::new(9);
        session.advance(SessionState::AwaitingTerminal);

        let started = std::time::Instant::now();
        let reply = consume(frames, &mut session, 9, Duration::from_millis(100))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(session.state(), SessionState::TimedOut);
        let err = RouterError::from_rpc(&reply.error.unwrap());
        assert!(matches!(err, RouterError::NoResponse(_)));
    }

    #[tokio::test]
    async fn test_closed_stream_without_terminal_is_no_response() {
        let frames = stream::iter(vec![frame("{}"), frame("{}")]);
        let mut session = Session::new(3);
        session.advance(SessionState::AwaitingTerminal);

        let reply = consume(frames, &mut session, 3, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(reply.is_error());
        assert_eq!(session.state(), SessionState::TimedOut);
    }

    #[tokio::test]
    async fn test_failed_delivery_ends_the_session() {
        use crate::models::server::TransportType;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let backend = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string("event: endpoint\ndata: /mcp/message\n\n"),
            )
            .mount(&backend)
            .await;
        Mock::given(method("POST"))
            .and(path("/mcp/message"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&backend)
            .await;

        let transport = EventStreamTransport::new(
            &BackendPaths::default(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let server = Server::new("S1", backend.uri(), TransportType::EventStream);
        let mut session = Session::new(4);

        let err = transport
            .run_session(&server, &CallEnvelope::tools_list(4), &mut session)
            .await
            .unwrap_err();

        assert!(matches!(err, RouterError::Transport(_)));
        assert_eq!(session.state(), SessionState::TimedOut);
        assert!(session.state().is_final());
    }
}
