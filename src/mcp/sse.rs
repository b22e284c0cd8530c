//! Server-sent-events framing for backend streams
//!
//! Parsing is done by `eventsource_stream`, which buffers across chunk
//! boundaries (including multi-byte UTF-8 sequences split between chunks).
//! This module only narrows its events to the two fields the router reads
//! and maps read failures into the router's error taxonomy.

use eventsource_stream::{Event, Eventsource};
use futures::future;
use futures::stream::{Stream, StreamExt};

use crate::error::RouterError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl From<Event> for SseFrame {
    fn from(event: Event) -> Self {
        Self {
            event: Some(event.event).filter(|name| !name.is_empty()),
            data: event.data,
        }
    }
}

/// Turns a byte stream into a stream of decoded frames
///
/// A read or parse error is yielded once as `Transport` and ends the stream.
pub fn frames<S, B, E>(bytes: S) -> impl Stream<Item = Result<SseFrame, RouterError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    bytes.eventsource().scan(false, |failed, item| {
        let next = if *failed {
            None
        } else {
            Some(match item {
                Ok(event) => Ok(SseFrame::from(event)),
                Err(e) => {
                    *failed = true;
                    Err(RouterError::Transport(format!("stream read failed: {}", e)))
                }
            })
        };
        future::ready(next)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::convert::Infallible;

    async fn decode(chunks: Vec<Vec<u8>>) -> Vec<SseFrame> {
        let chunks = chunks.into_iter().map(Ok::<_, Infallible>);
        frames(stream::iter(chunks))
            .map(|frame| frame.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_frames_split_across_chunks() {
        let decoded = decode(vec![
            b"data: {\"res".to_vec(),
            b"ult\":1}\n\ndata: {}\n".to_vec(),
            b"\n".to_vec(),
        ])
        .await;

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].data, r#"{"result":1}"#);
        assert_eq!(decoded[1].data, "{}");
    }

    #[tokio::test]
    async fn test_multibyte_character_split_across_chunks() {
        let body = "data: {\"result\":\"张三\"}\n\n".as_bytes();
        let split = body
            .iter()
            .position(|b| *b >= 0x80)
            .map(|start| start + 1)
            .unwrap();

        let decoded = decode(vec![body[..split].to_vec(), body[split..].to_vec()]).await;

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].data, r#"{"result":"张三"}"#);
    }

    #[tokio::test]
    async fn test_event_name_comments_and_crlf() {
        let decoded = decode(vec![
            b": keep-alive\r\n\r\nevent: message\r\ndata: a\r\ndata: b\r\n\r\n".to_vec(),
        ])
        .await;

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].event.as_deref(), Some("message"));
        assert_eq!(decoded[0].data, "a\nb");
    }

    #[tokio::test]
    async fn test_frames_stream_reports_read_error() {
        let chunks: Vec<Result<&[u8], String>> = vec![
            Ok(b"data: one\n\n"),
            Err("connection reset".to_string()),
            Ok(b"data: never\n\n"),
        ];
        let decoded: Vec<_> = frames(stream::iter(chunks)).collect().await;

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].as_ref().unwrap().data, "one");
        assert!(matches!(decoded[1], Err(RouterError::Transport(_))));
    }
}
