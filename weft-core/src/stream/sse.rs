//! Server-sent-events transport
//!
//! Subscribes to `GET /threads/{id}/events` with an optional `since=<seq>`
//! resume cursor. Two channel types arrive on the wire: `gateway`, carrying
//! one JSON-encoded [`RawEvent`], and `heartbeat`, carrying nothing.
//!
//! A `gateway` frame whose JSON does not parse is logged and dropped; the
//! stream stays up. Unrecognized channel names are ignored the same way.
//! Transport-level failures surface as an `Err` frame, which the connection
//! manager answers with backoff and a fresh `open`.

use async_trait::async_trait;
use eventsource_stream::{Event as SseEvent, EventStreamError, Eventsource};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::types::RawEvent;

use super::{EventStream, EventTransport, StreamFrame};

/// Channel carrying domain events.
const CHANNEL_GATEWAY: &str = "gateway";
/// Channel carrying liveness pings.
const CHANNEL_HEARTBEAT: &str = "heartbeat";

/// SSE transport over the control-plane's push endpoint.
#[derive(Clone)]
pub struct SseTransport {
    http_client: reqwest::Client,
    base_url: String,
}

impl SseTransport {
    /// Create a transport from server configuration.
    ///
    /// The underlying client carries no request timeout: the subscription is
    /// long-lived by design and staleness is the watchdog's concern.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config.base_url.trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        if let Some(api_key) = &config.api_key {
            let auth_value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }
}

#[async_trait]
impl EventTransport for SseTransport {
    async fn open(&self, thread_id: &str, since: Option<u64>) -> Result<EventStream> {
        let mut url = format!(
            "{}/threads/{}/events",
            self.base_url,
            urlencoding::encode(thread_id)
        );
        if let Some(seq) = since {
            url.push_str(&format!("?since={}", seq));
        }

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Stream(format!("subscribe request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Stream(format!("subscribe failed ({})", status)));
        }

        let stream = response
            .bytes_stream()
            .eventsource()
            .filter_map(|frame| futures::future::ready(decode_frame(frame)))
            .boxed();

        Ok(stream)
    }
}

/// Decode one SSE frame into a stream frame, or nothing for droppable input.
fn decode_frame(
    frame: std::result::Result<SseEvent, EventStreamError<reqwest::Error>>,
) -> Option<Result<StreamFrame>> {
    match frame {
        Ok(event) => match event.event.as_str() {
            CHANNEL_HEARTBEAT => Some(Ok(StreamFrame::Heartbeat)),
            CHANNEL_GATEWAY => match serde_json::from_str::<RawEvent>(&event.data) {
                Ok(raw) => Some(Ok(StreamFrame::Event(raw))),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed gateway event");
                    None
                }
            },
            other => {
                tracing::debug!(channel = %other, "Ignoring unrecognized stream channel");
                None
            }
        },
        Err(e) => Some(Err(Error::Stream(e.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sse_event(event: &str, data: &str) -> SseEvent {
        SseEvent {
            event: event.to_string(),
            data: data.to_string(),
            id: String::new(),
            retry: None,
        }
    }

    #[test]
    fn test_decode_heartbeat() {
        let frame = decode_frame(Ok(sse_event("heartbeat", "")));
        assert!(matches!(frame, Some(Ok(StreamFrame::Heartbeat))));
    }

    #[test]
    fn test_decode_gateway_event() {
        let data = r#"{"seq": 3, "serverTs": "2026-08-01T10:00:00Z", "threadId": "th-1",
                       "kind": "item", "name": "item/agentMessage/delta",
                       "payload": {"delta": "hi"}}"#;
        let frame = decode_frame(Ok(sse_event("gateway", data)));
        match frame {
            Some(Ok(StreamFrame::Event(raw))) => {
                assert_eq!(raw.seq, 3);
                assert_eq!(raw.name, "item/agentMessage/delta");
            }
            other => panic!("expected gateway event, got {:?}", other.is_some()),
        }
    }

    #[test]
    fn test_malformed_gateway_is_dropped_silently() {
        let frame = decode_frame(Ok(sse_event("gateway", "{not json")));
        assert!(frame.is_none());
    }

    #[test]
    fn test_unknown_channel_is_ignored() {
        let frame = decode_frame(Ok(sse_event("metrics", "{}")));
        assert!(frame.is_none());
    }

    #[test]
    fn test_transport_rejects_invalid_config() {
        let config = ServerConfig {
            base_url: "".to_string(),
            ..Default::default()
        };
        assert!(SseTransport::new(&config).is_err());
    }
}
