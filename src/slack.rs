use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Slack refuses (or truncates) messages much longer than this.
pub const DEFAULT_MAX_LINES: usize = 30;

pub const DEFAULT_API_URL: &str = "https://slack.com/api";

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Request to post to {channel} failed: {underlying_error}")]
    Request {
        channel: String,
        underlying_error: reqwest::Error,
    },
    #[error("Slack rejected message to {channel}: {reason}")]
    Rejected { channel: String, reason: String },
}

/// Somewhere a message can be posted, one call per message.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), DeliveryError>;
}

#[derive(Deserialize, Debug)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct SlackClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl SlackClient {
    pub fn new<S: Into<String>>(token: S) -> SlackClient {
        SlackClient::with_api_url(token, DEFAULT_API_URL)
    }

    pub fn with_api_url<S1: Into<String>, S2: AsRef<str>>(token: S1, api_url: S2) -> SlackClient {
        SlackClient {
            http: reqwest::Client::new(),
            api_url: api_url.as_ref().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl MessageSink for SlackClient {
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), DeliveryError> {
        let request_error = |e: reqwest::Error| DeliveryError::Request {
            channel: channel.to_string(),
            underlying_error: e,
        };

        let response: PostMessageResponse = self
            .http
            .post(format!("{}/chat.postMessage", self.api_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({
                "channel": channel,
                "text": text,
                "as_user": false,
                "username": "purr",
                "icon_emoji": ":purr:",
            }))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(request_error)?
            .json()
            .await
            .map_err(request_error)?;

        if !response.ok {
            return Err(DeliveryError::Rejected {
                channel: channel.to_string(),
                reason: response.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        Ok(())
    }
}

/// Splits `message` into runs of at most `max_lines` lines. Joining the result
/// with `\n` gives back `message` exactly.
pub fn chunk_lines(message: &str, max_lines: usize) -> Vec<String> {
    let lines: Vec<&str> = message.split('\n').collect();
    lines
        .chunks(max_lines.max(1))
        .map(|chunk| chunk.join("\n"))
        .collect()
}

/// Posts `message` in chunks, one after another, skipping chunks with nothing
/// but whitespace (Slack answers those with `no_text`).
///
/// Stops at the first failure; chunks already posted stay posted. Returns the
/// number of messages sent.
pub async fn deliver<S: MessageSink + ?Sized>(
    sink: &S,
    channel: &str,
    message: &str,
    max_lines: usize,
) -> Result<usize, DeliveryError> {
    if message.is_empty() {
        log::info!("Nothing to deliver");
        return Ok(0);
    }

    let mut sent = 0;
    for chunk in chunk_lines(message, max_lines) {
        if chunk.trim().is_empty() {
            continue;
        }
        sink.post_message(channel, &chunk).await?;
        sent += 1;
    }

    log::debug!("Delivered {sent} messages to {channel}");
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::test_server::{serve, Reply};

    #[derive(Default)]
    struct RecordingSink {
        posted: Mutex<Vec<(String, String)>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn post_message(&self, channel: &str, text: &str) -> Result<(), DeliveryError> {
            let mut posted = self.posted.lock().unwrap();
            if self.fail_on == Some(posted.len()) {
                return Err(DeliveryError::Rejected {
                    channel: channel.to_string(),
                    reason: "msg_too_long".to_string(),
                });
            }
            posted.push((channel.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn numbered_lines(count: usize) -> String {
        (0..count)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn chunking_is_lossless_and_bounded() {
        for lines in [1, 2, 29, 30, 31, 60, 61, 95] {
            for max_lines in [1, 7, 30] {
                let message = numbered_lines(lines);
                let chunks = chunk_lines(&message, max_lines);

                assert_eq!(chunks.len(), lines.div_ceil(max_lines));
                assert_eq!(chunks.join("\n"), message);
                for chunk in &chunks {
                    assert!(!chunk.is_empty());
                    assert!(chunk.split('\n').count() <= max_lines);
                }
            }
        }
    }

    #[test]
    fn zero_max_lines_behaves_like_one() {
        assert_eq!(chunk_lines("a\nb", 0), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn delivers_chunks_in_order() {
        let sink = RecordingSink::default();
        let message = numbered_lines(65);

        let sent = deliver(&sink, "#reviews", &message, 30).await.unwrap();

        let posted = sink.posted.lock().unwrap();
        assert_eq!(sent, 3);
        assert!(posted.iter().all(|(channel, _)| channel == "#reviews"));
        let texts: Vec<&str> = posted.iter().map(|(_, text)| text.as_str()).collect();
        assert_eq!(texts.join("\n"), message);
    }

    #[tokio::test]
    async fn skips_empty_chunks() {
        let sink = RecordingSink::default();
        // 31 lines, the last of which is the empty string after the final newline
        let message = format!("{}\n", numbered_lines(30));

        assert_eq!(deliver(&sink, "c", &message, 30).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn skips_chunks_of_blank_lines() {
        let sink = RecordingSink::default();
        let message = "*o/a*\n • pr\n\n\nThere are currently 1 open pull requests";

        assert_eq!(chunk_lines(message, 2)[1], "\n");
        assert_eq!(deliver(&sink, "c", message, 2).await.unwrap(), 2);

        let posted = sink.posted.lock().unwrap();
        assert_eq!(posted[0].1, "*o/a*\n • pr");
        assert_eq!(posted[1].1, "There are currently 1 open pull requests");
    }

    #[tokio::test]
    async fn empty_message_is_not_delivered() {
        let sink = RecordingSink::default();
        assert_eq!(deliver(&sink, "c", "", 30).await.unwrap(), 0);
        assert!(sink.posted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stops_at_first_failure() {
        let sink = RecordingSink {
            fail_on: Some(1),
            ..Default::default()
        };

        let result = deliver(&sink, "c", &numbered_lines(90), 30).await;

        assert!(matches!(result, Err(DeliveryError::Rejected { .. })));
        assert_eq!(sink.posted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn slack_posts_as_purr() {
        let server = serve(|_| Reply::json(200, r#"{"ok": true}"#)).await;
        let slack = SlackClient::with_api_url("xoxb-secret", &server.url);

        slack.post_message("#reviews", "hello").await.unwrap();

        let requests = server.requests();
        let request = &requests[0];
        assert!(request.starts_with("POST /chat.postMessage "), "{request}");
        assert!(request.to_lowercase().contains("authorization: bearer xoxb-secret"));
        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["channel"], "#reviews");
        assert_eq!(body["text"], "hello");
        assert_eq!(body["username"], "purr");
    }

    #[tokio::test]
    async fn slack_refusal_is_a_rejection() {
        let server = serve(|_| Reply::json(200, r#"{"ok": false, "error": "channel_not_found"}"#)).await;
        let slack = SlackClient::with_api_url("xoxb-secret", &server.url);

        let result = slack.post_message("#nowhere", "hello").await;

        match result {
            Err(DeliveryError::Rejected { channel, reason }) => {
                assert_eq!(channel, "#nowhere");
                assert_eq!(reason, "channel_not_found");
            }
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slack_http_error_fails_the_request() {
        let server = serve(|_| Reply::json(503, "{}")).await;
        let slack = SlackClient::with_api_url("xoxb-secret", &server.url);

        let result = slack.post_message("#reviews", "hello").await;

        assert!(matches!(result, Err(DeliveryError::Request { .. })), "{result:?}");
    }
}
