//! Gemini API client.
//!
//! Provides type-safe methods for:
//! - Single-shot multimodal generation (prompt + inline images)
//! - Streamed chat turns with a system instruction and prior history
//!
//! Calls are never retried; failures surface to the caller unchanged.

use anyhow::{Context, Result};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument};

use super::sse::SseDecoder;
use crate::error::ApiError;

/// Fragment of the provider message that identifies a rejected key.
const INVALID_KEY_MARKER: &str = "API key not valid";

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("API key not valid")]
    InvalidApiKey,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message} ({status})")]
    Provider { status: StatusCode, message: String },

    #[error("response contained no text")]
    MalformedResponse,
}

impl GeminiError {
    /// Message suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidApiKey => {
                "APIキーが無効です。正しいAPIキーを設定してください。".to_string()
            }
            Self::MalformedResponse => {
                "AIからの応答形式が正しくありません。テキストデータが見つかりませんでした。"
                    .to_string()
            }
            other => format!("Gemini APIとの通信に失敗しました: {}", other),
        }
    }

    fn from_provider(status: StatusCode, message: String) -> Self {
        if message.contains(INVALID_KEY_MARKER) {
            Self::InvalidApiKey
        } else {
            Self::Provider { status, message }
        }
    }
}

impl From<GeminiError> for ApiError {
    fn from(e: GeminiError) -> Self {
        ApiError::Upstream(e.user_message())
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part::Text { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
    /// Part kinds this client never produces (function calls, etc.)
    Other(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    /// Base64 payload without the data URL prefix.
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, `None` if it has no text parts.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let mut texts = content.parts.iter().filter_map(|part| match part {
            Part::Text { text } => Some(text.as_str()),
            _ => None,
        });
        let first = texts.next()?;
        Some(texts.fold(first.to_string(), |mut acc, t| {
            acc.push_str(t);
            acc
        }))
    }
}

/// Error envelope returned by the API.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Decode one streamed chunk into its text fragment.
fn parse_stream_chunk(payload: &str) -> Result<String, GeminiError> {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(payload) {
        return Err(GeminiError::from_provider(
            StatusCode::INTERNAL_SERVER_ERROR,
            envelope.error.message,
        ));
    }
    let chunk: GenerateContentResponse =
        serde_json::from_str(payload).map_err(|_| GeminiError::MalformedResponse)?;
    Ok(chunk.text().unwrap_or_default())
}

/// Turn a `text/event-stream` body into text fragments.
///
/// The stream ends after the first error, whether it comes from the
/// transport or from an error payload sent by the API.
fn decode_fragments<S, B, E>(bytes: S) -> BoxStream<'static, Result<String, GeminiError>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Send + 'static,
    GeminiError: From<E>,
{
    let state = (
        bytes.boxed(),
        SseDecoder::default(),
        VecDeque::<String>::new(),
        false,
    );

    stream::unfold(state, |(mut bytes, mut decoder, mut pending, mut done)| async move {
        loop {
            if let Some(payload) = pending.pop_front() {
                let item = parse_stream_chunk(&payload);
                if item.is_err() {
                    pending.clear();
                    done = true;
                }
                return Some((item, (bytes, decoder, pending, done)));
            }
            if done {
                return None;
            }
            match bytes.next().await {
                Some(Ok(chunk)) => pending.extend(decoder.push(chunk.as_ref())),
                Some(Err(e)) => {
                    done = true;
                    let item = Err(GeminiError::from(e));
                    return Some((item, (bytes, decoder, pending, done)));
                }
                None => {
                    done = true;
                    pending.extend(decoder.finish());
                }
            }
        }
    })
    .boxed()
}

// =============================================================================
// Client
// =============================================================================

/// Client for the Gemini generative language API.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl GeminiClient {
    /// Create a new Gemini client.
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout_seconds: u64) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_seconds);
        // Streamed replies may take longer than `timeout` in total, so the
        // client only bounds the gap between reads
        let client = Client::builder()
            .read_timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(base_url = base_url, model = model, "Gemini client initialized");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, self.model, method)
    }

    /// Deadline for a whole request; streamed calls only have the read timeout.
    fn total_timeout(&self, method: &str) -> Option<Duration> {
        (method == "generateContent").then_some(self.timeout)
    }

    /// POST a generation request and map non-success statuses to errors.
    async fn post(
        &self,
        url: &str,
        body: &GenerateContentRequest<'_>,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, GeminiError> {
        debug!(url = %url, "Gemini request");

        let mut request = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Gemini request failed");
                GeminiError::Transport(e)
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorEnvelope>()
            .await
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("Gemini API error: {}", status));

        error!(status = %status, message = %message, "Gemini API error");
        Err(GeminiError::from_provider(status, message))
    }

    /// Generate a single response for a prompt and zero or more images.
    #[instrument(skip(self, prompt, images), fields(images = images.len()))]
    pub async fn generate_content(
        &self,
        prompt: &str,
        images: &[Blob],
    ) -> Result<String, GeminiError> {
        let mut parts = vec![Part::Text {
            text: prompt.to_string(),
        }];
        parts.extend(images.iter().cloned().map(|blob| Part::InlineData { inline_data: blob }));

        let contents = [Content {
            role: Some("user".to_string()),
            parts,
        }];
        let request = GenerateContentRequest {
            contents: &contents,
            system_instruction: None,
        };

        let response: GenerateContentResponse = self
            .post(
                &self.endpoint("generateContent"),
                &request,
                self.total_timeout("generateContent"),
            )
            .await?
            .json()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to parse Gemini response");
                GeminiError::MalformedResponse
            })?;

        response.text().ok_or_else(|| {
            error!("Gemini response has no text");
            GeminiError::MalformedResponse
        })
    }

    /// Send one chat turn and stream the reply as text fragments.
    ///
    /// `history` holds the earlier turns of the session, oldest first.
    #[instrument(skip_all, fields(history = history.len()))]
    pub async fn stream_chat(
        &self,
        system_instruction: &str,
        history: &[Content],
        message: &str,
    ) -> Result<BoxStream<'static, Result<String, GeminiError>>, GeminiError> {
        let mut contents = history.to_vec();
        contents.push(Content::text("user", message));

        let request = GenerateContentRequest {
            contents: &contents,
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::Text {
                    text: system_instruction.to_string(),
                }],
            }),
        };

        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let timeout = self.total_timeout("streamGenerateContent");
        let response = self.post(&url, &request, timeout).await?;

        Ok(decode_fragments(response.bytes_stream()))
    }

    /// Check that the key and model are usable.
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/v1beta/models/{}", self.base_url, self.model);

        self.client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .context("Gemini health check failed")?
            .error_for_status()
            .context("Gemini API unhealthy")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_to_api_shape() {
        let contents = [Content {
            role: Some("user".into()),
            parts: vec![
                Part::Text {
                    text: "現調してください".into(),
                },
                Part::InlineData {
                    inline_data: Blob {
                        mime_type: "image/jpeg".into(),
                        data: "AAAA".into(),
                    },
                },
            ],
        }];
        let request = GenerateContentRequest {
            contents: &contents,
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::Text { text: "sys".into() }],
            }),
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": "現調してください" },
                        { "inlineData": { "mimeType": "image/jpeg", "data": "AAAA" } }
                    ]
                }],
                "systemInstruction": { "parts": [{ "text": "sys" }] }
            })
        );
    }

    #[test]
    fn response_text_joins_text_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "1. 建物概要\n" },
                        { "functionCall": { "name": "noop" } },
                        { "text": "構造: 木造" }
                    ]
                },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("1. 建物概要\n構造: 木造"));
    }

    #[test]
    fn response_without_text_is_none() {
        let empty: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.text(), None);

        let blocked: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        }))
        .unwrap();
        assert_eq!(blocked.text(), None);
    }

    #[test]
    fn stream_chunks() {
        let chunk = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"はい"}]}}]}"#;
        assert_eq!(parse_stream_chunk(chunk).unwrap(), "はい");

        let usage_only = r#"{"usageMetadata":{"totalTokenCount":12}}"#;
        assert_eq!(parse_stream_chunk(usage_only).unwrap(), "");

        let failure = r#"{"error":{"code":503,"message":"overloaded","status":"UNAVAILABLE"}}"#;
        assert!(matches!(
            parse_stream_chunk(failure),
            Err(GeminiError::Provider { .. })
        ));

        assert!(matches!(
            parse_stream_chunk("not json"),
            Err(GeminiError::MalformedResponse)
        ));
    }

    #[test]
    fn invalid_key_is_recognized() {
        let error = GeminiError::from_provider(
            StatusCode::BAD_REQUEST,
            "API key not valid. Please pass a valid API key.".into(),
        );
        assert!(matches!(error, GeminiError::InvalidApiKey));
        assert_eq!(
            error.user_message(),
            "APIキーが無効です。正しいAPIキーを設定してください。"
        );
    }

    #[test]
    fn provider_errors_become_upstream_api_errors() {
        let error = GeminiError::from_provider(StatusCode::TOO_MANY_REQUESTS, "quota".into());
        match ApiError::from(error) {
            ApiError::Upstream(msg) => {
                assert!(msg.starts_with("Gemini APIとの通信に失敗しました: "));
                assert!(msg.contains("quota"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    fn event(text: &str) -> String {
        let chunk = json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
        });
        format!("data: {}\r\n\r\n", chunk)
    }

    async fn fragments(
        chunks: Vec<Result<Vec<u8>, GeminiError>>,
    ) -> Vec<Result<String, GeminiError>> {
        decode_fragments(stream::iter(chunks)).collect().await
    }

    #[tokio::test]
    async fn body_split_inside_a_character_decodes_in_order() {
        let body = format!("{}{}", event("木造です"), event("。"));
        let at = body.find('木').unwrap() + 1;
        let chunks = vec![
            Ok(body.as_bytes()[..at].to_vec()),
            Ok(body.as_bytes()[at..].to_vec()),
        ];

        let texts: Vec<String> = fragments(chunks)
            .await
            .into_iter()
            .map(|item| item.unwrap())
            .collect();
        assert_eq!(texts, vec!["木造です".to_string(), "。".to_string()]);
    }

    #[tokio::test]
    async fn unterminated_last_event_is_flushed() {
        let body = event("最後");
        let body = body.trim_end().to_string();

        let items = fragments(vec![Ok(body.into_bytes())]).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_deref().unwrap(), "最後");
    }

    #[tokio::test]
    async fn error_payload_ends_the_stream() {
        let body = format!(
            "{}data: {}\n\n{}",
            event("前半"),
            json!({ "error": { "code": 500, "message": "internal" } }),
            event("後半"),
        );

        let items = fragments(vec![Ok(body.into_bytes())]).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "前半");
        assert!(matches!(
            &items[1],
            Err(GeminiError::Provider { message, .. }) if message == "internal"
        ));
    }

    #[tokio::test]
    async fn transport_error_ends_the_stream() {
        let chunks = vec![
            Ok(event("途中").into_bytes()),
            Err(GeminiError::MalformedResponse),
            Ok(event("届かない").into_bytes()),
        ];

        let items = fragments(chunks).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "途中");
        assert!(matches!(items[1], Err(GeminiError::MalformedResponse)));
    }

    #[test]
    fn only_single_shot_calls_have_a_total_deadline() {
        let client =
            GeminiClient::new("http://127.0.0.1:9/", "key", "gemini-2.5-flash", 120).unwrap();
        assert_eq!(
            client.total_timeout("generateContent"),
            Some(Duration::from_secs(120))
        );
        assert_eq!(client.total_timeout("streamGenerateContent"), None);
    }
}
