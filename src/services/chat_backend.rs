use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::Message;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Stream chunks emitted during responses
#[derive(Debug, Clone)]
pub enum StreamChunk {
    Text(String),
    Done,
    Error(String),
}

/// Type alias for response streams
pub type ResponseStream = BoxStream<'static, Result<StreamChunk>>;

/// Payload sent to the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_message: String,
    /// Plain-text description of the attached datasets; only sent with the
    /// first message of a conversation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_info: Option<String>,
    pub conversation_history: Vec<Message>,
    pub model: String,
    /// Inline data-URL image attachments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TitleRequest<'a> {
    first_message: &'a str,
}

#[derive(Debug, Deserialize)]
struct TitleResponse {
    title: String,
}

/// Non-streaming variant of the chat endpoint's answer.
#[derive(Debug, Deserialize)]
struct JsonChatResponse {
    assistant: String,
}

/// Abstraction over the model-serving HTTP backend.
pub trait ChatBackend: Send + Sync + 'static {
    /// Send a message and get the assistant's reply as a chunk stream.
    fn send_message(&self, request: ChatRequest) -> BoxFuture<'static, Result<ResponseStream>>;

    /// Ask the backend for a short conversation title from the first
    /// user message.
    fn generate_title(&self, message: &str) -> BoxFuture<'static, Result<String>>;
}

/// Incremental UTF-8 decoder for byte chunks that may split a multi-byte
/// sequence at the boundary. Incomplete tail bytes are held back until the
/// next chunk; genuinely invalid sequences decode lossily.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning all text decodable so far.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(s) => {
                let out = s.to_string();
                self.pending.clear();
                out
            }
            Err(e) if e.error_len().is_none() => {
                // Incomplete sequence at the tail; keep it for the next chunk.
                let valid = e.valid_up_to();
                let out = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                self.pending.drain(..valid);
                out
            }
            Err(_) => {
                let out = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                out
            }
        }
    }

    /// Flush whatever is left once the stream ends.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }
}

/// HTTP backend talking to the app server's `/api/chat` routes. Handles both
/// the streamed plain-text response and the JSON `{"assistant": ...}` form,
/// distinguished by the response Content-Type.
pub struct HttpChatBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChatBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl ChatBackend for HttpChatBackend {
    fn send_message(&self, request: ChatRequest) -> BoxFuture<'static, Result<ResponseStream>> {
        let client = self.client.clone();
        let url = format!("{}/api/chat", self.base_url);

        Box::pin(async move {
            let response = client
                .post(&url)
                .json(&request)
                .send()
                .await
                .context("Failed to reach chat backend")?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Chat backend returned {}: {}", status, body);
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();

            if content_type.starts_with("application/json") {
                debug!("Chat backend answered with a non-streaming JSON body");
                let parsed: JsonChatResponse = response
                    .json()
                    .await
                    .context("Failed to parse JSON chat response")?;
                let stream: ResponseStream = Box::pin(futures::stream::iter(vec![
                    Ok(StreamChunk::Text(parsed.assistant)),
                    Ok(StreamChunk::Done),
                ]));
                return Ok(stream);
            }

            let mut bytes = response.bytes_stream();
            let stream: ResponseStream = Box::pin(async_stream::stream! {
                let mut decoder = Utf8ChunkDecoder::new();
                while let Some(item) = bytes.next().await {
                    match item {
                        Ok(chunk) => {
                            let text = decoder.push(&chunk);
                            if !text.is_empty() {
                                yield Ok(StreamChunk::Text(text));
                            }
                        }
                        Err(e) => {
                            yield Ok(StreamChunk::Error(e.to_string()));
                            return;
                        }
                    }
                }
                let tail = decoder.finish();
                if !tail.is_empty() {
                    yield Ok(StreamChunk::Text(tail));
                }
                yield Ok(StreamChunk::Done);
            });
            Ok(stream)
        })
    }

    fn generate_title(&self, message: &str) -> BoxFuture<'static, Result<String>> {
        let client = self.client.clone();
        let url = format!("{}/api/chat/title", self.base_url);
        let body = serde_json::to_value(TitleRequest {
            first_message: message,
        });

        Box::pin(async move {
            let body = body.context("Failed to serialize title request")?;
            let response = client
                .post(&url)
                .json(&body)
                .send()
                .await
                .context("Failed to reach title endpoint")?;

            let status = response.status();
            if !status.is_success() {
                anyhow::bail!("Title endpoint returned {}", status);
            }

            let parsed: TitleResponse = response
                .json()
                .await
                .context("Failed to parse title response")?;
            Ok(parsed.title)
        })
    }
}
