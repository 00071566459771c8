//! Ollama `/api/chat` backend.
//!
//! Non-streaming requests return one JSON object. Streaming requests return
//! newline-delimited JSON; lines can be split across network chunks, so bytes
//! are buffered and only complete lines are decoded.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, Stream};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{BackendError, ChatMessage, CompletionBackend, FragmentStream};
use crate::config::BackendConfig;

pub struct OllamaBackend {
    client: Client,
    chat_url: String,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// Both the full response and each streamed line have this shape.
#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

impl OllamaBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            chat_url: format!("{}/api/chat", config.url.trim_end_matches('/')),
            stream: config.stream,
        })
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<FragmentStream, BackendError> {
        let request = ChatRequest {
            model,
            messages,
            stream: self.stream,
        };
        tracing::debug!(
            url = %self.chat_url,
            model,
            messages = messages.len(),
            stream = self.stream,
            "sending chat request"
        );

        let response = self.client.post(&self.chat_url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if self.stream {
            return Ok(ndjson_fragments(response.bytes_stream()));
        }

        let body = response.text().await?;
        let content = parse_full_response(&body)?;
        Ok(stream::iter([Ok(content)]).boxed())
    }
}

fn parse_full_response(body: &str) -> Result<String, BackendError> {
    let chunk: ChatChunk =
        serde_json::from_str(body).map_err(|e| BackendError::Malformed(e.to_string()))?;
    if let Some(error) = chunk.error {
        return Err(BackendError::Remote(error));
    }
    chunk
        .message
        .map(|m| m.content)
        .ok_or_else(|| BackendError::Malformed("response has no message".into()))
}

/// Parse one streamed line. `Ok(None)` for lines without text, such as the
/// final `done` record.
fn parse_stream_line(line: &str) -> Result<Option<String>, BackendError> {
    let chunk: ChatChunk = serde_json::from_str(line)
        .map_err(|e| BackendError::Malformed(format!("{e}: {line}")))?;
    if let Some(error) = chunk.error {
        return Err(BackendError::Remote(error));
    }
    Ok(chunk
        .message
        .map(|m| m.content)
        .filter(|content| !content.is_empty()))
}

/// Turn a byte stream of NDJSON records into a stream of content fragments.
fn ndjson_fragments<S, B, E>(bytes: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let reader = NdjsonReader {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };
    stream::unfold(reader, |mut reader| async move {
        let item = reader.next_fragment().await?;
        Some((item, reader))
    })
    .boxed()
}

struct NdjsonReader<S> {
    bytes: Pin<Box<S>>,
    buffer: Vec<u8>,
    pending: VecDeque<Result<String, BackendError>>,
    finished: bool,
}

impl<S, B, E> NdjsonReader<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    async fn next_fragment(&mut self) -> Option<Result<String, BackendError>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }

            match self.bytes.next().await {
                Some(Ok(chunk)) => {
                    self.buffer.extend_from_slice(chunk.as_ref());
                    self.drain_complete_lines();
                }
                Some(Err(e)) => {
                    self.finished = true;
                    self.pending.push_back(Err(BackendError::Stream(e.to_string())));
                }
                None => {
                    self.finished = true;
                    // Final record without a trailing newline
                    let rest = std::mem::take(&mut self.buffer);
                    self.push_line(&rest);
                }
            }
        }
    }

    fn drain_complete_lines(&mut self) {
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            self.push_line(&line);
            if self.finished {
                break;
            }
        }
    }

    fn push_line(&mut self, line: &[u8]) {
        let line = match std::str::from_utf8(line) {
            Ok(line) => line.trim(),
            Err(e) => {
                self.finished = true;
                self.pending
                    .push_back(Err(BackendError::Malformed(format!("invalid UTF-8: {e}"))));
                return;
            }
        };
        if line.is_empty() {
            return;
        }
        match parse_stream_line(line) {
            Ok(Some(fragment)) => self.pending.push_back(Ok(fragment)),
            Ok(None) => {}
            Err(e) => {
                self.finished = true;
                self.pending.push_back(Err(e));
            }
        }
    }
}
