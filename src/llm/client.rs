//! Provider backend trait and the `GroqClient` HTTP implementation.
//!
//! `GroqClient` calls any OpenAI-compatible API (Groq by default) and takes
//! the credential per request, so a single client serves every key in the
//! [`CredentialPool`](crate::pool::CredentialPool).  All connection details
//! come from [`ProviderConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ProviderConfig;
use crate::pool::Credential;
use crate::text::truncate_chars;

/// Max characters of an error body carried in [`LlmError::Status`].
const ERROR_BODY_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors from a single provider call.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// Non-2xx response (401 bad key, 429 rate limit, 5xx …).
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// The LLM returned a response with no usable text content.
    #[error("LLM returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// One message in the chat-completions wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: content.into() }
    }
}

// ---------------------------------------------------------------------------
// LlmBackend trait
// ---------------------------------------------------------------------------

/// One remote operation per call, authenticated with the given credential.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn LlmBackend>` between concurrent user requests.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Chat completion; returns the trimmed assistant text.
    async fn chat(
        &self,
        credential: &Credential,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, LlmError>;

    /// Speech to text for an encoded audio file (OGG/MP3/WAV …).
    async fn transcribe(
        &self,
        credential: &Credential,
        audio: &[u8],
        file_name: &str,
        mime: &str,
    ) -> Result<String, LlmError>;

    /// Ask the vision model about a JPEG/PNG image.
    async fn describe_image(
        &self,
        credential: &Credential,
        image: &[u8],
        prompt: &str,
    ) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// GroqClient
// ---------------------------------------------------------------------------

/// OpenAI wire-format client.  Works with Groq, OpenAI, Together.ai,
/// LM Studio and vLLM alike.
pub struct GroqClient {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl GroqClient {
    /// Build a client from provider config.
    ///
    /// The HTTP client is pre-configured with `config.timeout_secs`.  A
    /// default (no-timeout) client is used as a last-resort fallback if the
    /// builder fails.
    pub fn from_config(config: &ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post_chat(
        &self,
        credential: &Credential,
        body: serde_json::Value,
    ) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(credential.expose())
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        non_empty(json["choices"][0]["message"]["content"].as_str())
    }
}

#[async_trait]
impl LlmBackend for GroqClient {
    async fn chat(
        &self,
        credential: &Credential,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model":       self.config.chat_model,
            "messages":    messages,
            "stream":      false,
            "temperature": temperature,
        });
        self.post_chat(credential, body).await
    }

    async fn transcribe(
        &self,
        credential: &Credential,
        audio: &[u8],
        file_name: &str,
        mime: &str,
    ) -> Result<String, LlmError> {
        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(file_name.to_string())
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.config.transcription_model.clone())
            .text("language", self.config.language.clone())
            .text("response_format", "text");

        let response = self
            .client
            .post(self.url("audio/transcriptions"))
            .bearer_auth(credential.expose())
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;

        let text = response.text().await?;
        non_empty(Some(&text))
    }

    async fn describe_image(
        &self,
        credential: &Credential,
        image: &[u8],
        prompt: &str,
    ) -> Result<String, LlmError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let body = serde_json::json!({
            "model": self.config.vision_model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url",
                      "image_url": { "url": format!("data:image/jpeg;base64,{encoded}") } }
                ]
            }],
            "stream": false,
        });
        self.post_chat(credential, body).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LlmError::Status {
        status: status.as_u16(),
        body: truncate_chars(body.trim(), ERROR_BODY_CHARS),
    })
}

fn non_empty(text: Option<&str>) -> Result<String, LlmError> {
    let text = text.ok_or(LlmError::EmptyResponse)?.trim();
    if text.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
