//! `TextProcessor` — every user-facing LLM task, routed through the
//! [`Dispatcher`] so each call rotates keys and fails over.
//!
//! The processor never turns failures into text itself; see
//! [`FriendlyProcessor`](crate::llm::FriendlyProcessor) for that.

use std::sync::Arc;

use thiserror::Error;

use crate::config::TextConfig;
use crate::llm::client::{ChatMessage, LlmBackend};
use crate::llm::prompt::{ProcessingMode, PromptBuilder};
use crate::pool::{DispatchError, Dispatcher};
use crate::text::{clamp_to_token_limit, is_short_text, trim_messages_to_token_limit};

/// Temperature for OCR and document answers.
const REASONING_TEMPERATURE: f32 = 0.3;

// ---------------------------------------------------------------------------
// ProcessError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ProcessError {
    /// Key rotation gave up (or no keys are configured).
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("input is empty")]
    EmptyInput,

    /// Summary requested for a text below the short-text thresholds.
    #[error("text is too short to summarise")]
    TextTooShort,
}

impl ProcessError {
    /// `true` when no API keys are configured at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ProcessError::Dispatch(e) if e.is_unavailable())
    }
}

// ---------------------------------------------------------------------------
// TextProcessor
// ---------------------------------------------------------------------------

/// Transcription, correction, summaries, OCR and document Q&A.
pub struct TextProcessor {
    dispatcher: Dispatcher,
    backend: Arc<dyn LlmBackend>,
    text: TextConfig,
}

impl TextProcessor {
    pub fn new(dispatcher: Dispatcher, backend: Arc<dyn LlmBackend>, text: TextConfig) -> Self {
        Self {
            dispatcher,
            backend,
            text,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn text_config(&self) -> &TextConfig {
        &self.text
    }

    /// Speech to text for a voice message, video note or audio file.
    pub async fn transcribe_voice(
        &self,
        audio: &[u8],
        file_name: &str,
        mime: &str,
    ) -> Result<String, ProcessError> {
        if audio.is_empty() {
            return Err(ProcessError::EmptyInput);
        }
        let text = self
            .dispatcher
            .dispatch(|key| async move {
                self.backend.transcribe(&key, audio, file_name, mime).await
            })
            .await?;
        log::info!("transcribed {} bytes into {} chars", audio.len(), text.chars().count());
        Ok(text)
    }

    /// Run one of the three correction modes over `text`.
    pub async fn correct(&self, mode: ProcessingMode, text: &str) -> Result<String, ProcessError> {
        let text = self.prepare(text)?;
        if mode == ProcessingMode::Summary && is_short_text(&text, &self.text) {
            return Err(ProcessError::TextTooShort);
        }

        let messages = PromptBuilder::correction(mode, &text);
        let messages = messages.as_slice();
        let temperature = mode.temperature();

        log::debug!("{mode} request: {} chars", text.chars().count());
        let result = self
            .dispatcher
            .dispatch(|key| async move { self.backend.chat(&key, messages, temperature).await })
            .await?;
        Ok(result)
    }

    pub async fn basic_correction(&self, text: &str) -> Result<String, ProcessError> {
        self.correct(ProcessingMode::Basic, text).await
    }

    pub async fn premium_correction(&self, text: &str) -> Result<String, ProcessError> {
        self.correct(ProcessingMode::Premium, text).await
    }

    pub async fn summarize(&self, text: &str) -> Result<String, ProcessError> {
        self.correct(ProcessingMode::Summary, text).await
    }

    /// Read the text out of a photo with the vision model.
    pub async fn extract_image_text(&self, image: &[u8]) -> Result<String, ProcessError> {
        if image.is_empty() {
            return Err(ProcessError::EmptyInput);
        }
        let prompt = PromptBuilder::ocr();
        let text = self
            .dispatcher
            .dispatch(|key| async move { self.backend.describe_image(&key, image, prompt).await })
            .await?;
        Ok(text)
    }

    /// Answer `question` about `document`, given the earlier exchange.
    ///
    /// The conversation is cut from the oldest end to fit
    /// `context_token_limit`.
    pub async fn answer_document_question(
        &self,
        document: &str,
        history: &[ChatMessage],
        question: &str,
    ) -> Result<String, ProcessError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ProcessError::EmptyInput);
        }
        let document = self.prepare(document)?;

        let messages = PromptBuilder::document_question(&document, history, question);
        let messages = trim_messages_to_token_limit(&messages, self.text.context_token_limit);
        let messages = messages.as_slice();

        let answer = self
            .dispatcher
            .dispatch(|key| async move {
                self.backend.chat(&key, messages, REASONING_TEMPERATURE).await
            })
            .await?;
        Ok(answer)
    }

    /// Explain a correction to the user.
    pub async fn explain_correction(
        &self,
        original: &str,
        corrected: &str,
        question: &str,
    ) -> Result<String, ProcessError> {
        if original.trim().is_empty() || corrected.trim().is_empty() || question.trim().is_empty() {
            return Err(ProcessError::EmptyInput);
        }
        let messages = PromptBuilder::explain(original, corrected, question);
        let messages = messages.as_slice();
        let answer = self
            .dispatcher
            .dispatch(|key| async move {
                self.backend.chat(&key, messages, REASONING_TEMPERATURE).await
            })
            .await?;
        Ok(answer)
    }

    /// Trim, reject empty input, cap length and token estimate.
    fn prepare(&self, text: &str) -> Result<String, ProcessError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ProcessError::EmptyInput);
        }
        let capped: String = if text.chars().count() > self.text.max_text_length {
            log::warn!(
                "input cut to {} chars (was {})",
                self.text.max_text_length,
                text.chars().count()
            );
            text.chars().take(self.text.max_text_length).collect()
        } else {
            text.to_string()
        };
        Ok(clamp_to_token_limit(&capped, self.text.context_token_limit))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::llm::client::{GroqClient, LlmError};
    use crate::pool::{Credential, CredentialPool, NoBackoff};
    use async_trait::async_trait;
    use std::sync::Mutex;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Fails for keys listed in `bad_keys`, otherwise echoes the last user
    /// message.  Records every call as `(key, op, last message)`.
    #[derive(Default)]
    struct ScriptedBackend {
        bad_keys: Vec<&'static str>,
        calls: Mutex<Vec<(String, &'static str, String)>>,
    }

    impl ScriptedBackend {
        fn failing_for(bad_keys: Vec<&'static str>) -> Self {
            Self {
                bad_keys,
                ..Self::default()
            }
        }

        fn record(&self, key: &Credential, op: &'static str, last: String) -> Result<String, LlmError> {
            self.calls
                .lock()
                .unwrap()
                .push((key.expose().to_string(), op, last.clone()));
            if self.bad_keys.contains(&key.expose()) {
                Err(LlmError::Status {
                    status: 401,
                    body: "invalid api key".into(),
                })
            } else {
                Ok(format!("{op}:{last}"))
            }
        }

        fn calls(&self) -> Vec<(String, &'static str, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn chat(
            &self,
            credential: &Credential,
            messages: &[ChatMessage],
            _temperature: f32,
        ) -> Result<String, LlmError> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            self.record(credential, "chat", last)
        }

        async fn transcribe(
            &self,
            credential: &Credential,
            audio: &[u8],
            file_name: &str,
            _mime: &str,
        ) -> Result<String, LlmError> {
            self.record(credential, "transcribe", format!("{file_name}:{}", audio.len()))
        }

        async fn describe_image(
            &self,
            credential: &Credential,
            image: &[u8],
            _prompt: &str,
        ) -> Result<String, LlmError> {
            self.record(credential, "image", image.len().to_string())
        }
    }

    fn processor(keys: &str, backend: Arc<ScriptedBackend>) -> TextProcessor {
        let dispatcher = Dispatcher::new(
            Arc::new(CredentialPool::initialize(keys)),
            Arc::new(NoBackoff),
        );
        TextProcessor::new(dispatcher, backend, TextConfig::default())
    }

    fn long_text() -> String {
        vec!["предложение"; 80].join(" ")
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn basic_correction_wraps_trimmed_text() {
        let backend = Arc::new(ScriptedBackend::default());
        let p = processor("k1", backend.clone());

        let out = p.basic_correction("  привет мир  ").await.unwrap();
        assert_eq!(out, "chat:<text>привет мир</text>");
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn empty_input_never_reaches_the_provider() {
        let backend = Arc::new(ScriptedBackend::default());
        let p = processor("k1", backend.clone());

        assert!(matches!(p.premium_correction("   ").await, Err(ProcessError::EmptyInput)));
        assert!(matches!(p.transcribe_voice(&[], "a.ogg", "audio/ogg").await, Err(ProcessError::EmptyInput)));
        assert!(matches!(p.extract_image_text(&[]).await, Err(ProcessError::EmptyInput)));
        assert!(matches!(
            p.answer_document_question("doc", &[], " ").await,
            Err(ProcessError::EmptyInput)
        ));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn summary_rejects_short_text() {
        let backend = Arc::new(ScriptedBackend::default());
        let p = processor("k1", backend.clone());

        assert!(matches!(p.summarize("совсем коротко").await, Err(ProcessError::TextTooShort)));
        assert!(backend.calls().is_empty());

        let out = p.summarize(&long_text()).await.unwrap();
        assert!(out.starts_with("chat:<text>предложение"));
    }

    #[tokio::test]
    async fn overlong_input_is_cut() {
        let backend = Arc::new(ScriptedBackend::default());
        let mut cfg = TextConfig::default();
        cfg.max_text_length = 10;
        let dispatcher = Dispatcher::new(
            Arc::new(CredentialPool::initialize("k1")),
            Arc::new(NoBackoff),
        );
        let p = TextProcessor::new(dispatcher, backend.clone(), cfg);

        let out = p.basic_correction("абвгдежзийклмно").await.unwrap();
        assert_eq!(out, "chat:<text>абвгдежзий</text>");
    }

    #[tokio::test]
    async fn rotates_past_rejected_keys() {
        let backend = Arc::new(ScriptedBackend::failing_for(vec!["k1", "k2"]));
        let p = processor("k1,k2,k3", backend.clone());

        let out = p.extract_image_text(&[0xFF, 0xD8, 0xFF]).await.unwrap();
        assert_eq!(out, "image:3");

        let keys: Vec<String> = backend.calls().into_iter().map(|(k, _, _)| k).collect();
        assert_eq!(keys, vec!["k1", "k2", "k3"]);
    }

    #[tokio::test]
    async fn no_keys_reports_unavailable() {
        let backend = Arc::new(ScriptedBackend::default());
        let p = processor("", backend.clone());

        let err = p.transcribe_voice(b"OggS", "voice.ogg", "audio/ogg").await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn all_keys_rejected_exhausts_retries() {
        let backend = Arc::new(ScriptedBackend::failing_for(vec!["k1", "k2"]));
        let p = processor("k1,k2", backend.clone());

        let err = p.basic_correction("текст").await.unwrap_err();
        match err {
            ProcessError::Dispatch(DispatchError::RetriesExhausted { attempts, samples }) => {
                assert_eq!(attempts, 4);
                assert_eq!(samples, vec!["provider returned 401: invalid api key"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(backend.calls().len(), 4);
    }

    #[tokio::test]
    async fn document_question_sends_history_and_question_last() {
        let backend = Arc::new(ScriptedBackend::default());
        let p = processor("k1", backend.clone());
        let history = vec![ChatMessage::user("кто?"), ChatMessage::assistant("автор")];

        let out = p
            .answer_document_question("длинный документ", &history, "когда? ")
            .await
            .unwrap();
        assert_eq!(out, "chat:когда?");
    }

    #[tokio::test]
    async fn transcription_passes_file_metadata() {
        let backend = Arc::new(ScriptedBackend::default());
        let p = processor("k1", backend.clone());

        let out = p.transcribe_voice(b"12345", "note.ogg", "audio/ogg").await.unwrap();
        assert_eq!(out, "transcribe:note.ogg:5");
    }

    #[tokio::test]
    async fn explain_requires_all_parts() {
        let backend = Arc::new(ScriptedBackend::default());
        let p = processor("k1", backend.clone());

        assert!(matches!(
            p.explain_correction("превет", "", "почему?").await,
            Err(ProcessError::EmptyInput)
        ));
        let out = p.explain_correction("превет", "привет", "почему?").await.unwrap();
        assert!(out.contains("Student question: почему?"));
    }

    /// End to end over HTTP: the first key is rejected by the provider, the
    /// second one succeeds.
    #[tokio::test]
    async fn http_failover_to_second_key() {
        let mut server = mockito::Server::new_async().await;
        let rejected = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer gsk_revoked")
            .with_status(401)
            .with_body("{\"error\":{\"message\":\"Invalid API Key\"}}")
            .expect(1)
            .create_async()
            .await;
        let accepted = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer gsk_working")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "choices": [{ "message": { "content": "Привет, мир." } }]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let client = GroqClient::from_config(&ProviderConfig {
            base_url: server.url(),
            ..ProviderConfig::default()
        });
        let dispatcher = Dispatcher::new(
            Arc::new(CredentialPool::initialize("gsk_revoked,gsk_working")),
            Arc::new(NoBackoff),
        );
        let p = TextProcessor::new(dispatcher, Arc::new(client), TextConfig::default());

        let out = p.basic_correction("привет мир").await.unwrap();

        rejected.assert_async().await;
        accepted.assert_async().await;
        assert_eq!(out, "Привет, мир.");
    }
}
