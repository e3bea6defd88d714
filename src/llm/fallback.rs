//! Friendly processor — wraps [`TextProcessor`] and turns every failure into
//! a message that can be shown to the end user.
//!
//! When no API keys are configured the user gets a "service unavailable"
//! notice straight away; other failures are logged at error level and
//! reported as "❌ <action>: <first 100 chars of the error>".  Nothing here
//! ever returns `Err(_)`.

use crate::llm::processor::{ProcessError, TextProcessor};
use crate::llm::prompt::ProcessingMode;
use crate::llm::ChatMessage;
use crate::session::{MessageId, SessionStore, UserId};
use crate::text::truncate_chars;

const DOCUMENT_ACTION: &str = "Ошибка ответа";

/// Max characters of an internal error shown to the user.
const USER_ERROR_CHARS: usize = 100;

pub const SERVICE_UNAVAILABLE: &str =
    "⚠️ Сервис временно недоступен: не настроены API-ключи. Попробуйте позже.";
pub const EMPTY_INPUT: &str = "❌ Пустой текст";
pub const TOO_SHORT_FOR_SUMMARY: &str =
    "📝 Текст слишком короткий для саммари. Используйте обычную коррекцию.";

// ---------------------------------------------------------------------------
// FriendlyProcessor
// ---------------------------------------------------------------------------

/// A transparent wrapper around [`TextProcessor`] that never returns an
/// error.
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use textfix_bot::config::AppConfig;
/// use textfix_bot::llm::{FriendlyProcessor, GroqClient, TextProcessor};
///
/// # async fn run() {
/// let config = AppConfig::default();
/// let processor = TextProcessor::new(
///     config.build_dispatcher(),
///     Arc::new(GroqClient::from_config(&config.provider)),
///     config.text.clone(),
/// );
/// let friendly = FriendlyProcessor::new(processor);
/// println!("{}", friendly.basic_correction("превет").await);
/// # }
/// ```
pub struct FriendlyProcessor {
    inner: TextProcessor,
}

impl FriendlyProcessor {
    pub fn new(inner: TextProcessor) -> Self {
        Self { inner }
    }

    /// Return a reference to the wrapped processor.
    pub fn inner(&self) -> &TextProcessor {
        &self.inner
    }

    pub async fn transcribe_voice(&self, audio: &[u8], file_name: &str, mime: &str) -> String {
        reply(
            self.inner.transcribe_voice(audio, file_name, mime).await,
            "Ошибка распознавания",
        )
    }

    pub async fn correct(&self, mode: ProcessingMode, text: &str) -> String {
        reply(self.inner.correct(mode, text).await, correction_action(mode))
    }

    /// Like [`correct`](Self::correct) for the text of the user's session:
    /// reuses a result already cached for `mode`, and caches only
    /// successful results.  `None` when the user has no session.
    pub async fn correct_session(
        &self,
        sessions: &SessionStore,
        user: UserId,
        mode: ProcessingMode,
    ) -> Option<String> {
        if let Some(cached) = sessions.cached_result(user, mode) {
            sessions.set_current_mode(user, mode);
            return Some(cached);
        }
        let original = sessions.session(user)?.original;
        let text = match self.inner.correct(mode, &original).await {
            Ok(text) => {
                sessions.cache_result(user, mode, &text);
                text
            }
            Err(err) => user_message(&err, correction_action(mode)),
        };
        Some(text)
    }

    pub async fn basic_correction(&self, text: &str) -> String {
        self.correct(ProcessingMode::Basic, text).await
    }

    pub async fn premium_correction(&self, text: &str) -> String {
        self.correct(ProcessingMode::Premium, text).await
    }

    pub async fn summarize(&self, text: &str) -> String {
        self.correct(ProcessingMode::Summary, text).await
    }

    pub async fn extract_image_text(&self, image: &[u8]) -> String {
        reply(
            self.inner.extract_image_text(image).await,
            "Ошибка распознавания изображения",
        )
    }

    pub async fn answer_document_question(
        &self,
        document: &str,
        history: &[ChatMessage],
        question: &str,
    ) -> String {
        reply(
            self.inner
                .answer_document_question(document, history, question)
                .await,
            DOCUMENT_ACTION,
        )
    }

    /// Answer `question` about the document of dialogue `(user, message)`.
    ///
    /// Only a successful answer is appended to the dialogue history; a
    /// failure is reported to the user and never sent back to the model as
    /// context.  `None` when the dialogue no longer exists.
    pub async fn answer_in_dialogue(
        &self,
        sessions: &SessionStore,
        user: UserId,
        message: MessageId,
        question: &str,
    ) -> Option<String> {
        let dialogue = sessions.dialogue(user, message)?;
        let answer = match self
            .inner
            .answer_document_question(&dialogue.text, &dialogue.history, question)
            .await
        {
            Ok(answer) => {
                sessions.record_exchange(user, message, question, &answer);
                answer
            }
            Err(err) => user_message(&err, DOCUMENT_ACTION),
        };
        Some(answer)
    }

    pub async fn explain_correction(&self, original: &str, corrected: &str, question: &str) -> String {
        reply(
            self.inner
                .explain_correction(original, corrected, question)
                .await,
            "Ошибка объяснения",
        )
    }
}

fn correction_action(mode: ProcessingMode) -> &'static str {
    match mode {
        ProcessingMode::Summary => "Ошибка создания саммари",
        ProcessingMode::Basic | ProcessingMode::Premium => "Ошибка коррекции",
    }
}

/// Map a processor result onto the text the user will see.
pub fn reply(result: Result<String, ProcessError>, action: &str) -> String {
    match result {
        Ok(text) => text,
        Err(err) => user_message(&err, action),
    }
}

/// User-facing text for a processing failure.
pub fn user_message(err: &ProcessError, action: &str) -> String {
    match err {
        ProcessError::EmptyInput => EMPTY_INPUT.to_string(),
        ProcessError::TextTooShort => TOO_SHORT_FOR_SUMMARY.to_string(),
        e if e.is_unavailable() => SERVICE_UNAVAILABLE.to_string(),
        e => {
            log::error!("{action}: {e}");
            format!("❌ {action}: {}", truncate_chars(&e.to_string(), USER_ERROR_CHARS))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
