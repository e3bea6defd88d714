//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! API keys are deliberately absent: they only ever come from the
//! environment variables named by [`AppConfig::keys_env`] and
//! [`AppConfig::fallback_key_env`].

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::pool::{CredentialPool, Dispatcher, JitteredBackoff};

// ---------------------------------------------------------------------------
// ProviderConfig
// ---------------------------------------------------------------------------

/// Connection and model settings for the OpenAI-compatible provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API root; `/chat/completions` and `/audio/transcriptions` are
    /// appended to it.
    pub base_url: String,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    /// Model used for correction, summaries and document Q&A.
    pub chat_model: String,
    /// Speech-to-text model.
    pub transcription_model: String,
    /// Multimodal model used to read text from images.
    pub vision_model: String,
    /// ISO-639-1 language hint for transcription.
    pub language: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".into(),
            timeout_secs: 30,
            chat_model: "llama-3.3-70b-versatile".into(),
            transcription_model: "whisper-large-v3-turbo".into(),
            vision_model: "meta-llama/llama-4-scout-17b-16e-instruct".into(),
            language: "ru".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// RetryConfig
// ---------------------------------------------------------------------------

/// Key-rotation retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Fixed part of the delay after a failed attempt; up to one extra
    /// second of jitter is added on top.
    pub backoff_base_secs: f64,
    /// Attempts per configured key before a dispatch gives up.
    pub attempts_per_credential: usize,
    /// Distinct error messages kept for the final failure report.
    pub error_samples: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_base_secs: 0.5,
            attempts_per_credential: 2,
            error_samples: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// TextConfig
// ---------------------------------------------------------------------------

/// Thresholds for text handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// Below this many words a text is "short" and gets no summary.
    pub short_text_words: usize,
    /// Below this many characters a text is "short" as well.
    pub short_text_chars: usize,
    /// Longer input is cut before it is sent to the model.
    pub max_text_length: usize,
    /// Token budget for a single chat request.
    pub context_token_limit: usize,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            short_text_words: 50,
            short_text_chars: 300,
            max_text_length: 10_000,
            context_token_limit: 6_000,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use textfix_bot::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// let dispatcher = config.build_dispatcher();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Environment variable holding the comma-separated API keys.
    pub keys_env: String,
    /// Single-key variable consulted when `keys_env` is unset or blank.
    pub fallback_key_env: String,
    pub provider: ProviderConfig,
    pub retry: RetryConfig,
    pub text: TextConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            keys_env: "GROQ_API_KEYS".into(),
            fallback_key_env: "GROQ_API_KEY".into(),
            provider: ProviderConfig::default(),
            retry: RetryConfig::default(),
            text: TextConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Read the credential pool from the configured environment variables.
    pub fn load_pool(&self) -> CredentialPool {
        CredentialPool::from_env(&self.keys_env, &self.fallback_key_env)
    }

    /// Dispatcher over `pool` using this config's retry policy.
    pub fn dispatcher_for(&self, pool: CredentialPool) -> Dispatcher {
        Dispatcher::new(
            Arc::new(pool),
            Arc::new(JitteredBackoff::from_secs_f64(self.retry.backoff_base_secs)),
        )
        .with_attempts_per_credential(self.retry.attempts_per_credential)
        .with_error_samples(self.retry.error_samples)
    }

    /// Environment keys + retry policy in one step.
    pub fn build_dispatcher(&self) -> Dispatcher {
        self.dispatcher_for(self.load_pool())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.keys_env, loaded.keys_env);
        assert_eq!(original.provider.base_url, loaded.provider.base_url);
        assert_eq!(original.provider.chat_model, loaded.provider.chat_model);
        assert_eq!(original.retry.backoff_base_secs, loaded.retry.backoff_base_secs);
        assert_eq!(
            original.retry.attempts_per_credential,
            loaded.retry.attempts_per_credential
        );
        assert_eq!(original.text.max_text_length, loaded.text.max_text_length);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.provider.timeout_secs, 30);
        assert_eq!(config.keys_env, "GROQ_API_KEYS");
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.provider.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(cfg.provider.chat_model, "llama-3.3-70b-versatile");
        assert_eq!(cfg.provider.transcription_model, "whisper-large-v3-turbo");
        assert_eq!(cfg.retry.backoff_base_secs, 0.5);
        assert_eq!(cfg.retry.attempts_per_credential, 2);
        assert_eq!(cfg.retry.error_samples, 3);
        assert_eq!(cfg.text.short_text_words, 50);
        assert_eq!(cfg.text.short_text_chars, 300);
        assert_eq!(cfg.fallback_key_env, "GROQ_API_KEY");
    }

    /// A partial file only overrides what it names.
    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "keys_env = \"MY_KEYS\"\n\n[retry]\nbackoff_base_secs = 1.0\n",
        )
        .expect("write");

        let cfg = AppConfig::load_from(&path).expect("load");
        assert_eq!(cfg.keys_env, "MY_KEYS");
        assert_eq!(cfg.retry.backoff_base_secs, 1.0);
        assert_eq!(cfg.retry.attempts_per_credential, 2);
        assert_eq!(cfg.provider.language, "ru");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "retry = [").expect("write");
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn dispatcher_uses_retry_policy() {
        let mut cfg = AppConfig::default();
        cfg.retry.attempts_per_credential = 3;
        let d = cfg.dispatcher_for(CredentialPool::initialize("a,b"));
        assert_eq!(d.retry_budget(), 6);
        assert_eq!(d.pool().len(), 2);
    }

    #[test]
    fn pool_comes_from_configured_env_vars() {
        let mut cfg = AppConfig::default();
        cfg.keys_env = "TEXTFIX_SETTINGS_TEST_KEYS".into();
        cfg.fallback_key_env = "TEXTFIX_SETTINGS_TEST_KEY".into();

        std::env::set_var(&cfg.keys_env, "x1, x2");
        assert_eq!(cfg.load_pool().len(), 2);
        std::env::remove_var(&cfg.keys_env);
        assert!(cfg.build_dispatcher().pool().is_empty());
    }
}
