//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the provider,
//! retry policy and text thresholds, `AppPaths` for cross-platform
//! directories, and TOML persistence via `AppConfig::load` /
//! `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, ProviderConfig, RetryConfig, TextConfig};
