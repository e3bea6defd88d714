//! Multi-key credential rotation and failover for the LLM provider.
//!
//! This module provides:
//! * [`Credential`] / [`CredentialPool`] — ordered API keys handed out
//!   round-robin through a shared atomic cursor.
//! * [`Dispatcher`] — runs one remote call per credential draw and retries
//!   across the pool until success or the retry budget is spent.
//! * [`Backoff`] — injectable jitter between failed attempts
//!   ([`JitteredBackoff`] in production, [`NoBackoff`] in tests).
//! * [`DispatchError`] — terminal failures surfaced to callers.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use textfix_bot::pool::{CredentialPool, Dispatcher, JitteredBackoff};
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = Arc::new(CredentialPool::initialize("gsk_one,gsk_two"));
//!     let dispatcher = Dispatcher::new(
//!         pool,
//!         Arc::new(JitteredBackoff::new(Duration::from_millis(500))),
//!     );
//!
//!     let reply = dispatcher
//!         .dispatch(|key| async move {
//!             // call the provider with `key` here
//!             Ok::<_, String>(format!("served by {key}"))
//!         })
//!         .await;
//!     println!("{reply:?}");
//! }
//! ```

pub mod backoff;
pub mod credential;
pub mod dispatcher;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use backoff::{Backoff, JitteredBackoff, NoBackoff};
pub use credential::{Credential, CredentialPool};
pub use dispatcher::{AttemptOutcome, DispatchError, Dispatcher, RequestAttempt};
