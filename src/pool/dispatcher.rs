//! Retry/failover engine over a [`CredentialPool`].
//!
//! [`Dispatcher::dispatch`] runs a caller-supplied remote operation once per
//! credential draw.  Every failure is treated the same way (network, auth,
//! rate limit, malformed body): it is logged, the caller's task sleeps for
//! the backoff interval, and the next credential is tried.  The budget is
//! `attempts_per_credential × pool.len()` attempts; once it is spent the
//! first few distinct error messages are returned in
//! [`DispatchError::RetriesExhausted`].
//!
//! There is no cancellation.  Wrap the call in `tokio::time::timeout` when a
//! deadline is needed.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::pool::backoff::Backoff;
use crate::pool::credential::{Credential, CredentialPool};
use crate::text::truncate_chars;

/// Max characters of an error message kept in logs and error samples.
const ERROR_SNIPPET_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// DispatchError
// ---------------------------------------------------------------------------

/// Terminal outcomes of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No credentials are configured.  Returned before any attempt or sleep.
    #[error("LLM service unavailable: no API keys configured")]
    PoolEmpty,

    /// Every attempt in the retry budget failed.
    #[error("all {attempts} attempts failed: {}", .samples.join("; "))]
    RetriesExhausted {
        attempts: usize,
        /// Up to `error_samples` distinct messages, first-seen order.
        samples: Vec<String>,
    },
}

impl DispatchError {
    /// `true` for the permanent "nothing configured" state, so callers can
    /// answer with a service-unavailable message straight away.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DispatchError::PoolEmpty)
    }
}

// ---------------------------------------------------------------------------
// RequestAttempt
// ---------------------------------------------------------------------------

/// Result of one attempt, as seen by the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed(String),
}

/// One `(credential, outcome)` pair.  Transient; only used for logging and
/// error aggregation.
#[derive(Debug, Clone)]
pub struct RequestAttempt {
    /// 1-based attempt number within the dispatch.
    pub attempt: usize,
    /// Masked key prefix.
    pub credential: String,
    pub outcome: AttemptOutcome,
}

impl RequestAttempt {
    fn new(attempt: usize, credential: &Credential, outcome: AttemptOutcome) -> Self {
        Self {
            attempt,
            credential: credential.masked(),
            outcome,
        }
    }
}

impl fmt::Display for RequestAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            AttemptOutcome::Succeeded => {
                write!(f, "attempt {} with {} succeeded", self.attempt, self.credential)
            }
            AttemptOutcome::Failed(msg) => write!(
                f,
                "attempt {} with {} failed: {}",
                self.attempt, self.credential, msg
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Executes remote calls against rotating credentials.
///
/// Cheap to share: clone the `Arc`s or wrap the dispatcher itself in an
/// `Arc`.  All concurrent dispatches share the pool's single cursor.
#[derive(Clone)]
pub struct Dispatcher {
    pool: Arc<CredentialPool>,
    backoff: Arc<dyn Backoff>,
    attempts_per_credential: usize,
    error_samples: usize,
}

impl Dispatcher {
    /// Two attempts per credential, three error samples.
    pub fn new(pool: Arc<CredentialPool>, backoff: Arc<dyn Backoff>) -> Self {
        Self {
            pool,
            backoff,
            attempts_per_credential: 2,
            error_samples: 3,
        }
    }

    pub fn with_attempts_per_credential(mut self, attempts: usize) -> Self {
        self.attempts_per_credential = attempts.max(1);
        self
    }

    pub fn with_error_samples(mut self, samples: usize) -> Self {
        self.error_samples = samples;
        self
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Total attempts a single dispatch may make.
    pub fn retry_budget(&self) -> usize {
        self.pool.len() * self.attempts_per_credential
    }

    /// Run `op` with successive credentials until it succeeds or the retry
    /// budget is spent.
    ///
    /// Each attempt draws exactly one credential.  After every failure
    /// (including the last) the task sleeps for `backoff.delay(attempt)`.
    pub async fn dispatch<T, E, F, Fut>(&self, mut op: F) -> Result<T, DispatchError>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        if self.pool.is_empty() {
            log::warn!("dispatch refused: credential pool is empty");
            return Err(DispatchError::PoolEmpty);
        }

        let budget = self.retry_budget();
        let mut samples: Vec<String> = Vec::with_capacity(self.error_samples);

        for attempt in 1..=budget {
            let Some(credential) = self.pool.next() else {
                return Err(DispatchError::PoolEmpty);
            };

            let message = match op(credential.clone()).await {
                Ok(value) => {
                    if attempt > 1 {
                        let record =
                            RequestAttempt::new(attempt, &credential, AttemptOutcome::Succeeded);
                        log::info!("{record} after {} failure(s)", attempt - 1);
                    }
                    return Ok(value);
                }
                Err(e) => truncate_chars(&e.to_string(), ERROR_SNIPPET_CHARS),
            };

            let record = RequestAttempt::new(
                attempt,
                &credential,
                AttemptOutcome::Failed(message.clone()),
            );
            log::warn!("LLM request error ({attempt}/{budget}): {record}");

            if samples.len() < self.error_samples && !samples.contains(&message) {
                samples.push(message);
            }

            tokio::time::sleep(self.backoff.delay(attempt)).await;
        }

        log::error!(
            "all {} API key(s) failed after {budget} attempts",
            self.pool.len()
        );
        Err(DispatchError::RetriesExhausted {
            attempts: budget,
            samples,
        })
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pool", &self.pool)
            .field("attempts_per_credential", &self.attempts_per_credential)
            .field("error_samples", &self.error_samples)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
