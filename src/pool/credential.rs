//! API credentials and the round-robin [`CredentialPool`].
//!
//! A pool is built once at startup from a comma-delimited string (usually
//! the `GROQ_API_KEYS` environment variable) and is read-only afterwards,
//! apart from the rotation cursor.  An empty pool is a valid, degraded
//! state: every dispatch fails fast with
//! [`DispatchError::PoolEmpty`](crate::pool::DispatchError::PoolEmpty).

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Number of leading characters shown when a key is masked for logs.
const MASK_PREFIX_CHARS: usize = 8;

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// One secret API key for the remote provider.
///
/// Cheap to clone (`Arc<str>` inside).  `Debug` and `Display` only ever show
/// the masked prefix; use [`Credential::expose`] to read the full secret
/// when building the `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Arc<str>);

impl Credential {
    pub fn new(secret: &str) -> Self {
        Self(Arc::from(secret))
    }

    /// The full secret.  Only pass this to the HTTP layer.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// First eight characters followed by `...`.
    pub fn masked(&self) -> String {
        let prefix: String = self.0.chars().take(MASK_PREFIX_CHARS).collect();
        format!("{prefix}...")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

// ---------------------------------------------------------------------------
// CredentialPool
// ---------------------------------------------------------------------------

/// Ordered credentials plus a shared rotation cursor.
///
/// The cursor always stays in `0..len` and is advanced with a single atomic
/// read-modify-write, so concurrent callers on a multi-threaded runtime
/// never receive the same slot twice or skip one.
#[derive(Debug, Default)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
    cursor: AtomicUsize,
}

impl CredentialPool {
    /// Parse a comma-delimited list of keys.
    ///
    /// Entries are trimmed and empty entries dropped.  Source order is kept
    /// and duplicates are not removed.  Empty or blank input yields an empty
    /// pool and a warning rather than an error.
    pub fn initialize(raw: &str) -> Self {
        let credentials: Vec<Credential> = raw
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(Credential::new)
            .collect();

        if credentials.is_empty() {
            log::warn!("no API keys configured; LLM features will report service unavailable");
        } else {
            for credential in &credentials {
                log::info!("API key loaded: {}", credential.masked());
            }
            log::info!("credential pool ready: {} key(s)", credentials.len());
        }

        Self::from_credentials(credentials)
    }

    /// Read keys from the environment.
    ///
    /// `primary` holds the comma-delimited list; `fallback` is consulted
    /// only when `primary` is unset or blank (single-key deployments).
    pub fn from_env(primary: &str, fallback: &str) -> Self {
        let raw = std::env::var(primary)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| std::env::var(fallback).ok())
            .unwrap_or_default();
        Self::initialize(&raw)
    }

    /// Build a pool from already-parsed credentials without logging.
    pub fn from_credentials(credentials: Vec<Credential>) -> Self {
        Self {
            credentials,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Hand out the credential under the cursor and advance it by one,
    /// wrapping at the end.  `None` when the pool is empty.
    pub fn next(&self) -> Option<Credential> {
        let len = self.credentials.len();
        if len == 0 {
            return None;
        }
        // The closure always returns Some, so fetch_update cannot fail.
        let idx = match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % len))
        {
            Ok(prev) | Err(prev) => prev,
        };
        self.credentials.get(idx).cloned()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Masked prefixes of every key, in rotation order.
    pub fn masked(&self) -> Vec<String> {
        self.credentials.iter().map(Credential::masked).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn keys(pool: &CredentialPool, n: usize) -> Vec<String> {
        (0..n)
            .map(|_| pool.next().unwrap().expose().to_string())
            .collect()
    }

    #[test]
    fn initialize_trims_and_drops_empty_entries() {
        let pool = CredentialPool::initialize("  k1 , ,k2,,  k3  ,");
        assert_eq!(pool.len(), 3);
        assert_eq!(keys(&pool, 3), vec!["k1", "k2", "k3"]);
    }

    #[test]
    fn initialize_keeps_duplicates_in_order() {
        let pool = CredentialPool::initialize("a,b,a");
        assert_eq!(pool.len(), 3);
        assert_eq!(keys(&pool, 4), vec!["a", "b", "a", "a"]);
    }

    #[test]
    fn empty_and_blank_input_yield_empty_pool() {
        for raw in ["", "   ", ",,,", " , "] {
            let pool = CredentialPool::initialize(raw);
            assert!(pool.is_empty(), "input {raw:?}");
            assert!(pool.next().is_none());
            assert!(pool.next().is_none());
        }
    }

    #[test]
    fn next_visits_each_key_once_then_wraps() {
        for n in 1..=6 {
            let raw: Vec<String> = (0..n).map(|i| format!("key-{i}")).collect();
            let pool = CredentialPool::initialize(&raw.join(","));

            assert_eq!(keys(&pool, n), raw);
            assert_eq!(pool.next().unwrap().expose(), "key-0");
        }
    }

    #[test]
    fn credential_debug_and_display_are_masked() {
        let cred = Credential::new("gsk_abcdefghijklmnop");
        assert_eq!(cred.masked(), "gsk_abcd...");
        assert_eq!(cred.to_string(), "gsk_abcd...");
        assert!(!format!("{cred:?}").contains("ijklmnop"));
        assert_eq!(cred.expose(), "gsk_abcdefghijklmnop");
    }

    #[test]
    fn masked_handles_short_keys() {
        assert_eq!(Credential::new("abc").masked(), "abc...");
        let pool = CredentialPool::initialize("abc,0123456789");
        assert_eq!(pool.masked(), vec!["abc...", "01234567..."]);
    }

    #[test]
    fn from_env_prefers_primary_then_fallback() {
        let primary = "TEXTFIX_TEST_KEYS_PRIMARY";
        let fallback = "TEXTFIX_TEST_KEYS_FALLBACK";

        std::env::remove_var(primary);
        std::env::set_var(fallback, "single");
        let pool = CredentialPool::from_env(primary, fallback);
        assert_eq!(keys(&pool, 1), vec!["single"]);

        std::env::set_var(primary, "p1,p2");
        let pool = CredentialPool::from_env(primary, fallback);
        assert_eq!(keys(&pool, 2), vec!["p1", "p2"]);

        std::env::remove_var(primary);
        std::env::remove_var(fallback);
        assert!(CredentialPool::from_env(primary, fallback).is_empty());
    }

    /// Many threads drawing at once must see an even spread; no slot is
    /// issued twice or skipped.
    #[test]
    fn concurrent_draws_never_double_issue() {
        let pool = Arc::new(CredentialPool::initialize("k0,k1,k2,k3"));
        let threads = 8;
        let per_thread = 100;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    (0..per_thread)
                        .map(|_| pool.next().unwrap().expose().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for handle in handles {
            for key in handle.join().unwrap() {
                *counts.entry(key).or_default() += 1;
            }
        }

        assert_eq!(counts.len(), 4);
        for count in counts.values() {
            assert_eq!(*count, threads * per_thread / 4);
        }
    }
}
