//! Serialization-conflict retry with exponential backoff and jitter.
//!
//! SQLite reports a competing writer as `SQLITE_BUSY` / `SQLITE_LOCKED`
//! ("database is locked"). Those are the only errors retried here; constraint
//! failures and domain violations surface on the first attempt.

use std::future::Future;
use std::time::Duration;

use strata_config::RetrySettings;

use crate::error::DatabaseError;

/// Retry policy for conflicting write transactions.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Cap on any single delay, jitter included.
    pub max_delay: Duration,
    /// Fraction of the backoff added as uniform random jitter.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            jitter: settings.jitter.clamp(0.0, 1.0),
        }
    }
}

impl RetryConfig {
    /// No retries, no waiting.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// `base * 2^(attempt-1)`, capped at `max_delay`. `attempt` counts from 1.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exp)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Backoff plus `unit * jitter` of itself, capped. `unit` is expected in `[0, 1)`.
    #[must_use]
    pub fn delay_with(&self, attempt: u32, unit: f64) -> Duration {
        let backoff = self.backoff(attempt);
        let extra = backoff.mul_f64(self.jitter * unit.clamp(0.0, 1.0));
        (backoff + extra).min(self.max_delay)
    }

    /// Decide the fate of failed attempt number `attempt`.
    ///
    /// Returns the delay to wait before the next attempt, or the error to
    /// surface: the original one when it is not a conflict, or
    /// [`DatabaseError::Conflict`] once attempts are exhausted.
    ///
    /// # Errors
    ///
    /// See above; the `Err` side is the terminal outcome.
    pub fn after_failure(
        &self,
        label: &str,
        attempt: u32,
        err: DatabaseError,
    ) -> Result<Duration, DatabaseError> {
        if !err.is_conflict() {
            return Err(err);
        }
        if attempt >= self.max_attempts {
            tracing::warn!(label, attempt, error = %err, "write conflict, retries exhausted");
            return Err(DatabaseError::Conflict {
                attempts: attempt,
                last: err.to_string(),
            });
        }
        let delay = self.delay_with(attempt, random_unit());
        tracing::warn!(
            label,
            attempt,
            max_attempts = self.max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "write conflict, retrying"
        );
        Ok(delay)
    }
}

/// Detect lock contention between writers.
///
/// The predicate is intentionally narrow to avoid retrying genuine SQL or
/// constraint errors.
pub fn is_conflict_error(e: &libsql::Error) -> bool {
    let msg = e.to_string().to_ascii_lowercase();
    msg.contains("database is locked")
        || msg.contains("database table is locked")
        || msg.contains("database is busy")
        || msg.contains("sqlite_busy")
}

/// Run `op` until it succeeds, fails with a non-conflict error, or attempts run out.
///
/// `op` receives the 1-based attempt number and must open its own transaction
/// each time.
///
/// # Errors
///
/// The first non-conflict error, or [`DatabaseError::Conflict`] on exhaustion.
pub async fn with_conflict_retry<T, F, Fut>(
    config: &RetryConfig,
    label: &str,
    mut op: F,
) -> Result<T, DatabaseError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DatabaseError>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let delay = config.after_failure(label, attempt, err)?;
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Uniform sample in `[0, 1)`; zero if the OS source is unavailable.
#[allow(clippy::cast_precision_loss)]
fn random_unit() -> f64 {
    let mut buf = [0u8; 8];
    if getrandom::fill(&mut buf).is_err() {
        return 0.0;
    }
    (u64::from_le_bytes(buf) >> 11) as f64 / (1u64 << 53) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn busy() -> DatabaseError {
        DatabaseError::LibSql(libsql::Error::SqliteFailure(5, "database is locked".into()))
    }

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            jitter: 0.5,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let cfg = RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
            jitter: 0.0,
        };
        assert_eq!(cfg.backoff(1), Duration::from_millis(100));
        assert_eq!(cfg.backoff(2), Duration::from_millis(200));
        assert_eq!(cfg.backoff(5), Duration::from_millis(1600));
        assert_eq!(cfg.backoff(6), Duration::from_millis(2000));
        assert_eq!(cfg.backoff(60), Duration::from_millis(2000));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let cfg = RetryConfig::default();
        for attempt in 1..=10 {
            let backoff = cfg.backoff(attempt);
            for unit in [0.0, 0.25, 0.999] {
                let delay = cfg.delay_with(attempt, unit);
                assert!(delay >= backoff);
                assert!(delay <= cfg.max_delay);
                assert!(delay <= backoff + backoff.mul_f64(cfg.jitter));
            }
        }
    }

    #[test]
    fn random_unit_is_in_range() {
        for _ in 0..100 {
            let u = random_unit();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn lock_messages_are_conflicts() {
        assert!(busy().is_conflict());
        let constraint =
            libsql::Error::SqliteFailure(19, "UNIQUE constraint failed: cars.name".into());
        assert!(!is_conflict_error(&constraint));
    }

    #[tokio::test]
    async fn retries_conflicts_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_conflict_retry(&fast(5), "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { if attempt < 3 { Err(busy()) } else { Ok(attempt) } }
        })
        .await
        .unwrap();
        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_surfaces_conflict() {
        let err = with_conflict_retry(&fast(3), "test", |_| async { Err::<(), _>(busy()) })
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = with_conflict_retry(&fast(5), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(DatabaseError::InvalidState("bad".into())) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidState(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
