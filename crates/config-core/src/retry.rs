//! Retrying transient backend failures

use std::time::Duration;

use backoff::ExponentialBackoffBuilder;

use crate::Result;

/// Run `op`, retrying errors for which [`crate::Error::is_retryable`] holds.
///
/// Waits grow exponentially from `initial` and retrying stops once
/// `max_elapsed` has passed; the last error is then returned. Errors that
/// are not retryable return immediately. A zero `max_elapsed` runs `op` once.
pub fn with_backoff<T>(
    initial: Duration,
    max_elapsed: Duration,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    if max_elapsed.is_zero() {
        return op();
    }

    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(initial)
        .with_max_elapsed_time(Some(max_elapsed))
        .build();

    let mut attempt = 0u32;
    backoff::retry(policy, || {
        attempt += 1;
        op().map_err(|e| {
            if e.is_retryable() {
                tracing::debug!(attempt, error = %e, "Retryable failure; backing off");
                backoff::Error::transient(e)
            } else {
                backoff::Error::permanent(e)
            }
        })
    })
    .map_err(|e| match e {
        backoff::Error::Permanent(e) => e,
        backoff::Error::Transient { err, .. } => err,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::cell::Cell;

    fn unavailable() -> Error {
        Error::Git(config_git::Error::RepositoryUnavailable {
            uri: "https://example.com/repo.git".into(),
            message: "connection reset".into(),
        })
    }

    #[test]
    fn retries_until_success() {
        let calls = Cell::new(0);
        let result = with_backoff(Duration::from_millis(1), Duration::from_secs(5), || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 { Err(unavailable()) } else { Ok("done") }
        });
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<()> = with_backoff(Duration::from_millis(1), Duration::from_secs(5), || {
            calls.set(calls.get() + 1);
            Err(Error::Git(config_git::Error::NoSuchLabel { label: "x".into() }))
        });
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn zero_budget_runs_once() {
        let calls = Cell::new(0);
        let result: Result<()> = with_backoff(Duration::from_millis(1), Duration::ZERO, || {
            calls.set(calls.get() + 1);
            Err(unavailable())
        });
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.get(), 1);
    }
}
