use std::time::Duration;

use tracing::warn;

use crate::result::{Error, Result};

/// How many times an operation is attempted before giving up.
pub const DEFAULT_ATTEMPTS: u32 = 5;

/// Fixed pause between two attempts. No backoff growth, no jitter.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

/// Run `op` up to `attempts` times, sleeping `delay` between attempts.
///
/// The first success wins and no further attempt is made. The error of
/// the final attempt is returned once the budget is exhausted.
pub fn with_retries<T, F>(attempts: u32, delay: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    debug_assert!(attempts > 0);

    let mut last_err = None;
    for attempt in 1..=attempts {
        match op() {
            Ok(res) => return Ok(res),
            Err(err) => {
                if attempt < attempts {
                    warn!("Attempt {attempt}/{attempts} failed, retrying in {delay:?}");
                    std::thread::sleep(delay);
                }
                last_err = Some(err);
            }
        }
    }

    let err = last_err.unwrap_or(Error::UnavailableStream);
    Err(err.wrap_err_with(|| format!("Still failing after {attempts} attempts")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::bail;

    #[test]
    fn first_success_makes_a_single_call() {
        let mut calls = 0;
        let res = with_retries(5, Duration::ZERO, || {
            calls += 1;
            Ok(42)
        });
        assert!(matches!(res, Ok(42)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn recovers_after_transient_failures() {
        let mut calls = 0;
        let res = with_retries(5, Duration::ZERO, || {
            calls += 1;
            if calls < 3 {
                bail("transient")
            } else {
                Ok(())
            }
        });
        assert!(res.is_ok());
        assert_eq!(calls, 3);
    }

    #[test]
    fn stops_after_the_attempt_budget() {
        let mut calls = 0;
        let res: Result<()> = with_retries(5, Duration::ZERO, || {
            calls += 1;
            bail("always down")
        });
        assert!(res.is_err());
        assert_eq!(calls, 5);
    }
}
