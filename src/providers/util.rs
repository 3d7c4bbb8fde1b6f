use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retries an async operation while its error is transient
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay`: Pause between attempts
/// - `is_transient`: Decides whether an error is worth another attempt
///
/// # Returns
/// Either the successful result or the last error
pub async fn with_retry<F, Fut, T, E>(
    mut operation: F,
    retries: usize,
    delay: Duration,
    is_transient: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries || !is_transient(&err) {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Connection and timeout failures are retried; anything else is final.
pub fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, String> = with_retry(
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("connection refused".to_string())
                } else {
                    Ok(7)
                }
            },
            3,
            Duration::from_millis(500),
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_retries() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, String> = with_retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("timeout".to_string())
            },
            2,
            Duration::from_millis(500),
            |_| true,
        )
        .await;

        assert_eq!(result, Err("timeout".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, String> = with_retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("bad request".to_string())
            },
            5,
            Duration::from_millis(500),
            |e: &String| e != "bad request",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
