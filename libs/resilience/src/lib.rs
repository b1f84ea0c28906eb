/// Resilience patterns for remote calls
///
/// This library provides the retry and timeout building blocks used by the
/// sync engine:
/// - **Retry**: exponential backoff with jitter for transient failures. The
///   caller supplies a retryability predicate; errors it rejects abort the
///   loop immediately instead of burning attempts.
/// - **Timeout**: enforces time limits on remote calls.
///
/// # Example: retry a flaky call, but never a permission error
///
/// ```rust,no_run
/// use resilience::{with_retry, RetryConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let result = with_retry(
///         RetryConfig::default(),
///         |err: &String| err.contains("timed out"),
///         || async { Err::<(), _>("permission denied".to_string()) },
///     )
///     .await;
///     assert!(result.is_err());
/// }
/// ```
pub mod retry;
pub mod timeout;

pub use retry::{with_retry, RetryConfig, RetryError};
pub use timeout::{with_timeout, TimeoutError};
