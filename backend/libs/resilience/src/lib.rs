/// Resilience helpers shared by the product platform services
///
/// Every call to a cache, object store or broker goes through one of the
/// timeout wrappers so a slow dependency degrades into a named error instead
/// of stalling the caller.
///
/// # Example: cache lookup with timeout
///
/// ```rust,no_run
/// use resilience::timeout::with_timeout_result;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let result = with_timeout_result("cache.get", Duration::from_secs(1), async {
///         // Your cache call
///         Ok::<_, String>(Some("value".to_string()))
///     })
///     .await;
/// }
/// ```
pub mod timeout;

pub use timeout::{with_timeout, with_timeout_result, TimeoutError};
