//! Authenticated request execution
//!
//! Wraps a single remote operation with resilience against transient
//! transport failures and credential expiry, transparent to the caller's
//! business logic. Retries are strictly sequential and every backoff sleep
//! is bounded by the caller's deadline.

use super::{Deadline, RetryConfig};
use crate::api::error::{format_api_error, ApiError};
use crate::api::ApiClient;
use crate::diag::Diagnostics;
use std::future::Future;

/// Execute one remote operation, retrying transient failures and refreshing
/// the auth token at most once.
///
/// - An auth-expiry result (401) triggers exactly one credential refresh and
///   one immediate retry; a second 401 is surfaced as fatal.
/// - Transient errors (connect/timeout/429/5xx) are retried up to
///   `retry.max_attempts` total attempts with capped-exponential backoff.
/// - Other errors are returned immediately. Not-found is returned without a
///   diagnostic: the pollers treat absence as a signal, not a failure.
///
/// The returned value is always the outcome of the last attempt. On final
/// failure an error diagnostic naming `action` is appended (except for
/// not-found, as above).
pub async fn execute<T, F, Fut>(
    client: &ApiClient,
    retry: &RetryConfig,
    deadline: Deadline,
    diags: &mut Diagnostics,
    action: &str,
    op: F,
) -> Result<T, ApiError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempts: u32 = 0;
    let mut refreshed = false;

    loop {
        attempts += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if err.is_auth_expired() {
            if refreshed {
                diags.error(
                    format!("{} failed", action),
                    "Authentication failed again after refreshing credentials. \
                     Check your Stratus access keys.",
                );
                return Err(err);
            }
            refreshed = true;
            tracing::warn!("{}: auth token expired, refreshing credentials", action);
            if let Err(refresh_err) = client.refresh_token().await {
                diags.error(format!("{} failed", action), format_api_error(&refresh_err));
                return Err(refresh_err);
            }
            // Retry immediately with the fresh token
            continue;
        }

        if err.is_transient() {
            if attempts >= retry.max_attempts {
                tracing::warn!("{}: giving up after {} attempts: {}", action, attempts, err);
                diags.error(
                    format!("{} failed", action),
                    format!("{} (after {} attempts)", format_api_error(&err), attempts),
                );
                return Err(err);
            }

            let delay = retry.delay_for_attempt(attempts - 1);
            tracing::warn!(
                "{}: transient error ({}), retrying in {:?}",
                action,
                err,
                delay
            );
            if !deadline.sleep(delay).await {
                diags.error(
                    format!("{} failed", action),
                    "Deadline exceeded while retrying after a transient error.",
                );
                return Err(err);
            }
            continue;
        }

        if !err.is_not_found() {
            diags.error(format!("{} failed", action), format_api_error(&err));
        }
        return Err(err);
    }
}
