//! Property-based tests using proptest
//!
//! These tests verify error classification and retry backoff arithmetic
//! against randomized inputs.

use proptest::prelude::*;
use std::time::Duration;
use stratus_provider::api::error::{format_api_error, ApiError};
use stratus_provider::reconcile::RetryConfig;

fn status_error(code: u16) -> ApiError {
    ApiError::Status {
        code,
        message: "injected".to_string(),
    }
}

/// Generate a retry config with sane relationships between the fields
fn arb_retry_config() -> impl Strategy<Value = RetryConfig> {
    (1u64..1000, 1u64..60, 1.0f64..3.0).prop_map(|(initial_ms, max_factor, multiplier)| {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(initial_ms * max_factor),
            backoff_multiplier: multiplier,
        }
    })
}

proptest! {
    /// Status-code classification is consistent: transient is exactly
    /// 429 or 5xx, auth expiry is exactly 401, not-found is exactly 404
    #[test]
    fn classification_by_status_code(code in 100u16..600) {
        let err = status_error(code);
        prop_assert_eq!(err.is_transient(), code == 429 || code >= 500);
        prop_assert_eq!(err.is_auth_expired(), code == 401);
        prop_assert_eq!(err.is_not_found(), code == 404);
        prop_assert_eq!(err.status(), Some(code));
    }

    /// The three classifications never overlap for any status code
    #[test]
    fn classifications_are_disjoint(code in 100u16..600) {
        let err = status_error(code);
        let classes = [err.is_transient(), err.is_auth_expired(), err.is_not_found()];
        prop_assert!(classes.iter().filter(|c| **c).count() <= 1);
    }

    /// User-facing error formatting never leaks control characters and is
    /// never empty
    #[test]
    fn formatted_errors_are_printable(code in 100u16..600, message in ".{0,300}") {
        let err = ApiError::Status { code, message };
        let formatted = format_api_error(&err);
        prop_assert!(!formatted.is_empty());
        prop_assert!(formatted.chars().all(|c| c.is_ascii_graphic() || c == ' ' || c == '.'));
    }

    /// The first backoff delay is the configured initial delay (when the
    /// cap allows it)
    #[test]
    fn first_delay_is_initial(config in arb_retry_config()) {
        let expected = config.initial_delay.min(config.max_delay);
        prop_assert_eq!(config.delay_for_attempt(0), expected);
    }

    /// Backoff never exceeds the configured maximum
    #[test]
    fn delay_never_exceeds_max(config in arb_retry_config(), attempt in 0u32..12) {
        prop_assert!(config.delay_for_attempt(attempt) <= config.max_delay);
    }

    /// Backoff is non-decreasing in the attempt number
    #[test]
    fn delay_is_monotonic(config in arb_retry_config(), attempt in 0u32..11) {
        prop_assert!(config.delay_for_attempt(attempt) <= config.delay_for_attempt(attempt + 1));
    }
}
