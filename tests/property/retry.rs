//! Property tests for the retry executor.
//!
//! Invariants tested:
//! - An always-failing retryable operation runs exactly max_attempts times
//! - Success on the Nth attempt stops retrying
//! - Non-retryable errors are attempted once and returned unchanged
//! - Total wait matches the sum of the backoff schedule

use super::paused_runtime;
use callguard_core::{ErrorKind, StructuredError};
use callguard_retry::{RetryPolicy, retry_with_backoff};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: never more than max_attempts calls, exhaustion wraps the last error
    #[test]
    fn retry_respects_max_attempts(max_attempts in 1usize..=10) {
        paused_runtime().block_on(async {
            let calls = AtomicUsize::new(0);
            let policy = RetryPolicy::new(max_attempts, Duration::from_millis(1), 2.0).unwrap();

            let err = retry_with_backoff(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(StructuredError::service("down", "op")) }
                },
                &policy,
            )
            .await
            .unwrap_err();

            prop_assert_eq!(calls.load(Ordering::SeqCst), max_attempts);
            let is_exhausted = matches!(err.kind(), ErrorKind::RetryExhausted { attempts } if *attempts == max_attempts);
            prop_assert!(is_exhausted);
            prop_assert_eq!(err.cause().map(|c| c.message().to_string()), Some("down".to_string()));
            Ok(())
        })?;
    }

    /// Property: success on attempt N stops retrying
    #[test]
    fn retry_stops_on_success(
        max_attempts in 2usize..=10,
        success_at in 1usize..=10,
    ) {
        prop_assume!(success_at <= max_attempts);

        paused_runtime().block_on(async {
            let calls = AtomicUsize::new(0);
            let policy = RetryPolicy::new(max_attempts, Duration::from_millis(1), 2.0).unwrap();

            let value = retry_with_backoff(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        if n < success_at {
                            Err(StructuredError::api("Bad gateway", "/x", 502))
                        } else {
                            Ok(n)
                        }
                    }
                },
                &policy,
            )
            .await
            .unwrap();

            prop_assert_eq!(value, success_at);
            prop_assert_eq!(calls.load(Ordering::SeqCst), success_at);
            Ok(())
        })?;
    }

    /// Property: non-retryable errors get exactly one attempt
    #[test]
    fn non_retryable_errors_are_attempted_once(
        max_attempts in 1usize..=10,
        kind in 0u8..4,
    ) {
        paused_runtime().block_on(async {
            let calls = AtomicUsize::new(0);
            let policy = RetryPolicy::new(max_attempts, Duration::from_millis(1), 2.0).unwrap();
            let error = match kind {
                0 => StructuredError::circuit_open("db"),
                1 => StructuredError::cancelled("stop"),
                2 => StructuredError::database("dup", "INSERT", "UNIQUE_VIOLATION"),
                _ => StructuredError::validation("bad", "field").with_retryable(false),
            };
            let expected = error.kind().name();

            let err = retry_with_backoff(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let error = error.clone();
                    async move { Err::<(), _>(error) }
                },
                &policy,
            )
            .await
            .unwrap_err();

            prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
            prop_assert_eq!(err.kind().name(), expected);
            Ok(())
        })?;
    }

    /// Property: elapsed time is the sum of the first max_attempts - 1 delays
    #[test]
    fn elapsed_matches_backoff_schedule(
        max_attempts in 1usize..=6,
        base_ms in 1u64..=200,
        multiplier in 1.0f64..=3.0,
    ) {
        paused_runtime().block_on(async {
            let policy = RetryPolicy::new(max_attempts, Duration::from_millis(base_ms), multiplier).unwrap();
            let expected: Duration = (1..max_attempts).map(|attempt| policy.next_backoff(attempt)).sum();
            let start = Instant::now();

            let _ = retry_with_backoff(
                || async { Err::<(), _>(StructuredError::generic("flaky")) },
                &policy,
            )
            .await;

            // the timer wheel rounds each sleep up to the next millisecond
            let elapsed = start.elapsed();
            let slack = Duration::from_millis(max_attempts as u64);
            prop_assert!(elapsed >= expected, "{:?} < {:?}", elapsed, expected);
            prop_assert!(elapsed <= expected + slack, "{:?} > {:?}", elapsed, expected + slack);
            Ok(())
        })?;
    }

    /// Property: delays never shrink and never exceed the cap
    #[test]
    fn backoff_is_monotonic_and_capped(
        base_ms in 1u64..=1000,
        multiplier in 1.0f64..=4.0,
        cap_ms in 1u64..=10_000,
    ) {
        let policy = RetryPolicy::builder()
            .base_delay(Duration::from_millis(base_ms))
            .multiplier(multiplier)
            .max_delay(Duration::from_millis(cap_ms))
            .build()
            .unwrap();

        let delays: Vec<_> = (1..=12).map(|attempt| policy.next_backoff(attempt)).collect();
        for pair in delays.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }
        for delay in &delays {
            prop_assert!(*delay <= Duration::from_millis(cap_ms));
        }
    }
}
