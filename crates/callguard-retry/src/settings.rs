use crate::{RetryPolicy, RetryPolicyBuilder};
use callguard_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Plain retry policy settings, for loading from configuration files.
///
/// ```
/// use callguard_retry::{RetryPolicy, RetrySettings};
///
/// let settings: RetrySettings = serde_json::from_str(
///     r#"{ "maxAttempts": 5, "baseDelayMs": 50, "multiplier": 3.0, "maxDelayMs": 1000 }"#,
/// )
/// .unwrap();
/// let policy = RetryPolicy::try_from(settings).unwrap();
/// assert_eq!(policy.max_attempts(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrySettings {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: Option<u64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            multiplier: 2.0,
            max_delay_ms: None,
        }
    }
}

impl From<RetrySettings> for RetryPolicyBuilder {
    fn from(settings: RetrySettings) -> Self {
        let builder = RetryPolicy::builder()
            .max_attempts(settings.max_attempts)
            .base_delay(Duration::from_millis(settings.base_delay_ms))
            .multiplier(settings.multiplier);
        match settings.max_delay_ms {
            Some(ms) => builder.max_delay(Duration::from_millis(ms)),
            None => builder,
        }
    }
}

impl TryFrom<RetrySettings> for RetryPolicy {
    type Error = ConfigError;

    fn try_from(settings: RetrySettings) -> Result<Self, Self::Error> {
        RetryPolicyBuilder::from(settings).build()
    }
}
