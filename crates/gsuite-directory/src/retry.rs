//! Retry with exponential backoff for transient Directory API failures.
//!
//! Only network failures, throttling (429), timeouts and gateway errors
//! (502/503/504) are retried. Credential, permission and decoding failures
//! surface immediately.

use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

/// Configuration for retry handling.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Base delay for exponential backoff in milliseconds (default: 1000ms).
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds (default: 60000ms = 1 minute).
    pub max_delay_ms: u64,
    /// Jitter factor as a fraction of delay (default: 0.25 = 25%).
    pub jitter_factor: f64,
    /// Maximum retry attempts per request (default: 3, 0 disables retries).
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            jitter_factor: 0.25,
            max_retries: 3,
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Creates a configuration optimized for testing (shorter delays).
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            base_delay_ms: 10,
            max_delay_ms: 100,
            jitter_factor: 0.25,
            max_retries: 3,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_delay_ms == 0 {
            return Err("base_delay_ms must be > 0".to_string());
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err("max_delay_ms must be >= base_delay_ms".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err("jitter_factor must be in range [0.0, 1.0]".to_string());
        }
        Ok(())
    }
}

/// Computes and waits out retry delays.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a retry policy with the given configuration.
    pub fn new(config: RetryConfig) -> Result<Self, String> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Whether another attempt is allowed after `attempt` retries.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.config.max_retries
    }

    /// Parses the Retry-After header value.
    #[must_use]
    pub fn parse_retry_after(header_value: &str) -> Option<u64> {
        // Only the delta-seconds form is supported, not HTTP-date.
        header_value.trim().parse::<u64>().ok()
    }

    /// Calculates backoff delay with exponential growth.
    #[must_use]
    pub fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay_ms as f64;
        let max = self.config.max_delay_ms as f64;

        // base * 2^attempt
        let delay_ms = (base * 2_f64.powi(attempt.min(32) as i32)).min(max);

        Duration::from_millis(delay_ms as u64)
    }

    /// Adds jitter to a delay using the configured factor.
    #[must_use]
    pub fn add_jitter(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as f64;
        let jitter_range = delay_ms * self.config.jitter_factor;
        let jitter = rand::thread_rng().gen_range(0.0..=jitter_range);

        Duration::from_millis((delay_ms + jitter) as u64)
    }

    /// Delay before the next attempt, honouring a Retry-After hint.
    #[must_use]
    pub fn delay_for(&self, retry_after_secs: Option<u64>, attempt: u32) -> Duration {
        let delay = if let Some(secs) = retry_after_secs {
            let capped_secs = secs.min(self.config.max_delay_ms / 1000);
            if secs > capped_secs {
                warn!(
                    "Retry-After {} seconds exceeds max, capping at {} seconds",
                    secs, capped_secs
                );
            }
            Duration::from_secs(capped_secs)
        } else {
            self.calculate_backoff_delay(attempt)
        };

        self.add_jitter(delay)
    }

    /// Sleeps before the next attempt.
    pub async fn wait(&self, retry_after_secs: Option<u64>, attempt: u32) {
        let delay = self.delay_for(retry_after_secs, attempt);
        info!("Transient failure, retrying in {:?} (attempt {})", delay, attempt + 1);
        tokio::time::sleep(delay).await;
    }
}
