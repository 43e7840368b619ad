use std::time::Duration;

/// Tuning for `ProgressService`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressConfig {
    max_attempts: u32,
    store_timeout: Duration,
}

impl ProgressConfig {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Builds a config. `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, store_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            store_timeout,
        }
    }

    /// Load-apply-persist attempts made before surfacing a conflict.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Upper bound on each individual store call.
    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_STORE_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_attempts_still_tries_once() {
        let config = ProgressConfig::new(0, Duration::from_millis(10));
        assert_eq!(config.max_attempts(), 1);
    }
}
