use std::time::Duration;

/// Tunables for a broker client.
///
/// The defaults match the behavior of typical queue-backed providers: a
/// 30 second visibility timeout before an unacknowledged delivery is
/// requeued, a 5 second budget for acquiring a topic lock, and a 30 second
/// ceiling on how far in the future a previously issued identifier may be
/// before generation fails instead of sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerConfig {
    /// How long a delivered-but-unacknowledged message stays invisible
    /// before it is requeued for redelivery.
    pub visibility_timeout: Duration,
    /// Budget for acquiring a topic lock. Exceeding it is fatal.
    pub lock_timeout: Duration,
    /// Maximum tolerated gap between a previously issued identifier's
    /// timestamp and the current wall clock.
    pub max_clock_skew: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            visibility_timeout: Duration::from_secs(30),
            lock_timeout: Duration::from_secs(5),
            max_clock_skew: Duration::from_secs(30),
        }
    }
}

impl BrokerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the visibility timeout for queuing consumers.
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    /// Set the topic lock acquisition budget.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the maximum tolerated clock skew for identifier generation.
    pub fn with_max_clock_skew(mut self, skew: Duration) -> Self {
        self.max_clock_skew = skew;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.visibility_timeout, Duration::from_secs(30));
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
        assert_eq!(config.max_clock_skew, Duration::from_secs(30));
    }

    #[test]
    fn builder_overrides() {
        let config = BrokerConfig::new()
            .with_visibility_timeout(Duration::from_millis(100))
            .with_lock_timeout(Duration::from_secs(1))
            .with_max_clock_skew(Duration::from_secs(60));
        assert_eq!(config.visibility_timeout, Duration::from_millis(100));
        assert_eq!(config.lock_timeout, Duration::from_secs(1));
        assert_eq!(config.max_clock_skew, Duration::from_secs(60));
    }
}
