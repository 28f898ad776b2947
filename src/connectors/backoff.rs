// src/connectors/backoff.rs
use rand::Rng;
use std::time::Duration;

/// How the delay between reconnect attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffKind {
    /// Same delay every attempt. The default policy.
    Fixed,
    /// Delay doubles (by `multiplier`) up to `max_delay`, with jitter.
    Exponential,
}

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub kind: BackoffKind,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter_factor: f64,
    /// 0 means retry forever.
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            kind: BackoffKind::Fixed,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

/// Stateful reconnect schedule. One instance per connection loop;
/// call `reset()` after a successful connect.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl BackoffPolicy {
    pub fn new(config: BackoffConfig) -> Self {
        let current_delay = config.initial_delay;
        Self {
            config,
            current_delay,
            attempt_count: 0,
        }
    }

    /// Delay to wait before the next attempt, or None once the configured
    /// attempt limit is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_attempts > 0 && self.attempt_count >= self.config.max_attempts {
            return None;
        }
        self.attempt_count += 1;

        match self.config.kind {
            BackoffKind::Fixed => Some(self.config.initial_delay),
            BackoffKind::Exponential => {
                let delay = self.apply_jitter(self.current_delay);
                self.current_delay = self
                    .current_delay
                    .mul_f64(self.config.multiplier)
                    .min(self.config.max_delay);
                Some(delay)
            }
        }
    }

    pub fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return delay;
        }
        let mut rng = rand::rng();
        let range = delay.as_millis() as f64 * self.config.jitter_factor;
        let offset = rng.random_range(-range..=range);
        let millis = (delay.as_millis() as f64 + offset).max(1.0);
        Duration::from_millis(millis as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_config(delay_secs: u64) -> BackoffConfig {
        BackoffConfig {
            kind: BackoffKind::Fixed,
            initial_delay: Duration::from_secs(delay_secs),
            ..BackoffConfig::default()
        }
    }

    fn exponential_config() -> BackoffConfig {
        BackoffConfig {
            kind: BackoffKind::Exponential,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(800),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts: 0,
        }
    }

    #[test]
    fn default_config_is_fixed_five_seconds_unlimited() {
        let config = BackoffConfig::default();
        assert_eq!(config.kind, BackoffKind::Fixed);
        assert_eq!(config.initial_delay, Duration::from_secs(5));
        assert_eq!(config.max_attempts, 0);
    }

    #[test]
    fn fixed_policy_repeats_same_delay() {
        let mut policy = BackoffPolicy::new(fixed_config(5));
        for _ in 0..10 {
            assert_eq!(policy.next_delay(), Some(Duration::from_secs(5)));
        }
        assert_eq!(policy.attempt_count(), 10);
    }

    #[test]
    fn exponential_policy_doubles_up_to_cap() {
        let mut policy = BackoffPolicy::new(exponential_config());
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(400)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(800)));
        // Capped.
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(800)));
    }

    #[test]
    fn jitter_stays_within_band() {
        let config = BackoffConfig {
            kind: BackoffKind::Exponential,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(1000),
            multiplier: 1.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        };
        let mut policy = BackoffPolicy::new(config);
        for _ in 0..100 {
            let delay = policy.next_delay().unwrap();
            assert!(delay >= Duration::from_millis(900), "delay {delay:?} below band");
            assert!(delay <= Duration::from_millis(1100), "delay {delay:?} above band");
        }
    }

    #[test]
    fn max_attempts_exhausts_policy() {
        let config = BackoffConfig {
            max_attempts: 3,
            ..fixed_config(1)
        };
        let mut policy = BackoffPolicy::new(config);
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert_eq!(policy.next_delay(), None);
        assert_eq!(policy.next_delay(), None);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut policy = BackoffPolicy::new(exponential_config());
        policy.next_delay();
        policy.next_delay();
        policy.reset();
        assert_eq!(policy.attempt_count(), 0);
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn zero_max_attempts_never_exhausts() {
        let mut policy = BackoffPolicy::new(fixed_config(1));
        for _ in 0..1000 {
            assert!(policy.next_delay().is_some());
        }
    }
}
