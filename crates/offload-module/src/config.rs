//! Coordinator configuration

use offload_core::constants::{DEFAULT_CAPACITY, MAX_CAPACITY};
use offload_core::env::{env_get, env_get_bool, env_get_ms, env_get_us};

use std::time::Duration;

/// Longest idle wait between stop checks.
pub const MAX_POLL_IDLE: Duration = Duration::from_secs(3600);

/// Longest sleep between empty drain iterations.
pub const MAX_POLL_BACKOFF: Duration = Duration::from_secs(1);

/// What a submitter does when every slot is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquirePolicy {
    /// Wait for a slot to be released.
    Block,
    /// Return `Exhausted` so the caller can fall back to software.
    FailFast,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Number of in-flight task slots
    pub capacity: usize,

    /// Behaviour when the pool is exhausted
    pub acquire: AcquirePolicy,

    /// Would-block retries before a submission gives up
    pub submit_retries: u32,

    /// How long the idle poll driver sleeps on the work signal
    pub poll_idle: Duration,

    /// Empty drain iterations spent spinning before yielding
    pub poll_spins: u32,

    /// Ceiling for the sleep between empty drain iterations
    pub poll_backoff_max: Duration,

    /// Completions each drain call asks for
    pub drain_min: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            acquire: AcquirePolicy::Block,
            submit_retries: 1000,
            poll_idle: Duration::from_millis(10),
            poll_spins: 64,
            poll_backoff_max: Duration::from_micros(50),
            drain_min: 1,
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `OFFLOAD_*` environment variables.
    ///
    /// | Variable                 | Field            |
    /// |--------------------------|------------------|
    /// | `OFFLOAD_CAPACITY`       | capacity         |
    /// | `OFFLOAD_FAIL_FAST`      | acquire          |
    /// | `OFFLOAD_SUBMIT_RETRIES` | submit_retries   |
    /// | `OFFLOAD_POLL_IDLE_MS`   | poll_idle        |
    /// | `OFFLOAD_POLL_SPINS`     | poll_spins       |
    /// | `OFFLOAD_POLL_BACKOFF_US`| poll_backoff_max |
    /// | `OFFLOAD_DRAIN_MIN`      | drain_min        |
    pub fn from_env() -> Self {
        let d = Self::default();
        let fail_fast = env_get_bool("OFFLOAD_FAIL_FAST", d.acquire == AcquirePolicy::FailFast);
        Self {
            capacity: env_get("OFFLOAD_CAPACITY", d.capacity),
            acquire: if fail_fast { AcquirePolicy::FailFast } else { AcquirePolicy::Block },
            submit_retries: env_get("OFFLOAD_SUBMIT_RETRIES", d.submit_retries),
            poll_idle: env_get_ms("OFFLOAD_POLL_IDLE_MS", d.poll_idle.as_millis() as u64),
            poll_spins: env_get("OFFLOAD_POLL_SPINS", d.poll_spins),
            poll_backoff_max: env_get_us("OFFLOAD_POLL_BACKOFF_US", d.poll_backoff_max.as_micros() as u64),
            drain_min: env_get("OFFLOAD_DRAIN_MIN", d.drain_min),
        }
    }

    pub fn capacity(mut self, n: usize) -> Self {
        self.capacity = n;
        self
    }

    pub fn acquire(mut self, policy: AcquirePolicy) -> Self {
        self.acquire = policy;
        self
    }

    /// Shorthand for `acquire(AcquirePolicy::FailFast)`
    pub fn fail_fast(self) -> Self {
        self.acquire(AcquirePolicy::FailFast)
    }

    pub fn submit_retries(mut self, n: u32) -> Self {
        self.submit_retries = n;
        self
    }

    pub fn poll_idle(mut self, d: Duration) -> Self {
        self.poll_idle = d;
        self
    }

    pub fn poll_spins(mut self, n: u32) -> Self {
        self.poll_spins = n;
        self
    }

    pub fn poll_backoff_max(mut self, d: Duration) -> Self {
        self.poll_backoff_max = d;
        self
    }

    pub fn drain_min(mut self, n: u32) -> Self {
        self.drain_min = n;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.capacity == 0 {
            return Err("capacity must be at least 1");
        }
        if self.capacity > MAX_CAPACITY {
            return Err("capacity exceeds maximum");
        }
        if self.drain_min == 0 {
            return Err("drain_min must be at least 1");
        }
        if self.poll_idle.is_zero() {
            return Err("poll_idle must be non-zero");
        }
        if self.poll_idle > MAX_POLL_IDLE {
            return Err("poll_idle exceeds maximum");
        }
        if self.poll_backoff_max > MAX_POLL_BACKOFF {
            return Err("poll_backoff_max exceeds maximum");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let c = CoordinatorConfig::default();
        assert_eq!(c.capacity, 1024);
        assert_eq!(c.acquire, AcquirePolicy::Block);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let c = CoordinatorConfig::new()
            .capacity(8)
            .fail_fast()
            .submit_retries(3)
            .drain_min(2);
        assert_eq!(c.capacity, 8);
        assert_eq!(c.acquire, AcquirePolicy::FailFast);
        assert_eq!(c.submit_retries, 3);
        assert_eq!(c.drain_min, 2);
    }

    #[test]
    fn test_validate_rejects() {
        assert!(CoordinatorConfig::new().capacity(0).validate().is_err());
        assert!(CoordinatorConfig::new().capacity(MAX_CAPACITY + 1).validate().is_err());
        assert!(CoordinatorConfig::new().drain_min(0).validate().is_err());
        assert!(CoordinatorConfig::new().poll_idle(Duration::ZERO).validate().is_err());
        assert!(CoordinatorConfig::new().poll_idle(MAX_POLL_IDLE).validate().is_ok());
        assert!(CoordinatorConfig::new()
            .poll_idle(Duration::from_millis(u64::MAX))
            .validate()
            .is_err());
        assert!(CoordinatorConfig::new()
            .poll_backoff_max(Duration::from_micros(u64::MAX))
            .validate()
            .is_err());
    }
}
