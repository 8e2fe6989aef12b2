//! Environment variable utilities
//!
//! Typed lookups with defaults, used by `CoordinatorConfig::from_env()`.
//!
//! ```ignore
//! use offload_core::env::{env_get, env_get_bool, env_get_ms};
//!
//! let capacity: usize = env_get("OFFLOAD_CAPACITY", 1024);
//! let fail_fast = env_get_bool("OFFLOAD_FAIL_FAST", false);
//! let idle = env_get_ms("OFFLOAD_POLL_IDLE_MS", 10);
//! ```

use std::str::FromStr;
use std::time::Duration;

/// Get environment variable parsed as type T, or return default
///
/// Unset and unparsable values both yield the default.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as boolean
///
/// Accepts "1", "true", "yes", "on" (case-insensitive) as true.
/// Any other set value is false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Get environment variable as optional value
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Check if environment variable is set (regardless of value)
#[inline]
pub fn env_is_set(key: &str) -> bool {
    std::env::var(key).is_ok()
}

/// Millisecond duration from the environment
#[inline]
pub fn env_get_ms(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_get(key, default_ms))
}

/// Microsecond duration from the environment
#[inline]
pub fn env_get_us(key: &str, default_us: u64) -> Duration {
    Duration::from_micros(env_get(key, default_us))
}
