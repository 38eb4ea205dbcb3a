//! Environment variable utilities
//!
//! Typed lookups with defaults, used by every `*Config::from_env()`.
//!
//! ```ignore
//! use stackswap_core::env::{env_get, env_get_bool, env_get_bytes};
//!
//! let stripes: usize = env_get("SSW_STORAGE_STRIPES", 8);
//! let debug = env_get_bool("SSW_DEBUG", false);
//! let reserve = env_get_bytes("SSW_IDLE_RESERVE", 64 * 1024); // accepts "64k"
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
///
/// Unset variables and parse failures both fall back to `default`.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Get environment variable as boolean
///
/// "1", "true", "yes", "on" (case-insensitive) are true; any other value
/// is false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => is_truthy(&val),
        Err(_) => default,
    }
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a byte size, accepting `k`/`m`/`g` suffixes (powers of 1024)
#[inline]
pub fn env_get_bytes(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_bytes(&v))
        .unwrap_or(default)
}

/// Parse "4096", "64k", "16M", "1g" into bytes
pub fn parse_bytes(s: &str) -> Option<usize> {
    let s = s.trim().replace('_', "");
    let (digits, shift) = match s.char_indices().last()? {
        (i, 'k') | (i, 'K') => (&s[..i], 10),
        (i, 'm') | (i, 'M') => (&s[..i], 20),
        (i, 'g') | (i, 'G') => (&s[..i], 30),
        _ => (&s[..], 0),
    };
    let base: usize = digits.trim().parse().ok()?;
    base.checked_mul(1usize << shift)
}

pub(crate) fn is_truthy(val: &str) -> bool {
    matches!(
        val.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
