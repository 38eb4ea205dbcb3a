//! Executor configuration

use crate::error::{ExecutorError, ExecutorResult};

use stackswap_core::env::{env_get, env_get_str};
use stackswap_core::kprintln;

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Worker thread name prefix
    pub name: String,
    /// Threads started up front and never shrunk below
    pub low_watermark: usize,
    /// Upper bound on worker threads
    pub high_watermark: usize,
    /// Pending tasks accepted before `submit` starts refusing
    pub max_queue_size: usize,
    /// How long a thread above the low watermark waits for work before exiting
    pub idle_time: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorConfig {
    /// Defaults with environment overrides:
    /// - `SSW_EXECUTOR_NAME` - thread name prefix
    /// - `SSW_EXECUTOR_LOW` - low watermark
    /// - `SSW_EXECUTOR_HIGH` - high watermark
    /// - `SSW_EXECUTOR_QUEUE` - max queued tasks
    /// - `SSW_EXECUTOR_IDLE_MS` - idle time in milliseconds
    pub fn from_env() -> Self {
        let defaults = Self::new();
        Self {
            name: env_get_str("SSW_EXECUTOR_NAME", &defaults.name),
            low_watermark: env_get("SSW_EXECUTOR_LOW", defaults.low_watermark),
            high_watermark: env_get("SSW_EXECUTOR_HIGH", defaults.high_watermark),
            max_queue_size: env_get("SSW_EXECUTOR_QUEUE", defaults.max_queue_size),
            idle_time: Duration::from_millis(env_get(
                "SSW_EXECUTOR_IDLE_MS",
                defaults.idle_time.as_millis() as u64,
            )),
        }
    }

    pub fn new() -> Self {
        Self {
            name: "ssw-exec".to_string(),
            low_watermark: 2,
            high_watermark: 8,
            max_queue_size: 64,
            idle_time: Duration::from_millis(1000),
        }
    }

    // Builder methods

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn low_watermark(mut self, n: usize) -> Self {
        self.low_watermark = n;
        self
    }

    pub fn high_watermark(mut self, n: usize) -> Self {
        self.high_watermark = n;
        self
    }

    pub fn max_queue_size(mut self, n: usize) -> Self {
        self.max_queue_size = n;
        self
    }

    pub fn idle_time(mut self, d: Duration) -> Self {
        self.idle_time = d;
        self
    }

    pub fn validate(&self) -> ExecutorResult<()> {
        if self.high_watermark == 0 {
            return Err(ExecutorError::InvalidConfig("high_watermark must be > 0"));
        }
        if self.low_watermark > self.high_watermark {
            return Err(ExecutorError::InvalidConfig(
                "low_watermark must be <= high_watermark",
            ));
        }
        if self.max_queue_size == 0 {
            return Err(ExecutorError::InvalidConfig("max_queue_size must be > 0"));
        }
        if self.idle_time.is_zero() {
            return Err(ExecutorError::InvalidConfig("idle_time must be > 0"));
        }
        Ok(())
    }

    pub fn print(&self) {
        kprintln!("stackswap executor configuration:");
        kprintln!("  name:            {}", self.name);
        kprintln!("  low_watermark:   {}", self.low_watermark);
        kprintln!("  high_watermark:  {}", self.high_watermark);
        kprintln!("  max_queue_size:  {}", self.max_queue_size);
        kprintln!("  idle_time:       {:?}", self.idle_time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(ExecutorConfig::new().validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let c = ExecutorConfig::new().high_watermark(0);
        assert!(c.validate().is_err());

        let c = ExecutorConfig::new().low_watermark(4).high_watermark(2);
        assert_eq!(
            c.validate(),
            Err(ExecutorError::InvalidConfig(
                "low_watermark must be <= high_watermark"
            ))
        );

        let c = ExecutorConfig::new().max_queue_size(0);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let c = ExecutorConfig::new()
            .name("io")
            .low_watermark(0)
            .high_watermark(1)
            .idle_time(Duration::from_millis(5));
        assert_eq!(c.name, "io");
        assert_eq!(c.low_watermark, 0);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("SSW_EXECUTOR_QUEUE", "17");
        let config = ExecutorConfig::from_env();
        let plain = ExecutorConfig::default();
        std::env::remove_var("SSW_EXECUTOR_QUEUE");
        assert_eq!(config.max_queue_size, 17);
        assert_eq!(plain, ExecutorConfig::new());
    }
}
