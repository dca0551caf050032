//! Configuration types for the Heron runtime.
//!
//! Plain structs with defaults and builder-style setters. Every config can
//! also be read from JSON (camelCase keys, durations in milliseconds).

use crate::error::{HeronError, HeronResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Value converter configuration.
///
/// The proxy modes are atomics so they can be toggled while a converter is
/// installed in a runtime.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConverterConfig {
    /// Expose host maps through map-semantics proxies.
    /// Default: false (maps become generic object proxies)
    pub proxy_map_enabled: AtomicBool,

    /// Expose host sets through set-semantics proxies.
    /// Default: false (sets become generic object proxies)
    pub proxy_set_enabled: AtomicBool,
}

impl ConverterConfig {
    /// Create a converter config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable map proxies.
    pub fn proxy_map(self, enabled: bool) -> Self {
        self.set_proxy_map_enabled(enabled);
        self
    }

    /// Enable or disable set proxies.
    pub fn proxy_set(self, enabled: bool) -> Self {
        self.set_proxy_set_enabled(enabled);
        self
    }

    pub fn is_proxy_map_enabled(&self) -> bool {
        self.proxy_map_enabled.load(Ordering::Acquire)
    }

    pub fn is_proxy_set_enabled(&self) -> bool {
        self.proxy_set_enabled.load(Ordering::Acquire)
    }

    /// Toggle map proxies on a live config.
    pub fn set_proxy_map_enabled(&self, enabled: bool) {
        self.proxy_map_enabled.store(enabled, Ordering::Release);
    }

    /// Toggle set proxies on a live config.
    pub fn set_proxy_set_enabled(&self, enabled: bool) {
        self.proxy_set_enabled.store(enabled, Ordering::Release);
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> HeronResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Clone for ConverterConfig {
    fn clone(&self) -> Self {
        Self::new()
            .proxy_map(self.is_proxy_map_enabled())
            .proxy_set(self.is_proxy_set_enabled())
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    /// How long `lock()` waits for another thread to release the runtime.
    /// Default: 10s
    #[serde(with = "millis")]
    pub lock_timeout: Duration,

    /// Maximum script call depth before a stack overflow is reported.
    /// Default: 128
    pub max_call_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(10),
            max_call_depth: 128,
        }
    }
}

impl RuntimeConfig {
    /// Create a runtime config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lock acquisition timeout.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the maximum call depth.
    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> HeronResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Engine pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolConfig {
    /// Runtimes created up front and never swept.
    /// Default: 0
    pub min_size: usize,

    /// Upper bound on live runtimes.
    /// Default: 4
    pub max_size: usize,

    /// How long `get_engine()` waits for a free runtime.
    /// Default: 5s
    #[serde(with = "millis")]
    pub wait_timeout: Duration,

    /// Idle runtimes unused for longer than this are disposed.
    /// Default: 60s
    #[serde(with = "millis")]
    pub idle_timeout: Duration,

    /// Interval between background sweeps.
    /// Default: 10s
    #[serde(with = "millis")]
    pub sweep_interval: Duration,

    /// Configuration for every runtime the pool creates.
    pub runtime: RuntimeConfig,

    /// Converter configuration installed in every runtime.
    pub converter: ConverterConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 0,
            max_size: 4,
            wait_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(10),
            runtime: RuntimeConfig::default(),
            converter: ConverterConfig::default(),
        }
    }
}

impl PoolConfig {
    /// Create a pool config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of prewarmed runtimes.
    pub fn min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    /// Set the maximum number of runtimes.
    pub fn max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Set the checkout wait timeout.
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Set the idle timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the sweep interval.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the runtime configuration.
    pub fn runtime(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = runtime;
        self
    }

    /// Set the converter configuration.
    pub fn converter(mut self, converter: ConverterConfig) -> Self {
        self.converter = converter;
        self
    }

    /// Check size bounds.
    pub fn validate(&self) -> HeronResult<()> {
        if self.max_size == 0 {
            return Err(HeronError::Config("maxSize must be at least 1".to_string()));
        }
        if self.min_size > self.max_size {
            return Err(HeronError::Config(format!(
                "minSize ({}) exceeds maxSize ({})",
                self.min_size, self.max_size
            )));
        }
        if self.sweep_interval.is_zero() {
            return Err(HeronError::Config("sweepInterval must be positive".to_string()));
        }
        Ok(())
    }

    /// Parse and validate from JSON.
    pub fn from_json(json: &str) -> HeronResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
