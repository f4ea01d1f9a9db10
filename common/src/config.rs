//! Engine configuration.
//!
//! Settings are layered: compiled-in defaults, then an optional JSON file
//! named by `ENGINE_VERIFY_CONFIG`, then individual environment overrides.

use crate::error::{ErrorContext, VerifyError, VerifyResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Environment variable naming a JSON configuration file.
pub const CONFIG_FILE_ENV: &str = "ENGINE_VERIFY_CONFIG";
pub const APP_NAME_ENV: &str = "ENGINE_VERIFY_APP_NAME";
pub const MASTER_ENV: &str = "ENGINE_VERIFY_MASTER";
pub const DRIVER_MEMORY_ENV: &str = "ENGINE_VERIFY_DRIVER_MEMORY";
pub const EXECUTOR_MEMORY_ENV: &str = "ENGINE_VERIFY_EXECUTOR_MEMORY";

/// How the engine parallelizes work on the local machine.
///
/// Master strings follow the familiar `local`, `local[N]` and `local[*]`
/// forms. Cluster masters are rejected since only local execution exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExecutionMode {
    /// A single worker thread (`local`)
    Local,
    /// A fixed number of worker threads (`local[N]`)
    LocalThreads(usize),
    /// One worker thread per logical core (`local[*]`)
    LocalAllCores,
}

impl ExecutionMode {
    /// Number of partitions the engine should target.
    pub fn parallelism(&self) -> usize {
        match self {
            ExecutionMode::Local => 1,
            ExecutionMode::LocalThreads(n) => *n,
            ExecutionMode::LocalAllCores => num_cpus::get().max(1),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let master = s.trim();
        if master == "local" {
            return Ok(ExecutionMode::Local);
        }

        let threads = master
            .strip_prefix("local[")
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| {
                VerifyError::configuration_error(format!(
                    "Unsupported master '{}': only local execution is available",
                    master
                ))
            })?;

        if threads == "*" {
            return Ok(ExecutionMode::LocalAllCores);
        }

        match threads.parse::<usize>() {
            Ok(0) => Err(VerifyError::configuration_error(format!(
                "Master '{}' requests zero worker threads",
                master
            ))),
            Ok(n) => Ok(ExecutionMode::LocalThreads(n)),
            Err(e) => Err(VerifyError::configuration_error_with_source(
                format!("Invalid thread count in master '{}'", master),
                e,
            )),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Local => write!(f, "local"),
            ExecutionMode::LocalThreads(n) => write!(f, "local[{}]", n),
            ExecutionMode::LocalAllCores => write!(f, "local[*]"),
        }
    }
}

impl TryFrom<String> for ExecutionMode {
    type Error = VerifyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExecutionMode> for String {
    fn from(mode: ExecutionMode) -> Self {
        mode.to_string()
    }
}

/// A memory amount written in JVM style: `512m`, `2g`, `1024k` or plain bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemorySize(u64);

impl MemorySize {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * Self::KIB;
    const GIB: u64 = 1024 * Self::MIB;
    const TIB: u64 = 1024 * Self::GIB;

    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Sizes past `u64::MAX` bytes saturate.
    pub const fn from_gib(gib: u64) -> Self {
        Self(gib.saturating_mul(Self::GIB))
    }

    pub fn bytes(&self) -> u64 {
        self.0
    }
}

impl FromStr for MemorySize {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_ascii_lowercase();
        let (digits, unit) = match value.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
            Some((idx, _)) => value.split_at(idx),
            None => (value.as_str(), ""),
        };

        let multiplier = match unit {
            "" | "b" => 1,
            "k" | "kb" => Self::KIB,
            "m" | "mb" => Self::MIB,
            "g" | "gb" => Self::GIB,
            "t" | "tb" => Self::TIB,
            other => {
                return Err(VerifyError::configuration_error(format!(
                    "Unknown memory unit '{}' in '{}'",
                    other, s
                )));
            }
        };

        let amount: u64 = digits
            .parse()
            .with_config_context(|| format!("Invalid memory size '{}'", s))?;
        if amount == 0 {
            return Err(VerifyError::configuration_error(format!(
                "Memory size '{}' must be greater than zero",
                s
            )));
        }

        amount
            .checked_mul(multiplier)
            .map(MemorySize)
            .ok_or_else(|| VerifyError::configuration_error(format!("Memory size '{}' overflows", s)))
    }
}

impl fmt::Display for MemorySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = [
            (Self::TIB, "t"),
            (Self::GIB, "g"),
            (Self::MIB, "m"),
            (Self::KIB, "k"),
        ];
        for (size, suffix) in units {
            if self.0 % size == 0 {
                return write!(f, "{}{}", self.0 / size, suffix);
            }
        }
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for MemorySize {
    type Error = VerifyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MemorySize> for String {
    fn from(size: MemorySize) -> Self {
        size.to_string()
    }
}

/// Configuration for the local engine session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub app_name: String,
    pub master: ExecutionMode,
    /// Upper bound for the engine's memory pool.
    pub driver_memory: MemorySize,
    /// Recorded for parity with cluster deployments; local runs only log it.
    pub executor_memory: MemorySize,
    pub batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_name: "engine-verify".to_string(),
            master: ExecutionMode::LocalAllCores,
            driver_memory: MemorySize::from_gib(2),
            executor_memory: MemorySize::from_gib(2),
            batch_size: 8192,
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> VerifyResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_config_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_config_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Build the effective configuration from the process environment.
    pub fn from_env() -> VerifyResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the effective configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> VerifyResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_FILE_ENV) {
            Some(path) => {
                debug!("Loading engine configuration from {}", path);
                Self::from_json_file(path)?
            }
            None => Self::default(),
        };

        if let Some(app_name) = lookup(APP_NAME_ENV) {
            config.app_name = app_name;
        }
        if let Some(master) = lookup(MASTER_ENV) {
            config.master = master.parse()?;
        }
        if let Some(memory) = lookup(DRIVER_MEMORY_ENV) {
            config.driver_memory = memory.parse()?;
        }
        if let Some(memory) = lookup(EXECUTOR_MEMORY_ENV) {
            config.executor_memory = memory.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> VerifyResult<()> {
        if self.app_name.trim().is_empty() {
            return Err(VerifyError::configuration_error(
                "Application name must not be empty",
            ));
        }
        if self.batch_size == 0 {
            return Err(VerifyError::configuration_error(
                "Batch size must be greater than zero",
            ));
        }
        Ok(())
    }
}
