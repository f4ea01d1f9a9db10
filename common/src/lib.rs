//! Common utilities shared by the engine-verify crates.
//!
//! This module provides the error type and the engine configuration.

pub mod config;
pub mod error;

pub use config::{EngineConfig, ExecutionMode, MemorySize};
pub use error::{ErrorCategory, ErrorContext, VerifyError, VerifyResult};
