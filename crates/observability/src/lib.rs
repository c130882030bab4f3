//! Tracing/logging setup shared by every growledger binary.

pub mod tracing;

pub use crate::tracing::{LogFormat, TracingConfig, UnknownLogFormat};

/// Initialize process-wide tracing from `config`.
///
/// Safe to call multiple times; subsequent calls become no-ops and return `false`.
pub fn init(config: &TracingConfig) -> bool {
    crate::tracing::init(config)
}
