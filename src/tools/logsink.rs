//! Explicit diagnostics sink for the kernel and the storage engine.
//!
//! The container and the time-series engine never talk to a logging
//! backend directly; everything they have to say goes through a sink
//! received at construction. The default sink forwards to the `log`
//! facade, so the binary decides where the lines end up.

use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkLevel {
    Error,
    Warn,
    Info,
    Debug,
}

/// Receives diagnostics from the core.
pub trait LogSink: Send + Sync {
    fn emit(&self, level: SinkLevel, target: &str, message: &str);
}

pub type SharedSink = Arc<dyn LogSink>;

/// Sink forwarding to the `log` facade.
pub struct StandardLogSink;

impl LogSink for StandardLogSink {
    fn emit(&self, level: SinkLevel, target: &str, message: &str) {
        match level {
            SinkLevel::Error => log::error!("{}: {}", target, message),
            SinkLevel::Warn => log::warn!("{}: {}", target, message),
            SinkLevel::Info => log::info!("{}: {}", target, message),
            SinkLevel::Debug => log::debug!("{}: {}", target, message),
        }
    }
}

pub fn default_sink() -> SharedSink {
    Arc::new(StandardLogSink)
}
