//! Logging port for mesh components.
//!
//! Components never talk to a process-wide logger directly. Each mesh owns an
//! `Arc<dyn LogSink>` that is handed to every algorithm operating on it, so a
//! caller can redirect or silence diagnostics per mesh instance. The default
//! sink forwards to the [`log`] facade.

use std::fmt;
use std::sync::Arc;

use log::Level;

/// Destination for diagnostics emitted by mesh components.
pub trait LogSink: Send + Sync + fmt::Debug {
    /// Record one message at `level`.
    fn log(&self, level: Level, target: &str, message: fmt::Arguments<'_>);

    /// Whether messages at `level` would be recorded.
    fn enabled(&self, _level: Level) -> bool {
        true
    }
}

/// Forwards to the global [`log`] facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogFacade;

impl LogSink for LogFacade {
    fn log(&self, level: Level, target: &str, message: fmt::Arguments<'_>) {
        log::log!(target: target, level, "{message}");
    }

    fn enabled(&self, level: Level) -> bool {
        log::log_enabled!(level)
    }
}

/// Discards every message.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _level: Level, _target: &str, _message: fmt::Arguments<'_>) {}

    fn enabled(&self, _level: Level) -> bool {
        false
    }
}

/// Keeps every message in memory. Useful for asserting on warnings.
#[derive(Debug, Default)]
pub struct CaptureSink {
    records: parking_lot::Mutex<Vec<(Level, String)>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records so far.
    pub fn records(&self) -> Vec<(Level, String)> {
        self.records.lock().clone()
    }

    /// Number of records at exactly `level`.
    pub fn count(&self, level: Level) -> usize {
        self.records.lock().iter().filter(|(l, _)| *l == level).count()
    }
}

impl LogSink for CaptureSink {
    fn log(&self, level: Level, _target: &str, message: fmt::Arguments<'_>) {
        self.records.lock().push((level, message.to_string()));
    }
}

/// Shared handle to a sink.
pub type SharedSink = Arc<dyn LogSink>;

/// Sink used when none is injected.
pub fn default_sink() -> SharedSink {
    Arc::new(LogFacade)
}

/// Emit a warning through a [`LogSink`].
#[macro_export]
macro_rules! sink_warn {
    ($sink:expr, $($arg:tt)+) => {{
        use $crate::diagnostics::LogSink as _;
        $sink.log(::log::Level::Warn, module_path!(), format_args!($($arg)+))
    }};
}

/// Emit a debug message through a [`LogSink`].
#[macro_export]
macro_rules! sink_debug {
    ($sink:expr, $($arg:tt)+) => {{
        use $crate::diagnostics::LogSink as _;
        if $sink.enabled(::log::Level::Debug) {
            $sink.log(::log::Level::Debug, module_path!(), format_args!($($arg)+))
        }
    }};
}
