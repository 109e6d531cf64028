//! Logging handle handed to each state at construction.
//!
//! States never reach for a process-wide logger themselves; they log through the
//! `SyncLog` they were built with. The binary wires it to the `log` facade (and so
//! to `env_logger`), tests wire it to a recorder.

use std::fmt;
use std::sync::Arc;

use log::{Level, Log, Metadata, Record};

/// Forwards records to whatever logger is installed behind the `log` facade
struct FacadeLogger;

impl Log for FacadeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record) {
        log::logger().log(record)
    }

    fn flush(&self) {
        log::logger().flush()
    }
}

#[derive(Clone)]
pub struct SyncLog {
    logger: Arc<dyn Log>,
    target: String,
}

impl fmt::Debug for SyncLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncLog")
            .field("target", &self.target)
            .finish()
    }
}

impl SyncLog {
    pub fn new(logger: Arc<dyn Log>, target: impl Into<String>) -> Self {
        Self {
            logger,
            target: target.into(),
        }
    }

    /// A handle backed by the globally installed logger
    pub fn facade(target: impl Into<String>) -> Self {
        Self::new(Arc::new(FacadeLogger), target)
    }

    /// Same sink, different target
    pub fn scoped(&self, target: impl Into<String>) -> Self {
        Self {
            logger: self.logger.clone(),
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let metadata = Metadata::builder()
            .level(level)
            .target(&self.target)
            .build();
        if !self.logger.enabled(&metadata) {
            return;
        }
        self.logger.log(
            &Record::builder()
                .metadata(metadata)
                .args(args)
                .module_path_static(Some(module_path!()))
                .build(),
        );
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args)
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args)
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args)
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args)
    }
}
