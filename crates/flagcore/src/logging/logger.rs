// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global logger instance and initialization.
//!
//! Provides a thread-safe singleton logger with a single output
//! destination and a runtime level filter. Uses lazy initialization so
//! that logging has zero cost until [`init_logger`] is called.

use super::output::{LogLevel, Output};
use std::io;
use std::sync::{Arc, Mutex, OnceLock};

static LOGGER: OnceLock<Mutex<GlobalLogger>> = OnceLock::new();

struct GlobalLogger {
    output: Option<Arc<dyn Output>>,
    level_filter: LogLevel,
}

impl GlobalLogger {
    fn disabled() -> Self {
        Self {
            output: None,
            level_filter: LogLevel::Info,
        }
    }

    fn log(&self, level: LogLevel, message: &str) -> io::Result<()> {
        if level < self.level_filter {
            return Ok(());
        }
        if let Some(output) = &self.output {
            output.write(level, message)?;
        }
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        if let Some(output) = &self.output {
            output.flush()?;
        }
        Ok(())
    }
}

fn logger() -> &'static Mutex<GlobalLogger> {
    LOGGER.get_or_init(|| Mutex::new(GlobalLogger::disabled()))
}

/// Initialize the global logger. Only the first call takes effect;
/// subsequent calls are ignored so that a library dependency can't
/// clobber an application's chosen sink.
pub fn init_logger(output: Arc<dyn Output>, level: LogLevel) {
    let mut guard = logger().lock().unwrap_or_else(|e| e.into_inner());
    if guard.output.is_none() {
        guard.output = Some(output);
        guard.level_filter = level;
    }
}

/// Emit a message at the given level through the configured output, if
/// any is configured and the level passes the filter.
pub fn log_message(level: LogLevel, message: &str) -> io::Result<()> {
    logger().lock().unwrap_or_else(|e| e.into_inner()).log(level, message)
}

/// Flush the configured output's buffers.
pub fn flush_logger() -> io::Result<()> {
    logger().lock().unwrap_or_else(|e| e.into_inner()).flush()
}
