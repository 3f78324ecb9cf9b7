// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! A minimal, level-filtered logging sink.
//!
//! This is deliberately not a full logging framework: the SDK's job is
//! to emit a handful of diagnostic lines (data-source state changes,
//! dropped events, delivery failures) through whatever sink the host
//! application wants -- console, file, or something else entirely via
//! a custom [`Output`] impl. Swap in `log`/`tracing` at the application
//! boundary if you need more.
//!
//! ```ignore
//! use flagcore::logging::{init_logger, ConsoleOutput, LogLevel};
//! use std::sync::Arc;
//!
//! init_logger(Arc::new(ConsoleOutput::new(LogLevel::Info)), LogLevel::Info);
//! flagcore::info!("SDK starting");
//! ```

#[cfg(feature = "logging")]
pub mod logger;
#[cfg(feature = "logging")]
mod output;

#[cfg(feature = "logging")]
pub use logger::{flush_logger, init_logger};
#[cfg(feature = "logging")]
pub use output::{ConsoleOutput, FileOutput, LogLevel, Output};

/// Debug-level log message. No-op unless the `logging` feature is enabled.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        { let _ = $crate::logging::logger::log_message(
            $crate::logging::LogLevel::Debug,
            &format!($($arg)*),
        ); }
    };
}

/// Info-level log message.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        { let _ = $crate::logging::logger::log_message(
            $crate::logging::LogLevel::Info,
            &format!($($arg)*),
        ); }
    };
}

/// Warn-level log message.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        { let _ = $crate::logging::logger::log_message(
            $crate::logging::LogLevel::Warn,
            &format!($($arg)*),
        ); }
    };
}

/// Error-level log message.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        #[cfg(feature = "logging")]
        { let _ = $crate::logging::logger::log_message(
            $crate::logging::LogLevel::Error,
            &format!($($arg)*),
        ); }
    };
}
