//! Error types for muselog
//!
//! This module defines all error types used throughout the library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for muselog operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Main error type for muselog operations
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Log writer error
    #[error("Writer error: {0}")]
    Writer(#[from] WriterError),

    /// A listener is already running on the port
    #[error("Listener already running on port {0}")]
    ListenerAlreadyRunning(u16),

    /// No listener is running on the port
    #[error("No listener running on port {0}")]
    ListenerNotFound(u16),

    /// The listener factory failed to bind
    #[error("Listener startup failed on port {port}: {reason}")]
    ListenerStartup { port: u16, reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised by a log writer
#[derive(Error, Debug)]
pub enum WriterError {
    /// The log directory could not be created
    #[error("Cannot create log directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A log file could not be opened or its header written
    #[error("Cannot open log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Buffered records could not be appended to the active file
    #[error("Flush to {path} failed: {source}")]
    Flush {
        path: PathBuf,
        source: std::io::Error,
    },
}
