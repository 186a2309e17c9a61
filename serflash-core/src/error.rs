//! Error types for port tracking and flash operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by flashing operations.
///
/// Hardware-operation errors are logged at the orchestrator boundary and
/// returned to the caller as one of these variants, never as a panic.
#[derive(Debug, Error)]
pub enum FlashError {
    /// No communication port is selected.
    #[error("no port selected")]
    NoPortSelected,

    /// A write was requested without a firmware image.
    #[error("no firmware image selected")]
    NoFirmwareSelected,

    /// The programmer executable could not be found.
    #[error("programmer executable not found: {0}")]
    ExecutableNotFound(PathBuf),

    /// The programmer exited with a non-zero code.
    #[error("programmer process failed with exit code {0}")]
    ProcessFailed(i32),

    /// Another operation currently holds the hardware channel.
    #[error("device is busy with another operation")]
    DeviceBusy,

    /// Serial port enumeration failed.
    #[error("port enumeration failed: {0}")]
    Enumeration(#[from] serialport::Error),

    /// Filesystem access failed.
    #[error("filesystem error: {0}")]
    FileSystem(#[from] io::Error),
}

/// Result type for flashing operations.
pub type Result<T> = std::result::Result<T, FlashError>;
