//! Remapper error types

use std::path::PathBuf;

use thiserror::Error;

use crate::event::SourceKind;

/// Errors that stop the remapper. Unmapped buttons and codes are not errors.
#[derive(Error, Debug)]
pub enum RemapError {
    #[error("No {kind} device found with VID {vendor:04x} / PID {product:04x}")]
    DeviceNotFound {
        kind: SourceKind,
        vendor: u16,
        product: u16,
    },

    #[error("Failed to grab {path:?} (is another process holding it?): {source}")]
    Grab {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create virtual device: {0}")]
    VirtualDevice(#[source] std::io::Error),

    #[error("Failed to emit event: {0}")]
    Emit(#[source] std::io::Error),

    #[error("Failed to read from {kind} device: {source}")]
    Read {
        kind: SourceKind,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Injector stopped")]
    ChannelClosed,
}
