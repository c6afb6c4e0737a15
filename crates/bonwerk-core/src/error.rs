// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Bonwerk.
//
// Setup errors surface synchronously from `connect` and are never retried
// automatically. Link errors are absorbed by the session: they tear the
// handle down, flip the state to `ConnectionLost` and feed the retry queue.

use thiserror::Error;

/// Top-level error type for all Bonwerk operations.
#[derive(Debug, Error)]
pub enum BonwerkError {
    // -- Session setup --
    #[error("USB permission denied by the user or the OS")]
    PermissionDenied,

    #[error("USB permission prompt timed out")]
    PermissionTimeout,

    #[error("device not found")]
    DeviceNotFound,

    #[error("device exposes no usable bulk-OUT endpoint")]
    NoBulkEndpoint,

    #[error("device open failed: {0}")]
    OpenFailed(String),

    // -- Link --
    #[error("no printer connected")]
    NotConnected,

    #[error("bulk write failed: {0}")]
    WriteFailed(String),

    #[error("bulk read failed: {0}")]
    ReadFailed(String),

    // -- Encoding --
    #[error("unsupported charset: {0}")]
    UnsupportedCharset(String),

    // -- Storage / persistence --
    #[error("storage error: {0}")]
    Storage(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform --
    #[error("no USB transport available on this platform")]
    TransportUnavailable,
}

impl BonwerkError {
    /// Whether this error belongs to the setup class (connect-time failures
    /// that are reported to the caller and never retried automatically).
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied
                | Self::PermissionTimeout
                | Self::DeviceNotFound
                | Self::NoBulkEndpoint
                | Self::OpenFailed(_)
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BonwerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_errors_are_classified() {
        assert!(BonwerkError::PermissionDenied.is_setup_error());
        assert!(BonwerkError::PermissionTimeout.is_setup_error());
        assert!(BonwerkError::DeviceNotFound.is_setup_error());
        assert!(BonwerkError::NoBulkEndpoint.is_setup_error());
        assert!(BonwerkError::OpenFailed("busy".into()).is_setup_error());
    }

    #[test]
    fn link_errors_are_not_setup_errors() {
        assert!(!BonwerkError::NotConnected.is_setup_error());
        assert!(!BonwerkError::WriteFailed("pipe".into()).is_setup_error());
        assert!(!BonwerkError::ReadFailed("timeout".into()).is_setup_error());
    }
}
