// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session configuration.
//
// Tunables only — protocol constants (chunk size, retry ceiling, journal
// capacity, reconnect settle delay) are fixed in the modules that own them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing knobs for a printer session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Per-chunk bulk write timeout in milliseconds.
    pub chunk_timeout_ms: u64,
    /// Timeout for each individual status poll (write + read).
    pub status_timeout_ms: u64,
    /// Timeout for the zero-length liveness probe.
    pub probe_timeout_ms: u64,
    /// How long to wait for the OS permission prompt before giving up.
    pub permission_timeout_ms: u64,
    /// Transfers slower than this are logged as a soft warning.
    pub slow_transfer_warn_ms: u64,
    /// Minimum quiet interval between repeated paper warnings of one kind.
    pub paper_warning_quiet_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_timeout_ms: 5_000,
            status_timeout_ms: 1_000,
            probe_timeout_ms: 1_000,
            permission_timeout_ms: 30_000,
            slow_transfer_warn_ms: 2_000,
            paper_warning_quiet_secs: 30,
        }
    }
}

impl SessionConfig {
    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_millis(self.chunk_timeout_ms)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn permission_timeout(&self) -> Duration {
        Duration::from_millis(self.permission_timeout_ms)
    }

    pub fn paper_warning_quiet(&self) -> Duration {
        Duration::from_secs(self.paper_warning_quiet_secs)
    }
}
