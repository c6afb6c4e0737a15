// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Bonwerk printer session engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed delivery ceiling: a job is attempted at most this many times before
/// it is dropped from the retry queue.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Persistent identity of a USB printer model.
///
/// Vendor + product is the only identity that survives replug and reboot;
/// everything else about an enumerated device is session-scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceId {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// A USB device as seen during enumeration.
#[derive(Debug, Clone, Eq)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub product_name: Option<String>,
    pub serial: Option<String>,
    /// OS-assigned enumeration address. Changes on every replug — must never
    /// participate in equality or saved-printer matching.
    pub bus_address: Option<u32>,
}

impl PartialEq for DeviceInfo {
    fn eq(&self, other: &Self) -> bool {
        // Two device records are equal iff vendor + product match.
        self.id == other.id
    }
}

impl DeviceInfo {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            id: DeviceId::new(vendor_id, product_id),
            product_name: None,
            serial: None,
            bus_address: None,
        }
    }
}

/// Lifecycle states of the printer session.
///
/// Exactly one state is active at a time; every transition (including the
/// initial value to new observers) is broadcast by the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    ConnectionLost,
}

/// Hardware notifications consumed by the event arbiter.
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareEvent {
    /// Full device-list snapshot (replaces the previous one).
    Devices(Vec<DeviceInfo>),
    /// A device appeared.
    Attached(DeviceInfo),
    /// A device went away.
    Detached(DeviceInfo),
    /// The active connection dropped. Carries the identity because the
    /// handle itself has already been released by the OS.
    ConnectionLost(DeviceId),
}

/// Decoded printer health snapshot.
///
/// Recomputed from three independent DLE EOT polls; each field keeps its
/// all-OK default when its source poll fails. `online` is always derived,
/// never read from hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterStatus {
    /// False only when every poll was structurally unavailable (no
    /// connection, or the device lacks a bulk-IN endpoint).
    pub supported: bool,
    pub paper_ok: bool,
    pub paper_near_end: bool,
    pub cover_closed: bool,
    /// Derived: `!(printing_error_stopped || unrecoverable_error)`.
    pub online: bool,
    pub feed_button_pressed: bool,
    pub printing_error_stopped: bool,
    pub error_occurred: bool,
    pub auto_cutter_error: bool,
    pub unrecoverable_error: bool,
    pub auto_recoverable_error: bool,
}

impl Default for PrinterStatus {
    fn default() -> Self {
        Self {
            supported: true,
            paper_ok: true,
            paper_near_end: false,
            cover_closed: true,
            online: true,
            feed_button_pressed: false,
            printing_error_stopped: false,
            error_occurred: false,
            auto_cutter_error: false,
            unrecoverable_error: false,
            auto_recoverable_error: false,
        }
    }
}

impl PrinterStatus {
    /// Snapshot for a printer whose status protocol cannot be reached at
    /// all. Every field keeps its no-problem default.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::default()
        }
    }

    /// Whether any condition that should block printing is present.
    pub fn has_any_error(&self) -> bool {
        !self.paper_ok
            || !self.cover_closed
            || self.auto_cutter_error
            || self.unrecoverable_error
            || self.printing_error_stopped
    }

    /// Human-readable summary in a fixed phrase order, or `"OK"`.
    pub fn summary_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if !self.paper_ok {
            parts.push("NO PAPER");
        } else if self.paper_near_end {
            parts.push("Paper near end");
        }
        if !self.cover_closed {
            parts.push("COVER OPEN");
        }
        if self.auto_cutter_error {
            parts.push("CUTTER ERROR");
        }
        if self.unrecoverable_error {
            parts.push("UNRECOVERABLE ERROR");
        }
        if self.auto_recoverable_error {
            parts.push("Auto-recoverable error");
        }
        if self.printing_error_stopped {
            parts.push("PRINTING STOPPED");
        }
        if parts.is_empty() {
            "OK".into()
        } else {
            parts.join(", ")
        }
    }
}

/// Unique identifier for a queued print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An undelivered print payload held by the retry queue.
#[derive(Debug, Clone)]
pub struct PrintJob {
    pub id: JobId,
    pub payload: Vec<u8>,
    pub label: String,
    pub created_at: DateTime<Utc>,
    /// Bumped by the queue before each delivery attempt.
    pub retry_count: u32,
}

impl PrintJob {
    pub fn new(payload: Vec<u8>, label: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            payload,
            label: label.into(),
            created_at: Utc::now(),
            retry_count: 0,
        }
    }

    /// Whether another delivery attempt is allowed.
    pub fn can_retry(&self) -> bool {
        self.retry_count < MAX_DELIVERY_ATTEMPTS
    }
}

/// The one printer remembered for auto-reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub product_name: Option<String>,
}

impl SavedIdentity {
    pub fn matches(&self, id: &DeviceId) -> bool {
        self.vendor_id == id.vendor_id && self.product_id == id.product_id
    }
}

/// Paper condition warnings emitted by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaperWarning {
    NearEnd,
    Empty,
}

/// One entry in the operation journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub operation: String,
    pub success: bool,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_time_ms: Option<u64>,
}
