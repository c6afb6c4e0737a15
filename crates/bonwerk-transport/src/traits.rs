// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Trait definitions for the capabilities the session engine consumes.
//
// The session never touches a USB stack, a database, or an encoding table
// directly — it goes through these seams. Implementations must convert every
// platform error into a typed `BonwerkError` at the boundary; an uncaught
// platform exception must never escape into the core.

use std::time::Duration;

use async_trait::async_trait;

use bonwerk_core::error::Result;
use bonwerk_core::types::{DeviceId, DeviceInfo, JournalEntry, SavedIdentity};

/// An open claim on a printer's bulk endpoints.
///
/// Opaque to the session beyond identity and logging; `raw` is whatever the
/// backend needs to find its own per-device state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub raw: u64,
    pub device: DeviceId,
    pub product_name: Option<String>,
}

/// Raw USB transport primitives.
///
/// All methods are bounded: `open` may suspend on a permission prompt (the
/// session wraps it in its own timeout), `write` and `read` take an explicit
/// per-call timeout. A zero-length `write` is a valid liveness probe and
/// must reach the device.
#[async_trait]
pub trait UsbTransport: Send + Sync {
    /// Enumerate currently attached printer-class devices.
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Claim the device's bulk interface.
    ///
    /// Errors: `DeviceNotFound`, `NoBulkEndpoint`, `OpenFailed`,
    /// `PermissionDenied`.
    async fn open(&self, device: &DeviceId) -> Result<DeviceHandle>;

    /// Release the claim. Infallible by contract — backends swallow and log
    /// their own close errors, since the caller is always tearing down.
    async fn close(&self, handle: DeviceHandle);

    /// Bulk-OUT write. Returns the number of bytes accepted.
    async fn write(&self, handle: &DeviceHandle, bytes: &[u8], timeout: Duration)
    -> Result<usize>;

    /// Bulk-IN read of up to `len` bytes.
    ///
    /// Returns `NoBulkEndpoint` when the device has no IN endpoint at all
    /// (structural), `ReadFailed` for timeouts and transient faults.
    async fn read(&self, handle: &DeviceHandle, len: usize, timeout: Duration)
    -> Result<Vec<u8>>;
}

/// Storage for the one printer remembered for auto-reconnect.
pub trait IdentityStore: Send + Sync {
    fn save(&self, identity: &SavedIdentity) -> Result<()>;
    fn load(&self) -> Result<Option<SavedIdentity>>;
    fn clear(&self) -> Result<()>;
}

/// Storage for the operation journal.
///
/// `persist` replaces the stored set wholesale — the session owns the
/// 100-entry cap and always hands over the full capped buffer.
pub trait JournalStore: Send + Sync {
    fn persist(&self, entries: &[JournalEntry]) -> Result<()>;
    fn load(&self) -> Result<Vec<JournalEntry>>;
}

/// Stateless text-to-printer-bytes conversion.
pub trait CharsetService: Send + Sync {
    /// Encode `text` using the named single-byte code page.
    ///
    /// Errors with `UnsupportedCharset` when the label is unknown.
    fn encode(&self, text: &str, charset: &str) -> Result<Vec<u8>>;

    /// Labels accepted by `encode`.
    fn supported(&self) -> Vec<String>;
}
