// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub transport for builds on platforms without a USB backend.
//
// Every method returns `TransportUnavailable` — real backends (nusb on
// desktop, the Android USB host bridge) live outside this crate.

use std::time::Duration;

use async_trait::async_trait;

use bonwerk_core::error::{BonwerkError, Result};
use bonwerk_core::types::{DeviceId, DeviceInfo};

use crate::traits::{DeviceHandle, UsbTransport};

/// No-op transport returned where no USB stack exists.
pub struct StubTransport;

#[async_trait]
impl UsbTransport for StubTransport {
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        tracing::warn!("UsbTransport::list_devices called on stub transport");
        Err(BonwerkError::TransportUnavailable)
    }

    async fn open(&self, _device: &DeviceId) -> Result<DeviceHandle> {
        tracing::warn!("UsbTransport::open called on stub transport");
        Err(BonwerkError::TransportUnavailable)
    }

    async fn close(&self, _handle: DeviceHandle) {}

    async fn write(
        &self,
        _handle: &DeviceHandle,
        _bytes: &[u8],
        _timeout: Duration,
    ) -> Result<usize> {
        Err(BonwerkError::TransportUnavailable)
    }

    async fn read(
        &self,
        _handle: &DeviceHandle,
        _len: usize,
        _timeout: Duration,
    ) -> Result<Vec<u8>> {
        Err(BonwerkError::TransportUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_refuses_everything() {
        let stub = StubTransport;
        assert!(matches!(
            stub.list_devices().await,
            Err(BonwerkError::TransportUnavailable)
        ));
        assert!(matches!(
            stub.open(&DeviceId::new(0x04b8, 0x0202)).await,
            Err(BonwerkError::TransportUnavailable)
        ));
    }
}
