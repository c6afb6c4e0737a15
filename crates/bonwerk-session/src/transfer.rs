// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Chunked bulk-OUT transfer.
//
// Payloads are cut into fixed 16 KiB chunks and written strictly in order.
// The first failed or short chunk aborts the whole transfer — the printer
// has consumed an unknown prefix at that point, so there is nothing to
// salvage by continuing.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use bonwerk_core::error::{BonwerkError, Result};
use bonwerk_transport::{DeviceHandle, UsbTransport};

/// Fixed transfer chunk size.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Outcome of a completed transfer.
#[derive(Debug, Clone, Copy)]
pub struct TransferReport {
    pub bytes_total: usize,
    pub elapsed: Duration,
}

/// Write `payload` to the device in [`CHUNK_SIZE`] chunks.
///
/// An empty payload completes immediately without touching the wire.
pub async fn send_chunked(
    transport: &dyn UsbTransport,
    handle: &DeviceHandle,
    payload: &[u8],
    chunk_timeout: Duration,
) -> Result<TransferReport> {
    let started = Instant::now();
    let mut sent = 0usize;

    for chunk in payload.chunks(CHUNK_SIZE) {
        let written = transport.write(handle, chunk, chunk_timeout).await?;
        if written != chunk.len() {
            warn!(
                written,
                expected = chunk.len(),
                "short bulk write, aborting transfer"
            );
            return Err(BonwerkError::WriteFailed(format!(
                "short write: {written} of {} bytes",
                chunk.len()
            )));
        }
        sent += written;
        debug!(sent, total = payload.len(), "chunk written");
    }

    Ok(TransferReport {
        bytes_total: sent,
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use bonwerk_core::types::DeviceId;

    async fn open_handle(mock: &MockTransport) -> DeviceHandle {
        mock.open(&DeviceId::new(0x04b8, 0x0202))
            .await
            .expect("mock open")
    }

    #[tokio::test]
    async fn small_payload_goes_out_as_one_chunk() {
        let mock = MockTransport::new();
        let handle = open_handle(&mock).await;

        let report = send_chunked(&mock, &handle, &[0xAA; 1_000], Duration::from_secs(5))
            .await
            .expect("transfer");

        assert_eq!(report.bytes_total, 1_000);
        let writes = mock.write_log();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].len(), 1_000);
    }

    #[tokio::test]
    async fn payload_on_the_chunk_boundary_stays_one_chunk() {
        let mock = MockTransport::new();
        let handle = open_handle(&mock).await;

        let report = send_chunked(&mock, &handle, &[0x00; CHUNK_SIZE], Duration::from_secs(5))
            .await
            .expect("transfer");

        assert_eq!(report.bytes_total, CHUNK_SIZE);
        assert_eq!(mock.write_log().len(), 1);
    }

    #[tokio::test]
    async fn one_byte_over_the_boundary_takes_two_chunks() {
        let mock = MockTransport::new();
        let handle = open_handle(&mock).await;

        send_chunked(&mock, &handle, &[0x00; CHUNK_SIZE + 1], Duration::from_secs(5))
            .await
            .expect("transfer");

        let writes = mock.write_log();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].len(), CHUNK_SIZE);
        assert_eq!(writes[1].len(), 1);
    }

    #[tokio::test]
    async fn empty_payload_never_touches_the_wire() {
        let mock = MockTransport::new();
        let handle = open_handle(&mock).await;

        let report = send_chunked(&mock, &handle, &[], Duration::from_secs(5))
            .await
            .expect("transfer");

        assert_eq!(report.bytes_total, 0);
        assert!(mock.write_log().is_empty());
    }

    #[tokio::test]
    async fn failed_middle_chunk_aborts_the_rest() {
        let mock = MockTransport::new();
        let handle = open_handle(&mock).await;
        mock.script_write_error(1, BonwerkError::WriteFailed("pipe stall".into()));

        let err = send_chunked(
            &mock,
            &handle,
            &[0x00; CHUNK_SIZE * 3],
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BonwerkError::WriteFailed(_)));
        // Exactly one chunk made it out before the failure.
        assert_eq!(mock.write_log().len(), 1);
    }
}
