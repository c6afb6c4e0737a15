// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DLE EOT status decoding.
//
// Three independent real-time polls, one reply byte each:
//   DLE EOT 2 — offline cause (cover, feed button, stop conditions)
//   DLE EOT 3 — error status (cutter, recoverable / unrecoverable)
//   DLE EOT 4 — paper roll sensors (near-end, end)
//
// Each decoder only touches the fields its reply byte is authoritative for,
// so a failed poll leaves those fields at their all-OK defaults. `online` is
// never read from the wire; it is recomputed from the merged result.

use bonwerk_core::types::PrinterStatus;

/// DLE EOT 2 — transmit offline cause.
pub const QUERY_OFFLINE_CAUSE: [u8; 3] = [0x10, 0x04, 0x02];
/// DLE EOT 3 — transmit error status.
pub const QUERY_ERROR_STATUS: [u8; 3] = [0x10, 0x04, 0x03];
/// DLE EOT 4 — transmit paper roll sensor status.
pub const QUERY_PAPER_SENSOR: [u8; 3] = [0x10, 0x04, 0x04];

/// Fold the offline-cause reply (DLE EOT 2) into `status`.
pub fn apply_offline_cause(byte: u8, status: &mut PrinterStatus) {
    // Bit 2 set means the cover is open.
    status.cover_closed = byte & 0x04 == 0;
    status.feed_button_pressed = byte & 0x08 != 0;
    status.printing_error_stopped = byte & 0x20 != 0;
    status.error_occurred = byte & 0x40 != 0;
}

/// Fold the error-status reply (DLE EOT 3) into `status`.
pub fn apply_error_status(byte: u8, status: &mut PrinterStatus) {
    status.auto_cutter_error = byte & 0x04 != 0;
    status.unrecoverable_error = byte & 0x08 != 0;
    status.auto_recoverable_error = byte & 0x20 != 0;
}

/// Fold the paper-sensor reply (DLE EOT 4) into `status`.
pub fn apply_paper_sensor(byte: u8, status: &mut PrinterStatus) {
    // Bits 2+3: near-end sensor. Bits 5+6: roll-end sensor.
    status.paper_near_end = byte & 0x0C != 0;
    status.paper_ok = byte & 0x60 == 0;
}

/// Merge up to three reply bytes into a full status snapshot.
///
/// `None` means that poll failed; the corresponding fields keep their
/// defaults. The caller decides separately whether the printer is reachable
/// at all (`PrinterStatus::unsupported`).
pub fn merge_status(offline: Option<u8>, errors: Option<u8>, paper: Option<u8>) -> PrinterStatus {
    let mut status = PrinterStatus::default();
    if let Some(byte) = offline {
        apply_offline_cause(byte, &mut status);
    }
    if let Some(byte) = errors {
        apply_error_status(byte, &mut status);
    }
    if let Some(byte) = paper {
        apply_paper_sensor(byte, &mut status);
    }
    status.online = !(status.printing_error_stopped || status.unrecoverable_error);
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_clear_replies_decode_to_ok() {
        let st = merge_status(Some(0x00), Some(0x00), Some(0x00));
        assert!(st.supported);
        assert!(st.paper_ok);
        assert!(st.cover_closed);
        assert!(st.online);
        assert!(!st.has_any_error());
    }

    #[test]
    fn offline_cause_0x44_means_error_with_cover_closed() {
        let st = merge_status(Some(0x44), Some(0x00), Some(0x00));
        assert!(!st.cover_closed); // bit 2 is set in 0x44
        assert!(st.error_occurred);
        assert!(!st.printing_error_stopped);
        assert!(st.online);
    }

    #[test]
    fn open_cover_sets_cover_open() {
        let st = merge_status(Some(0x04), Some(0x00), Some(0x00));
        assert!(!st.cover_closed);
        assert!(st.online);
    }

    #[test]
    fn stop_condition_takes_printer_offline() {
        let st = merge_status(Some(0x20), Some(0x00), Some(0x00));
        assert!(st.printing_error_stopped);
        assert!(!st.online);
    }

    #[test]
    fn unrecoverable_error_takes_printer_offline() {
        let st = merge_status(Some(0x00), Some(0x08), Some(0x00));
        assert!(st.unrecoverable_error);
        assert!(!st.online);
        assert!(st.has_any_error());
    }

    #[test]
    fn cutter_and_recoverable_bits_decode() {
        let st = merge_status(Some(0x00), Some(0x24), Some(0x00));
        assert!(st.auto_cutter_error);
        assert!(st.auto_recoverable_error);
        assert!(!st.unrecoverable_error);
        assert!(st.online);
    }

    #[test]
    fn paper_near_end_bits() {
        let st = merge_status(Some(0x00), Some(0x00), Some(0x0C));
        assert!(st.paper_near_end);
        assert!(st.paper_ok);
    }

    #[test]
    fn paper_out_bits() {
        let st = merge_status(Some(0x00), Some(0x00), Some(0x6C));
        assert!(!st.paper_ok);
        assert!(st.paper_near_end);
        assert_eq!(st.summary_text(), "NO PAPER");
    }

    #[test]
    fn failed_polls_keep_their_fields_at_defaults() {
        // Only the error poll answered, and it reported a cutter fault.
        let st = merge_status(None, Some(0x04), None);
        assert!(st.cover_closed);
        assert!(st.paper_ok);
        assert!(st.auto_cutter_error);
        assert!(st.online);
    }

    #[test]
    fn no_replies_at_all_is_plain_default() {
        let st = merge_status(None, None, None);
        assert_eq!(st, PrinterStatus::default());
    }
}
