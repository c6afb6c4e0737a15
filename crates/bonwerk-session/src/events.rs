// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hardware-event arbitration.
//
// Two concerns live here, both shared by the session and its background
// tasks:
//
//   * the device-list cache: a watch channel that holds the latest
//     enumeration snapshot, deduplicates identical snapshots, and replays
//     the current value to every new subscriber;
//   * the single-flight reconnect guard: at most one auto-reconnect attempt
//     may be in flight, no matter how many attach events the OS delivers
//     for the same physical replug.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::debug;

use bonwerk_core::types::{DeviceInfo, PaperWarning};

/// Delay between a reconnect decision and the open attempt, giving the OS
/// time to finish enumerating the replugged device.
pub(crate) const SETTLE_DELAY: Duration = Duration::from_millis(500);

pub struct EventArbiter {
    devices_tx: watch::Sender<Vec<DeviceInfo>>,
    reconnect_in_flight: AtomicBool,
}

impl EventArbiter {
    pub fn new() -> Self {
        let (devices_tx, _) = watch::channel(Vec::new());
        Self {
            devices_tx,
            reconnect_in_flight: AtomicBool::new(false),
        }
    }

    /// Replace the cached device snapshot. Returns false (and notifies
    /// nobody) when the new list is equal to the cached one.
    pub fn update_devices(&self, list: Vec<DeviceInfo>) -> bool {
        self.devices_tx.send_if_modified(|current| {
            if *current == list {
                debug!(count = list.len(), "device snapshot unchanged");
                return false;
            }
            *current = list;
            true
        })
    }

    /// Subscribe to snapshot changes. The receiver can read the current
    /// snapshot immediately via `borrow`, so late subscribers never miss
    /// the state of the world.
    pub fn subscribe_devices(&self) -> watch::Receiver<Vec<DeviceInfo>> {
        self.devices_tx.subscribe()
    }

    /// The cached snapshot right now.
    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.devices_tx.borrow().clone()
    }

    /// Claim the reconnect slot. Returns false when an attempt is already
    /// in flight.
    pub fn try_begin_reconnect(&self) -> bool {
        self.reconnect_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn finish_reconnect(&self) {
        self.reconnect_in_flight.store(false, Ordering::SeqCst);
    }

    pub fn reconnect_in_flight(&self) -> bool {
        self.reconnect_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for EventArbiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-kind throttle for paper warnings.
///
/// A warning of a given kind is broadcast at most once per quiet interval;
/// repeats inside the window are dropped. `NearEnd` and `Empty` throttle
/// independently, so an escalation is never suppressed by an earlier
/// near-end warning.
pub struct WarningGate {
    tx: broadcast::Sender<PaperWarning>,
    last_sent: Mutex<HashMap<PaperWarning, tokio::time::Instant>>,
    quiet: Duration,
}

impl WarningGate {
    pub fn new(quiet: Duration) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            tx,
            last_sent: Mutex::new(HashMap::new()),
            quiet,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PaperWarning> {
        self.tx.subscribe()
    }

    /// Broadcast `warning` unless one of the same kind went out within the
    /// quiet interval. Returns whether it was actually sent.
    pub fn emit(&self, warning: PaperWarning) -> bool {
        let now = tokio::time::Instant::now();
        let mut last_sent = self.last_sent.lock().expect("warning gate lock poisoned");

        if let Some(prev) = last_sent.get(&warning) {
            if now.duration_since(*prev) < self.quiet {
                debug!(?warning, "paper warning suppressed inside quiet window");
                return false;
            }
        }

        last_sent.insert(warning, now);
        // No receivers is fine; the warning still resets the window.
        let _ = self.tx.send(warning);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_snapshot_is_deduplicated() {
        let arbiter = EventArbiter::new();
        let list = vec![DeviceInfo::new(0x04b8, 0x0202)];

        assert!(arbiter.update_devices(list.clone()));
        assert!(!arbiter.update_devices(list));
        assert!(arbiter.update_devices(Vec::new()));
    }

    #[test]
    fn late_subscriber_sees_the_current_snapshot() {
        let arbiter = EventArbiter::new();
        arbiter.update_devices(vec![DeviceInfo::new(0x04b8, 0x0202)]);

        let rx = arbiter.subscribe_devices();
        assert_eq!(rx.borrow().len(), 1);
        assert_eq!(arbiter.devices().len(), 1);
    }

    #[test]
    fn reconnect_slot_is_single_flight() {
        let arbiter = EventArbiter::new();
        assert!(arbiter.try_begin_reconnect());
        assert!(!arbiter.try_begin_reconnect());
        assert!(arbiter.reconnect_in_flight());

        arbiter.finish_reconnect();
        assert!(arbiter.try_begin_reconnect());
    }

    #[tokio::test(start_paused = true)]
    async fn warnings_are_throttled_per_kind() {
        let gate = WarningGate::new(Duration::from_secs(30));
        let mut rx = gate.subscribe();

        assert!(gate.emit(PaperWarning::NearEnd));
        assert!(!gate.emit(PaperWarning::NearEnd));
        // A different kind passes straight through.
        assert!(gate.emit(PaperWarning::Empty));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(gate.emit(PaperWarning::NearEnd));

        assert_eq!(rx.recv().await.unwrap(), PaperWarning::NearEnd);
        assert_eq!(rx.recv().await.unwrap(), PaperWarning::Empty);
        assert_eq!(rx.recv().await.unwrap(), PaperWarning::NearEnd);
        assert!(rx.try_recv().is_err());
    }
}
