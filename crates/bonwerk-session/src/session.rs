// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The printer session manager.
//
// One `PrinterSession` owns at most one open device handle at a time, and
// every operation that touches the wire goes through the handle lock — a
// print and a status poll can never interleave their bulk transfers. Setup
// failures surface to the caller; link failures are absorbed: the handle is
// torn down, the state flips to `ConnectionLost`, and the undelivered
// payload joins the retry queue.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tracing::{debug, info, instrument, warn};

use bonwerk_core::config::SessionConfig;
use bonwerk_core::error::{BonwerkError, Result};
use bonwerk_core::types::{
    ConnectionState, DeviceId, DeviceInfo, HardwareEvent, JournalEntry, PaperWarning, PrintJob,
    PrinterStatus, SavedIdentity,
};
use bonwerk_transport::{
    CharsetService, DeviceHandle, IdentityStore, JournalStore, UsbTransport,
};

use crate::events::{EventArbiter, SETTLE_DELAY, WarningGate};
use crate::journal::Journal;
use crate::queue::{QueuedJobInfo, RetryQueue};
use crate::status;
use crate::transfer::{self, TransferReport};

pub struct PrinterSession {
    transport: Arc<dyn UsbTransport>,
    identity: Arc<dyn IdentityStore>,
    charset: Arc<dyn CharsetService>,
    config: SessionConfig,
    journal: Journal,
    queue: RetryQueue,
    arbiter: EventArbiter,
    warnings: WarningGate,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: broadcast::Sender<HardwareEvent>,
    /// The exclusive claim on the printer. Held across every bulk transfer.
    handle: Mutex<Option<DeviceHandle>>,
}

impl PrinterSession {
    pub fn new(
        transport: Arc<dyn UsbTransport>,
        identity: Arc<dyn IdentityStore>,
        journal_store: Arc<dyn JournalStore>,
        charset: Arc<dyn CharsetService>,
        config: SessionConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, _) = broadcast::channel(64);
        let warnings = WarningGate::new(config.paper_warning_quiet());
        Self {
            transport,
            identity,
            charset,
            config,
            journal: Journal::new(journal_store),
            queue: RetryQueue::new(),
            arbiter: EventArbiter::new(),
            warnings,
            state_tx,
            events_tx,
            handle: Mutex::new(None),
        }
    }

    // -- Observation --------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Watch connection-state transitions. The receiver starts with the
    /// current state.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Raw hardware events, forwarded as they arrive.
    pub fn subscribe_events(&self) -> broadcast::Receiver<HardwareEvent> {
        self.events_tx.subscribe()
    }

    /// Throttled paper warnings.
    pub fn subscribe_warnings(&self) -> broadcast::Receiver<PaperWarning> {
        self.warnings.subscribe()
    }

    /// Watch the cached device-list snapshot.
    pub fn subscribe_devices(&self) -> watch::Receiver<Vec<DeviceInfo>> {
        self.arbiter.subscribe_devices()
    }

    /// The last device snapshot seen, without touching the bus.
    pub fn known_devices(&self) -> Vec<DeviceInfo> {
        self.arbiter.devices()
    }

    /// Jobs currently waiting in the retry queue.
    pub fn pending_jobs(&self) -> Vec<QueuedJobInfo> {
        self.queue.pending()
    }

    /// The retained operation journal, oldest first.
    pub fn recent_logs(&self) -> Vec<JournalEntry> {
        self.journal.recent()
    }

    /// Code-page labels accepted by `print_text`.
    pub fn supported_charsets(&self) -> Vec<String> {
        self.charset.supported()
    }

    // -- Connection lifecycle -----------------------------------------------

    /// Enumerate attached printers and refresh the device snapshot.
    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let list = self.transport.list_devices().await?;
        self.arbiter.update_devices(list.clone());
        Ok(list)
    }

    /// Open `device` and make it the active printer.
    ///
    /// Idempotent: an existing handle is closed first. On success the
    /// identity is remembered for auto-reconnect; on failure the session
    /// returns to `Disconnected` and the error surfaces to the caller.
    #[instrument(skip_all, fields(device = %device))]
    pub async fn connect(&self, device: &DeviceId) -> Result<()> {
        {
            let mut slot = self.handle.lock().await;
            if let Some(old) = slot.take() {
                info!(device = %old.device, "closing previous handle before connect");
                self.transport.close(old).await;
            }
        }
        self.set_state(ConnectionState::Connecting);

        match self.open_with_timeout(device).await {
            Ok(handle) => {
                let saved = SavedIdentity {
                    vendor_id: device.vendor_id,
                    product_id: device.product_id,
                    product_name: handle.product_name.clone(),
                };
                if let Err(e) = self.identity.save(&saved) {
                    warn!(error = %e, "could not persist printer identity; auto-reconnect disabled");
                }

                *self.handle.lock().await = Some(handle);
                self.set_state(ConnectionState::Connected);
                self.journal
                    .append("connect", true, Some(device.to_string()), None);
                info!("printer connected");
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                self.journal
                    .append("connect", false, Some(e.to_string()), None);
                Err(e)
            }
        }
    }

    /// Close the active handle, if any.
    ///
    /// `forget` additionally clears the saved identity so the printer will
    /// not be auto-reconnected on replug.
    pub async fn disconnect(&self, forget: bool) {
        {
            let mut slot = self.handle.lock().await;
            if let Some(handle) = slot.take() {
                self.transport.close(handle).await;
            }
        }
        if forget {
            if let Err(e) = self.identity.clear() {
                warn!(error = %e, "could not clear saved identity");
            }
        }
        self.set_state(ConnectionState::Disconnected);
        self.journal.append("disconnect", true, None, None);
    }

    /// Probe the link with a zero-length bulk write.
    ///
    /// A failed probe tears the connection down exactly like a failed
    /// print would.
    pub async fn check_real_connection(&self) -> bool {
        let mut slot = self.handle.lock().await;
        let Some(handle) = slot.as_ref().cloned() else {
            return false;
        };
        match self
            .transport
            .write(&handle, &[], self.config.probe_timeout())
            .await
        {
            Ok(_) => true,
            Err(e) => {
                self.mark_lost(&format!("liveness probe failed: {e}"), &mut slot)
                    .await;
                false
            }
        }
    }

    // -- Printing -----------------------------------------------------------

    /// Deliver `payload` to the printer, or queue it for retry.
    ///
    /// Returns true when the bytes reached the device now, false when the
    /// job was queued instead. Queued is not an error: the payload will be
    /// retried on the next drain.
    #[instrument(skip_all, fields(label = %label, bytes = payload.len()))]
    pub async fn print_bytes(&self, payload: Vec<u8>, label: &str) -> bool {
        let mut slot = self.handle.lock().await;
        let Some(handle) = slot.as_ref().cloned() else {
            drop(slot);
            debug!("no active connection, queueing job");
            self.queue.enqueue(payload, label);
            self.journal.append(
                "print",
                false,
                Some(format!("{label}: not connected, queued")),
                None,
            );
            return false;
        };

        match transfer::send_chunked(
            self.transport.as_ref(),
            &handle,
            &payload,
            self.config.chunk_timeout(),
        )
        .await
        {
            Ok(report) => {
                drop(slot);
                self.note_delivery("print", label, &report);
                true
            }
            Err(e) => {
                self.mark_lost(&format!("transfer failed: {e}"), &mut slot)
                    .await;
                drop(slot);
                self.queue.enqueue(payload, label);
                self.journal.append(
                    "print",
                    false,
                    Some(format!("{label}: {e}, queued for retry")),
                    None,
                );
                false
            }
        }
    }

    /// Encode `text` in the named code page and deliver it.
    ///
    /// Encoding failures surface immediately; nothing is queued, because a
    /// payload that cannot be produced today cannot be produced on retry
    /// either.
    pub async fn print_text(&self, text: &str, charset: &str, label: &str) -> Result<bool> {
        let payload = self.charset.encode(text, charset)?;
        Ok(self.print_bytes(payload, label).await)
    }

    // -- Status -------------------------------------------------------------

    /// Poll the printer's real-time status.
    ///
    /// Never fails: polls that go unanswered leave their fields at the
    /// all-OK defaults, and a printer that cannot answer any poll at all
    /// reports `supported = false`. Paper conditions feed the throttled
    /// warning channel.
    pub async fn get_status(&self) -> PrinterStatus {
        let slot = self.handle.lock().await;
        let Some(handle) = slot.as_ref().cloned() else {
            debug!("status requested with no connection");
            return PrinterStatus::unsupported();
        };

        let mut structural_failures = 0usize;
        let offline = self
            .poll_status(&handle, status::QUERY_OFFLINE_CAUSE, &mut structural_failures)
            .await;
        let errors = self
            .poll_status(&handle, status::QUERY_ERROR_STATUS, &mut structural_failures)
            .await;
        let paper = self
            .poll_status(&handle, status::QUERY_PAPER_SENSOR, &mut structural_failures)
            .await;
        drop(slot);

        if structural_failures == 3 {
            debug!("status protocol unavailable on this device");
            return PrinterStatus::unsupported();
        }

        let snapshot = status::merge_status(offline, errors, paper);
        if !snapshot.paper_ok {
            self.warnings.emit(PaperWarning::Empty);
        } else if snapshot.paper_near_end {
            self.warnings.emit(PaperWarning::NearEnd);
        }
        snapshot
    }

    /// One DLE EOT round trip. `None` on any failure; structural failures
    /// (the device cannot answer this kind of query at all) are counted
    /// separately from transient ones.
    async fn poll_status(
        &self,
        handle: &DeviceHandle,
        query: [u8; 3],
        structural_failures: &mut usize,
    ) -> Option<u8> {
        let timeout = self.config.status_timeout();

        if let Err(e) = self.transport.write(handle, &query, timeout).await {
            if matches!(
                e,
                BonwerkError::NoBulkEndpoint | BonwerkError::TransportUnavailable
            ) {
                *structural_failures += 1;
            }
            debug!(error = %e, query = query[2], "status query write failed");
            return None;
        }

        match self.transport.read(handle, 1, timeout).await {
            Ok(reply) => match reply.first().copied() {
                Some(byte) => Some(byte),
                None => {
                    debug!(query = query[2], "empty status reply");
                    None
                }
            },
            Err(e) => {
                if matches!(
                    e,
                    BonwerkError::NoBulkEndpoint | BonwerkError::TransportUnavailable
                ) {
                    *structural_failures += 1;
                }
                debug!(error = %e, query = query[2], "status reply read failed");
                None
            }
        }
    }

    // -- Retry queue --------------------------------------------------------

    /// Drain the retry queue in FIFO order.
    ///
    /// Stops at the first failed delivery: the failed job (if it still has
    /// attempts left) and everything behind it go back to the head of the
    /// queue, ahead of jobs enqueued meanwhile.
    pub async fn process_queue(&self) {
        if self.state() != ConnectionState::Connected {
            debug!(state = ?self.state(), "queue drain skipped: not connected");
            return;
        }
        let batch = self.queue.snapshot_for_drain();
        if batch.is_empty() {
            return;
        }
        info!(jobs = batch.len(), "draining retry queue");

        let mut remaining: VecDeque<PrintJob> = batch.into();
        while let Some(mut job) = remaining.pop_front() {
            job.retry_count += 1;
            match self.deliver(&job).await {
                Ok(report) => {
                    debug!(job = %job.id, attempt = job.retry_count, "queued job delivered");
                    self.note_delivery("queued_print", &job.label, &report);
                }
                Err(e) => {
                    warn!(job = %job.id, error = %e, "queued delivery failed");
                    let mut undelivered = Vec::with_capacity(remaining.len() + 1);
                    if job.can_retry() {
                        undelivered.push(job);
                    } else {
                        warn!(job = %job.id, label = %job.label, "delivery ceiling reached, dropping job");
                        self.journal.append(
                            "queued_print",
                            false,
                            Some(format!(
                                "{}: dropped after {} attempts",
                                job.label, job.retry_count
                            )),
                            None,
                        );
                    }
                    undelivered.extend(remaining);
                    self.queue.restore(undelivered);
                    break;
                }
            }
        }
    }

    /// Drop every queued job. Returns how many were discarded.
    pub fn clear_queue(&self) -> usize {
        let dropped = self.queue.clear();
        if dropped > 0 {
            self.journal.append(
                "clear_queue",
                true,
                Some(format!("{dropped} jobs discarded")),
                None,
            );
        }
        dropped
    }

    async fn deliver(&self, job: &PrintJob) -> Result<TransferReport> {
        let mut slot = self.handle.lock().await;
        let Some(handle) = slot.as_ref().cloned() else {
            return Err(BonwerkError::NotConnected);
        };
        match transfer::send_chunked(
            self.transport.as_ref(),
            &handle,
            &job.payload,
            self.config.chunk_timeout(),
        )
        .await
        {
            Ok(report) => Ok(report),
            Err(e) => {
                self.mark_lost(&format!("queued transfer failed: {e}"), &mut slot)
                    .await;
                Err(e)
            }
        }
    }

    // -- Hardware events ----------------------------------------------------

    /// Feed one hardware notification into the session.
    pub async fn handle_hardware_event(self: &Arc<Self>, event: HardwareEvent) {
        let _ = self.events_tx.send(event.clone());

        match event {
            HardwareEvent::Devices(list) => {
                if self.arbiter.update_devices(list) {
                    debug!("device snapshot updated");
                }
            }
            HardwareEvent::Detached(info) => {
                debug!(device = %info.id, "device detached");
            }
            HardwareEvent::ConnectionLost(id) => {
                let mut slot = self.handle.lock().await;
                match slot.as_ref() {
                    Some(active) if active.device == id => {
                        self.mark_lost("hardware reported connection lost", &mut slot)
                            .await;
                    }
                    Some(active) => {
                        debug!(lost = %id, active = %active.device,
                            "ignoring connection-lost for unrelated device");
                    }
                    None => {
                        debug!(lost = %id, "connection-lost with no active session");
                    }
                }
            }
            HardwareEvent::Attached(info) => self.maybe_reconnect(info).await,
        }
    }

    /// Spawn a pump task that feeds a channel of hardware events into the
    /// session. The returned sender is handed to the platform event source;
    /// the pump exits when the source drops it.
    pub fn spawn_event_pump(self: &Arc<Self>) -> mpsc::Sender<HardwareEvent> {
        let (tx, mut rx) = mpsc::channel(32);
        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                session.handle_hardware_event(event).await;
            }
            debug!("hardware event source closed");
        });
        tx
    }

    /// React to a device appearing: if it matches the saved printer and no
    /// session is active, schedule a single reconnect attempt after the
    /// settle delay.
    async fn maybe_reconnect(self: &Arc<Self>, info: DeviceInfo) {
        {
            let slot = self.handle.lock().await;
            if slot.is_some() {
                debug!(device = %info.id, "attach ignored: session already active");
                return;
            }
        }

        let saved = match self.identity.load() {
            Ok(Some(saved)) => saved,
            Ok(None) => {
                debug!(device = %info.id, "attach ignored: no saved printer");
                return;
            }
            Err(e) => {
                warn!(error = %e, "could not read saved identity");
                return;
            }
        };
        if !saved.matches(&info.id) {
            debug!(device = %info.id, "attach ignored: not the saved printer");
            return;
        }
        if !self.arbiter.try_begin_reconnect() {
            debug!(device = %info.id, "reconnect already in flight");
            return;
        }

        self.set_state(ConnectionState::Reconnecting);
        info!(device = %info.id, "saved printer reattached, scheduling reconnect");

        let session = Arc::clone(self);
        let device = info.id;
        tokio::spawn(async move {
            // Let the OS finish enumerating before claiming the interface.
            tokio::time::sleep(SETTLE_DELAY).await;

            match session.adopt_device(&device).await {
                Ok(()) => {
                    session.set_state(ConnectionState::Connected);
                    session
                        .journal
                        .append("reconnect", true, Some(device.to_string()), None);
                    info!(device = %device, "auto-reconnect succeeded");
                    session.arbiter.finish_reconnect();
                    session.process_queue().await;
                }
                Err(e) => {
                    warn!(device = %device, error = %e, "auto-reconnect failed");
                    session
                        .journal
                        .append("reconnect", false, Some(e.to_string()), None);
                    session.set_state(ConnectionState::ConnectionLost);
                    session.arbiter.finish_reconnect();
                }
            }
        });
    }

    async fn adopt_device(&self, device: &DeviceId) -> Result<()> {
        let handle = self.open_with_timeout(device).await?;
        let mut slot = self.handle.lock().await;
        if let Some(old) = slot.take() {
            self.transport.close(old).await;
        }
        *slot = Some(handle);
        Ok(())
    }

    // -- Internals ----------------------------------------------------------

    async fn open_with_timeout(&self, device: &DeviceId) -> Result<DeviceHandle> {
        match tokio::time::timeout(
            self.config.permission_timeout(),
            self.transport.open(device),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(BonwerkError::PermissionTimeout),
        }
    }

    /// Tear down the active handle and flip to `ConnectionLost`. The caller
    /// must already hold the handle lock and passes the slot in, so loss
    /// handling can never deadlock against an in-flight transfer.
    async fn mark_lost(&self, reason: &str, slot: &mut Option<DeviceHandle>) {
        if let Some(handle) = slot.take() {
            self.transport.close(handle).await;
        }
        self.set_state(ConnectionState::ConnectionLost);
        self.journal
            .append("connection", false, Some(reason.to_string()), None);
        warn!(reason, "connection lost");
    }

    fn note_delivery(&self, operation: &str, label: &str, report: &TransferReport) {
        let elapsed_ms = report.elapsed.as_millis() as u64;
        if elapsed_ms > self.config.slow_transfer_warn_ms {
            warn!(label, elapsed_ms, "transfer unusually slow");
        }
        self.journal.append(
            operation,
            true,
            Some(format!("{label}: {} bytes", report.bytes_total)),
            Some(elapsed_ms),
        );
    }

    fn set_state(&self, next: ConnectionState) {
        self.state_tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            debug!(from = ?*state, to = ?next, "connection state transition");
            *state = next;
            true
        });
    }
}
