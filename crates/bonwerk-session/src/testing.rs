// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted in-memory transport for session tests.
//
// Opens succeed by default and hand out fresh handles; write and read
// outcomes can be scripted per call. The mock tracks which handles are
// currently open so tests can assert that the session never leaks a claim.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use bonwerk_core::error::{BonwerkError, Result};
use bonwerk_core::types::{DeviceId, DeviceInfo};
use bonwerk_transport::{DeviceHandle, UsbTransport};

pub(crate) struct MockTransport {
    devices: Mutex<Vec<DeviceInfo>>,
    open_script: Mutex<VecDeque<Result<()>>>,
    write_script: Mutex<VecDeque<Result<()>>>,
    read_script: Mutex<VecDeque<Result<Vec<u8>>>>,
    hang_opens: AtomicBool,
    next_handle: AtomicU64,
    open_count: AtomicUsize,
    close_count: AtomicUsize,
    open_handles: Mutex<HashSet<u64>>,
    writes: Mutex<Vec<Vec<u8>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
            open_script: Mutex::new(VecDeque::new()),
            write_script: Mutex::new(VecDeque::new()),
            read_script: Mutex::new(VecDeque::new()),
            hang_opens: AtomicBool::new(false),
            next_handle: AtomicU64::new(0),
            open_count: AtomicUsize::new(0),
            close_count: AtomicUsize::new(0),
            open_handles: Mutex::new(HashSet::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn set_devices(&self, list: Vec<DeviceInfo>) {
        *self.devices.lock().unwrap() = list;
    }

    /// Fail the next open with `err`; later opens succeed again.
    pub fn script_open_error(&self, err: BonwerkError) {
        self.open_script.lock().unwrap().push_back(Err(err));
    }

    /// Let `after_ok` writes succeed, then fail one with `err`.
    pub fn script_write_error(&self, after_ok: usize, err: BonwerkError) {
        let mut script = self.write_script.lock().unwrap();
        for _ in 0..after_ok {
            script.push_back(Ok(()));
        }
        script.push_back(Err(err));
    }

    /// Queue the outcome of the next read.
    pub fn script_read(&self, outcome: Result<Vec<u8>>) {
        self.read_script.lock().unwrap().push_back(outcome);
    }

    /// Queue one full status poll round: the three reply bytes for
    /// DLE EOT 2, 3 and 4 in that order.
    pub fn script_status_replies(&self, offline: u8, errors: u8, paper: u8) {
        self.script_read(Ok(vec![offline]));
        self.script_read(Ok(vec![errors]));
        self.script_read(Ok(vec![paper]));
    }

    /// Make every open hang until cancelled (permission prompt never
    /// answered).
    pub fn set_hang_opens(&self, hang: bool) {
        self.hang_opens.store(hang, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    /// Handles opened and not yet closed.
    pub fn live_handles(&self) -> usize {
        self.open_handles.lock().unwrap().len()
    }

    /// Every successful write so far, in order.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl UsbTransport for MockTransport {
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn open(&self, device: &DeviceId) -> Result<DeviceHandle> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        if self.hang_opens.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        }
        if let Some(outcome) = self.open_script.lock().unwrap().pop_front() {
            outcome?;
        }
        let raw = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        self.open_handles.lock().unwrap().insert(raw);
        Ok(DeviceHandle {
            raw,
            device: *device,
            product_name: Some("Mock TM-88".into()),
        })
    }

    async fn close(&self, handle: DeviceHandle) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        self.open_handles.lock().unwrap().remove(&handle.raw);
    }

    async fn write(
        &self,
        handle: &DeviceHandle,
        bytes: &[u8],
        _timeout: Duration,
    ) -> Result<usize> {
        if !self.open_handles.lock().unwrap().contains(&handle.raw) {
            return Err(BonwerkError::WriteFailed("stale handle".into()));
        }
        if let Some(outcome) = self.write_script.lock().unwrap().pop_front() {
            outcome?;
        }
        self.writes.lock().unwrap().push(bytes.to_vec());
        Ok(bytes.len())
    }

    async fn read(
        &self,
        handle: &DeviceHandle,
        _len: usize,
        _timeout: Duration,
    ) -> Result<Vec<u8>> {
        if !self.open_handles.lock().unwrap().contains(&handle.raw) {
            return Err(BonwerkError::ReadFailed("stale handle".into()));
        }
        match self.read_script.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => Err(BonwerkError::ReadFailed("no reply scripted".into())),
        }
    }
}
