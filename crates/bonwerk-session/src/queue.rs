// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// FIFO retry queue for undelivered print jobs.
//
// Drains work on a snapshot: the drainer takes every queued job in one
// motion, attempts delivery outside the lock, and hands back whatever it
// could not deliver via `restore`. Jobs enqueued while a drain is in flight
// land behind the restored remainder.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use bonwerk_core::types::{JobId, PrintJob};

/// Read-only view of one queued job, for UIs and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJobInfo {
    pub id: JobId,
    pub label: String,
    pub bytes: usize,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
}

/// Bounded-retry job queue. All methods are synchronous and lock-internal.
pub struct RetryQueue {
    jobs: Mutex<VecDeque<PrintJob>>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<PrintJob>> {
        self.jobs.lock().expect("retry queue lock poisoned")
    }

    /// Append a fresh job and return its id.
    pub fn enqueue(&self, payload: Vec<u8>, label: &str) -> JobId {
        let job = PrintJob::new(payload, label);
        let id = job.id;
        let mut jobs = self.lock();
        jobs.push_back(job);
        info!(job = %id, label, depth = jobs.len(), "job queued for retry");
        id
    }

    /// Take every queued job in FIFO order, leaving the queue empty.
    pub fn snapshot_for_drain(&self) -> Vec<PrintJob> {
        self.lock().drain(..).collect()
    }

    /// Put undelivered jobs back at the head of the queue, preserving their
    /// relative order ahead of anything enqueued during the drain.
    pub fn restore(&self, undelivered: Vec<PrintJob>) {
        if undelivered.is_empty() {
            return;
        }
        let mut jobs = self.lock();
        for job in undelivered.into_iter().rev() {
            jobs.push_front(job);
        }
        debug!(depth = jobs.len(), "undelivered jobs restored");
    }

    /// Snapshot of the queue contents without consuming them.
    pub fn pending(&self) -> Vec<QueuedJobInfo> {
        self.lock()
            .iter()
            .map(|job| QueuedJobInfo {
                id: job.id,
                label: job.label.clone(),
                bytes: job.payload.len(),
                created_at: job.created_at,
                retry_count: job.retry_count,
            })
            .collect()
    }

    /// Discard every queued job. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut jobs = self.lock();
        let dropped = jobs.len();
        jobs.clear();
        if dropped > 0 {
            info!(dropped, "retry queue cleared");
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for RetryQueue {
    fn default() -> Self {
        Self::new()
    }
}
