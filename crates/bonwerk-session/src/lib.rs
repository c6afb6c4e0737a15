// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bonwerk session engine.
//
// `PrinterSession` is the single authority over the USB printer connection:
// it owns the exclusive device handle, the connection-state machine, the
// chunked transfer path, the retry queue, the operation journal and the
// hardware-event arbiter. Everything platform-specific stays behind the
// traits in `bonwerk-transport`.

pub mod events;
pub mod journal;
pub mod queue;
pub mod session;
pub mod status;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

pub use journal::JOURNAL_CAPACITY;
pub use queue::QueuedJobInfo;
pub use session::PrinterSession;
pub use transfer::{CHUNK_SIZE, TransferReport};
