// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bonwerk Transport — the collaborator seams the session engine calls into:
// raw USB bulk transfer, saved-printer identity storage, journal storage,
// and code-page text encoding. The session crate consumes these as trait
// objects so that real backends, stubs, and test doubles are
// interchangeable.

pub mod codepage;
pub mod sqlite;
pub mod stub;
pub mod traits;

pub use codepage::CodePageEncoder;
pub use sqlite::{SqliteIdentityStore, SqliteJournalStore};
pub use stub::StubTransport;
pub use traits::{CharsetService, DeviceHandle, IdentityStore, JournalStore, UsbTransport};
