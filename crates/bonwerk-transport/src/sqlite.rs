// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SQLite-backed stores for the saved printer identity and the operation
// journal.
//
// Schema:
//   saved_printer(
//     id            INTEGER PRIMARY KEY CHECK (id = 1),   -- single row
//     vendor_id     INTEGER NOT NULL,
//     product_id    INTEGER NOT NULL,
//     product_name  TEXT
//   )
//   journal(
//     seq   INTEGER PRIMARY KEY AUTOINCREMENT,
//     entry TEXT NOT NULL                                  -- JSON document
//   )

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, params};
use tracing::{debug, instrument};

use bonwerk_core::error::{BonwerkError, Result};
use bonwerk_core::types::{JournalEntry, SavedIdentity};

use crate::traits::{IdentityStore, JournalStore};

/// Convert a `rusqlite::Error` into a `BonwerkError::Storage`.
fn db_err(e: rusqlite::Error) -> BonwerkError {
    BonwerkError::Storage(e.to_string())
}

fn lock_err() -> BonwerkError {
    BonwerkError::Storage("store lock poisoned".into())
}

// ---------------------------------------------------------------------------
// Saved identity
// ---------------------------------------------------------------------------

/// Single-row SQLite store for the remembered printer.
///
/// `rusqlite::Connection` is `Send` but not `Sync`, so the connection lives
/// behind a `Mutex`. Contention is irrelevant — the identity changes only on
/// connect and explicit forget.
pub struct SqliteIdentityStore {
    conn: Mutex<Connection>,
}

impl SqliteIdentityStore {
    /// Open (or create) the identity database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn)
    }

    /// Open an in-memory identity database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS saved_printer (
                id           INTEGER PRIMARY KEY CHECK (id = 1),
                vendor_id    INTEGER NOT NULL,
                product_id   INTEGER NOT NULL,
                product_name TEXT
            );",
        )
        .map_err(db_err)?;

        debug!("identity store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl IdentityStore for SqliteIdentityStore {
    fn save(&self, identity: &SavedIdentity) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        conn.execute(
            "INSERT INTO saved_printer (id, vendor_id, product_id, product_name)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT (id) DO UPDATE SET
                vendor_id = ?1, product_id = ?2, product_name = ?3",
            params![
                identity.vendor_id,
                identity.product_id,
                identity.product_name
            ],
        )
        .map_err(db_err)?;

        debug!(
            vendor_id = identity.vendor_id,
            product_id = identity.product_id,
            "printer identity saved"
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<SavedIdentity>> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let mut stmt = conn
            .prepare("SELECT vendor_id, product_id, product_name FROM saved_printer WHERE id = 1")
            .map_err(db_err)?;

        let mut rows = stmt
            .query_map([], |row| {
                Ok(SavedIdentity {
                    vendor_id: row.get(0)?,
                    product_id: row.get(1)?,
                    product_name: row.get(2)?,
                })
            })
            .map_err(db_err)?;

        match rows.next() {
            Some(Ok(identity)) => Ok(Some(identity)),
            Some(Err(e)) => Err(db_err(e)),
            None => Ok(None),
        }
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        conn.execute("DELETE FROM saved_printer", [])
            .map_err(db_err)?;
        debug!("printer identity cleared");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// SQLite store for the operation journal.
///
/// The session caps the live buffer and persists it wholesale, so `persist`
/// replaces the stored set inside one transaction.
pub struct SqliteJournalStore {
    conn: Mutex<Connection>,
}

impl SqliteJournalStore {
    /// Open (or create) the journal database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn)
    }

    /// Open an in-memory journal database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS journal (
                seq   INTEGER PRIMARY KEY AUTOINCREMENT,
                entry TEXT NOT NULL
            );",
        )
        .map_err(db_err)?;

        debug!("journal store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl JournalStore for SqliteJournalStore {
    fn persist(&self, entries: &[JournalEntry]) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|_| lock_err())?;
        let tx = conn.transaction().map_err(db_err)?;

        tx.execute("DELETE FROM journal", []).map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare("INSERT INTO journal (entry) VALUES (?1)")
                .map_err(db_err)?;
            for entry in entries {
                let json = serde_json::to_string(entry)?;
                stmt.execute(params![json]).map_err(db_err)?;
            }
        }

        tx.commit().map_err(db_err)?;
        debug!(count = entries.len(), "journal persisted");
        Ok(())
    }

    fn load(&self) -> Result<Vec<JournalEntry>> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let mut stmt = conn
            .prepare("SELECT entry FROM journal ORDER BY seq ASC")
            .map_err(db_err)?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_err)?;

        let mut entries = Vec::new();
        for row in rows {
            let json = row.map_err(db_err)?;
            entries.push(serde_json::from_str(&json)?);
        }
        Ok(entries)
    }
}
