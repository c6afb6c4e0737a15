// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capped operation journal.
//
// The journal is the diagnostic record of what the engine actually did:
// connects, prints, reconnects, losses. It keeps the most recent 100 entries
// in memory and mirrors the full capped buffer to the store after every
// append. Persistence failures are logged and swallowed — the journal must
// never take a print operation down with it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::warn;

use bonwerk_core::types::JournalEntry;
use bonwerk_transport::JournalStore;

/// Maximum number of retained entries, oldest evicted first.
pub const JOURNAL_CAPACITY: usize = 100;

pub struct Journal {
    entries: Mutex<VecDeque<JournalEntry>>,
    store: Arc<dyn JournalStore>,
}

impl Journal {
    /// Build a journal primed from whatever the store already holds.
    ///
    /// A store that fails to load starts the journal empty rather than
    /// failing construction.
    pub fn new(store: Arc<dyn JournalStore>) -> Self {
        let entries = match store.load() {
            Ok(mut loaded) => {
                if loaded.len() > JOURNAL_CAPACITY {
                    loaded.drain(..loaded.len() - JOURNAL_CAPACITY);
                }
                loaded.into()
            }
            Err(e) => {
                warn!(error = %e, "journal could not be loaded, starting empty");
                VecDeque::new()
            }
        };
        Self {
            entries: Mutex::new(entries),
            store,
        }
    }

    /// Record one operation, stamped with the current time.
    pub fn append(
        &self,
        operation: &str,
        success: bool,
        details: Option<String>,
        transfer_time_ms: Option<u64>,
    ) {
        let entry = JournalEntry {
            operation: operation.to_string(),
            success,
            timestamp: Utc::now().to_rfc3339(),
            details,
            transfer_time_ms,
        };

        let snapshot: Vec<JournalEntry> = {
            let mut entries = self.entries.lock().expect("journal lock poisoned");
            entries.push_back(entry);
            while entries.len() > JOURNAL_CAPACITY {
                entries.pop_front();
            }
            entries.iter().cloned().collect()
        };

        if let Err(e) = self.store.persist(&snapshot) {
            warn!(error = %e, operation, "journal persist failed");
        }
    }

    /// The retained entries, oldest first.
    pub fn recent(&self) -> Vec<JournalEntry> {
        self.entries
            .lock()
            .expect("journal lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("journal lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bonwerk_transport::SqliteJournalStore;

    fn memory_journal() -> (Journal, Arc<SqliteJournalStore>) {
        let store = Arc::new(SqliteJournalStore::open_in_memory().expect("open store"));
        (Journal::new(store.clone()), store)
    }

    #[test]
    fn appends_are_persisted_in_order() {
        let (journal, store) = memory_journal();
        journal.append("connect", true, None, None);
        journal.append("print", true, Some("42 bytes".into()), Some(17));

        let stored = store.load().expect("load");
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].operation, "connect");
        assert_eq!(stored[1].operation, "print");
        assert_eq!(stored[1].transfer_time_ms, Some(17));
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let (journal, store) = memory_journal();
        for i in 0..JOURNAL_CAPACITY + 5 {
            journal.append(&format!("op_{i}"), true, None, None);
        }

        let recent = journal.recent();
        assert_eq!(recent.len(), JOURNAL_CAPACITY);
        assert_eq!(recent[0].operation, "op_5");
        assert_eq!(recent.last().unwrap().operation, "op_104");

        // The store mirrors the capped buffer, not the full history.
        assert_eq!(store.load().expect("load").len(), JOURNAL_CAPACITY);
    }

    #[test]
    fn new_journal_is_primed_from_the_store() {
        let store = Arc::new(SqliteJournalStore::open_in_memory().expect("open store"));
        {
            let journal = Journal::new(store.clone());
            journal.append("connect", true, None, None);
            journal.append("disconnect", true, None, None);
        }

        let revived = Journal::new(store);
        let recent = revived.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].operation, "connect");
        assert_eq!(recent[1].operation, "disconnect");
    }
}
