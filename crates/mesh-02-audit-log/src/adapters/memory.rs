use crate::domain::entry::ImmutableLogEntry;
use crate::domain::errors::StoreError;
use crate::ports::outbound::LedgerStore;

/// In-memory ledger store.
///
/// Holds entries for the lifetime of the process only. Used when no ledger
/// path is configured and in tests.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    entries: Vec<ImmutableLogEntry>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing entries, as if previously persisted.
    pub fn with_entries(entries: Vec<ImmutableLogEntry>) -> Self {
        Self { entries }
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn append(&mut self, entry: &ImmutableLogEntry) -> Result<(), StoreError> {
        self.entries.push(entry.clone());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<ImmutableLogEntry>, StoreError> {
        Ok(self.entries.clone())
    }
}
