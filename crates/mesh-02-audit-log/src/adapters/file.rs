//! JSON-lines ledger file: one sealed entry per line.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use mesh_telemetry::log_mesh_event;

use crate::domain::entry::ImmutableLogEntry;
use crate::domain::errors::StoreError;
use crate::ports::outbound::LedgerStore;

/// File-backed ledger store.
///
/// Each append writes one complete line. A failed write is rolled back by
/// truncating to the previous length, and a torn final line left by a crash
/// is discarded on open, so the file only ever holds whole entries. If the
/// rollback itself fails the store is poisoned and refuses later appends.
pub struct JsonLinesLedgerStore {
    path: PathBuf,
    file: File,
    len: u64,
    sync: bool,
    poisoned: Option<String>,
}

impl JsonLinesLedgerStore {
    /// Open or create the ledger file.
    ///
    /// With `sync` set, every append is flushed to disk before it is
    /// acknowledged.
    pub fn open(path: impl AsRef<Path>, sync: bool) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let contents = fs::read(&path)?;
        let whole = contents
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |i| i + 1);
        if whole < contents.len() {
            log_mesh_event!(
                warn,
                "audit",
                "Discarding torn trailing ledger record",
                path = %path.display(),
                bytes = contents.len() - whole
            );
            file.set_len(whole as u64)?;
        }

        log_mesh_event!(
            info,
            "audit",
            "Opened ledger file",
            path = %path.display(),
            bytes = whole
        );

        Ok(Self {
            path,
            file,
            len: whole as u64,
            sync,
            poisoned: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    fn roll_back(&mut self) {
        if let Err(err) = self.file.set_len(self.len) {
            log_mesh_event!(
                error,
                "audit",
                "Ledger rollback failed, refusing further appends",
                path = %self.path.display(),
                len = self.len,
                error = %err
            );
            self.poisoned = Some(err.to_string());
        }
    }
}

impl LedgerStore for JsonLinesLedgerStore {
    fn append(&mut self, entry: &ImmutableLogEntry) -> Result<(), StoreError> {
        if let Some(reason) = &self.poisoned {
            return Err(StoreError::Poisoned(reason.clone()));
        }

        let mut line = serde_json::to_vec(entry).map_err(|e| StoreError::Io {
            message: e.to_string(),
            transient: false,
        })?;
        line.push(b'\n');

        let written = self
            .file
            .write_all(&line)
            .and_then(|_| if self.sync { self.file.sync_data() } else { Ok(()) });

        if let Err(err) = written {
            self.roll_back();
            return Err(err.into());
        }

        self.len += line.len() as u64;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<ImmutableLogEntry>, StoreError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line).map_err(|e| StoreError::Corrupt {
                line: i + 1,
                message: e.to_string(),
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}
