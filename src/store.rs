use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ==========================================
// Persistence Store
// ==========================================

/// Bumped when the slot payload layout changes. Slots written with a
/// different version restore as absent rather than being migrated.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Invoice,
    Quote,
    Vat,
}

impl Tool {
    fn slug(&self) -> &'static str {
        match self {
            Tool::Invoice => "factuur",
            Tool::Quote => "offerte",
            Tool::Vat => "btw",
        }
    }
}

impl From<crate::model::DocumentKind> for Tool {
    fn from(kind: crate::model::DocumentKind) -> Self {
        match kind {
            crate::model::DocumentKind::Invoice => Tool::Invoice,
            crate::model::DocumentKind::Quote => Tool::Quote,
        }
    }
}

/// Named slots per tool: the live slot mirrors the current edit, the
/// backup slot is only written at reset time, the counter slot holds
/// the document-number sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKey {
    Live,
    Backup,
    Counter,
}

impl StorageKey {
    fn suffix(&self) -> &'static str {
        match self {
            StorageKey::Live => "state",
            StorageKey::Backup => "backup",
            StorageKey::Counter => "counter",
        }
    }
}

/// Version wrapper around every persisted payload.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    payload: T,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct SlotStore {
    dir: PathBuf,
}

impl SlotStore {
    /// Slots live under `<data_root>/state/`. Nothing is created until
    /// the first write.
    pub fn new(data_root: &Path) -> Self {
        Self {
            dir: data_root.join("state"),
        }
    }

    fn slot_path(&self, tool: Tool, key: StorageKey) -> PathBuf {
        self.dir.join(format!("{}_{}.json", tool.slug(), key.suffix()))
    }

    /// Best-effort write: a full copy of the payload lands in the slot,
    /// or a warning is printed and the in-memory state stays the source
    /// of truth. Never propagates.
    pub fn save<T: Serialize>(&self, tool: Tool, key: StorageKey, payload: &T) {
        if let Err(e) = self.write_slot(tool, key, payload) {
            eprintln!("⚠️  Could not persist {} {}: {}", tool.slug(), key.suffix(), e);
        }
    }

    fn write_slot<T: Serialize>(
        &self,
        tool: Tool,
        key: StorageKey,
        payload: &T,
    ) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let envelope = Envelope {
            version: SCHEMA_VERSION,
            payload,
        };
        let json = serde_json::to_string_pretty(&envelope)?;
        fs::write(self.slot_path(tool, key), json)?;
        Ok(())
    }

    /// Reads a slot. A missing slot, unreadable file, corrupt JSON or
    /// foreign schema version all read as `None`; corruption is not an
    /// error condition here, it is absence.
    pub fn load<T: DeserializeOwned>(&self, tool: Tool, key: StorageKey) -> Option<T> {
        let path = self.slot_path(tool, key);
        if !path.exists() {
            return None;
        }
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<Envelope<T>>(&content) {
            Ok(envelope) if envelope.version == SCHEMA_VERSION => Some(envelope.payload),
            Ok(envelope) => {
                eprintln!(
                    "⚠️  Ignoring {} {} slot with schema version {}.",
                    tool.slug(),
                    key.suffix(),
                    envelope.version
                );
                None
            }
            Err(e) => {
                eprintln!("⚠️  Ignoring corrupt {} {} slot: {}", tool.slug(), key.suffix(), e);
                None
            }
        }
    }

    // ==========================================
    // Document Numbering
    // ==========================================

    /// Mints the next document number, `<year>-NNN`. The sequence is
    /// monotonic within a calendar year and restarts at 001 when the
    /// year rolls over. The new value is persisted immediately.
    pub fn next_document_number(&self, tool: Tool, today: NaiveDate) -> String {
        let year = today.year();
        let sequence = match self
            .load::<String>(tool, StorageKey::Counter)
            .and_then(|c| parse_document_number(&c))
        {
            Some((stored_year, seq)) if stored_year == year => seq + 1,
            _ => 1,
        };
        let number = format!("{}-{:03}", year, sequence);
        self.save(tool, StorageKey::Counter, &number);
        number
    }

    /// Records a manually entered document number. The counter only
    /// moves forward, and only for numbers carrying the current year
    /// prefix; anything else leaves it untouched.
    pub fn record_document_number(&self, tool: Tool, number: &str, today: NaiveDate) {
        let Some((year, seq)) = parse_document_number(number) else {
            return;
        };
        if year != today.year() {
            return;
        }
        let stored = self
            .load::<String>(tool, StorageKey::Counter)
            .and_then(|c| parse_document_number(&c));
        match stored {
            Some((stored_year, stored_seq)) if stored_year == year && stored_seq >= seq => {}
            _ => self.save(tool, StorageKey::Counter, &format!("{}-{:03}", year, seq)),
        }
    }
}

fn parse_document_number(number: &str) -> Option<(i32, u32)> {
    let (year, seq) = number.trim().split_once('-')?;
    Some((year.parse().ok()?, seq.parse().ok()?))
}
