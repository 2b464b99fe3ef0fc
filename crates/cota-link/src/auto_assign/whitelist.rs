//! Receiver whitelist for automatic slot assignment.

use std::collections::BTreeMap;
use std::fs;
use std::sync::{Arc, Mutex};

use camino::Utf8Path;
use thiserror::Error;

/// Whitelist shared between the engine and the auto-assign worker.
pub type SharedWhitelist = Arc<Mutex<Whitelist>>;

/// Problems found while loading a whitelist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WhitelistError {
    /// A slot column was present but not a number. The line is skipped.
    #[error("line {line}: {id}: invalid slot {value:?}")]
    InvalidSlot {
        line: usize,
        id: String,
        value: String,
    },
    /// The whitelist file could not be read.
    #[error("failed to read whitelist {path}: {message}")]
    Read { path: String, message: String },
}

/// Receiver identifiers awaiting assignment, each with an optional slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    entries: BTreeMap<String, Option<u32>>,
}

/// A parsed whitelist plus the lines that were rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhitelistLoad {
    /// Accepted entries.
    pub whitelist: Whitelist,
    /// Rejected lines.
    pub rejected: Vec<WhitelistError>,
}

impl Whitelist {
    /// Parses CSV text with one `id` or `id,slot` per line.
    ///
    /// Blank lines and lines with more than two fields are ignored. Lines
    /// whose slot is not a number are reported and skipped.
    #[must_use]
    pub fn from_csv(text: &str) -> WhitelistLoad {
        let mut load = WhitelistLoad::default();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            match fields.as_slice() {
                [id] => {
                    load.whitelist.insert(*id, None);
                }
                [id, slot] => match slot.trim().parse::<u32>() {
                    Ok(slot) => {
                        load.whitelist.insert(*id, Some(slot));
                    }
                    Err(_) => load.rejected.push(WhitelistError::InvalidSlot {
                        line: index + 1,
                        id: (*id).to_owned(),
                        value: (*slot).to_owned(),
                    }),
                },
                _ => {}
            }
        }
        load
    }

    /// Reads and parses a whitelist file.
    pub fn load(path: &Utf8Path) -> Result<WhitelistLoad, WhitelistError> {
        let text = fs::read_to_string(path).map_err(|error| WhitelistError::Read {
            path: path.to_string(),
            message: error.to_string(),
        })?;
        Ok(Self::from_csv(&text))
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, id: impl Into<String>, slot: Option<u32>) {
        self.entries.insert(id.into(), slot);
    }

    /// Removes `id`, returning true if it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Returns true when `id` is whitelisted.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// The requested slot for `id`; `None` means "next free slot".
    #[must_use]
    pub fn slot(&self, id: &str) -> Option<u32> {
        self.entries.get(id).copied().flatten()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no entries remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(id, slot)` pairs in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<u32>)> {
        self.entries.iter().map(|(id, slot)| (id.as_str(), *slot))
    }
}
