//! Requirement list persistence.
//!
//! The durable form is a UTF-8 text file with one requirement per line:
//!
//! ```text
//! 胡萝卜: 5\0
//! 寂寞石: 12\4
//! ```
//!
//! The numeric [`Inventory`] is derived from that text for the length of a
//! purchase run and written back afterwards.

use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::matcher::chinese_only;
use super::InventoryError;

/// `<Han name>: <needed>\<existing>`
const LINE_PATTERN: &str = r"^([\u{4e00}-\u{9fa5}]+):\s*(\d+)\s*\\\s*(\d+)\s*$";

/// Words that decorate pasted shop text but are never part of an item name.
const NOISE_WORDS: [&str; 5] = ["商店", "图纸", "摆设", "洞天", "百宝"];

/// Needed and already-owned quantity of one item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requirement {
    pub needed: u32,
    pub existing: u32,
}

impl Requirement {
    pub fn new(needed: u32, existing: u32) -> Self {
        Self { needed, existing }
    }

    pub fn is_satisfied(&self) -> bool {
        self.needed <= self.existing
    }

    /// Units still missing; zero once satisfied.
    pub fn remaining(&self) -> u32 {
        self.needed.saturating_sub(self.existing)
    }
}

/// Ordered requirement list. Iteration follows file order, which is also
/// the tie-break order used by the fuzzy matcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    entries: Vec<(String, Requirement)>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the durable text form. Blank lines are skipped; any other line
    /// that does not follow the pattern is rejected with its line number.
    pub fn parse(text: &str) -> Result<Self, InventoryError> {
        let line_regex = Regex::new(LINE_PATTERN)?;
        let mut inventory = Self::new();

        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_no = idx + 1;
            let malformed = || InventoryError::Malformed {
                line: line_no,
                content: line.to_string(),
            };

            let caps = line_regex.captures(line.trim()).ok_or_else(malformed)?;
            let name = caps[1].to_string();
            let needed: u32 = caps[2].parse().map_err(|_| malformed())?;
            let existing: u32 = caps[3].parse().map_err(|_| malformed())?;

            if inventory.get(&name).is_some() {
                return Err(InventoryError::Duplicate {
                    line: line_no,
                    name,
                });
            }
            inventory.entries.push((name, Requirement::new(needed, existing)));
        }

        Ok(inventory)
    }

    /// Serializes back to the durable text form.
    pub fn to_text(&self) -> String {
        self.entries
            .iter()
            .map(|(name, req)| format!("{}: {}\\{}\n", name, req.needed, req.existing))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Requirement> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, req)| req)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Requirement> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, req)| req)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Requirement)> {
        self.entries.iter().map(|(key, req)| (key.as_str(), req))
    }

    /// Inserts or replaces an entry, keeping the position of an existing key.
    pub fn upsert(&mut self, name: &str, requirement: Requirement) {
        match self.get_mut(name) {
            Some(req) => *req = requirement,
            None => self.entries.push((name.to_string(), requirement)),
        }
    }

    /// Entries whose need is not yet covered.
    pub fn active(&self) -> Inventory {
        Inventory {
            entries: self
                .entries
                .iter()
                .filter(|(_, req)| !req.is_satisfied())
                .cloned()
                .collect(),
        }
    }

    /// Adds `delta` to the owned quantity of `name`.
    ///
    /// Keeping `existing <= needed` is the caller's job; the store only
    /// records what it is told.
    pub fn record_purchase(&mut self, name: &str, delta: u32) -> Result<Requirement, InventoryError> {
        let req = self
            .get_mut(name)
            .ok_or_else(|| InventoryError::UnknownItem(name.to_string()))?;
        req.existing = req.existing.saturating_add(delta);
        Ok(*req)
    }

    /// Adds `quantity` to the need of `name`, creating the entry if absent.
    pub fn add_needed(&mut self, name: &str, quantity: u32) {
        match self.get_mut(name) {
            Some(req) => req.needed = req.needed.saturating_add(quantity),
            None => self
                .entries
                .push((name.to_string(), Requirement::new(quantity, 0))),
        }
    }

    /// Merges free-form pasted text such as `洞天百宝 胡萝卜 x5`.
    ///
    /// Each line contributes its Han characters as the name and its first
    /// number as the quantity (1 when absent).
    pub fn merge_raw_text(&mut self, raw: &str) -> Result<(), InventoryError> {
        let number_regex = Regex::new(r"\d+")?;
        let mut cleaned = raw.to_string();
        for word in NOISE_WORDS {
            cleaned = cleaned.replace(word, "");
        }

        for line in cleaned.lines() {
            let name = chinese_only(line);
            if name.is_empty() {
                continue;
            }
            let quantity = number_regex
                .find(line)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(1);
            self.add_needed(&name, quantity);
        }
        Ok(())
    }

    /// Copies every entry of `other` over this list, appending unknown keys.
    pub fn overlay(&mut self, other: &Inventory) {
        for (name, req) in other.iter() {
            self.upsert(name, *req);
        }
    }
}

/// How imported text combines with the stored list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ImportMode {
    /// Add to the quantities already on file.
    Append,
    /// Replace the file contents.
    Write,
}

/// File-backed requirement list.
#[derive(Debug, Clone)]
pub struct InventoryStore {
    path: PathBuf,
}

impl InventoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file contents; a missing file reads as an empty list.
    pub fn read_text(&self) -> Result<String, InventoryError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the file with hand-edited text after validating it.
    pub fn save_text(&self, text: &str) -> Result<Inventory, InventoryError> {
        let inventory = super::validate_text(text)?;
        self.write(&inventory)?;
        Ok(inventory)
    }

    /// Every entry on file, satisfied or not.
    pub fn load(&self) -> Result<Inventory, InventoryError> {
        Inventory::parse(&self.read_text()?)
    }

    /// Only the entries with `needed > existing`.
    pub fn load_active(&self) -> Result<Inventory, InventoryError> {
        Ok(self.load()?.active())
    }

    /// Writes `active` back, keeping the entries that were filtered out of it.
    pub fn persist(&self, active: &Inventory) -> Result<(), InventoryError> {
        let mut full = self.load()?;
        full.overlay(active);
        self.write(&full)
    }

    /// Merges raw requirement text into the file (or replaces it).
    pub fn import(&self, raw: &str, mode: ImportMode) -> Result<Inventory, InventoryError> {
        let mut inventory = match mode {
            ImportMode::Append => self.load()?,
            ImportMode::Write => Inventory::new(),
        };
        inventory.merge_raw_text(raw)?;
        if inventory.is_empty() {
            return Err(InventoryError::Empty);
        }
        self.write(&inventory)?;
        Ok(inventory)
    }

    /// Atomic replace: write a sibling temp file, then rename over the target.
    fn write(&self, inventory: &Inventory) -> Result<(), InventoryError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(inventory.to_text().as_bytes())?;
        temp.persist(&self.path)?;

        tracing::debug!(
            "Inventory saved to {} ({} entries)",
            self.path.display(),
            inventory.len()
        );
        Ok(())
    }
}
