// Remote status classification table
// Maps every remote status id onto the verdict class it contributes

use anyhow::{bail, Context, Result};
use arbiter_common::types::{VerdictStatus, LAST_PENDING_STATUS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    Pending,
    Accepted,
    Wrong,
    Error,
}

impl StatusClass {
    /// Verdict contribution of a terminal class
    pub fn verdict(self) -> Option<VerdictStatus> {
        match self {
            StatusClass::Pending => None,
            StatusClass::Accepted => Some(VerdictStatus::Accepted),
            StatusClass::Wrong => Some(VerdictStatus::Wrong),
            StatusClass::Error => Some(VerdictStatus::Error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEntry {
    pub id: u32,
    pub class: StatusClass,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct StatusFile {
    statuses: Vec<StatusEntry>,
}

/// Judge0 status ids
fn builtin_entries() -> Vec<StatusEntry> {
    use StatusClass::*;
    let entry = |id: u32, class: StatusClass, description: &str| StatusEntry {
        id,
        class,
        description: description.to_string(),
    };

    vec![
        entry(1, Pending, "In Queue"),
        entry(2, Pending, "Processing"),
        entry(3, Accepted, "Accepted"),
        entry(4, Wrong, "Wrong Answer"),
        entry(5, Error, "Time Limit Exceeded"),
        entry(6, Error, "Compilation Error"),
        entry(7, Error, "Runtime Error (SIGSEGV)"),
        entry(8, Error, "Runtime Error (SIGXFSZ)"),
        entry(9, Error, "Runtime Error (SIGFPE)"),
        entry(10, Error, "Runtime Error (SIGABRT)"),
        entry(11, Error, "Runtime Error (NZEC)"),
        entry(12, Error, "Runtime Error (Other)"),
        entry(13, Error, "Internal Error"),
        entry(14, Error, "Exec Format Error"),
    ]
}

/// Status id -> class lookup
///
/// Terminality is fixed by id (anything above 2 is settled); the table only
/// decides which verdict class a settled id counts as. Ids missing from the
/// table are errors.
#[derive(Debug, Clone)]
pub struct StatusTable {
    entries: HashMap<u32, StatusEntry>,
}

impl StatusTable {
    /// Built-in table with `overrides` layered on top
    pub fn new(overrides: Vec<StatusEntry>) -> Result<Self> {
        let mut table = Self::default();
        for entry in overrides {
            validate(&entry)?;
            table.entries.insert(entry.id, entry);
        }
        Ok(table)
    }

    /// Built-in table with entries from a JSON file layered on top
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read status table {}", path.display()))?;

        let file: StatusFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse status table {}", path.display()))?;

        Self::new(file.statuses)
    }

    pub fn classify(&self, status_id: u32) -> StatusClass {
        if status_id <= LAST_PENDING_STATUS {
            return StatusClass::Pending;
        }
        self.entries
            .get(&status_id)
            .map(|e| e.class)
            .unwrap_or(StatusClass::Error)
    }

    pub fn description(&self, status_id: u32) -> Option<&str> {
        self.entries.get(&status_id).map(|e| e.description.as_str())
    }
}

fn validate(entry: &StatusEntry) -> Result<()> {
    let in_flight = entry.id <= LAST_PENDING_STATUS;
    match (in_flight, entry.class) {
        (true, StatusClass::Pending) | (false, StatusClass::Accepted)
        | (false, StatusClass::Wrong) | (false, StatusClass::Error) => Ok(()),
        (true, class) => bail!("Status {} is in flight and cannot be classed {:?}", entry.id, class),
        (false, _) => bail!("Status {} is terminal and cannot be classed pending", entry.id),
    }
}

impl Default for StatusTable {
    fn default() -> Self {
        Self {
            entries: builtin_entries().into_iter().map(|e| (e.id, e)).collect(),
        }
    }
}
