// Language resolution
// Single source of truth for language names, aliases and remote environment ids

use crate::error::JudgeError;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageEntry {
    pub name: String,
    pub id: u32,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LanguagesFile {
    languages: Vec<LanguageEntry>,
}

/// Built-in table (Judge0 CE environment ids)
fn builtin_entries() -> Vec<LanguageEntry> {
    let entry = |name: &str, id: u32, aliases: &[&str]| LanguageEntry {
        name: name.to_string(),
        id,
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
    };

    vec![
        entry("c++", 54, &["cpp"]),
        entry("java", 62, &[]),
        entry("javascript", 63, &["js"]),
        entry("python", 71, &["py", "python3"]),
        entry("c", 50, &[]),
    ]
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Maps user-facing language names to canonical names and environment ids
#[derive(Debug, Clone)]
pub struct LanguageResolver {
    canonical: HashMap<String, String>,
    ids: HashMap<String, u32>,
}

impl LanguageResolver {
    pub fn new(entries: Vec<LanguageEntry>) -> Result<Self> {
        if entries.is_empty() {
            bail!("No languages configured");
        }

        let mut canonical = HashMap::new();
        let mut ids = HashMap::new();

        for entry in entries {
            let name = normalize(&entry.name);
            if ids.insert(name.clone(), entry.id).is_some() {
                bail!("Language '{}' configured twice", name);
            }

            for alias in std::iter::once(&entry.name).chain(entry.aliases.iter()) {
                let alias = normalize(alias);
                if let Some(previous) = canonical.insert(alias.clone(), name.clone()) {
                    if previous != name {
                        bail!("Alias '{}' maps to both '{}' and '{}'", alias, previous, name);
                    }
                }
            }
        }

        Ok(Self { canonical, ids })
    }

    /// Judge0 CE table shipped with the service
    pub fn builtin() -> Result<Self> {
        Self::new(builtin_entries()).context("Built-in language table is invalid")
    }

    /// Load a language table from a JSON file replacing the built-ins
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read language table {}", path.display()))?;

        let file: LanguagesFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse language table {}", path.display()))?;

        Self::new(file.languages)
    }

    /// Canonical name for a (possibly aliased) language name
    pub fn canonical_name(&self, name: &str) -> Result<&str, JudgeError> {
        self.canonical
            .get(&normalize(name))
            .map(String::as_str)
            .ok_or_else(|| JudgeError::UnsupportedLanguage(name.trim().to_string()))
    }

    /// Remote execution environment id for a language name
    pub fn resolve(&self, name: &str) -> Result<u32, JudgeError> {
        let canonical = self.canonical_name(name)?;
        self.ids
            .get(canonical)
            .copied()
            .ok_or_else(|| JudgeError::UnsupportedLanguage(name.trim().to_string()))
    }

    /// List canonical language names, sorted
    pub fn list_languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ids.keys().cloned().collect();
        names.sort();
        names
    }
}
