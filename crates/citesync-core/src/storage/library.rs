use std::fs;
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::models::BibliographicEntry;

/// Load the bibliographic collection from a JSON array file.
///
/// A missing file is an empty library. Completeness scores are derived, so
/// they are recomputed rather than trusted from disk.
pub fn load_entries(path: &Path) -> Result<Vec<BibliographicEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut entries: Vec<BibliographicEntry> = serde_json::from_str(&contents)?;
    for entry in &mut entries {
        entry.refresh_completeness();
    }
    Ok(entries)
}

/// Save the collection as a pretty JSON array, creating parent directories.
pub fn save_entries(path: &Path, entries: &[BibliographicEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(entries)?;
    fs::write(path, json)?;
    Ok(())
}

/// Look up an entry by its UUID string.
pub fn find_entry<'a>(entries: &'a [BibliographicEntry], id: &str) -> Result<&'a BibliographicEntry> {
    entries
        .iter()
        .find(|entry| entry.id.to_string() == id)
        .ok_or_else(|| CoreError::EntryNotFound(id.to_string()))
}
