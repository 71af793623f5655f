use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::{EntryField, RecordFields};

/// Provenance label for values that were already present in the library.
pub const LIBRARY_PROVENANCE: &str = "library";

/// A canonical bibliographic record.
///
/// Entries are value snapshots: enrichment produces a new entry instead of
/// editing one that other documents may be matched against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BibliographicEntry {
    pub id: Uuid,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    #[serde(flatten)]
    pub fields: RecordFields,

    /// Field name → name of the source that supplied the value.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub source_provenance: BTreeMap<String, String>,

    #[serde(default)]
    pub completeness_score: f64,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl BibliographicEntry {
    pub fn new(identifier: Option<String>, fields: RecordFields) -> Self {
        let now = Utc::now();
        let completeness_score = fields.completeness();
        Self {
            id: Uuid::now_v7(),
            identifier,
            fields,
            source_provenance: BTreeMap::new(),
            completeness_score,
            created_at: now,
            updated_at: now,
        }
    }

    /// An entry that holds nothing but an identifier, used as the starting
    /// point of an enrichment pass.
    pub fn placeholder(identifier: impl Into<String>) -> Self {
        Self::new(Some(identifier.into()), RecordFields::default())
    }

    pub fn title(&self) -> Option<&str> {
        self.fields.title.as_deref()
    }

    pub fn provenance_of(&self, field: EntryField) -> Option<&str> {
        self.source_provenance
            .get(field.as_str())
            .map(String::as_str)
    }

    pub fn set_provenance(&mut self, field: EntryField, source: impl Into<String>) {
        self.source_provenance
            .insert(field.as_str().to_string(), source.into());
    }

    /// Recompute the derived completeness score from the current fields.
    pub fn refresh_completeness(&mut self) {
        self.completeness_score = self.fields.completeness();
    }

    pub fn is_complete(&self) -> bool {
        self.fields.is_complete()
    }

    /// Build a new entry that keeps every value already set on `self` and
    /// fills the remaining gaps from `other`, carrying `other`'s provenance
    /// for the fields it contributes.
    ///
    /// Fields that `self` already had are attributed to
    /// [`LIBRARY_PROVENANCE`] unless they already carry a source.
    pub fn overlaid_with(&self, other: &BibliographicEntry) -> BibliographicEntry {
        let mut merged = self.clone();
        for field in EntryField::ALL {
            if merged.fields.is_populated(field) {
                if merged.provenance_of(field).is_none() {
                    merged.set_provenance(field, LIBRARY_PROVENANCE);
                }
                continue;
            }
            if merged.fields.fill_from(&other.fields, field) {
                let source = other.provenance_of(field).unwrap_or(LIBRARY_PROVENANCE);
                merged.set_provenance(field, source.to_string());
            }
        }
        if merged.identifier.is_none() {
            merged.identifier = other.identifier.clone();
        }
        merged.refresh_completeness();
        merged.updated_at = Utc::now();
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_scores_itself() {
        let entry = BibliographicEntry::new(
            Some("10.1000/abc".to_string()),
            RecordFields {
                title: Some("A Title".to_string()),
                authors: vec!["Doe, Jane".to_string()],
                ..Default::default()
            },
        );
        assert_eq!(entry.completeness_score, 0.5);
        assert!(!entry.is_complete());
    }

    #[test]
    fn test_placeholder_is_empty() {
        let entry = BibliographicEntry::placeholder("10.1000/abc");
        assert_eq!(entry.identifier.as_deref(), Some("10.1000/abc"));
        assert!(entry.fields.is_empty());
        assert_eq!(entry.completeness_score, 0.0);
    }

    #[test]
    fn test_overlay_keeps_library_values() {
        let existing = BibliographicEntry::new(
            Some("10.1000/abc".to_string()),
            RecordFields {
                title: Some("Library Title".to_string()),
                ..Default::default()
            },
        );
        let mut enriched = BibliographicEntry::placeholder("10.1000/abc");
        enriched.fields = RecordFields {
            title: Some("Remote Title".to_string()),
            authors: vec!["Doe, Jane".to_string()],
            journal: Some("Nature".to_string()),
            year: Some(2020),
            ..Default::default()
        };
        enriched.set_provenance(EntryField::Title, "crossref");
        enriched.set_provenance(EntryField::Authors, "crossref");
        enriched.set_provenance(EntryField::Journal, "openalex");
        enriched.set_provenance(EntryField::Year, "crossref");

        let merged = existing.overlaid_with(&enriched);

        assert_eq!(merged.id, existing.id);
        assert_eq!(merged.title(), Some("Library Title"));
        assert_eq!(merged.provenance_of(EntryField::Title), Some(LIBRARY_PROVENANCE));
        assert_eq!(merged.provenance_of(EntryField::Journal), Some("openalex"));
        assert_eq!(merged.completeness_score, 1.0);
        // the original snapshot is untouched
        assert_eq!(existing.completeness_score, 0.25);
        assert!(existing.source_provenance.is_empty());
    }

    #[test]
    fn test_entry_json_is_flat() {
        let entry = BibliographicEntry::new(
            None,
            RecordFields {
                title: Some("Flat".to_string()),
                year: Some(2001),
                ..Default::default()
            },
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["title"], "Flat");
        assert_eq!(json["year"], 2001);
        assert!(json.get("identifier").is_none());

        let back: BibliographicEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back.fields, entry.fields);
    }
}
