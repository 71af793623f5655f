use std::fmt;

use serde::{Deserialize, Serialize};

/// A bibliographic field that sources can supply and merges track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryField {
    Title,
    Authors,
    Journal,
    Year,
    Volume,
    Issue,
    Pages,
    Publisher,
    Abstract,
    Url,
}

impl EntryField {
    pub const ALL: [EntryField; 10] = [
        EntryField::Title,
        EntryField::Authors,
        EntryField::Journal,
        EntryField::Year,
        EntryField::Volume,
        EntryField::Issue,
        EntryField::Pages,
        EntryField::Publisher,
        EntryField::Abstract,
        EntryField::Url,
    ];

    /// Fields that must all be populated for a record to count as complete.
    pub const REQUIRED: [EntryField; 4] = [
        EntryField::Title,
        EntryField::Authors,
        EntryField::Journal,
        EntryField::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Authors => "authors",
            Self::Journal => "journal",
            Self::Year => "year",
            Self::Volume => "volume",
            Self::Issue => "issue",
            Self::Pages => "pages",
            Self::Publisher => "publisher",
            Self::Abstract => "abstract",
            Self::Url => "url",
        }
    }
}

impl fmt::Display for EntryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The descriptive fields of a bibliographic record.
///
/// Sources return these as partial records; entries embed them. Every field
/// is optional so that a partial answer from one source can be merged with
/// another's.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RecordFields {
    pub fn is_populated(&self, field: EntryField) -> bool {
        match field {
            EntryField::Title => has_text(&self.title),
            EntryField::Authors => self.authors.iter().any(|a| !a.trim().is_empty()),
            EntryField::Journal => has_text(&self.journal),
            EntryField::Year => self.year.is_some(),
            EntryField::Volume => has_text(&self.volume),
            EntryField::Issue => has_text(&self.issue),
            EntryField::Pages => has_text(&self.pages),
            EntryField::Publisher => has_text(&self.publisher),
            EntryField::Abstract => has_text(&self.abstract_text),
            EntryField::Url => has_text(&self.url),
        }
    }

    pub fn populated_fields(&self) -> Vec<EntryField> {
        EntryField::ALL
            .into_iter()
            .filter(|field| self.is_populated(*field))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.populated_fields().is_empty()
    }

    /// Copy `field` from `other` when it is missing here and present there.
    ///
    /// Returns `true` when the field was taken.
    pub fn fill_from(&mut self, other: &RecordFields, field: EntryField) -> bool {
        if self.is_populated(field) || !other.is_populated(field) {
            return false;
        }
        match field {
            EntryField::Title => self.title = other.title.clone(),
            EntryField::Authors => {
                self.authors = other
                    .authors
                    .iter()
                    .filter(|a| !a.trim().is_empty())
                    .cloned()
                    .collect();
            }
            EntryField::Journal => self.journal = other.journal.clone(),
            EntryField::Year => self.year = other.year,
            EntryField::Volume => self.volume = other.volume.clone(),
            EntryField::Issue => self.issue = other.issue.clone(),
            EntryField::Pages => self.pages = other.pages.clone(),
            EntryField::Publisher => self.publisher = other.publisher.clone(),
            EntryField::Abstract => self.abstract_text = other.abstract_text.clone(),
            EntryField::Url => self.url = other.url.clone(),
        }
        true
    }

    /// Share of [`EntryField::REQUIRED`] that is populated, in `[0, 1]`.
    pub fn completeness(&self) -> f64 {
        let populated = EntryField::REQUIRED
            .iter()
            .filter(|field| self.is_populated(**field))
            .count();
        populated as f64 / EntryField::REQUIRED.len() as f64
    }

    pub fn is_complete(&self) -> bool {
        EntryField::REQUIRED
            .iter()
            .all(|field| self.is_populated(*field))
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}
