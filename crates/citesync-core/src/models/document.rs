use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a document ended up paired with a bibliographic entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    #[default]
    Unmatched,
    MatchedByIdentifier,
    MatchedByTitle,
    Ambiguous,
}

impl MatchState {
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::MatchedByIdentifier | Self::MatchedByTitle)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unmatched => "unmatched",
            Self::MatchedByIdentifier => "matched_by_identifier",
            Self::MatchedByTitle => "matched_by_title",
            Self::Ambiguous => "ambiguous",
        }
    }
}

/// A local research note as seen by the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable key, the note path relative to the notes root for file-backed notes.
    pub id: String,

    /// Identifier as written in the note, possibly malformed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_identifier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_title: Option<String>,

    #[serde(default)]
    pub match_state: MatchState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw_identifier: None,
            raw_title: None,
            match_state: MatchState::Unmatched,
            path: None,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.raw_identifier = Some(identifier.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.raw_title = Some(title.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}
