use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, Result};

/// Scheme and resolver prefixes removed during normalization.
static PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://(?:dx\.)?doi\.org/|(?:dx\.)?doi\.org/|urn:doi:|info:doi/|doi:)")
        .expect("valid regex")
});

static DOI_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^10\.\d{4,9}(?:\.\d+)*/\S+$").expect("valid regex"));

/// A canonical bibliographic identifier: lower-cased, prefix-free, trimmed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `10.<registrant>/<suffix>`
    pub fn is_doi(&self) -> bool {
        DOI_SHAPE_RE.is_match(&self.0)
    }

    pub fn url(&self) -> Option<String> {
        self.is_doi().then(|| format!("https://doi.org/{}", self.0))
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonicalize a raw identifier such as `"DOI: 10.1000/ABC"` or
/// `"https://doi.org/10.1000/abc"` into `"10.1000/abc"`.
///
/// Steps: lower-case fold, strip scheme/resolver prefixes (repeatedly, so the
/// result never starts with one), strip surrounding whitespace. Input that is
/// empty after stripping is rejected with [`ResolveError::InvalidIdentifier`].
pub fn normalize_identifier(raw: &str) -> Result<Identifier> {
    let mut value = raw.trim().to_lowercase();
    loop {
        let stripped = PREFIX_RE.replace(&value, "").trim().to_string();
        if stripped == value {
            break;
        }
        value = stripped;
    }

    if value.is_empty() {
        return Err(ResolveError::InvalidIdentifier(raw.to_string()));
    }
    Ok(Identifier(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_doi() {
        let id = normalize_identifier("10.1000/xyz123").unwrap();
        assert_eq!(id.as_str(), "10.1000/xyz123");
        assert_eq!(id.url().as_deref(), Some("https://doi.org/10.1000/xyz123"));
    }

    #[test]
    fn uppercase_is_folded() {
        let id = normalize_identifier("10.1000/ABC").unwrap();
        assert_eq!(id.as_str(), "10.1000/abc");
    }

    #[test]
    fn scheme_prefixes_are_stripped() {
        for raw in [
            "doi:10.1000/ABC",
            "DOI: 10.1000/abc",
            "  https://doi.org/10.1000/abc  ",
            "http://dx.doi.org/10.1000/abc",
            "doi.org/10.1000/abc",
            "urn:doi:10.1000/abc",
            "info:doi/10.1000/abc",
        ] {
            assert_eq!(normalize_identifier(raw).unwrap().as_str(), "10.1000/abc", "{raw}");
        }
    }

    #[test]
    fn stacked_prefixes_are_stripped() {
        let id = normalize_identifier("doi: https://doi.org/10.1000/abc").unwrap();
        assert_eq!(id.as_str(), "10.1000/abc");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["DOI:10.5555/X.Y", "arXiv:1706.03762", "  ISBN 978-3-16 ", "doi:doi:10.1/a"] {
            let once = normalize_identifier(raw).unwrap();
            let twice = normalize_identifier(once.as_str()).unwrap();
            assert_eq!(once, twice, "{raw}");
        }
    }

    #[test]
    fn empty_after_strip_is_invalid() {
        for raw in ["", "   ", "doi:", "https://doi.org/", " DOI:  "] {
            let err = normalize_identifier(raw).unwrap_err();
            assert!(matches!(err, ResolveError::InvalidIdentifier(_)), "{raw}");
        }
    }

    #[test]
    fn non_doi_identifiers_survive() {
        let id = normalize_identifier("arXiv:1706.03762").unwrap();
        assert_eq!(id.as_str(), "arxiv:1706.03762");
        assert!(!id.is_doi());
        assert!(normalize_identifier("doi:10.1038/nature14539").unwrap().is_doi());
    }
}
