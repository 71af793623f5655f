use std::fmt;

use serde::{Deserialize, Serialize};

/// Wrapper characters used for emphasis or case protection in titles
/// (`{BERT}`, `*Nature*`, `` `code` ``).
const MARKUP_CHARS: &[char] = &['{', '}', '*', '`'];

/// A title in comparable form: markup removed, case folded, whitespace
/// collapsed to single spaces.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedTitle(String);

impl NormalizedTitle {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Total: any input yields a (possibly empty) normalized title.
pub fn normalize_title(raw: &str) -> NormalizedTitle {
    let cleaned: String = raw
        .chars()
        .filter(|c| !MARKUP_CHARS.contains(c))
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    let folded = cleaned.to_lowercase();
    NormalizedTitle(folded.split_whitespace().collect::<Vec<_>>().join(" "))
}
