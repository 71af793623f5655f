//! Title similarity on normalized titles.

use crate::identifiers::NormalizedTitle;

/// Normalized Levenshtein similarity in `[0, 1]`.
///
/// Symmetric, deterministic, and `1.0` exactly when both titles are equal.
pub fn similarity(a: &NormalizedTitle, b: &NormalizedTitle) -> f64 {
    if a == b {
        return 1.0;
    }
    strsim::normalized_levenshtein(a.as_str(), b.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::normalize_title;

    #[test]
    fn identical_titles_score_one() {
        let a = normalize_title("Deep Learning for NLP");
        let b = normalize_title("deep  learning for nlp");
        assert_eq!(similarity(&a, &b), 1.0);
    }

    #[test]
    fn different_titles_score_below_one() {
        let a = normalize_title("Deep Learning for NLP");
        let b = normalize_title("Deep Learning for NLP.");
        let s = similarity(&a, &b);
        assert!(s < 1.0);
        assert!(s > 0.9);
    }

    #[test]
    fn similarity_is_symmetric() {
        let pairs = [
            ("Deep Learning for NLP", "Shallow Learning"),
            ("", "Attention is all you need"),
            ("graph neural networks", "neural graph networks"),
        ];
        for (x, y) in pairs {
            let a = normalize_title(x);
            let b = normalize_title(y);
            assert_eq!(similarity(&a, &b), similarity(&b, &a));
        }
    }

    #[test]
    fn unrelated_titles_score_low() {
        let a = normalize_title("Deep Learning for NLP");
        let b = normalize_title("Shallow Learning");
        assert!(similarity(&a, &b) < 0.8);
    }

    #[test]
    fn empty_against_text_is_zero() {
        let empty = normalize_title("");
        let text = normalize_title("anything");
        assert_eq!(similarity(&empty, &text), 0.0);
    }
}
