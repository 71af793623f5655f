use citesync_core::BibliographicEntry;

/// Decides when a merged entry is good enough to stop querying sources.
pub trait CompletenessPredicate: Send + Sync {
    fn is_complete(&self, entry: &BibliographicEntry) -> bool;
}

/// Title, authors, journal and year all populated.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredFields;

impl CompletenessPredicate for RequiredFields {
    fn is_complete(&self, entry: &BibliographicEntry) -> bool {
        entry.is_complete()
    }
}

impl<F> CompletenessPredicate for F
where
    F: Fn(&BibliographicEntry) -> bool + Send + Sync,
{
    fn is_complete(&self, entry: &BibliographicEntry) -> bool {
        self(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{complete_record, record};

    #[test]
    fn test_required_fields() {
        let mut entry = BibliographicEntry::placeholder("10.1/x");
        entry.fields = record("Only a title", &[], None, None);
        assert!(!RequiredFields.is_complete(&entry));

        entry.fields = complete_record("Everything");
        assert!(RequiredFields.is_complete(&entry));
    }

    #[test]
    fn test_closure_predicate() {
        let has_title = |entry: &BibliographicEntry| entry.title().is_some();
        let mut entry = BibliographicEntry::placeholder("10.1/x");
        assert!(!has_title.is_complete(&entry));
        entry.fields = record("T", &[], None, None);
        assert!(has_title.is_complete(&entry));
    }
}
