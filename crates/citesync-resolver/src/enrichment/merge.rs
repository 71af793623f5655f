use citesync_core::{BibliographicEntry, EntryField};

use crate::sources::PartialRecord;

/// Field-level priority merge of one source's record into the running entry.
///
/// Sources are merged in priority order, so a field that is already set came
/// from a higher-priority source and is left alone. Returns the fields this
/// record contributed, which are attributed to `source` in the provenance map.
pub fn merge_partial(
    merged: &mut BibliographicEntry,
    record: &PartialRecord,
    source: &str,
) -> Vec<EntryField> {
    let mut contributed = Vec::new();
    for field in EntryField::ALL {
        if merged.fields.fill_from(record, field) {
            merged.set_provenance(field, source);
            contributed.push(field);
        }
    }
    merged.refresh_completeness();
    contributed
}
