use super::record::{FieldRecord, MergePolicy};

/// Index visit: the narrative record overwrites table values wherever it has a
/// non-empty value, placeholders included.
pub fn merge_first_visit(table: FieldRecord, narrative: Option<FieldRecord>) -> FieldRecord {
    match narrative {
        Some(narrative) if table.is_empty() => narrative,
        Some(narrative) => {
            let mut merged = table;
            merged.overlay(&narrative, MergePolicy::PlaceholderOverwrites);
            merged
        }
        None => table,
    }
}

/// Follow-up visits, paired by position. A placeholder never replaces a table value;
/// narrative records without a table counterpart are appended unchanged.
pub fn merge_follow_ups(tables: Vec<FieldRecord>, narratives: Vec<FieldRecord>) -> Vec<FieldRecord> {
    let table_count = tables.len();
    let mut merged = tables;
    for (idx, narrative) in narratives.into_iter().enumerate() {
        match merged.get_mut(idx) {
            Some(existing) => existing.overlay(&narrative, MergePolicy::PlaceholderPreserves),
            None => merged.push(narrative),
        }
    }
    if merged.len() != table_count {
        tracing::debug!(
            table_visits = table_count,
            visits = merged.len(),
            "follow-up visits without table data"
        );
    }
    merged
}
