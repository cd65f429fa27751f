//! Document grid -> per-visit field records.

pub mod merge;
pub mod record;
pub mod schema;
pub mod tables;
pub mod visits;

use crate::docx::grid::DocumentGrid;

use record::FieldRecord;
use schema::TemplateSchema;

/// Records of one document before reshaping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Fields shared by every visit.
    pub base: FieldRecord,
    pub first_visit: FieldRecord,
    pub follow_ups: Vec<FieldRecord>,
}

impl Extraction {
    /// Index visit first, then follow-ups.
    pub fn visits(&self) -> impl Iterator<Item = &FieldRecord> {
        std::iter::once(&self.first_visit).chain(self.follow_ups.iter())
    }

    pub fn visit_count(&self) -> usize {
        1 + self.follow_ups.len()
    }
}

pub fn extract(grid: &DocumentGrid) -> Extraction {
    extract_with(grid, &TemplateSchema::default())
}

pub fn extract_with(grid: &DocumentGrid, schema: &TemplateSchema) -> Extraction {
    let mut base = FieldRecord::new();
    for slot in &schema.base {
        base.assign(tables::apply_slot(grid, slot));
    }

    let mut first_table = FieldRecord::new();
    for slot in &schema.first_visit {
        first_table.assign(tables::apply_slot(grid, slot));
    }

    let follow_up_tables = tables::follow_up_records(grid, &schema.follow_ups);
    let narratives = visits::segment_visits(&grid.paragraphs);

    let extraction = Extraction {
        base,
        first_visit: merge::merge_first_visit(first_table, narratives.first),
        follow_ups: merge::merge_follow_ups(follow_up_tables, narratives.follow_ups),
    };
    tracing::debug!(
        tables = grid.tables.len(),
        visits = extraction.visit_count(),
        "extraction done"
    );
    extraction
}
