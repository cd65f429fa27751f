//! Which table of the template holds which group of fields.
//!
//! The claim report template is positional: table N always carries the same fields
//! for a given template version. Keeping the layout here, as data, means a new
//! template version is a new [`TemplateSchema`] rather than a hunt for indices.

use super::record::DefaultPolicy;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableRule {
    /// Company and visit header, colon segments.
    Company,
    /// Injured party identity, colon segments.
    InjuredParty,
    /// Family situation, colon segments.
    Family,
    /// Hospital admission, header row + value row.
    Admission,
    /// Diagnosis codes, header row + value row.
    Diagnosis,
    /// Temporary injury days of the index visit, positional lookup.
    Injuries,
    /// Sequelae of the index visit, header row + value row.
    Sequelae,
    /// Loss of quality of life, marker cell.
    LifeQuality,
    /// Lawyer contact, colon cells.
    Lawyer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableSlot {
    pub index: usize,
    pub rule: TableRule,
    pub defaults: DefaultPolicy,
}

impl TableSlot {
    const fn new(index: usize, rule: TableRule) -> Self {
        Self {
            index,
            rule,
            defaults: DefaultPolicy::Placeholder,
        }
    }
}

/// Follow-up visits repeat as (injuries, sequelae, other) table triplets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FollowUpLayout {
    /// First table index to look at.
    pub search_from: usize,
    /// Cell text that marks the first injuries table.
    pub anchor: &'static str,
    /// Tables per follow-up visit.
    pub stride: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateSchema {
    /// Fields shared by every visit row.
    pub base: Vec<TableSlot>,
    /// Table-derived fields of the index visit.
    pub first_visit: Vec<TableSlot>,
    pub follow_ups: FollowUpLayout,
}

impl Default for TemplateSchema {
    fn default() -> Self {
        Self {
            base: vec![
                TableSlot {
                    defaults: DefaultPolicy::Absent,
                    ..TableSlot::new(0, TableRule::Company)
                },
                TableSlot::new(1, TableRule::InjuredParty),
                TableSlot::new(2, TableRule::Family),
                TableSlot::new(3, TableRule::Admission),
                TableSlot::new(4, TableRule::Diagnosis),
            ],
            first_visit: vec![
                TableSlot::new(5, TableRule::Injuries),
                TableSlot::new(6, TableRule::Sequelae),
                TableSlot::new(7, TableRule::LifeQuality),
                TableSlot::new(9, TableRule::Lawyer),
            ],
            follow_ups: FollowUpLayout {
                search_from: 10,
                anchor: "Muy graves:",
                stride: 3,
            },
        }
    }
}

impl TemplateSchema {
    /// Overrides the default policy of every slot using `rule`.
    pub fn with_defaults(mut self, rule: TableRule, defaults: DefaultPolicy) -> Self {
        for slot in self.base.iter_mut().chain(self.first_visit.iter_mut()) {
            if slot.rule == rule {
                slot.defaults = defaults;
            }
        }
        self
    }
}
