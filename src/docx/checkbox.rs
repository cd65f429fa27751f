//! Form-field and checkbox state read straight from `word/document.xml`.

use super::package::DOCUMENT_PART;
use super::tree::{ElementNode, ElementTree};
use super::xml::parse_xml_part;
use crate::error::Result;

pub const DEFAULT_CONSENT_FIELD: &str = "Casilla9";
pub const NEXT_VISIT_TEXT: &str = "Próxima visita:";

/// Value of a checked-state element that means "unchecked".
const UNCHECKED: &str = "0";

/// Controls that follow each next-visit marker: follow-up, final, final definitive.
const NEXT_VISIT_CONTROLS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Consent {
    Si,
    No,
}

impl Consent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Si => "SI",
            Self::No => "NO",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextVisit {
    Seguimiento,
    Final,
    FinalDefinitive,
}

impl NextVisit {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seguimiento => "Seguimiento",
            Self::Final => "Final",
            Self::FinalDefinitive => "Final definitive",
        }
    }
}

fn parse_tree(markup: &[u8]) -> Result<ElementTree> {
    let part = parse_xml_part(DOCUMENT_PART, markup)?;
    Ok(ElementTree::from_part(&part))
}

/// Reads the two-state legacy field named `field_name`.
///
/// The field appears twice in the template. The polarity is inverted on purpose: an
/// explicitly unchecked FIRST occurrence reads as consent given ("SI"), an explicitly
/// unchecked SECOND occurrence as "NO". Later occurrences are ignored.
pub fn read_consent(markup: &[u8], field_name: &str) -> Result<Option<Consent>> {
    let tree = parse_tree(markup)?;

    let occurrences = tree.nodes.iter().enumerate().filter(|(idx, node)| {
        node.name == "w:ffData"
            && tree
                .child_named(*idx, "w:name")
                .and_then(|n| n.attr("w:val"))
                == Some(field_name)
    });

    for (ordinal, (idx, _)) in occurrences.enumerate() {
        let explicitly_unchecked = tree
            .child_index_named(idx, "w:checkBox")
            .and_then(|cb| tree.child_named(cb, "w:checked"))
            .and_then(|checked| checked.attr("w:val"))
            == Some(UNCHECKED);
        if !explicitly_unchecked {
            continue;
        }
        match ordinal {
            0 => return Ok(Some(Consent::Si)),
            1 => return Ok(Some(Consent::No)),
            _ => {}
        }
    }
    Ok(None)
}

/// One entry per "Próxima visita:" text run followed by at least three checkbox
/// controls; `None` when none of the three is checked.
pub fn read_next_visit_flags(markup: &[u8]) -> Result<Vec<Option<NextVisit>>> {
    let tree = parse_tree(markup)?;
    let mut flags = Vec::new();

    for (idx, node) in tree.nodes.iter().enumerate() {
        if node.name != "w:t" || node.text.trim() != NEXT_VISIT_TEXT {
            continue;
        }
        let controls: Vec<usize> = (idx + 1..tree.len())
            .filter(|&i| is_checkbox_control(&tree.nodes[i]))
            .take(NEXT_VISIT_CONTROLS)
            .collect();
        if controls.len() < NEXT_VISIT_CONTROLS {
            tracing::debug!(
                element = idx,
                found = controls.len(),
                "next-visit marker without three checkboxes"
            );
            continue;
        }
        let flag = [NextVisit::Seguimiento, NextVisit::Final, NextVisit::FinalDefinitive]
            .into_iter()
            .zip(controls)
            .find(|(_, control)| is_checked(&tree, *control))
            .map(|(flag, _)| flag);
        flags.push(flag);
    }
    Ok(flags)
}

fn is_checkbox_control(node: &ElementNode) -> bool {
    matches!(node.name.as_str(), "w:checkBox" | "w14:checkbox")
}

/// A control is checked when it has a checked-state child whose value is missing or
/// anything but "0".
fn is_checked(tree: &ElementTree, control: usize) -> bool {
    let checked = match tree.nodes[control].name.as_str() {
        "w14:checkbox" => tree.child_named(control, "w14:checked"),
        _ => tree.child_named(control, "w:checked"),
    };
    match checked {
        Some(el) => {
            let val = el.attr("w:val").or_else(|| el.attr("w14:val"));
            val != Some(UNCHECKED)
        }
        None => false,
    }
}
