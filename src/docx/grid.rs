use serde::Serialize;

use super::xml::{find_attr, XmlEvent, XmlPart};

/// One body-level table as rows of raw cell text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn cells(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flat_map(|r| r.iter().map(|c| c.as_str()))
    }
}

/// Tables and body paragraphs of a document, in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DocumentGrid {
    pub tables: Vec<Table>,
    /// Body paragraphs whose trimmed text is non-empty, stored untrimmed.
    pub paragraphs: Vec<String>,
}

impl DocumentGrid {
    pub fn table(&self, index: usize) -> Option<&Table> {
        self.tables.get(index)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VMerge {
    None,
    Restart,
    Continue,
}

struct CellCapture {
    paragraphs: Vec<String>,
    span: usize,
    vmerge: VMerge,
}

impl Default for CellCapture {
    fn default() -> Self {
        Self {
            paragraphs: Vec::new(),
            span: 1,
            vmerge: VMerge::None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ParaTarget {
    Body,
    Cell,
}

struct ParaCapture {
    target: ParaTarget,
    text: String,
    /// Paragraphs opened inside this one (text boxes); their text is not ours.
    nested_p: usize,
    in_t: bool,
}

pub fn extract_grid(part: &XmlPart) -> DocumentGrid {
    let mut grid = DocumentGrid::default();
    let mut stack: Vec<&str> = Vec::new();

    let mut tbl_depth = 0usize;
    let mut table: Option<Table> = None;
    let mut row: Vec<CellCapture> = Vec::new();
    let mut prev_row: Option<Vec<String>> = None;
    let mut cell: Option<CellCapture> = None;
    let mut para: Option<ParaCapture> = None;

    for ev in &part.events {
        match ev {
            XmlEvent::Start { name, attrs } => {
                let name = name.as_str();
                let parent = stack.last().copied().unwrap_or("");
                match name {
                    "w:tbl" => {
                        if tbl_depth == 0 && parent == "w:body" {
                            table = Some(Table::default());
                            prev_row = None;
                        }
                        tbl_depth += 1;
                    }
                    "w:tr" if tbl_depth == 1 && table.is_some() => row.clear(),
                    "w:tc" if tbl_depth == 1 && table.is_some() => {
                        cell = Some(CellCapture::default());
                    }
                    "w:p" => match para.as_mut() {
                        Some(p) => p.nested_p += 1,
                        None => {
                            let target = if parent == "w:body" && tbl_depth == 0 {
                                Some(ParaTarget::Body)
                            } else if parent == "w:tc" && tbl_depth == 1 && cell.is_some() {
                                Some(ParaTarget::Cell)
                            } else {
                                None
                            };
                            para = target.map(|target| ParaCapture {
                                target,
                                text: String::new(),
                                nested_p: 0,
                                in_t: false,
                            });
                        }
                    },
                    "w:t" => {
                        if let Some(p) = para.as_mut() {
                            p.in_t = p.nested_p == 0;
                        }
                    }
                    _ => {}
                }
                apply_element(name, parent, &stack, attrs, tbl_depth, &mut cell, &mut para);
                stack.push(name);
            }
            XmlEvent::Empty { name, attrs } => {
                let parent = stack.last().copied().unwrap_or("");
                apply_element(name, parent, &stack, attrs, tbl_depth, &mut cell, &mut para);
            }
            XmlEvent::Text { text } => {
                if let Some(p) = para.as_mut() {
                    if p.in_t {
                        p.text.push_str(text);
                    }
                }
            }
            XmlEvent::End { name } => {
                let _ = stack.pop();
                match name.as_str() {
                    "w:t" => {
                        if let Some(p) = para.as_mut() {
                            p.in_t = false;
                        }
                    }
                    "w:p" => {
                        let nested = para.as_ref().map(|p| p.nested_p).unwrap_or(0);
                        if nested > 0 {
                            if let Some(p) = para.as_mut() {
                                p.nested_p -= 1;
                            }
                        } else if let Some(p) = para.take() {
                            match p.target {
                                ParaTarget::Body => {
                                    if !p.text.trim().is_empty() {
                                        grid.paragraphs.push(p.text);
                                    }
                                }
                                ParaTarget::Cell => {
                                    if let Some(c) = cell.as_mut() {
                                        c.paragraphs.push(p.text);
                                    }
                                }
                            }
                        }
                    }
                    "w:tc" if tbl_depth == 1 => {
                        if let Some(c) = cell.take() {
                            row.push(c);
                        }
                    }
                    "w:tr" if tbl_depth == 1 => {
                        if let Some(t) = table.as_mut() {
                            let resolved = resolve_row(std::mem::take(&mut row), prev_row.as_deref());
                            t.rows.push(resolved.clone());
                            prev_row = Some(resolved);
                        }
                    }
                    "w:tbl" => {
                        tbl_depth = tbl_depth.saturating_sub(1);
                        if tbl_depth == 0 {
                            if let Some(t) = table.take() {
                                grid.tables.push(t);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    tracing::debug!(
        tables = grid.tables.len(),
        paragraphs = grid.paragraphs.len(),
        "document grid extracted"
    );
    grid
}

/// Handles elements that contribute run controls or cell properties.
fn apply_element(
    name: &str,
    parent: &str,
    stack: &[&str],
    attrs: &[(String, String)],
    tbl_depth: usize,
    cell: &mut Option<CellCapture>,
    para: &mut Option<ParaCapture>,
) {
    if parent == "w:r" {
        if let Some(p) = para.as_mut().filter(|p| p.nested_p == 0) {
            control_append(&mut p.text, name, attrs);
        }
    }

    let in_top_level_tcpr = tbl_depth == 1
        && parent == "w:tcPr"
        && stack.len() >= 2
        && stack[stack.len() - 2] == "w:tc";
    if !in_top_level_tcpr {
        return;
    }
    if let Some(c) = cell.as_mut() {
        match name {
            "w:gridSpan" => {
                c.span = find_attr(attrs, "w:val")
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .filter(|&n| n > 0)
                    .unwrap_or(1);
            }
            "w:vMerge" => {
                c.vmerge = match find_attr(attrs, "w:val") {
                    Some("restart") => VMerge::Restart,
                    _ => VMerge::Continue,
                };
            }
            _ => {}
        }
    }
}

fn control_append(buf: &mut String, name: &str, attrs: &[(String, String)]) {
    match name {
        "w:tab" | "w:ptab" => buf.push('\t'),
        "w:cr" => buf.push('\n'),
        "w:br" => {
            if find_attr(attrs, "w:type").unwrap_or("textWrapping") == "textWrapping" {
                buf.push('\n');
            }
        }
        "w:noBreakHyphen" => buf.push('-'),
        _ => {}
    }
}

/// Expands merged cells into grid columns: a spanned cell repeats, a vertical
/// continuation shows the text of the cell above.
fn resolve_row(cells: Vec<CellCapture>, prev: Option<&[String]>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for c in cells {
        let col = out.len();
        let own = c.paragraphs.join("\n");
        let text = match (c.vmerge, prev.and_then(|p| p.get(col))) {
            (VMerge::Continue, Some(above)) => above.clone(),
            _ => own,
        };
        for _ in 0..c.span {
            out.push(text.clone());
        }
    }
    out
}
