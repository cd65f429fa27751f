use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use crate::docx::checkbox::{read_consent, read_next_visit_flags};
use crate::docx::grid::{extract_grid, DocumentGrid};
use crate::docx::package::{DocxPackage, DOCUMENT_PART};
use crate::docx::xml::{parse_xml_part_with, ParseMode};
use crate::error::Result;
use crate::extract::extract_with;
use crate::progress::ConsoleProgress;
use crate::report::{document_id, reshape, Report};

use super::PipelineConfig;

pub struct ReportPipeline {
    cfg: PipelineConfig,
    progress: ConsoleProgress,
}

impl ReportPipeline {
    pub fn new(cfg: PipelineConfig, progress: ConsoleProgress) -> Self {
        Self { cfg, progress }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    /// Rows of one document held in memory. `file_name` gives the document id.
    pub fn process_bytes(&self, bytes: &[u8], file_name: Option<&str>) -> Result<Report> {
        let pkg = DocxPackage::from_bytes(bytes)?;
        self.process_package(&pkg, &document_id(file_name))
    }

    pub fn process_path(&self, path: &Path) -> anyhow::Result<Report> {
        let pkg = DocxPackage::read(path).with_context(|| format!("open docx: {}", path.display()))?;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        self.process_package(&pkg, &document_id(name.as_deref()))
            .with_context(|| format!("extract: {}", path.display()))
    }

    /// The markup is parsed twice. The grid parse recovers from a truncated part and
    /// fails only on markup it cannot read at all; the checkbox parses are strict, and
    /// their failures become warnings.
    pub fn process_package(&self, pkg: &DocxPackage, document_id: &str) -> Result<Report> {
        let xml = pkg.document_xml()?;
        let grid = load_grid(xml)?;
        let extraction = extract_with(&grid, &self.cfg.schema);

        let mut checkbox_warnings = Vec::new();
        let consent = read_consent(xml, &self.cfg.consent_field).unwrap_or_else(|e| {
            checkbox_warnings.push(format!("{document_id}: consent field unreadable: {e}"));
            None
        });
        let flags = read_next_visit_flags(xml).unwrap_or_else(|e| {
            checkbox_warnings.push(format!("{document_id}: next-visit checkboxes unreadable: {e}"));
            Vec::new()
        });

        let mut report = Report::default();
        for w in checkbox_warnings {
            report.warn(w);
        }
        report.append(reshape(
            &extraction,
            consent,
            &flags,
            document_id,
            &self.cfg.reshape,
        ));
        Ok(report)
    }

    /// Processes every input in order. Documents that fail are reported and skipped; the
    /// batch fails only when none succeeds.
    pub fn process_all(&self, inputs: &[PathBuf]) -> anyhow::Result<Report> {
        let mut combined = Report::default();
        let mut processed = 0usize;
        for (i, input) in inputs.iter().enumerate() {
            self.progress.document(i + 1, inputs.len(), input);
            match self.process_path(input) {
                Ok(report) => {
                    self.progress.info(format!("{} visit rows", report.rows.len()));
                    combined.append(report);
                    processed += 1;
                }
                Err(e) => combined.warn(format!("skipped {}: {e:#}", input.display())),
            }
        }
        if processed == 0 {
            bail!("no document could be processed ({} inputs)", inputs.len());
        }
        Ok(combined)
    }
}

fn load_grid(xml: &[u8]) -> Result<DocumentGrid> {
    let part = parse_xml_part_with(DOCUMENT_PART, xml, ParseMode::Recover)?;
    Ok(extract_grid(&part))
}

/// Table grid and paragraph stream of a document as pretty JSON.
pub fn dump_grid_json(path: &Path) -> anyhow::Result<String> {
    let pkg = DocxPackage::read(path).with_context(|| format!("open docx: {}", path.display()))?;
    let grid = load_grid(pkg.document_xml()?)?;
    serde_json::to_string_pretty(&grid).context("serialize grid json")
}
