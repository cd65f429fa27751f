use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::extract::record::DefaultPolicy;

pub const CONFIG_FILENAME: &str = "claim-extract.toml";
pub const CONFIG_ENV: &str = "CLAIM_EXTRACT_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub tables: TablesSection,
    #[serde(default)]
    pub checkboxes: CheckboxesSection,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TablesSection {
    /// What the company/visit table does with fields it did not find:
    /// "absent" (leave empty) or "placeholder" (write "-").
    #[serde(default)]
    pub company_defaults: Option<DefaultPolicy>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct CheckboxesSection {
    /// Name of the legacy form field that holds the consent answer.
    #[serde(default)]
    pub consent_field: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct OutputSection {
    #[serde(default)]
    pub next_visit_padding: Option<String>,
    /// One line per column instead of one line per visit.
    #[serde(default)]
    pub transpose: Option<bool>,
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

/// Looks in the working directory, then `workdir`, then next to the executable.
pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    parse_config(&text)
}

pub fn parse_config(text: &str) -> anyhow::Result<AppConfig> {
    toml::from_str(text).context("parse config toml")
}

const DEFAULT_CONFIG_TOML: &str = r#"[tables]
# Fields of the company/visit table that the document leaves out:
# "absent" keeps them empty, "placeholder" writes "-".
company_defaults = "absent"

[checkboxes]
# Legacy form field that carries the consent answer.
consent_field = "Casilla9"

[output]
# Next-visit flag for visits without a checkbox group.
next_visit_padding = "NO"
# One line per column, one further cell per visit.
transpose = true
"#;

/// Writes the default config into `dir`. An existing file is kept unless `force`.
pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);
    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}
