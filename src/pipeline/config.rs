use std::path::{Path, PathBuf};

use crate::config::{find_default_config, load_config, AppConfig, CONFIG_ENV, CONFIG_FILENAME};
use crate::docx::checkbox::DEFAULT_CONSENT_FIELD;
use crate::extract::schema::{TableRule, TemplateSchema};
use crate::report::ReshapeOptions;

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Config file that was loaded, if any.
    pub config_path: Option<PathBuf>,
    pub schema: TemplateSchema,
    pub consent_field: String,
    pub reshape: ReshapeOptions,
    pub transpose: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default(), None)
    }
}

impl PipelineConfig {
    /// Config lookup: explicit path, then `CLAIM_EXTRACT_CONFIG`, then an upward search
    /// from the working directory, the input directory and the executable directory.
    /// Command-line flags override file values.
    pub fn from_paths_and_args(
        input: &Path,
        config_path: Option<PathBuf>,
        transpose: Option<bool>,
    ) -> anyhow::Result<Self> {
        let workdir = input
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let workdir = workdir.canonicalize().unwrap_or(workdir);

        let cfg_file = config_path
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(|| find_default_config(&workdir, CONFIG_FILENAME));

        let mut file_cfg = AppConfig::default();
        let mut loaded = None;
        if let Some(p) = cfg_file {
            if p.exists() {
                file_cfg = load_config(&p)?;
                tracing::info!(config = %p.display(), "config loaded");
                loaded = Some(p);
            } else {
                tracing::warn!(config = %p.display(), "config file not found, using defaults");
            }
        }

        let mut cfg = Self::from_app_config(&file_cfg, loaded);
        if let Some(t) = transpose {
            cfg.transpose = t;
        }
        Ok(cfg)
    }

    pub fn from_app_config(file_cfg: &AppConfig, config_path: Option<PathBuf>) -> Self {
        let mut schema = TemplateSchema::default();
        if let Some(policy) = file_cfg.tables.company_defaults {
            schema = schema.with_defaults(TableRule::Company, policy);
        }

        let consent_field = file_cfg
            .checkboxes
            .consent_field
            .as_deref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CONSENT_FIELD.to_string());

        let mut reshape = ReshapeOptions::default();
        if let Some(pad) = file_cfg.output.next_visit_padding.clone() {
            reshape.next_visit_padding = pad;
        }

        Self {
            config_path,
            schema,
            consent_field,
            reshape,
            transpose: file_cfg.output.transpose.unwrap_or(true),
        }
    }
}
