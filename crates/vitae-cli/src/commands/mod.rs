//! CLI subcommands.

pub mod batch;
pub mod config;
pub mod extract;
pub mod info;
pub mod merge;

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::debug;

use vitae_core::{Pipeline, VitaeConfig};

/// Pipeline settings shared by the commands that run extraction.
#[derive(Args, Clone, Debug, Default)]
pub struct PipelineArgs {
    /// Skip OCR on scanned documents
    #[arg(long)]
    pub no_ocr: bool,

    /// Document language (skips detection)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Directory of rule files overriding the built-in ones
    #[arg(long)]
    pub rules_dir: Option<PathBuf>,

    /// Model directory
    #[arg(short, long)]
    pub models_dir: Option<PathBuf>,
}

impl PipelineArgs {
    pub fn apply(&self, config: &mut VitaeConfig) {
        if self.no_ocr {
            config.ocr.enabled = false;
        }
        if let Some(dir) = &self.rules_dir {
            config.models.rules_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.models_dir {
            config.models.model_dir = dir.clone();
        }
    }

    /// Load configuration, apply these overrides and build the pipeline.
    pub fn pipeline(&self, config_path: Option<&str>) -> anyhow::Result<Pipeline> {
        let mut config = load_config(config_path)?;
        self.apply(&mut config);
        Ok(Pipeline::new(config)?)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
    /// One CSV row per candidate or profile field
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Text => "txt",
            OutputFormat::Csv => "csv",
        }
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vitae")
        .join("config.json")
}

/// Explicit path first, then the user config file, then defaults.
pub fn load_config(path: Option<&str>) -> anyhow::Result<VitaeConfig> {
    if let Some(path) = path {
        return Ok(VitaeConfig::from_file(Path::new(path))?);
    }
    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config file {}", default_path.display());
        return Ok(VitaeConfig::from_file(&default_path)?);
    }
    Ok(VitaeConfig::default())
}

/// Remove every `provenance` object from a serialized profile.
pub fn strip_provenance(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.remove("provenance");
            for child in map.values_mut() {
                strip_provenance(child);
            }
        }
        serde_json::Value::Array(items) => {
            for child in items {
                strip_provenance(child);
            }
        }
        _ => {}
    }
}
