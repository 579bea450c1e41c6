//! Merge command - reconcile a new résumé with an existing profile.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use tracing::info;

use vitae_core::merge::ConflictResolver;
use vitae_core::models::ConflictDecision;
use vitae_core::{CancellationToken, Document, ProfileSnapshot, RuleSet};

use super::{load_config, PipelineArgs};

/// Arguments for the merge command.
#[derive(Args)]
pub struct MergeArgs {
    /// Existing profile (JSON)
    #[arg(required = true)]
    existing: PathBuf,

    /// New résumé, or a mapped profile as JSON
    #[arg(required = true)]
    incoming: PathBuf,

    /// Output file for the merged profile (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write conflict records to this file
    #[arg(long)]
    conflicts: Option<PathBuf>,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

pub async fn run(args: MergeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let existing = read_profile(&args.existing)?;

    let is_json = args
        .incoming
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let (incoming, resolver) = if is_json {
        let mut config = load_config(config_path)?;
        args.pipeline.apply(&mut config);
        let rules = match &config.models.rules_dir {
            Some(dir) => RuleSet::load_dir(dir)?,
            None => RuleSet::builtin()?,
        };
        (read_profile(&args.incoming)?, ConflictResolver::new(rules.precedence))
    } else {
        if !args.incoming.exists() {
            anyhow::bail!("Input file not found: {}", args.incoming.display());
        }
        info!("Extracting {}", args.incoming.display());
        let pipeline = args.pipeline.pipeline(config_path)?;
        let mut document = Document::from_path(&args.incoming)?;
        if let Some(language) = &args.pipeline.language {
            document = document.with_language(language.clone());
        }
        let (_, mapped) = pipeline.process(&document, &CancellationToken::new())?;
        let resolver = ConflictResolver::new(pipeline.rules().precedence.clone());
        (mapped.profile, resolver)
    };

    let outcome = resolver.merge(&incoming, &existing);
    let merged = serde_json::to_string_pretty(&outcome.profile)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &merged)?;
        eprintln!(
            "{} Merged profile written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", merged);
    }

    if let Some(conflicts_path) = &args.conflicts {
        fs::write(conflicts_path, serde_json::to_string_pretty(&outcome.conflicts)?)?;
        eprintln!(
            "{} Conflict records written to {}",
            style("✓").green(),
            conflicts_path.display()
        );
    }

    eprintln!(
        "{} {} replaced, {} kept, {} added, {} flagged for review",
        style("ℹ").blue(),
        outcome.count(ConflictDecision::Replaced),
        outcome.count(ConflictDecision::KeptExisting),
        outcome.count(ConflictDecision::Added),
        outcome.count(ConflictDecision::FlaggedForReview)
    );

    Ok(())
}

/// Read a profile snapshot, or the profile inside a mapping outcome.
fn read_profile(path: &Path) -> anyhow::Result<ProfileSnapshot> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let mut value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid JSON in {}: {}", path.display(), e))?;
    let nested = value.get_mut("profile").map(serde_json::Value::take);
    if let Some(profile) = nested {
        value = profile;
    }
    serde_json::from_value(value)
        .map_err(|e| anyhow::anyhow!("{} is not a profile: {}", path.display(), e))
}
