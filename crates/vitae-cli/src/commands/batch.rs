//! Batch command - extract many résumés concurrently.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use vitae_core::mapper::MappingOutcome;
use vitae_core::{
    CancellationToken, Document, DocumentFormat, ExtractionResult, Pipeline, VitaeConfig,
};

use super::extract::render;
use super::{load_config, OutputFormat, PipelineArgs};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern of input files
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Write mapped profiles instead of raw candidates
    #[arg(long)]
    profile: bool,

    /// Leave provenance out of profile output
    #[arg(long)]
    no_provenance: bool,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,

    /// Per-document time budget in seconds; overruns keep partial results
    #[arg(long)]
    timeout: Option<u64>,
}

/// Result of processing a single file.
struct FileResult {
    path: PathBuf,
    outcome: Result<(ExtractionResult, MappingOutcome), String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .and_then(DocumentFormat::from_extension)
                .is_some()
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    eprintln!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let mut config = load_config(config_path)?;
    args.pipeline.apply(&mut config);
    let backstop = apply_timeout(&mut config, args.timeout);
    let pipeline = Arc::new(Pipeline::new(config)?);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let semaphore = Arc::new(Semaphore::new(args.jobs.max(1)));
    let mut tokens = Vec::with_capacity(files.len());
    let mut handles = Vec::with_capacity(files.len());

    for path in files {
        let token = CancellationToken::new();
        tokens.push(token.clone());
        let pipeline = pipeline.clone();
        let semaphore = semaphore.clone();
        let language = args.pipeline.language.clone();
        let pb = pb.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let file_start = Instant::now();
            let outcome = process_file(pipeline, path.clone(), language, token, backstop).await;
            pb.inc(1);
            FileResult {
                path,
                outcome,
                processing_time_ms: file_start.elapsed().as_millis() as u64,
            }
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let result = handle.await?;
        if let Err(message) = &result.outcome {
            if args.continue_on_error {
                warn!("Failed to process {}: {}", result.path.display(), message);
            } else {
                error!("Failed to process {}: {}", result.path.display(), message);
                for token in &tokens {
                    token.cancel();
                }
                pb.abandon();
                anyhow::bail!("Processing failed for {}: {}", result.path.display(), message);
            }
        }
        results.push(result);
    }

    pb.finish_and_clear();

    if let Some(output_dir) = &args.output_dir {
        for result in &results {
            let Ok((extraction, mapped)) = &result.outcome else {
                continue;
            };
            let output_name = result
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("resume");
            let output_path = output_dir.join(format!("{}.{}", output_name, args.format.extension()));
            let mapped = args.profile.then_some(mapped);
            let content = render(extraction, mapped, args.format, args.no_provenance)?;
            fs::write(&output_path, content)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        eprintln!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let failed: Vec<&FileResult> = results.iter().filter(|r| r.outcome.is_err()).collect();
    let successful = results.len() - failed.len();

    eprintln!();
    eprintln!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    eprintln!(
        "   {} successful, {} failed",
        style(successful).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        eprintln!();
        eprintln!("{}", style("Failed files:").red());
        for result in &failed {
            if let Err(message) = &result.outcome {
                eprintln!("  - {}: {}", result.path.display(), message);
            }
        }
    }

    Ok(())
}

/// Extra time the worker gets past the document budget before it is abandoned.
const BACKSTOP_GRACE: Duration = Duration::from_secs(5);

/// Route `--timeout` into the pipeline's document budget, so an overrun
/// still yields a partial result with timeout warnings. Returns the hard
/// limit for the worker task.
fn apply_timeout(config: &mut VitaeConfig, timeout: Option<u64>) -> Option<Duration> {
    let secs = timeout.filter(|&s| s > 0)?;
    config.pipeline.document_timeout_secs = secs;
    Some(Duration::from_secs(secs) + BACKSTOP_GRACE)
}

async fn process_file(
    pipeline: Arc<Pipeline>,
    path: PathBuf,
    language: Option<String>,
    token: CancellationToken,
    backstop: Option<Duration>,
) -> Result<(ExtractionResult, MappingOutcome), String> {
    let worker_token = token.clone();
    let task = tokio::task::spawn_blocking(move || {
        let mut document = Document::from_path(&path).map_err(|e| e.to_string())?;
        if let Some(language) = language {
            document = document.with_language(language);
        }
        pipeline.process(&document, &worker_token).map_err(|e| e.to_string())
    });

    let joined = match backstop {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                token.cancel();
                return Err(format!("worker did not finish within {}s", limit.as_secs()));
            }
        },
        None => task.await,
    };
    joined.map_err(|e| format!("worker failed: {}", e))?
}

fn write_summary(path: &Path, results: &[FileResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "format",
        "language",
        "ai_mode",
        "ocr_used",
        "sections",
        "fields",
        "high_confidence",
        "low_confidence",
        "mean_confidence",
        "completion_rate",
        "extracted_at",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        match &result.outcome {
            Ok((extraction, mapped)) => {
                let metrics = &extraction.metadata.metrics;
                wtr.write_record([
                    filename,
                    "success",
                    extraction.format.as_str(),
                    &extraction.language.code,
                    &extraction.metadata.ai_mode.to_string(),
                    &extraction.metadata.ocr_used.to_string(),
                    &metrics.sections_detected.to_string(),
                    &metrics.fields_extracted.to_string(),
                    &metrics.high_confidence_fields.to_string(),
                    &metrics.low_confidence_fields.to_string(),
                    &format!("{:.2}", metrics.confidence.mean),
                    &format!("{:.2}", mapped.completion_rate),
                    &extraction.extracted_at.to_rfc3339(),
                    &result.processing_time_ms.to_string(),
                    "",
                ])?;
            }
            Err(message) => {
                wtr.write_record([
                    filename,
                    "error",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    &result.processing_time_ms.to_string(),
                    message,
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}
