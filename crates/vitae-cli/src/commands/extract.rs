//! Extract command - run the pipeline on a single résumé.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use vitae_core::mapper::MappingOutcome;
use vitae_core::models::{ConfidenceLevel, PersonalSlot, ProfileField};
use vitae_core::{CancellationToken, Document, ExtractionResult, ProfileSnapshot};

use super::{strip_provenance, OutputFormat, PipelineArgs};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input file (PDF, DOCX, ODT or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Output the mapped profile instead of raw candidates
    #[arg(long)]
    profile: bool,

    /// Leave provenance out of the profile output
    #[arg(long)]
    no_provenance: bool,

    /// Show extraction confidence and timing
    #[arg(long)]
    show_confidence: bool,
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Loading rules and models...");

    let pipeline = args.pipeline.pipeline(config_path)?;

    pb.set_message("Extracting...");
    let mut document = Document::from_path(&args.input)?;
    if let Some(language) = &args.pipeline.language {
        document = document.with_language(language.clone());
    }
    let cancel = CancellationToken::new();
    let result = pipeline.extract(&document, &cancel)?;
    let mapped = args.profile.then(|| pipeline.map(&result));

    pb.finish_and_clear();

    let output = render(&result, mapped.as_ref(), args.format, args.no_provenance)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    for warning in &result.warnings {
        eprintln!("{} {}", style("!").yellow(), warning);
    }

    if args.show_confidence {
        let metrics = &result.metadata.metrics;
        eprintln!();
        eprintln!(
            "{} Mean confidence: {:.1}% over {} fields ({} high, {} low)",
            style("ℹ").blue(),
            metrics.confidence.mean * 100.0,
            metrics.fields_extracted,
            metrics.high_confidence_fields,
            metrics.low_confidence_fields
        );
        eprintln!(
            "{} Mode: {}, OCR: {}, processing time: {}ms",
            style("ℹ").blue(),
            result.metadata.ai_mode,
            if result.metadata.ocr_used { "yes" } else { "no" },
            result.metadata.processing_time_ms
        );
        if let Some(mapped) = &mapped {
            eprintln!(
                "{} Profile completion: {:.0}%",
                style("ℹ").blue(),
                mapped.completion_rate * 100.0
            );
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Render an extraction result, or its mapped profile when given.
pub fn render(
    result: &ExtractionResult,
    mapped: Option<&MappingOutcome>,
    format: OutputFormat,
    no_provenance: bool,
) -> anyhow::Result<String> {
    match (format, mapped) {
        (OutputFormat::Json, Some(mapped)) => {
            let mut value = serde_json::to_value(mapped)?;
            if no_provenance {
                strip_provenance(&mut value);
            }
            Ok(serde_json::to_string_pretty(&value)?)
        }
        (OutputFormat::Json, None) => Ok(serde_json::to_string_pretty(result)?),
        (OutputFormat::Text, Some(mapped)) => Ok(profile_text(&mapped.profile, mapped.completion_rate)),
        (OutputFormat::Text, None) => Ok(result_text(result)),
        (OutputFormat::Csv, Some(mapped)) => profile_csv(&mapped.profile),
        (OutputFormat::Csv, None) => result_csv(result),
    }
}

fn result_csv(result: &ExtractionResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "section",
        "field",
        "value",
        "raw_value",
        "confidence",
        "level",
        "method",
        "extractor",
        "start",
        "end",
        "low_confidence",
    ])?;

    for section in &result.sections {
        for candidate in &section.candidates {
            wtr.write_record([
                section.kind.as_str(),
                candidate.field.as_str(),
                &candidate.value_text(),
                &candidate.raw_value,
                &format!("{:.2}", candidate.confidence),
                ConfidenceLevel::from_score(candidate.confidence).as_str(),
                candidate.method.as_str(),
                &candidate.extractor,
                &candidate.span.start.to_string(),
                &candidate.span.end.to_string(),
                &candidate.low_confidence.to_string(),
            ])?;
        }
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn profile_csv(profile: &ProfileSnapshot) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["path", "value", "confidence", "low_confidence"])?;

    for slot in PersonalSlot::ALL {
        if let Some(field) = profile.personal_info.slot(slot) {
            let path = format!("personal_info.{}", slot.as_str());
            write_field(&mut wtr, &path, field)?;
        }
    }
    write_list(&mut wtr, "experiences", &profile.experiences)?;
    write_list(&mut wtr, "education", &profile.education)?;
    write_list(&mut wtr, "skills", &profile.skills)?;
    write_list(&mut wtr, "soft_skills", &profile.soft_skills)?;
    write_list(&mut wtr, "languages", &profile.languages)?;
    write_list(&mut wtr, "projects", &profile.projects)?;
    write_list(&mut wtr, "certifications", &profile.certifications)?;
    write_list(&mut wtr, "publications", &profile.publications)?;
    write_list(&mut wtr, "volunteering", &profile.volunteering)?;
    write_list(&mut wtr, "awards", &profile.awards)?;
    write_list(&mut wtr, "references", &profile.references)?;
    write_list(&mut wtr, "interests", &profile.interests)?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn write_list<T: serde::Serialize>(
    wtr: &mut csv::Writer<Vec<u8>>,
    name: &str,
    fields: &[ProfileField<T>],
) -> anyhow::Result<()> {
    for (i, field) in fields.iter().enumerate() {
        write_field(wtr, &format!("{}[{}]", name, i), field)?;
    }
    Ok(())
}

fn write_field<T: serde::Serialize>(
    wtr: &mut csv::Writer<Vec<u8>>,
    path: &str,
    field: &ProfileField<T>,
) -> anyhow::Result<()> {
    let value = match serde_json::to_value(&field.value)? {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    };
    wtr.write_record([
        path,
        &value,
        &format!("{:.2}", field.confidence),
        &field.low_confidence.to_string(),
    ])?;
    Ok(())
}

fn result_text(result: &ExtractionResult) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Document: {} ({}, language {})\n",
        result.source_id, result.format, result.language.code
    ));
    output.push_str(&format!("Mode: {}\n", result.metadata.ai_mode));

    for section in &result.sections {
        output.push('\n');
        match &section.heading {
            Some(heading) => output.push_str(&format!(
                "[{}] {} ({:.2})\n",
                section.kind, heading, section.label_confidence
            )),
            None => output.push_str(&format!("[{}]\n", section.kind)),
        }
        for candidate in &section.candidates {
            let flag = if candidate.low_confidence { " ?" } else { "" };
            output.push_str(&format!(
                "  {}: {}  {:.2} {}{}\n",
                candidate.field,
                candidate.value_text(),
                candidate.confidence,
                candidate.method,
                flag
            ));
        }
    }

    output
}

fn profile_text(profile: &ProfileSnapshot, completion_rate: f32) -> String {
    let mut output = String::new();

    for slot in PersonalSlot::ALL {
        if let Some(field) = profile.personal_info.slot(slot) {
            output.push_str(&format!("{}: {}\n", slot.as_str(), field.value));
        }
    }

    if !profile.experiences.is_empty() {
        output.push_str("\nExperiences:\n");
        for entry in &profile.experiences {
            let e = &entry.value;
            let head = [e.title.as_deref(), e.company.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(", ");
            match &e.period {
                Some(period) => output.push_str(&format!("  - {} ({})\n", head, period)),
                None => output.push_str(&format!("  - {}\n", head)),
            }
        }
    }

    if !profile.education.is_empty() {
        output.push_str("\nEducation:\n");
        for entry in &profile.education {
            let e = &entry.value;
            let head = [e.degree.as_deref(), e.institution.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(", ");
            match &e.period {
                Some(period) => output.push_str(&format!("  - {} ({})\n", head, period)),
                None => output.push_str(&format!("  - {}\n", head)),
            }
        }
    }

    let joined = |fields: &[ProfileField<String>]| {
        fields.iter().map(|f| f.value.as_str()).collect::<Vec<_>>().join(", ")
    };
    if !profile.skills.is_empty() {
        output.push_str(&format!("\nSkills: {}\n", joined(&profile.skills)));
    }
    if !profile.soft_skills.is_empty() {
        output.push_str(&format!("Soft skills: {}\n", joined(&profile.soft_skills)));
    }

    if !profile.languages.is_empty() {
        let languages: Vec<String> = profile
            .languages
            .iter()
            .map(|f| match (&f.value.cefr, &f.value.level) {
                (Some(cefr), _) => format!("{} ({})", f.value.language, cefr),
                (None, Some(level)) => format!("{} ({})", f.value.language, level),
                (None, None) => f.value.language.clone(),
            })
            .collect();
        output.push_str(&format!("Languages: {}\n", languages.join(", ")));
    }

    if !profile.interests.is_empty() {
        output.push_str(&format!("Interests: {}\n", joined(&profile.interests)));
    }

    output.push_str(&format!("\nCompletion: {:.0}%\n", completion_rate * 100.0));
    output
}
