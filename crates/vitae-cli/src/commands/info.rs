//! Info command - supported inputs and model availability.

use clap::Args;
use console::style;
use serde::Serialize;

use vitae_core::preprocess::supported_languages;
use vitae_core::rules::{Fallback, RoutingTable, TaskRouting};
use vitae_core::{DocumentFormat, ModelRegistry, RuleSet, SectionKind, VitaeConfig};

use super::{load_config, PipelineArgs};

/// Arguments for the info command.
#[derive(Args)]
pub struct InfoArgs {
    /// Print as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Serialize)]
struct Info {
    formats: Vec<&'static str>,
    languages: Vec<&'static str>,
    sections: Vec<&'static str>,
    models: Vec<ModelRoute>,
    ocr_models: bool,
}

#[derive(Serialize)]
struct ModelRoute {
    task: &'static str,
    /// Language code, or `*` for the default route.
    language: String,
    model: String,
    path: String,
    available: bool,
    fallback: Fallback,
}

pub async fn run(args: InfoArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    args.pipeline.apply(&mut config);
    let rules = match &config.models.rules_dir {
        Some(dir) => RuleSet::load_dir(dir)?,
        None => RuleSet::builtin()?,
    };

    let info = collect(&config, &rules.routing);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{}", style("Formats").bold());
    println!("  {}", info.formats.join(", "));
    println!("{}", style("Languages").bold());
    println!("  {}", info.languages.join(", "));
    println!("{}", style("Sections").bold());
    println!("  {}", info.sections.join(", "));
    println!("{}", style("Models").bold());
    for route in &info.models {
        let status = if route.available {
            style("available").green()
        } else if route.fallback == Fallback::Heuristic {
            style("missing (heuristic fallback)").yellow()
        } else {
            style("missing").red()
        };
        println!(
            "  {:<10} {:<4} {:<20} {}",
            route.task, route.language, route.model, status
        );
    }
    println!(
        "  {:<10} {:<4} {:<20} {}",
        "ocr",
        "*",
        config.models.ocr_recognition_model,
        if info.ocr_models {
            style("available").green()
        } else {
            style("missing").red()
        }
    );

    Ok(())
}

fn collect(config: &VitaeConfig, routing: &RoutingTable) -> Info {
    let registry = ModelRegistry::from_config(&config.models);
    let mut models = Vec::new();
    for (task, table) in [("ner", &routing.ner), ("zero_shot", &routing.zero_shot)] {
        for (language, model) in routes(table) {
            let (path, available) = match routing.models.get(&model) {
                Some(spec) => (
                    registry.resolve(spec).display().to_string(),
                    registry.is_available(spec),
                ),
                None => (String::new(), false),
            };
            models.push(ModelRoute {
                task,
                language,
                model,
                path,
                available,
                fallback: table.fallback,
            });
        }
    }

    let ocr_models = [
        &config.models.ocr_detection_model,
        &config.models.ocr_recognition_model,
        &config.models.ocr_dictionary,
    ]
    .iter()
    .all(|name| config.model_path(name.as_str()).is_file());

    Info {
        formats: DocumentFormat::ALL.iter().map(|f| f.as_str()).collect(),
        languages: supported_languages(),
        sections: SectionKind::ALL.iter().map(|k| k.as_str()).collect(),
        models,
        ocr_models,
    }
}

fn routes(table: &TaskRouting) -> Vec<(String, String)> {
    table
        .languages
        .iter()
        .map(|(language, model)| (language.clone(), model.clone()))
        .chain(table.default.iter().map(|model| ("*".to_string(), model.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_reports_missing_models() {
        let mut config = VitaeConfig::default();
        config.models.model_dir = std::env::temp_dir().join("vitae-no-models-here");
        let rules = RuleSet::builtin().unwrap();
        let info = collect(&config, &rules.routing);

        assert!(info.formats.contains(&"docx"));
        assert!(info.sections.contains(&"experiences"));
        assert!(!info.models.is_empty());
        assert!(info.models.iter().all(|m| !m.available));
        assert!(info.models.iter().any(|m| m.language == "*"));
        assert!(!info.ocr_models);
    }
}
