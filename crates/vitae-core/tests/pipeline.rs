use std::io::{Cursor, Write};

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use vitae_core::error::LoaderErrorReason;
use vitae_core::models::{ConflictDecision, ExtractionMethod, PersonalSlot};
use vitae_core::{
    CancellationToken, Document, DocumentFormat, FieldName, Pipeline, SectionKind, VitaeConfig,
};
use zip::write::SimpleFileOptions;

fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

fn pipeline(models: &TempDir) -> Pipeline {
    let mut config = VitaeConfig::default();
    config.models.model_dir = models.path().to_path_buf();
    config.ocr.enabled = false;
    Pipeline::new(config).unwrap()
}

const FRENCH_RESUME: &[&str] = &[
    "Marie Curie",
    "Ingénieure logiciel",
    "marie.curie@example.fr",
    "06 12 34 56 78",
    "Expérience professionnelle",
    "Ingénieure Backend chez Acme",
    "janvier 2020 - présent",
    "Conception d'API en Rust",
    "Formation",
    "Master Informatique",
    "Université de Lyon",
    "2015 - 2017",
    "Compétences",
    "Rust, Python, PostgreSQL",
    "Langues",
    "Anglais : courant",
    "Espagnol : B1",
];

#[test]
fn extracts_french_resume() {
    let models = TempDir::new().unwrap();
    let doc = Document::new("marie.docx", docx(FRENCH_RESUME), Some(DocumentFormat::Docx))
        .with_language("fr");
    let result = pipeline(&models)
        .extract(&doc, &CancellationToken::new())
        .unwrap();

    assert_eq!(result.source_id, "marie.docx");
    for kind in [
        SectionKind::PersonalInfo,
        SectionKind::Experiences,
        SectionKind::Education,
        SectionKind::Skills,
        SectionKind::Languages,
    ] {
        assert!(result.has_section(kind), "missing {:?}", kind);
    }

    let emails: Vec<_> = result
        .candidates()
        .filter(|c| c.field == FieldName::Email)
        .collect();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].method, ExtractionMethod::Rule);
    assert_eq!(emails[0].value_text(), "marie.curie@example.fr");
}

#[test]
fn sections_partition_blocks() {
    let models = TempDir::new().unwrap();
    let doc = Document::new("marie.docx", docx(FRENCH_RESUME), None).with_language("fr");
    let result = pipeline(&models)
        .extract(&doc, &CancellationToken::new())
        .unwrap();

    let mut next = 0;
    for section in &result.sections {
        assert_eq!(section.blocks.start, next);
        assert!(section.blocks.end > section.blocks.start);
        next = section.blocks.end;
    }
    assert_eq!(next, result.blocks.len());
}

#[test]
fn candidates_stay_in_their_section() {
    let models = TempDir::new().unwrap();
    let doc = Document::new("marie.docx", docx(FRENCH_RESUME), None).with_language("fr");
    let result = pipeline(&models)
        .extract(&doc, &CancellationToken::new())
        .unwrap();

    for section in &result.sections {
        for candidate in &section.candidates {
            assert!(section.span.contains(&candidate.span), "{:?}", candidate);
            assert!((0.0..=1.0).contains(&candidate.confidence));
        }
    }
}

#[test]
fn empty_document_is_rejected() {
    let models = TempDir::new().unwrap();
    let doc = Document::new("blank.docx", docx(&[]), None);
    let err = pipeline(&models)
        .extract(&doc, &CancellationToken::new())
        .unwrap_err();
    assert_eq!(err.loader_reason(), Some(LoaderErrorReason::EmptyDocument));
}

#[test]
fn maps_profile_and_merges_update() {
    let models = TempDir::new().unwrap();
    let pipeline = pipeline(&models);
    let cancel = CancellationToken::new();

    let first = Document::new("v1.docx", docx(FRENCH_RESUME), None).with_language("fr");
    let (_, existing) = pipeline.process(&first, &cancel).unwrap();
    let existing = existing.profile;
    assert_eq!(
        existing.personal_info.email.as_ref().map(|f| f.value.as_str()),
        Some("marie.curie@example.fr")
    );
    let job = &existing.experiences[0].value;
    assert_eq!(job.title.as_deref(), Some("Ingénieure Backend"));
    assert_eq!(job.company.as_deref(), Some("Acme"));
    assert!(existing.skills.iter().any(|s| s.value == "rust"));

    let mut updated: Vec<&str> = FRENCH_RESUME.to_vec();
    updated[2] = "marie@curie.dev";
    let second = Document::new("v2.docx", docx(&updated), None).with_language("fr");
    let (_, incoming) = pipeline.process(&second, &cancel).unwrap();

    let merged = pipeline.merge(&incoming.profile, &existing);
    let email_conflicts: Vec<_> = merged
        .conflicts
        .iter()
        .filter(|c| c.path == format!("personal_info.{}", PersonalSlot::Email.as_str()))
        .collect();
    assert_eq!(email_conflicts.len(), 1);
    assert_ne!(email_conflicts[0].decision, ConflictDecision::FlaggedForReview);
}

#[test]
fn user_edits_are_never_overwritten() {
    let models = TempDir::new().unwrap();
    let pipeline = pipeline(&models);
    let cancel = CancellationToken::new();

    let doc = Document::new("v1.docx", docx(FRENCH_RESUME), None).with_language("fr");
    let (_, mapped) = pipeline.process(&doc, &cancel).unwrap();
    let mut existing = mapped.profile.clone();
    existing.edit_personal(PersonalSlot::Email, "marie@private.fr", chrono::Utc::now());

    let merged = pipeline.merge(&mapped.profile, &existing);
    assert_eq!(
        merged.profile.personal_info.email.as_ref().map(|f| f.value.as_str()),
        Some("marie@private.fr")
    );
    assert!(merged.count(ConflictDecision::FlaggedForReview) >= 1);
}
