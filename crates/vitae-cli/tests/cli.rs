use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const RESUME: &[&str] = &[
    "Jane Doe",
    "jane.doe@example.com",
    "+33 6 12 34 56 78",
    "Expérience professionnelle",
    "Développeuse Backend chez Acme",
    "janvier 2020 - présent",
    "Compétences",
    "Rust, PostgreSQL, Docker",
    "Langues",
    "Anglais : courant",
];

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

/// Workspace with an isolated config home and an empty model directory.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("config")).unwrap();
        fs::create_dir_all(dir.path().join("models")).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    fn write_resume(&self, name: &str, paragraphs: &[&str]) -> std::path::PathBuf {
        let path = self.path(name);
        fs::write(&path, docx(paragraphs)).unwrap();
        path
    }

    fn vitae(&self) -> Command {
        let mut cmd = Command::cargo_bin("vitae").unwrap();
        cmd.env("XDG_CONFIG_HOME", self.path("config"))
            .env("HOME", self.dir.path());
        cmd
    }

    fn models(&self) -> String {
        self.path("models").display().to_string()
    }
}

fn arg(path: &Path) -> String {
    path.display().to_string()
}

#[test]
fn help_lists_commands() {
    let ws = Workspace::new();
    ws.vitae()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("merge"));
}

#[test]
fn extract_prints_json_result() {
    let ws = Workspace::new();
    let cv = ws.write_resume("cv.docx", RESUME);

    ws.vitae()
        .args(["extract", &arg(&cv), "--no-ocr", "--language", "fr", "-m", &ws.models()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"source_id\": \"cv.docx\""))
        .stdout(predicate::str::contains("jane.doe@example.com"));
}

#[test]
fn extract_profile_without_provenance() {
    let ws = Workspace::new();
    let cv = ws.write_resume("cv.docx", RESUME);

    ws.vitae()
        .args([
            "extract",
            &arg(&cv),
            "--profile",
            "--no-provenance",
            "--no-ocr",
            "-m",
            &ws.models(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"completion_rate\""))
        .stdout(predicate::str::contains("provenance").not());
}

#[test]
fn extract_csv_has_header() {
    let ws = Workspace::new();
    let cv = ws.write_resume("cv.docx", RESUME);

    ws.vitae()
        .args(["extract", &arg(&cv), "--format", "csv", "--no-ocr", "-m", &ws.models()])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("section,field,value"));
}

#[test]
fn extract_missing_file_fails() {
    let ws = Workspace::new();
    ws.vitae()
        .args(["extract", &arg(&ws.path("nope.pdf"))])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn extract_empty_file_reports_reason() {
    let ws = Workspace::new();
    let empty = ws.path("empty.docx");
    fs::write(&empty, b"").unwrap();

    ws.vitae()
        .args(["extract", &arg(&empty), "--no-ocr", "-m", &ws.models()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("empty_document"));
}

#[test]
fn batch_writes_outputs_and_summary() {
    let ws = Workspace::new();
    let input = ws.path("in");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("a.docx"), docx(RESUME)).unwrap();
    fs::write(input.join("b.docx"), docx(RESUME)).unwrap();
    fs::write(input.join("notes.txt"), "ignored").unwrap();
    let out = ws.path("out");

    ws.vitae()
        .args([
            "batch",
            &format!("{}/*", input.display()),
            "--output-dir",
            &arg(&out),
            "--summary",
            "-j",
            "2",
            "--no-ocr",
            "-m",
            &ws.models(),
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("2 successful"));

    assert!(out.join("a.json").is_file());
    assert!(out.join("b.json").is_file());
    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    assert_eq!(summary.lines().count(), 3);
    assert_eq!(summary.matches(",success,").count(), 2);
}

#[test]
fn batch_continue_on_error() {
    let ws = Workspace::new();
    let input = ws.path("in");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("good.docx"), docx(RESUME)).unwrap();
    fs::write(input.join("bad.docx"), b"").unwrap();

    ws.vitae()
        .args([
            "batch",
            &format!("{}/*.docx", input.display()),
            "--continue-on-error",
            "--no-ocr",
            "-m",
            &ws.models(),
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("1 successful, 1 failed"));
}

#[test]
fn batch_timeout_keeps_outputs() {
    let ws = Workspace::new();
    let input = ws.path("in");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("cv.docx"), docx(RESUME)).unwrap();
    let out = ws.path("out");

    ws.vitae()
        .args([
            "batch",
            &format!("{}/*.docx", input.display()),
            "--output-dir",
            &arg(&out),
            "--timeout",
            "30",
            "--no-ocr",
            "-m",
            &ws.models(),
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("1 successful, 0 failed"));

    let output = fs::read_to_string(out.join("cv.json")).unwrap();
    assert!(output.contains("jane.doe@example.com"));
}

#[test]
fn merge_profile_with_new_resume() {
    let ws = Workspace::new();
    let first = ws.write_resume("v1.docx", RESUME);
    let existing = ws.path("existing.json");

    ws.vitae()
        .args([
            "extract",
            &arg(&first),
            "--profile",
            "--no-ocr",
            "-m",
            &ws.models(),
            "-o",
            &arg(&existing),
        ])
        .assert()
        .success();

    let mut updated = RESUME.to_vec();
    updated[1] = "jane@doe.dev";
    let second = ws.write_resume("v2.docx", &updated);
    let conflicts = ws.path("conflicts.json");

    ws.vitae()
        .args([
            "merge",
            &arg(&existing),
            &arg(&second),
            "--conflicts",
            &arg(&conflicts),
            "--no-ocr",
            "-m",
            &ws.models(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"personal_info\""));

    let records: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&conflicts).unwrap()).unwrap();
    let paths: Vec<&str> = records
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["path"].as_str())
        .collect();
    assert!(paths.contains(&"personal_info.email"));
}

#[test]
fn merge_two_profile_files() {
    let ws = Workspace::new();
    let existing = ws.path("existing.json");
    let incoming = ws.path("incoming.json");
    fs::write(&existing, "{}").unwrap();
    fs::write(
        &incoming,
        r#"{"skills": [{"value": "rust", "confidence": 0.9,
            "provenance": {"source": "cv.pdf", "method": "rule", "extracted_at": "2024-01-01T00:00:00Z"}}]}"#,
    )
    .unwrap();

    ws.vitae()
        .args(["merge", &arg(&existing), &arg(&incoming)])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rust\""))
        .stderr(predicate::str::contains("1 added"));
}

#[cfg(target_os = "linux")]
#[test]
fn config_set_then_get() {
    let ws = Workspace::new();

    ws.vitae()
        .args(["config", "set", "ocr.timeout_secs", "5"])
        .assert()
        .success();
    ws.vitae()
        .args(["config", "get", "ocr.timeout_secs"])
        .assert()
        .success()
        .stdout(predicate::str::diff("5\n"));
    ws.vitae()
        .args(["config", "set", "ocr.no_such_key", "1"])
        .assert()
        .failure();
    assert!(ws.path("config/vitae/config.json").is_file());
}

#[test]
fn info_reports_missing_models() {
    let ws = Workspace::new();
    ws.vitae()
        .args(["info", "--json", "-m", &ws.models()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"docx\""))
        .stdout(predicate::str::contains("\"available\": false"));
}
