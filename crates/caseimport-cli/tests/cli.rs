//! Command-line tests against generated documents.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

fn templates_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../templates")
}

fn cell(text: &str) -> String {
    format!(r#"<w:tc><w:p><w:r><w:t>{text}</w:t></w:r></w:p></w:tc>"#)
}

fn clinic_xml(internal_ref: &str, birthday: &str) -> String {
    let rows = [
        vec!["Medical case report"],
        vec!["Internal ref", internal_ref],
        vec!["Assistance ref", "AS-77"],
        vec!["Assistance", "Global Assist"],
        vec!["Patient", "John Doe"],
        vec!["Birthday", birthday],
        vec!["Visit date", "13.08.2017"],
        vec!["Visit time", "14:05"],
        vec!["Symptoms", "Fever"],
        vec!["Investigation", "blood test"],
        vec!["Recommendation", "Rest"],
        vec!["Doctor", "Dr. Smith"],
        vec!["Gender", "male"],
        vec!["Price", "120.50"],
    ];
    let mut table = String::from("<w:tbl>");
    for row in rows {
        table.push_str("<w:tr>");
        for text in row {
            table.push_str(&cell(text));
        }
        table.push_str("</w:tr>");
    }
    table.push_str("</w:tbl>");
    let diagnostics = format!(
        "<w:tbl><w:tr>{}{}{}</w:tr></w:tbl>",
        cell("Influenza"),
        cell("seasonal"),
        cell("J10")
    );

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{table}{diagnostics}</w:body></w:document>"#
    )
}

fn write_clinic(dir: &Path, name: &str, internal_ref: &str, birthday: &str) -> PathBuf {
    let path = dir.join(name);
    let mut zip = ZipWriter::new(File::create(&path).unwrap());
    zip.start_file("word/document.xml", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(clinic_xml(internal_ref, birthday).as_bytes())
        .unwrap();
    zip.finish().unwrap();
    path
}

/// Temp dir with an empty config file, so the user's own config is never read.
fn workspace() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    fs::write(&config, "{}").unwrap();
    (dir, config)
}

fn caseimport(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("caseimport").unwrap();
    cmd.arg("--config").arg(config);
    cmd
}

#[test]
fn test_templates_list_in_registry_order() {
    let (_dir, config) = workspace();
    caseimport(&config)
        .args(["templates", "list", "--templates"])
        .arg(templates_dir())
        .assert()
        .success()
        .stdout(
            predicate::str::contains("1. clinic-report")
                .and(predicate::str::contains("2. hospital-letter")),
        );
}

#[test]
fn test_templates_validate_bundled_files() {
    let (_dir, config) = workspace();
    caseimport(&config)
        .args(["templates", "validate"])
        .arg(templates_dir().join("10-clinic-report.json"))
        .arg(templates_dir().join("20-hospital-letter.json"))
        .assert()
        .success();
}

#[test]
fn test_import_prints_the_case() {
    let (dir, config) = workspace();
    let document = write_clinic(dir.path(), "case.docx", "REF 001", "1990-01-01");

    caseimport(&config)
        .arg("import")
        .arg(&document)
        .arg("--templates")
        .arg(templates_dir())
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""internal_ref_number": "REF001""#)
                .and(predicate::str::contains("John Doe")),
        );
}

#[test]
fn test_import_explains_failed_rules() {
    let (dir, config) = workspace();
    let document = write_clinic(dir.path(), "case.docx", "REF 001", "not-a-date");

    caseimport(&config)
        .arg("import")
        .arg(&document)
        .arg("--templates")
        .arg(templates_dir())
        .arg("--errors")
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("patient_birthday !== is_date")
                .and(predicate::str::contains("checkpoints !== is_true")),
        );
}

#[test]
fn test_import_log_refuses_second_import() {
    let (dir, config) = workspace();
    let document = write_clinic(dir.path(), "case.docx", "REF 001", "1990-01-01");
    let log = dir.path().join("imports.jsonl");

    let import = |expect_success: bool| {
        let assert = caseimport(&config)
            .arg("import")
            .arg(&document)
            .arg("--templates")
            .arg(templates_dir())
            .arg("--log")
            .arg(&log)
            .assert();
        if expect_success {
            assert.success();
        } else {
            assert
                .failure()
                .stderr(predicate::str::contains("has already been imported"));
        }
    };

    import(true);
    assert!(fs::read_to_string(&log).unwrap().contains("REF001"));
    import(false);
}

#[test]
fn test_batch_writes_records_and_summary() {
    let (dir, config) = workspace();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    fs::create_dir_all(&input).unwrap();
    write_clinic(&input, "a.docx", "A 1", "1990-01-01");
    write_clinic(&input, "b.docx", "B 2", "not-a-date");
    fs::write(input.join("notes.txt"), "ignored").unwrap();

    caseimport(&config)
        .arg("batch")
        .arg(&input)
        .arg("--templates")
        .arg(templates_dir())
        .arg("--output-dir")
        .arg(&output)
        .args(["--summary", "--jobs", "2", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 2 files"));

    let record = fs::read_to_string(output.join("a.json")).unwrap();
    assert!(record.contains(r#""internal_ref_number": "A1""#));
    assert!(!output.join("b.json").exists());

    let summary = fs::read_to_string(output.join("summary.csv")).unwrap();
    assert!(summary.contains("a.docx,imported,clinic-report,A1"));
    assert!(summary.contains("b.docx,unmatched"));
}

#[test]
fn test_batch_keeps_same_named_files_apart() {
    let (dir, config) = workspace();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    fs::create_dir_all(input.join("north")).unwrap();
    fs::create_dir_all(input.join("south")).unwrap();
    write_clinic(&input.join("north"), "case.docx", "N 1", "1990-01-01");
    write_clinic(&input.join("south"), "case.docx", "S 2", "1990-01-01");

    caseimport(&config)
        .arg("batch")
        .arg(&input)
        .arg("--templates")
        .arg(templates_dir())
        .arg("--output-dir")
        .arg(&output)
        .args(["--summary", "--dry-run"])
        .assert()
        .success();

    let north = fs::read_to_string(output.join("north").join("case.json")).unwrap();
    let south = fs::read_to_string(output.join("south").join("case.json")).unwrap();
    assert!(north.contains(r#""internal_ref_number": "N1""#));
    assert!(south.contains(r#""internal_ref_number": "S2""#));
}

#[test]
fn test_batch_continue_on_error_can_be_disabled() {
    let (dir, config) = workspace();
    let input = dir.path().join("in");
    fs::create_dir_all(&input).unwrap();
    write_clinic(&input, "a.docx", "A 1", "1990-01-01");
    fs::write(input.join("broken.docx"), "not a zip archive").unwrap();

    let batch = |extra: &[&str]| {
        let mut cmd = caseimport(&config);
        cmd.arg("batch")
            .arg(&input)
            .arg("--templates")
            .arg(templates_dir())
            .arg("--dry-run")
            .args(extra);
        cmd.assert()
    };

    batch(&[]).success();
    batch(&["--continue-on-error=false"]).failure();
    batch(&["--continue-on-error"]).success();
}

#[test]
fn test_stats_counts_first_fits() {
    let (dir, config) = workspace();
    write_clinic(dir.path(), "a.docx", "A 1", "1990-01-01");
    write_clinic(dir.path(), "b.docx", "B 2", "1990-01-01");
    write_clinic(dir.path(), "c.docx", "C 3", "not-a-date");

    caseimport(&config)
        .arg("stats")
        .arg(dir.path())
        .arg("--templates")
        .arg(templates_dir())
        .arg("--show-unmatched")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("2 of 3 files importable")
                .and(predicate::str::contains("c.docx")),
        );
}

#[test]
fn test_inspect_resolves_a_path() {
    let (dir, config) = workspace();
    let document = write_clinic(dir.path(), "case.docx", "REF 001", "1990-01-01");

    caseimport(&config)
        .arg("inspect")
        .arg(&document)
        .args(["--path", "0,1,1", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""REF 001""#));
}

#[test]
fn test_config_set_and_get() {
    let (_dir, config) = workspace();

    caseimport(&config)
        .args(["config", "set", "batch.jobs", "8"])
        .assert()
        .success();
    caseimport(&config)
        .args(["config", "get", "batch.jobs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("8"));
    caseimport(&config)
        .args(["config", "get", "batch.nope"])
        .assert()
        .failure();
}
