use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const SNAPSHOT: &str = r###"{
  "file": {
    "name": "report.pdf",
    "type": "application/pdf",
    "base64": "data:application/pdf;base64,JVBERi0xLjQ="
  },
  "sections": [
    { "id": "section-0", "title": "Intro", "summary": "Opening." },
    { "id": "section-1", "title": "Methods", "summary": "Sampling." }
  ],
  "selectedSectionId": null,
  "notes": { "section-0": "## Intro\n- point one" },
  "isDarkMode": false
}"###;

fn orbit_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("orbit");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[ai]
api_key_env = "NOTEORBIT_CLI_TEST_MISSING_KEY"

[storage]
state_dir = "{}/data"

[ui]
prefer_dark = false
"#,
        root.display()
    );

    let config_path = config_dir.join("orbit.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

/// Same as `setup_test_env` with a document already analyzed.
fn setup_loaded_env() -> (TempDir, PathBuf) {
    let (tmp, config_path) = setup_test_env();
    let data_dir = tmp.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(data_dir.join("noteorbit_session.json"), SNAPSHOT).unwrap();
    (tmp, config_path)
}

fn run_orbit(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = orbit_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("NOTEORBIT_CLI_TEST_MISSING_KEY")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run orbit binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_status_on_empty_session() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_orbit(&config_path, &["status"]);
    assert!(success, "status failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("document: none"));
    assert!(stdout.contains("sections: 0"));
    assert!(stdout.contains("theme: light"));
    assert!(stdout.contains("model: gemini-3-pro-preview"));
}

#[test]
fn test_missing_config_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let (stdout, stderr, success) = run_orbit(&missing, &["--help"]);
    assert!(success, "help failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("upload"));
    assert!(stdout.contains("serve"));
}

#[test]
fn test_theme_toggle_persists() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_orbit(&config_path, &["theme"]);
    assert!(success);
    assert!(stdout.contains("Theme: dark"));

    let (stdout, _, _) = run_orbit(&config_path, &["status"]);
    assert!(stdout.contains("theme: dark"));
}

#[test]
fn test_upload_rejects_unsupported_type() {
    let (tmp, config_path) = setup_test_env();
    let path = tmp.path().join("notes.txt");
    fs::write(&path, "plain text").unwrap();

    let (_, stderr, success) = run_orbit(&config_path, &["upload", path.to_str().unwrap()]);
    assert!(!success);
    assert!(
        stderr.contains("Invalid file type. Please upload a PDF, JPG, or PNG image."),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_upload_without_key_reports_configuration() {
    let (tmp, config_path) = setup_test_env();
    let path = tmp.path().join("report.pdf");
    fs::write(&path, b"%PDF-1.4").unwrap();

    let (_, stderr, success) = run_orbit(&config_path, &["upload", path.to_str().unwrap()]);
    assert!(!success);
    assert!(
        stderr.contains("API Key is missing. Please check your environment configuration."),
        "stderr: {}",
        stderr
    );

    let (stdout, _, _) = run_orbit(&config_path, &["status"]);
    assert!(stdout.contains("document: none"));
}

#[test]
fn test_sections_lists_index() {
    let (_tmp, config_path) = setup_loaded_env();

    let (stdout, stderr, success) = run_orbit(&config_path, &["sections"]);
    assert!(success, "sections failed: {}", stderr);
    assert!(stdout.contains("1. [section-0] Intro"));
    assert!(stdout.contains("2. [section-1] Methods"));

    let (stdout, _, _) = run_orbit(&config_path, &["sections", "--search", "SAMPL"]);
    assert!(!stdout.contains("Intro"));
    assert!(stdout.contains("2. [section-1] Methods"));

    let (stdout, _, _) = run_orbit(&config_path, &["sections", "--search", "zzz"]);
    assert!(stdout.contains("No results for \"zzz\""));
}

#[test]
fn test_notes_uses_cache_without_key() {
    let (_tmp, config_path) = setup_loaded_env();

    let (stdout, stderr, success) =
        run_orbit(&config_path, &["notes", "section-0", "--find", "point"]);
    assert!(success, "notes failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(stdout, "# Intro\n\n## Intro\n- [[point]] one\n");

    let (stdout, _, _) = run_orbit(&config_path, &["status"]);
    assert!(stdout.contains("selected: section-0"));
    assert!(stdout.contains("notes cached: 1"));
}

#[test]
fn test_notes_for_unknown_section_fails() {
    let (_tmp, config_path) = setup_loaded_env();

    let (_, stderr, success) = run_orbit(&config_path, &["notes", "section-9"]);
    assert!(!success);
    assert!(stderr.contains("No section with id 'section-9'"));
}

#[test]
fn test_uncached_notes_without_key_fail() {
    let (_tmp, config_path) = setup_loaded_env();

    let (_, stderr, success) = run_orbit(&config_path, &["notes", "section-1"]);
    assert!(!success);
    assert!(stderr.contains("API Key is missing"));
}

#[test]
fn test_download_writes_original_bytes() {
    let (tmp, config_path) = setup_loaded_env();
    let out = tmp.path().join("copy.pdf");

    let (stdout, stderr, success) = run_orbit(
        &config_path,
        &["download", "--output", out.to_str().unwrap()],
    );
    assert!(success, "download failed: {}", stderr);
    assert!(stdout.contains("8 bytes"));
    assert_eq!(fs::read(&out).unwrap(), b"%PDF-1.4");
}

#[test]
fn test_reset_clears_document_keeps_theme() {
    let (_tmp, config_path) = setup_loaded_env();

    run_orbit(&config_path, &["theme"]);
    let (stdout, _, success) = run_orbit(&config_path, &["reset"]);
    assert!(success);
    assert!(stdout.contains("Session reset."));

    let (stdout, _, _) = run_orbit(&config_path, &["status"]);
    assert!(stdout.contains("document: none"));
    assert!(stdout.contains("notes cached: 0"));
    assert!(stdout.contains("theme: dark"));

    let (_, stderr, success) = run_orbit(&config_path, &["download"]);
    assert!(!success);
    assert!(stderr.contains("No document loaded."));
}
