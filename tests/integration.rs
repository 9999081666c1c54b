use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn lexassist_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("lexassist");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let corpus = root.join("corpus");
    fs::create_dir_all(corpus.join("labour")).unwrap();
    fs::create_dir_all(corpus.join("property")).unwrap();
    fs::write(
        corpus.join("labour").join("wages.md"),
        "# Minimum Wages\n\nEvery employer shall pay wages not less than the minimum rate.\n\nArrears are recoverable before the authority.",
    )
    .unwrap();
    fs::write(
        corpus.join("property").join("tenancy.txt"),
        "A landlord shall return the security deposit within one month of vacating.\n\nDeductions require an itemised statement.",
    )
    .unwrap();
    fs::write(
        corpus.join("notes.txt"),
        "General notes on limitation periods for civil suits.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/index.sqlite"

[server]
bind = "127.0.0.1:7341"

[classifier]
path = "{root}/models/missing.json"

[llm]
provider = "disabled"

[corpus]
root = "{root}/corpus"
include_globs = ["**/*.md", "**/*.txt"]
"#,
        root = root.display()
    );

    let config_path = config_dir.join("lexassist.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_lexassist(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = lexassist_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run lexassist binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_lexassist(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/index.sqlite").exists());

    let (_, _, again) = run_lexassist(&config_path, &["init"]);
    assert!(again, "second init failed (not idempotent)");
}

#[test]
fn test_index_build_without_embeddings() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_lexassist(&config_path, &["index", "build"]);
    assert!(success, "index build failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("scanned: 3 files"));
    assert!(stdout.contains("upserted documents: 3"));
    assert!(!stdout.contains("embeddings written"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_index_build_incremental() {
    let (tmp, config_path) = setup_test_env();

    run_lexassist(&config_path, &["index", "build"]);
    let (stdout, _, success) = run_lexassist(&config_path, &["index", "build"]);
    assert!(success);
    assert!(stdout.contains("upserted documents: 0"));
    assert!(stdout.contains("unchanged documents: 3"));

    fs::remove_file(tmp.path().join("corpus/notes.txt")).unwrap();
    let (stdout, _, success) = run_lexassist(&config_path, &["index", "build"]);
    assert!(success);
    assert!(stdout.contains("removed documents: 1"));

    let (stdout, _, success) = run_lexassist(&config_path, &["index", "build", "--full"]);
    assert!(success);
    assert!(stdout.contains("index build (full)"));
    assert!(stdout.contains("upserted documents: 2"));
}

#[test]
fn test_index_sources_lists_categories() {
    let (_tmp, config_path) = setup_test_env();

    run_lexassist(&config_path, &["index", "build"]);
    let (stdout, stderr, success) = run_lexassist(&config_path, &["index", "sources"]);
    assert!(success, "sources failed: {}", stderr);
    let wages = stdout.lines().find(|l| l.starts_with("wages.md")).unwrap();
    assert!(wages.contains("labour"));
    let notes = stdout.lines().find(|l| l.starts_with("notes.txt")).unwrap();
    assert!(notes.contains("general"));
}

#[test]
fn test_search_requires_index() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_lexassist(&config_path, &["search", "minimum wages"]);
    assert!(!success);
    assert!(stderr.contains("Index database not found"), "stderr={}", stderr);
}

#[test]
fn test_search_errors_when_embeddings_disabled() {
    let (_tmp, config_path) = setup_test_env();

    run_lexassist(&config_path, &["index", "build"]);
    let (_, stderr, success) = run_lexassist(&config_path, &["search", "minimum wages"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr={}", stderr);
}

#[test]
fn test_predict_requires_classifier_artifact() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_lexassist(
        &config_path,
        &["predict", "The tenant shall indemnify the landlord."],
    );
    assert!(!success);
    assert!(stderr.contains("Classifier model file not found"), "stderr={}", stderr);
}

#[test]
fn test_serve_fails_without_classifier() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_lexassist(&config_path, &["serve"]);
    assert!(!success);
    assert!(stderr.contains("Classifier model file not found"), "stderr={}", stderr);
}

#[test]
fn test_advice_validates_situation() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_lexassist(&config_path, &["advice", "too short"]);
    assert!(!success);
    assert!(stderr.contains("at least 10 characters"), "stderr={}", stderr);
}

#[test]
fn test_will_errors_when_llm_disabled() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_lexassist(
        &config_path,
        &["will", "I am Ravi Verma, 62, of Pune. My wife Sita inherits everything."],
    );
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr={}", stderr);
}

#[test]
fn test_lawyers_filters() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_lexassist(&config_path, &["lawyers"]);
    assert!(success, "lawyers failed: {}", stderr);
    assert!(stdout.contains("Rajesh Kumar"));
    assert!(stdout.contains("Meera Reddy"));

    let (stdout, _, success) = run_lexassist(
        &config_path,
        &["lawyers", "--city", "Mumbai", "--language", "Marathi"],
    );
    assert!(success);
    assert!(stdout.contains("Priya Sharma"));
    assert!(!stdout.contains("Rajesh Kumar"));

    let (stdout, _, success) = run_lexassist(&config_path, &["lawyers", "--min-rating", "5"]);
    assert!(success);
    assert!(stdout.contains("No lawyers match."));
}

#[test]
fn test_summarize_empty_file() {
    let (tmp, config_path) = setup_test_env();
    let empty = tmp.path().join("empty.txt");
    fs::write(&empty, "   \n").unwrap();

    let (_, stderr, success) = run_lexassist(&config_path, &["summarize", empty.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("No text provided"), "stderr={}", stderr);
}

#[test]
fn test_missing_config_errors() {
    let (tmp, _) = setup_test_env();
    let (_, stderr, success) = run_lexassist(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr={}", stderr);
}
