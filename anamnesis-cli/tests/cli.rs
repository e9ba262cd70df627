//! End-to-end tests for the anamnesis binary
//!
//! These build and run the binary, so they are gated behind the
//! `integration` feature flag. Run with:
//!
//! ```sh
//! cargo test -p anamnesis-cli --features integration
//! ```

#![cfg(feature = "integration")]

use std::process::Command;

fn anamnesis(args: &[&str], project_dir: &std::path::Path) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "anamnesis-cli", "--"])
        .args(args)
        .env("ANAMNESIS_PROJECT_CONFIG_DIR", project_dir)
        .env_remove("API_BASE_URL")
        .env_remove("API_MODEL")
        .output()
        .expect("Failed to run anamnesis")
}

#[test]
fn help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    let output = anamnesis(&["--help"], dir.path());

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Structured clinical interviews"));
    assert!(stdout.contains("interview"));
    assert!(stdout.contains("batch"));
    assert!(stdout.contains("results"));
}

#[test]
fn config_show_prints_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let output = anamnesis(&["config", "show"], dir.path());

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[oracle]"));
    assert!(stdout.contains("[interview]"));
    assert!(stdout.contains("max_depth = 3"));
}

#[test]
fn project_config_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[interview]\nscale = \"HAMA\"\n\n[batch]\nmax_concurrency = 2\n",
    )
    .unwrap();

    let output = anamnesis(&["config", "show"], dir.path());

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("scale = \"HAMA\""));
    assert!(stdout.contains("max_concurrency = 2"));
}

#[test]
fn config_path_shows_paths() {
    let dir = tempfile::tempdir().unwrap();
    let output = anamnesis(&["config", "path"], dir.path());

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("User config:"));
    assert!(stdout.contains("Project config:"));
}

#[test]
fn interview_without_scale_files_fails() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        format!(
            "[interview]\nrubric_path = \"{}\"\nquestions_path = \"{}\"\n\n[logging]\ndialog_log_dir = \"{}\"\n",
            dir.path().join("missing-rubrics.json").display(),
            dir.path().join("missing-questions.json").display(),
            dir.path().join("logs").display()
        ),
    )
    .unwrap();

    let output = anamnesis(&["interview", "--no-save"], dir.path());

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing-questions.json"));
}

#[test]
fn results_without_database_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        format!(
            "[batch]\nresults_db = \"{}\"\n",
            dir.path().join("none.db").display()
        ),
    )
    .unwrap();

    let output = anamnesis(&["results"], dir.path());

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No results database"));
}
