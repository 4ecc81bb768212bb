//! Integration tests for CLI commands.
use rstest::rstest;
use tempfile::tempdir;

mod common;
use common::{assert_esom_fails, assert_esom_runs, get_esom_stdout, write_config};

/// Test the `run` command in each mode
#[rstest]
#[case("perfect_foresight")]
#[case("myopic")]
#[case("check")]
fn check_run_command(#[case] mode: &str) {
    let tempdir = tempdir().unwrap();
    let config_path = write_config(tempdir.path(), mode, "");

    // Save results to non-existent directory to check that directory creation works
    let output_dir = tempdir.path().join("results");
    assert_esom_runs(&[
        "run",
        &config_path.to_string_lossy(),
        "--output-dir",
        &output_dir.to_string_lossy(),
    ]);

    assert!(output_dir.join("metadata.toml").is_file());
    assert!(output_dir.join("esom_info.log").is_file());
    assert!(output_dir.join("esom_debug.log").is_file());
}

/// Test that an existing output directory is only reused with `--overwrite`
#[test]
fn check_run_command_overwrite() {
    let tempdir = tempdir().unwrap();
    let config_path = write_config(tempdir.path(), "perfect_foresight", "");
    let config_path = config_path.to_string_lossy();
    let output_dir = tempdir.path().join("results");
    let output_dir = output_dir.to_string_lossy();

    assert_esom_runs(&["run", &config_path, "--output-dir", &output_dir]);
    assert_esom_fails(&["run", &config_path, "--output-dir", &output_dir]);
    assert_esom_runs(&["run", &config_path, "--output-dir", &output_dir, "--overwrite"]);
}

/// Test that invalid configuration is rejected
#[test]
fn check_run_command_bad_config() {
    let tempdir = tempdir().unwrap();
    let config_path = write_config(
        tempdir.path(),
        "myopic",
        "[myopic]\nview_depth = 1\nstep_size = 2\n",
    );
    assert_esom_fails(&[
        "run",
        &config_path.to_string_lossy(),
        "--output-dir",
        &tempdir.path().join("results").to_string_lossy(),
    ]);
}

/// Test the `validate` command
#[test]
fn check_validate_command() {
    let tempdir = tempdir().unwrap();
    let config_path = write_config(tempdir.path(), "perfect_foresight", "");
    assert_esom_runs(&["validate", &config_path.to_string_lossy()]);
}

/// Test the `validate` command fails on orphans in strict mode
#[test]
fn check_validate_command_strict() {
    let tempdir = tempdir().unwrap();
    let config_path = write_config(tempdir.path(), "perfect_foresight", "strict_network = true\n");
    assert_esom_fails(&["validate", &config_path.to_string_lossy()]);
}

/// Test the `save-graphs` command
#[test]
fn check_save_graphs_command() {
    let tempdir = tempdir().unwrap();
    let config_path = write_config(tempdir.path(), "perfect_foresight", "");

    // Save results to non-existent directory to check that directory creation works
    let output_dir = tempdir.path().join("graphs");
    assert_esom_runs(&[
        "save-graphs",
        &config_path.to_string_lossy(),
        "--output-dir",
        &output_dir.to_string_lossy(),
    ]);

    // Check that DOT files were created
    assert!(output_dir.join("network_R1_2020.dot").exists());
    assert!(output_dir.join("network_R1_2020_filtered.dot").exists());
}

/// Test the `settings show-default` command
#[test]
fn check_settings_show_default_command() {
    let stdout = get_esom_stdout(&["settings", "show-default"]);
    assert!(stdout.contains("# log_level = \"info\""));
}

/// Test the `settings show-path` command
#[test]
fn check_settings_show_path_command() {
    let stdout = get_esom_stdout(&["settings", "show-path"]);
    assert!(stdout.trim_end().ends_with("settings.toml"));
}
