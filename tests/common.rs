//! Code shared by the integration tests.
use assert_cmd::cargo_bin_cmd;
use esom::store::Store;
use std::fs;
use std::path::{Path, PathBuf};

/// SQL which populates a store with a small single-region model
const SIMPLE_MODEL_SQL: &str = include_str!("data/simple.sql");

#[allow(dead_code)]
pub fn assert_esom_runs(args: &[&str]) {
    cargo_bin_cmd!("esom")
        .env("ESOM_USE_DEFAULT_SETTINGS", "1")
        .args(args)
        .assert()
        .success();
}

#[allow(dead_code)]
pub fn assert_esom_fails(args: &[&str]) {
    cargo_bin_cmd!("esom")
        .env("ESOM_USE_DEFAULT_SETTINGS", "1")
        .args(args)
        .assert()
        .failure();
}

#[allow(dead_code)]
pub fn get_esom_stdout(args: &[&str]) -> String {
    let output = cargo_bin_cmd!("esom")
        .env("ESOM_USE_DEFAULT_SETTINGS", "1")
        .args(args)
        .output()
        .unwrap();
    assert!(output.status.success());

    String::from_utf8(output.stdout).unwrap()
}

/// Create a database holding the simple model in `dir`
#[allow(dead_code)]
pub fn create_simple_model(dir: &Path, file_name: &str) -> PathBuf {
    let path = dir.join(file_name);
    let store = Store::create(&path).unwrap();
    store.conn().execute_batch(SIMPLE_MODEL_SQL).unwrap();
    path
}

/// Write a run configuration for the simple model to `dir`, returning its path.
///
/// `extra` is appended to the file as is.
#[allow(dead_code)]
pub fn write_config(dir: &Path, mode: &str, extra: &str) -> PathBuf {
    create_simple_model(dir, "model.sqlite");
    let path = dir.join("config.toml");
    fs::write(
        &path,
        format!(
            "scenario = \"test\"\ninput_database = \"model.sqlite\"\nmode = \"{mode}\"\n{extra}"
        ),
    )
    .unwrap();
    path
}
