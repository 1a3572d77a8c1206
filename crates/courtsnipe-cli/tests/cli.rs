use assert_cmd::Command;
use predicates::str::{contains, starts_with};
use tempfile::TempDir;

fn courtsnipe(home: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("courtsnipe"));
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env_remove("COURTSNIPE_CONFIG")
        .env_remove("COURTSNIPE_PASSWORD");
    cmd
}

#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    courtsnipe(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("courtsnipe"))
        .stdout(contains("book"))
        .stdout(contains("doctor"));
}

#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    courtsnipe(&home).arg("--version").assert().success();
}

#[test]
fn test_cli_completions() {
    let home = TempDir::new().unwrap();
    courtsnipe(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(starts_with("_courtsnipe"));
}

#[test]
fn test_book_help_lists_overrides() {
    let home = TempDir::new().unwrap();
    courtsnipe(&home)
        .args(["book", "--help"])
        .assert()
        .success()
        .stdout(contains("--offset"))
        .stdout(contains("--dry-run"))
        .stdout(contains("--headed"));
}

#[test]
fn test_config_path_honours_flag() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("snipe.toml");
    courtsnipe(&home)
        .arg("--config")
        .arg(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(contains("snipe.toml"));
}

#[test]
fn test_config_init_writes_template_once() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("nested").join("config.toml");

    courtsnipe(&home)
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .success();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("[portal]"));
    assert!(written.contains("execution_time"));

    courtsnipe(&home)
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(contains("already exists"));
}

#[test]
fn test_book_without_config_suggests_init() {
    let home = TempDir::new().unwrap();
    courtsnipe(&home)
        .arg("--config")
        .arg(home.path().join("missing.toml"))
        .args(["book", "--dry-run"])
        .assert()
        .failure()
        .stderr(contains("Config file not found"))
        .stderr(contains("courtsnipe config init"));
}

#[test]
fn test_book_rejects_unknown_location_before_launching() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("config.toml");
    courtsnipe(&home)
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .success();

    courtsnipe(&home)
        .arg("--config")
        .arg(&path)
        .args(["book", "--dry-run", "--location", "Atlantis"])
        .assert()
        .failure()
        .stderr(contains("Unknown location 'Atlantis'"));
}

#[test]
fn test_book_rejects_bad_time() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("config.toml");
    courtsnipe(&home)
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .success();

    courtsnipe(&home)
        .arg("--config")
        .arg(&path)
        .args(["book", "--time", "noonish"])
        .assert()
        .failure()
        .stderr(contains("unrecognised time 'noonish'"));
}
