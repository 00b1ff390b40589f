#![allow(deprecated)]

#[allow(unused_imports)]
use assert_cmd::cargo::CommandCargoExt;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn cmd(temp: &TempDir) -> assert_cmd::Command {
    let config = temp.path().join("config.yml");
    if !config.exists() {
        fs::write(&config, "server_url: http://127.0.0.1:9\ntimeout_secs: 1\n").unwrap();
    }
    let mut c = assert_cmd::Command::cargo_bin("grimoire").unwrap();
    c.arg("--config")
        .arg(&config)
        .env("GRIMOIRE_LOG_FILE", temp.path().join("grimoire.log"))
        .env_remove("GRIMOIRE_SERVER")
        .env_remove("RUST_LOG");
    c
}

fn write_env(temp: &TempDir) -> PathBuf {
    let path = temp.path().join("env.json");
    let env = r##"{
        "today": "2026-03-10",
        "csrf_token": "token",
        "tags_data": {"gym": {"color": "#FF0000", "priority": 2}},
        "logs_data": {
            "2026-03-01": {"main": "# hello world\nfirst body", "footnotes": ""},
            "2026-03-02": {"main": "goodbye", "footnotes": null},
            "2026-03-03": {"main": "  ", "footnotes": ""},
            "2026-03-04": {"main": "Late night\n<img src=x onerror=alert(1)>", "footnotes": "late note"}
        }
    }"##;
    fs::write(&path, env).unwrap();
    path
}

#[test]
fn hex_expands_short_form() {
    let temp = TempDir::new().unwrap();
    cmd(&temp)
        .args(["hex", "f50"])
        .assert()
        .success()
        .stdout("#FF5500\n");
    cmd(&temp)
        .args(["hex", "#a1B2c3"])
        .assert()
        .success()
        .stdout("#A1B2C3\n");
}

#[test]
fn hex_rejects_bad_input() {
    let temp = TempDir::new().unwrap();
    cmd(&temp)
        .args(["hex", "#12"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("valid hex code"));
}

#[test]
fn swatches_prints_eight_colors() {
    let temp = TempDir::new().unwrap();
    let output = cmd(&temp)
        .args(["swatches", "--tier", "bold", "--hue", "red"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 8);
    for line in lines {
        assert_eq!(line.len(), 7);
        assert!(line.starts_with('#'));
        assert!(line[1..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }
}

#[test]
fn swatches_rejects_unknown_tier() {
    let temp = TempDir::new().unwrap();
    cmd(&temp)
        .args(["swatches", "--tier", "neon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown tier"));
}

#[test]
fn journal_from_file_lists_newest_first() {
    let temp = TempDir::new().unwrap();
    let env = write_env(&temp);
    let output = cmd(&temp)
        .args(["journal", "--from"])
        .arg(&env)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let dates: Vec<&str> = stdout
        .lines()
        .map(|l| l.split_whitespace().next().unwrap_or_default())
        .collect();
    assert_eq!(dates, vec!["2026-03-04", "2026-03-02", "2026-03-01"]);
    assert!(stdout.contains("2026-03-01  hello world"));
    assert!(stdout.contains("2026-03-04  Late night"));
}

#[test]
fn journal_query_filters_cards() {
    let temp = TempDir::new().unwrap();
    let env = write_env(&temp);
    cmd(&temp)
        .args(["journal", "--query", "wor", "--from"])
        .arg(&env)
        .assert()
        .success()
        .stdout(predicate::str::contains("hello world"))
        .stdout(predicate::str::contains("goodbye").not());
}

#[test]
fn journal_html_is_sanitized() {
    let temp = TempDir::new().unwrap();
    let env = write_env(&temp);
    cmd(&temp)
        .args(["journal", "--html", "--from"])
        .arg(&env)
        .assert()
        .success()
        .stdout(predicate::str::contains("Chronicle Addendum"))
        .stdout(predicate::str::contains("onerror").not());
}

#[test]
fn init_writes_config_once() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("grimoire.yml");
    let mut first = assert_cmd::Command::cargo_bin("grimoire").unwrap();
    first
        .arg("--config")
        .arg(&path)
        .arg("init")
        .env("GRIMOIRE_LOG_FILE", temp.path().join("grimoire.log"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default config"));
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("127.0.0.1:5000"));

    let mut second = assert_cmd::Command::cargo_bin("grimoire").unwrap();
    second
        .arg("--config")
        .arg(&path)
        .arg("init")
        .env("GRIMOIRE_LOG_FILE", temp.path().join("grimoire.log"))
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn unreachable_server_reports_connection_error() {
    let temp = TempDir::new().unwrap();
    cmd(&temp)
        .args(["tag", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("connecting to http://127.0.0.1:9"));
}
