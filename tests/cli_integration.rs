use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn ingest() -> Command {
    let mut cmd = Command::cargo_bin("ddalab-ingest").unwrap();
    cmd.env_remove("INGEST_STREAMS_FILE")
        .env_remove("INGEST_DRAIN_INTERVAL_SECS")
        .env_remove("INGEST_DRAIN_BATCH");
    cmd
}

fn streams_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const VALID: &str = r#"[
    {"name": "ticks", "source_kind": "websocket", "endpoint": "ws://127.0.0.1:9000/feed"},
    {"name": "lines", "source_kind": "socket", "endpoint": "tcp://127.0.0.1:9001"},
    {"name": "sensor", "source_kind": "api_polling", "endpoint": "http://127.0.0.1:9/api",
     "update_interval": 10}
]"#;

// =============================================================================
// GENERAL
// =============================================================================

#[test]
fn test_no_args_shows_help() {
    ingest()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    ingest()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ddalab-ingest"));
}

// =============================================================================
// VALIDATE SUBCOMMAND
// =============================================================================

#[test]
fn test_validate_accepts_good_file() {
    let file = streams_file(VALID);
    ingest()
        .args(["validate", "--streams"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("ok    ticks (websocket"))
        .stdout(predicate::str::contains("ok    lines (tcp"))
        .stdout(predicate::str::contains("3 of 3 stream(s) valid"));
}

#[test]
fn test_validate_json_output() {
    let file = streams_file(VALID);
    let output = ingest()
        .args(["validate", "--json", "--streams"])
        .arg(file.path())
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let verdicts = parsed.as_array().unwrap();
    assert_eq!(verdicts.len(), 3);
    assert_eq!(verdicts[2]["source_kind"], "polling");
    assert_eq!(verdicts[2]["transport"], "http");
    assert!(verdicts.iter().all(|v| v["valid"] == true));
}

#[test]
fn test_validate_reports_bad_streams() {
    let file = streams_file(
        r#"[
            {"name": "a", "source_kind": "socket", "endpoint": "udp://127.0.0.1:1"},
            {"name": "b", "source_kind": "polling", "endpoint": "http://h/x", "buffer_capacity": 0}
        ]"#,
    );
    ingest()
        .args(["validate", "--streams"])
        .arg(file.path())
        .assert()
        .code(2)
        .stdout(predicate::str::contains("FAIL  a"))
        .stdout(predicate::str::contains("FAIL  b"))
        .stdout(predicate::str::contains("0 of 2"));
}

#[test]
fn test_validate_unreadable_input() {
    ingest()
        .args(["validate", "--streams", "/nonexistent/streams.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to read"));

    let garbage = streams_file("{ not a list");
    ingest()
        .args(["validate", "--streams"])
        .arg(garbage.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to parse"));
}

#[test]
fn test_validate_streams_file_from_env() {
    let file = streams_file(VALID);
    ingest()
        .env("INGEST_STREAMS_FILE", file.path())
        .arg("validate")
        .assert()
        .success();
}

#[test]
fn test_validate_without_streams_file() {
    ingest()
        .arg("validate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("INGEST_STREAMS_FILE"));
}

// =============================================================================
// WATCH SUBCOMMAND
// =============================================================================

#[test]
fn test_watch_rejects_bad_alert() {
    let file = streams_file(VALID);
    ingest()
        .args(["watch", "--alert", "temperature:hot:100", "--streams"])
        .arg(file.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not a number"));
}

#[test]
fn test_watch_rejects_invalid_streams() {
    let file = streams_file(
        r#"[{"name": "a", "source_kind": "polling", "endpoint": "ws://h/x"}]"#,
    );
    ingest()
        .args(["watch", "--duration", "1", "--streams"])
        .arg(file.path())
        .assert()
        .code(2);
}

#[test]
fn test_watch_runs_for_duration() {
    // Nothing listens on port 9; the stream keeps polling and reports empty drains
    let file = streams_file(
        r#"[{"name": "probe", "source_kind": "polling", "endpoint": "http://127.0.0.1:9/x",
             "update_interval": 1, "read_timeout": 1}]"#,
    );
    ingest()
        .args(["watch", "--interval", "1", "--duration", "2", "--streams"])
        .arg(file.path())
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""stream":"probe""#))
        .stdout(predicate::str::contains(r#""state":"running""#));
}

#[test]
fn test_watch_uses_drain_interval_from_env() {
    let file = streams_file(
        r#"[{"name": "env_tick", "source_kind": "polling", "endpoint": "http://127.0.0.1:9/x",
             "update_interval": 1, "read_timeout": 1}]"#,
    );
    ingest()
        .env("INGEST_DRAIN_INTERVAL_SECS", "1")
        .args(["watch", "--duration", "2", "--streams"])
        .arg(file.path())
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""stream":"env_tick""#));
}

#[test]
fn test_watch_rejects_zero_interval() {
    let file = streams_file(VALID);
    ingest()
        .args(["watch", "--interval", "0", "--duration", "1", "--streams"])
        .arg(file.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("at least 1"));
}
