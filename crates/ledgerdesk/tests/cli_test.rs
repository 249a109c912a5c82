//! Integration tests for the `ledgerdesk` CLI binary.
//!
//! Argument parsing, help, completions and local commands run without a
//! server; the API-bound cases run against a wiremock ledger.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `ledgerdesk` binary with env isolation.
///
/// Clears all `LEDGERDESK_*` env vars and points config and data
/// directories at `home` so tests never touch the user's real files.
fn ledgerdesk_cmd_in(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("ledgerdesk");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("LEDGERDESK_PROFILE")
        .env_remove("LEDGERDESK_API_URL")
        .env_remove("LEDGERDESK_TOKEN")
        .env_remove("LEDGERDESK_BRANCH")
        .env_remove("LEDGERDESK_OUTPUT")
        .env_remove("LEDGERDESK_INSECURE")
        .env_remove("LEDGERDESK_TIMEOUT")
        .env_remove("LEDGERDESK_REALTIME_URL");
    cmd
}

fn ledgerdesk_cmd() -> assert_cmd::Command {
    ledgerdesk_cmd_in(Path::new("/tmp/ledgerdesk-cli-test-nonexistent"))
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Run a prepared command off the async runtime.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

fn holiday(id: &str, name: &str, date: &str) -> serde_json::Value {
    json!({ "id": id, "name": name, "entry_date": date, "description": "" })
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = ledgerdesk_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    ledgerdesk_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("ledger")
            .and(predicate::str::contains("holidays"))
            .and(predicate::str::contains("vouchers"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    ledgerdesk_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ledgerdesk"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    ledgerdesk_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    ledgerdesk_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = ledgerdesk_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success(), "Expected failure for invalid subcommand");
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_holidays_list_without_api_url() {
    let output = ledgerdesk_cmd().args(["holidays", "list"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(text.contains("No API URL configured"), "{text}");
    assert!(text.contains("ledgerdesk config init"), "{text}");
}

#[test]
fn test_unknown_named_profile() {
    let output = ledgerdesk_cmd()
        .args(["--profile", "staging", "holidays", "list"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("Profile 'staging' not found"));
}

#[test]
fn test_bad_filter_is_a_usage_error() {
    let output = ledgerdesk_cmd()
        .args(["-u", "http://127.0.0.1:9", "holidays", "list", "--filter", "name:like:x"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("unknown filter mode 'like'"));
}

#[test]
fn test_page_and_all_conflict() {
    ledgerdesk_cmd()
        .args(["holidays", "list", "--all", "--page", "2"])
        .assert()
        .failure()
        .code(2);
}

// ── Local commands ──────────────────────────────────────────────────

#[test]
fn test_decode_filter_and_sort() {
    ledgerdesk_cmd()
        .args([
            "decode",
            "--filter",
            "eyJuYW1lIjp7Im1vZGUiOiJjb250YWlucyIsImRhdGFUeXBlIjoidGV4dCIsInZhbHVlIjoieWVhciJ9fQ",
            "--sort",
            "W3siZmllbGQiOiJlbnRyeV9kYXRlIiwiZGlyZWN0aW9uIjoiZGVzYyJ9XQ",
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#"name contains "year" (text)"#)
                .and(predicate::str::contains("1. entry_date desc")),
        );
}

#[test]
fn test_decode_rejects_garbage() {
    ledgerdesk_cmd()
        .args(["decode", "--filter", "not base64!"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_explain_prints_the_search_request() {
    ledgerdesk_cmd()
        .args([
            "-u",
            "http://127.0.0.1:9",
            "holidays",
            "list",
            "--page",
            "3",
            "--page-size",
            "25",
            "--filter",
            "name:contains:year",
            "--sort",
            "entry_date:desc",
            "--explain",
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("GET http://127.0.0.1:9/api/v1/holiday/search")
                .and(predicate::str::contains("pageIndex=2"))
                .and(predicate::str::contains("pageSize=25"))
                .and(predicate::str::contains(
                    r#"filter: {"name":{"mode":"contains","dataType":"text","value":"year"}}"#,
                ))
                .and(predicate::str::contains(
                    r#"sort:   [{"field":"entry_date","direction":"desc"}]"#,
                )),
        );
}

#[test]
fn test_column_preferences_persist() {
    let home = tempfile::tempdir().unwrap();

    ledgerdesk_cmd_in(home.path())
        .args(["columns", "hide", "holiday", "description"])
        .assert()
        .success();
    ledgerdesk_cmd_in(home.path())
        .args(["columns", "order", "holiday", "entry_date", "name"])
        .assert()
        .success();

    ledgerdesk_cmd_in(home.path())
        .args(["-o", "plain", "columns", "show", "holiday"])
        .assert()
        .success()
        .stdout("entry_date\nname\nid\ncreated_by\ncreated_at\n");

    ledgerdesk_cmd_in(home.path())
        .args(["columns", "hide", "holiday", "nope"])
        .assert()
        .failure()
        .code(2);
}

// ── Against a mock ledger ───────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_list_renders_the_requested_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/holiday/search"))
        .and(query_param("pageIndex", "0"))
        .and(query_param("pageSize", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                holiday("h1", "New Year", "2025-01-01"),
                holiday("h2", "Labour Day", "2025-05-01"),
            ],
            "totalSize": 2,
            "totalPage": 1,
            "pageIndex": 0,
            "pageSize": 10
        })))
        .expect(2)
        .mount(&server)
        .await;

    let mut cmd = ledgerdesk_cmd();
    cmd.args(["-u", &server.uri(), "-o", "plain", "holidays", "list"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "h1\nh2\n");

    let mut cmd = ledgerdesk_cmd();
    cmd.args(["-u", &server.uri(), "holidays", "list"]);
    let output = run(cmd).await;
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Labour Day") && stdout.contains("Entry date"), "{stdout}");
    assert!(String::from_utf8_lossy(&output.stderr).contains("Page 1 of 1 (2 total)"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delete_many_sends_one_bulk_request() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/holiday/bulk"))
        .and(body_json(json!({ "ids": ["h1", "h2", "h3"] })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut cmd = ledgerdesk_cmd();
    cmd.args(["-u", &server.uri(), "--yes", "holidays", "delete-many", "h1", "h2", "h3"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stderr).contains("3 Holiday records deleted"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delete_without_yes_refuses_when_not_a_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let mut cmd = ledgerdesk_cmd();
    cmd.args(["-u", &server.uri(), "holidays", "delete", "h1"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("requires confirmation"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_create_never_reaches_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let mut cmd = ledgerdesk_cmd();
    cmd.args(["-u", &server.uri(), "holidays", "create", "--date", "2025-01-01"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Name is required"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unauthorized_maps_to_auth_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/voucher/search"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "token expired" })),
        )
        .mount(&server)
        .await;

    let mut cmd = ledgerdesk_cmd();
    cmd.args(["-u", &server.uri(), "--token", "stale", "vouchers", "list"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("token expired"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_watch_requires_a_branch() {
    let server = MockServer::start().await;
    let mut cmd = ledgerdesk_cmd();
    cmd.args([
        "-u",
        &server.uri(),
        "watch",
        "--realtime-url",
        "ws://127.0.0.1:9/ws",
    ]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("no branch configured"));
}
