//! CLI integration tests for the Portico command-line interface.
//!
//! Every command here runs offline: config and data directories point at a
//! temp dir, and nothing talks to a backend.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use assert_cmd::Command;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use predicates::prelude::*;
use tempfile::TempDir;

/// A portico command isolated from the user's config and data.
fn portico(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("portico").unwrap();
    cmd.current_dir(home)
        .env("PORTICO_CONFIG_DIR", home.join("config"))
        .env("PORTICO_DATA_DIR", home.join("data"))
        .env_remove("PORTICO_CONFIG")
        .env_remove("PORTICO_PASSWORD")
        .env("PORTICO_DEPLOYMENT", "ci");
    cmd
}

fn jwt_expiring_in(secs: i64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"ops","exp":{}}}"#, now + secs))
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    let home = TempDir::new().unwrap();
    portico(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("session-gated API gateway"));
}

#[test]
fn test_version_displays() {
    let home = TempDir::new().unwrap();
    portico(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("portico"));
}

#[test]
fn test_help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    portico(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("routes"))
        .stdout(predicate::str::contains("auth"))
        .stdout(predicate::str::contains("token"))
        .stdout(predicate::str::contains("get"));
}

#[test]
fn test_unknown_deployment_rejected() {
    let home = TempDir::new().unwrap();
    portico(home.path())
        .args(["--deployment", "staging", "routes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("staging"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Token Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_token_check_accepts_live_token() {
    let home = TempDir::new().unwrap();
    portico(home.path())
        .args(["token", "check", &jwt_expiring_in(600)])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid:"))
        .stdout(predicate::str::contains("sub: ops"));
}

#[test]
fn test_token_check_rejects_expired_token() {
    let home = TempDir::new().unwrap();
    portico(home.path())
        .args(["token", "check", &jwt_expiring_in(-60)])
        .assert()
        .failure()
        .stdout(predicate::str::contains("invalid:"))
        .stderr(predicate::str::contains("expired"));
}

#[test]
fn test_token_check_json_reports_reason() {
    let home = TempDir::new().unwrap();
    portico(home.path())
        .args(["--json", "token", "check", "not-a-jwt"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""valid":false"#))
        .stdout(predicate::str::contains("three-part"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Routes Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_routes_json_production() {
    let home = TempDir::new().unwrap();
    let output = portico(home.path())
        .args(["--json", "--deployment", "production", "routes", "models"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["service"], "models");
    assert_eq!(rows[0]["deployment"], "production");
    assert_eq!(rows[0]["browser"], "/api/models/v1");
    assert_eq!(
        rows[0]["server"],
        "http://models.portico.svc.cluster.local/api/models/v1"
    );
}

#[test]
fn test_routes_all_deployments() {
    let home = TempDir::new().unwrap();
    let output = portico(home.path())
        .args(["--json", "routes", "auth", "--all"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 3);
}

#[test]
fn test_routes_unknown_service() {
    let home = TempDir::new().unwrap();
    portico(home.path())
        .args(["routes", "billing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown service 'billing'"));
}

#[test]
fn test_routes_from_config_file() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("custom.toml");
    std::fs::write(
        &config,
        r#"
[services.billing]
path_prefix = "/billing/v2"

[services.billing.server]
ci = "http://billing.test:7000/"
"#,
    )
    .unwrap();

    let output = portico(home.path())
        .args(["--json", "--config"])
        .arg(&config)
        .arg("routes")
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["service"], "billing");
    assert_eq!(rows[0]["server"], "http://billing.test:7000/billing/v2");
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth and Get Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_auth_status_without_tokens() {
    let home = TempDir::new().unwrap();
    portico(home.path())
        .args(["--json", "auth", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""access_token": false"#))
        .stdout(predicate::str::contains(r#""refresh_token": false"#));
}

#[test]
fn test_auth_logout_is_idempotent() {
    let home = TempDir::new().unwrap();
    for _ in 0..2 {
        portico(home.path())
            .args(["auth", "logout"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No stored tokens found"));
    }
}

#[test]
fn test_get_unknown_service() {
    let home = TempDir::new().unwrap();
    portico(home.path())
        .args(["get", "billing", "invoices"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown service: billing"));
}

#[test]
fn test_get_rejects_malformed_query() {
    let home = TempDir::new().unwrap();
    portico(home.path())
        .args(["get", "models", "list", "-q", "page"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected key=value"));
}

#[test]
fn test_auth_status_reads_stored_tokens_then_logout_clears() {
    let home = TempDir::new().unwrap();
    let data = home.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(
        data.join("credentials.json"),
        serde_json::json!({
            "access_token": jwt_expiring_in(600),
            "refresh_token": "r-1",
        })
        .to_string(),
    )
    .unwrap();

    portico(home.path())
        .args(["--json", "auth", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""access_valid": true"#))
        .stdout(predicate::str::contains(r#""refresh_token": true"#));

    portico(home.path())
        .args(["auth", "logout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stored tokens removed"));
    assert!(!data.join("credentials.json").exists());
}
