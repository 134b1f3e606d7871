//! CLI regression tests for the `apiweld` binary.
//!
//! These tests invoke the binary as a subprocess to catch regressions in
//! argument names, exit codes and output destinations, which the library
//! tests can't catch.
//!
//! Run with: `cargo test -p apiweld-test`
//! Requires the `apiweld` binary to be built first (`cargo build -p apiweld`).

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value;

use crate::SpecWorkspace;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Returns an assert_cmd Command wrapping the `apiweld` binary.
fn apiweld() -> Command {
    // cargo_bin is deprecated for custom build-dir setups; fine for standard workspace use.
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("apiweld")
        .expect("apiweld binary not found; run `cargo build -p apiweld` first");
    cmd.env_remove("RUST_LOG")
        .env_remove("APIWELD_LOG_LEVEL")
        .env_remove("APIWELD_LOG_FORMAT");
    cmd
}

/// Absolute path to the shared test fixtures directory.
fn fixtures() -> PathBuf {
    // CARGO_MANIFEST_DIR = .../crates/apiweld-test
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("crates/")
        .parent()
        .expect("workspace root")
        .join("tests/fixtures")
}

fn parse_yaml(bytes: &[u8]) -> Value {
    serde_yaml::from_slice(bytes).expect("output is not YAML")
}

// ---------------------------------------------------------------------------
// apiweld bundle
// ---------------------------------------------------------------------------

#[test]
fn bundle_writes_to_stdout() {
    let output = apiweld()
        .arg("bundle")
        .arg(fixtures().join("bundle/api.yaml"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let doc = parse_yaml(&output.stdout);
    assert_eq!(
        doc["paths"]["/pets"]["get"]["responses"]["default"]["$ref"],
        "#/components/responses/Problem"
    );
    assert!(doc["components"]["schemas"].get("Error").is_some());
    assert!(!String::from_utf8_lossy(&output.stdout).contains("common.yaml"));
}

#[test]
fn bundle_writes_output_file() {
    let ws = SpecWorkspace::new().unwrap();
    let out = ws.path("bundled.yaml");

    apiweld()
        .arg("bundle")
        .arg(fixtures().join("bundle/api.yaml"))
        .arg(&out)
        .assert()
        .success()
        .stdout(predicates::str::is_empty());

    let doc = parse_yaml(ws.read("bundled.yaml").unwrap().as_bytes());
    assert_eq!(doc["info"]["title"], "Pets");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&out).unwrap().permissions().mode();
        assert_eq!(mode & 0o644, 0o644);
    }
}

#[test]
fn bundle_missing_spec_argument_exits_two() {
    apiweld()
        .arg("bundle")
        .assert()
        .failure()
        .code(2)
        .stderr(contains("<SPEC>"));
}

#[test]
fn bundle_nonexistent_spec_exits_one() {
    apiweld()
        .args(["bundle", "/nonexistent/api.yaml"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("spec file not found"));
}

#[test]
fn bundle_invalid_yaml_exits_one() {
    apiweld()
        .arg("bundle")
        .arg(fixtures().join("invalid-parse-error.yaml"))
        .assert()
        .failure()
        .code(1)
        .stdout(predicates::str::is_empty())
        .stderr(contains("error: bundling failed"));
}

#[test]
fn bundle_rejects_swagger_2() {
    apiweld()
        .arg("bundle")
        .arg(fixtures().join("swagger2.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("Swagger 2.0"));
}

#[test]
fn bundle_unresolved_reference_writes_nothing() {
    let ws = SpecWorkspace::new().unwrap();
    let out = ws.path("out.yaml");

    apiweld()
        .arg("bundle")
        .arg(fixtures().join("unresolved-ref.yaml"))
        .arg(&out)
        .assert()
        .failure()
        .code(1)
        .stderr(contains("nowhere.yaml"));
    assert!(!out.exists());
}

#[test]
fn bundle_circular_reference_warns_and_succeeds() {
    apiweld()
        .arg("bundle")
        .arg(fixtures().join("bundle/circular.yaml"))
        .assert()
        .success()
        .stdout(contains("#/components/schemas/Tree"))
        .stderr(contains("circular reference"));
}

#[test]
fn bundle_log_level_silences_warnings() {
    apiweld()
        .args(["--log-level", "error", "bundle"])
        .arg(fixtures().join("bundle/circular.yaml"))
        .assert()
        .success()
        .stderr(contains("circular reference").not());
}

#[test]
fn json_log_format_emits_event_field() {
    apiweld()
        .args(["--log-format", "json", "bundle"])
        .arg(fixtures().join("bundle/circular.yaml"))
        .assert()
        .success()
        .stderr(contains("\"event\":\"circular_reference\""));
}

#[test]
fn unknown_log_format_exits_two() {
    apiweld()
        .args(["--log-format", "xml", "bundle"])
        .arg(fixtures().join("bundle/api.yaml"))
        .assert()
        .failure()
        .code(2);
}

// ---------------------------------------------------------------------------
// apiweld inline
// ---------------------------------------------------------------------------

#[test]
fn inline_dereferences_everything_but_cycles() {
    let output = apiweld()
        .arg("inline")
        .arg(fixtures().join("bundle/circular.yaml"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let doc = parse_yaml(&output.stdout);
    let responses = &doc["paths"]["/trees"]["get"]["responses"];
    assert_eq!(responses["default"]["description"], "Unexpected error");
    assert_eq!(
        responses["200"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/Tree"
    );
}

// ---------------------------------------------------------------------------
// apiweld proxy
// ---------------------------------------------------------------------------

#[test]
fn proxy_compiles_fixture() {
    let output = apiweld()
        .arg("proxy")
        .arg(fixtures().join("proxy/gateway.yaml"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let doc = parse_yaml(&output.stdout);
    assert_eq!(doc["paths"]["/me"]["get"]["operationId"], "getMe");
    assert!(doc["components"]["schemas"].get("ProfileError").is_some());
    assert!(doc["components"]["schemas"].get("AccountsError").is_some());
}

#[test]
fn proxy_output_file_matches_stdout() {
    let ws = SpecWorkspace::from_fixture_dir(&fixtures().join("proxy")).unwrap();
    let out = ws.path("compiled.yaml");

    let stdout = apiweld()
        .arg("proxy")
        .arg(ws.path("gateway.yaml"))
        .output()
        .unwrap()
        .stdout;

    apiweld()
        .arg("proxy")
        .arg(ws.path("gateway.yaml"))
        .arg(&out)
        .assert()
        .success();

    assert_eq!(ws.read("compiled.yaml").unwrap().into_bytes(), stdout);
}

#[test]
fn proxy_unknown_name_exits_one() {
    apiweld()
        .arg("proxy")
        .arg(fixtures().join("proxy/unknown-proxy.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("unknown proxy 'nobody'"));
}

#[test]
fn proxy_missing_upstream_operation_exits_one() {
    apiweld()
        .arg("proxy")
        .arg(fixtures().join("proxy/missing-operation.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("PATCH /me"));
}

#[test]
fn proxy_edited_upstream_is_picked_up() {
    let ws = SpecWorkspace::from_fixture_dir(&fixtures().join("proxy")).unwrap();
    let accounts = ws
        .read("accounts.yaml")
        .unwrap()
        .replace("reason:", "detail:");
    ws.write("accounts.yaml", &accounts).unwrap();

    let compiled = ws.compile_proxy("gateway.yaml").unwrap();
    let error = &compiled.document.root()["components"]["schemas"]["AccountsError"];
    assert!(error["properties"].get("detail").is_some());
}
