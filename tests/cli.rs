//! End-to-end tests for the `docview` binary against a mock backend.

mod common;

use serde_json::Value;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

use common::MockBackend;

fn docview_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docview");
    path
}

struct Output {
    stdout: String,
    stderr: String,
    code: Option<i32>,
}

/// Runs `docview` in an empty working directory so no config file is
/// picked up, without blocking the runtime serving the mock backend.
async fn run_docview(base_url: &str, args: &[&str]) -> Output {
    let base_url = base_url.to_string();
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    tokio::task::spawn_blocking(move || {
        let cwd = TempDir::new().unwrap();
        let binary = docview_binary();
        let output = Command::new(&binary)
            .current_dir(cwd.path())
            .arg("--backend")
            .arg(&base_url)
            .args(&args)
            .output()
            .unwrap_or_else(|e| panic!("Failed to run docview binary at {:?}: {}", binary, e));
        Output {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            code: output.status.code(),
        }
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_projects_lists_table() {
    let server = common::start(MockBackend::default()).await;

    let out = run_docview(&server.base_url, &["projects"]).await;

    assert_eq!(out.code, Some(0), "stderr={}", out.stderr);
    assert!(out.stdout.contains("ID"));
    let row = out.stdout.lines().find(|l| l.starts_with("demo")).unwrap();
    assert!(row.contains("Demo"));
    assert!(row.trim_end().ends_with('2'));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_projects_json_uses_manifest_fallback() {
    let server = common::start(MockBackend {
        dynamic: None,
        manifest: Some(common::demo_projects()),
        ..MockBackend::default()
    })
    .await;

    let out = run_docview(&server.base_url, &["projects", "--json"]).await;

    assert_eq!(out.code, Some(0), "stderr={}", out.stderr);
    let parsed: Value = serde_json::from_str(&out.stdout).unwrap();
    assert_eq!(parsed, common::demo_projects());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_docs_lists_titles() {
    let server = common::start(MockBackend::default()).await;

    let out = run_docview(&server.base_url, &["docs", "demo"]).await;

    assert_eq!(out.code, Some(0), "stderr={}", out.stderr);
    assert!(out.stdout.contains("Intro"));
    assert!(out.stdout.contains("/output/demo/02_usage.md"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_show_defaults_to_first_document() {
    let server = common::start(MockBackend::default()).await;

    let out = run_docview(&server.base_url, &["show", "demo"]).await;
    assert_eq!(out.code, Some(0), "stderr={}", out.stderr);
    assert_eq!(out.stdout, "# Intro\n\nWelcome to *Demo*.\n");

    let out = run_docview(&server.base_url, &["show", "demo", "02_usage.md"]).await;
    assert_eq!(out.code, Some(0), "stderr={}", out.stderr);
    assert!(out.stdout.starts_with("# Usage"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_show_unknown_project_fails() {
    let server = common::start(MockBackend::default()).await;

    let out = run_docview(&server.base_url, &["show", "nope"]).await;

    assert_ne!(out.code, Some(0));
    assert!(out.stderr.contains("project not found: nope"), "stderr={}", out.stderr);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ingest_follows_log_to_completion() {
    let server = common::start(MockBackend {
        frames: common::successful_run(),
        ..MockBackend::default()
    })
    .await;

    let out = run_docview(
        &server.base_url,
        &[
            "ingest",
            "--repo",
            "https://github.com/acme/widgets",
            "--name",
            "Widgets",
            "--progress",
            "json",
        ],
    )
    .await;

    assert_eq!(out.code, Some(0), "stderr={}", out.stderr);
    assert_eq!(out.stdout.trim(), "completed");

    let events: Vec<Value> = out
        .stderr
        .lines()
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect();
    let lines: Vec<&str> = events
        .iter()
        .filter(|e| e["event"] == "log")
        .map(|e| e["line"].as_str().unwrap())
        .collect();
    assert_eq!(
        lines,
        vec![
            "[STATUS] Job started",
            "Cloning repository...",
            "Generating docs...",
            "[STATUS] Done",
        ]
    );
    assert!(events
        .iter()
        .any(|e| e["event"] == "state" && e["state"] == "completed"));

    let submissions = server.recorder.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0]["type"], "repo");
    assert_eq!(submissions[0]["name"], "Widgets");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ingest_backend_error_exits_one() {
    let server = common::start(MockBackend {
        frames: common::failed_run(),
        ..MockBackend::default()
    })
    .await;

    let out = run_docview(
        &server.base_url,
        &["ingest", "--path", "/srv/code", "--progress", "off"],
    )
    .await;

    assert_eq!(out.code, Some(1), "stderr={}", out.stderr);
    assert!(out.stdout.contains("fatal: repository not found"));
    assert_eq!(out.stdout.lines().last(), Some("failed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ingest_rejected_submission_exits_one() {
    let server = common::start(MockBackend {
        reject_ingest: Some("disk full".into()),
        ..MockBackend::default()
    })
    .await;

    let out = run_docview(
        &server.base_url,
        &["ingest", "--repo", "https://github.com/acme/widgets", "--progress", "off"],
    )
    .await;

    assert_eq!(out.code, Some(1), "stderr={}", out.stderr);
    assert!(out.stdout.contains("[ERROR] Failed to start ingestion: "));
    assert!(out.stdout.contains("disk full"));
    assert_eq!(out.stdout.lines().last(), Some("failed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ingest_empty_source_is_rejected() {
    let server = common::start(MockBackend::default()).await;

    let out = run_docview(&server.base_url, &["ingest", "--repo", "  "]).await;

    assert_ne!(out.code, Some(0));
    assert!(out.stderr.contains("source must not be empty"), "stderr={}", out.stderr);
    assert!(server.recorder.submissions().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ingest_requires_a_source() {
    let server = common::start(MockBackend::default()).await;

    let out = run_docview(&server.base_url, &["ingest", "--name", "x"]).await;

    assert_eq!(out.code, Some(2));
    assert!(out.stderr.contains("--repo"), "stderr={}", out.stderr);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_export_writes_file() {
    let server = common::start(MockBackend::default()).await;
    let tmp = TempDir::new().unwrap();
    let target = tmp.path().join("demo.html");

    let out = run_docview(
        &server.base_url,
        &["export", "demo", "--output", target.to_str().unwrap()],
    )
    .await;

    assert_eq!(out.code, Some(0), "stderr={}", out.stderr);
    assert!(out.stdout.contains("Exported 2 documents"));
    let html = std::fs::read_to_string(&target).unwrap();
    assert!(html.contains("<h1>01_intro</h1>"));
    assert!(html.contains("<h1>02_usage</h1>"));
}

#[test]
fn test_rejects_invalid_backend_url() {
    let cwd = TempDir::new().unwrap();
    let output = Command::new(docview_binary())
        .current_dir(cwd.path())
        .args(["--backend", "ftp://example.com", "projects"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid --backend"), "stderr={}", stderr);
}
