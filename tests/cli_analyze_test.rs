use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_session(sessions_dir: &Path, project: &str, id: &str) {
    let project_dir = sessions_dir.join(project);
    fs::create_dir_all(&project_dir).expect("mkdir project");
    let lines = [
        r#"{"type":"user","timestamp":"2026-01-10T09:00:00Z","message":{"role":"user","content":"add a retry loop"}}"#,
        r#"{"type":"assistant","timestamp":"2026-01-10T09:02:00Z","message":{"role":"assistant","content":[{"type":"text","text":"done"}]}}"#,
        r#"{"type":"user","timestamp":"2026-01-10T09:05:00Z","message":{"role":"user","content":"now test it"}}"#,
        r#"{"type":"assistant","timestamp":"2026-01-10T09:09:00Z","message":{"role":"assistant","content":[{"type":"text","text":"tests pass"}]}}"#,
    ];
    fs::write(project_dir.join(format!("{id}.jsonl")), lines.join("\n")).expect("write session");
}

fn facetlens(home: &Path, sessions_dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("facetlens");
    cmd.current_dir(home)
        .env("FACETLENS_HOME", home)
        .env("FACETLENS_SESSIONS_DIR", sessions_dir)
        .env("FACETLENS_PROVIDER", "openai-compatible")
        .env("FACETLENS_BASE_URL", "http://127.0.0.1:9")
        .env("FACETLENS_RETRY_BASE_MS", "1")
        .env("FACETLENS_REQUEST_TIMEOUT_SECS", "2")
        .env("AI_API_KEY", "test-key")
        .env_remove("FACETLENS_CONFIG_PATH")
        .env_remove("FACETLENS_OUTPUT")
        .env_remove("FACETLENS_MODEL")
        .env_remove("FACETLENS_MAX_SESSIONS")
        .env_remove("FACETLENS_CONCURRENCY")
        .env_remove("AI_MODEL");
    cmd
}

#[test]
fn analyze_uses_cached_facets_when_provider_is_unreachable() {
    let tmp = tempdir().expect("tempdir");
    let sessions_dir = tmp.path().join("sessions");
    write_session(&sessions_dir, "proj-a", "abc123");
    let facets_dir = tmp.path().join("facets");
    fs::create_dir_all(&facets_dir).expect("mkdir facets");
    fs::write(
        facets_dir.join("abc123.json"),
        r#"{"sessionId":"abc123","goal":"add retries"}"#,
    )
    .expect("write cached facet");

    let report_path = tmp.path().join("out/report.json");
    facetlens(tmp.path(), &sessions_dir)
        .arg("analyze")
        .arg("--output")
        .arg(&report_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze: ok"))
        .stdout(predicate::str::contains("outcomes=cache_hits:1,extracted:0"));

    let raw = fs::read_to_string(&report_path).expect("read report");
    let report: Value = serde_json::from_str(&raw).expect("report json");
    assert_eq!(report["total_sessions"], 1);
    assert_eq!(report["analyzed_sessions"], 1);
    assert_eq!(report["outcomes"]["cache_hits"], 1);
    assert_eq!(report["facets"][0]["sessionId"], "abc123");
    assert_eq!(report["facets"][0]["goal"], "add retries");
    assert_eq!(report["synthesis"]["atAGlance"]["whatsWorking"], "");
    assert_eq!(report["synthesis"]["impressiveThings"], Value::Array(Vec::new()));

    let audit = fs::read_to_string(tmp.path().join("logs/audit.log")).expect("audit log");
    assert!(audit.contains("\"phase\":\"analyze\""));
}

#[test]
fn analyze_rejects_zero_concurrency() {
    let tmp = tempdir().expect("tempdir");
    let sessions_dir = tmp.path().join("sessions");
    write_session(&sessions_dir, "proj-a", "abc123");

    facetlens(tmp.path(), &sessions_dir)
        .args(["analyze", "--concurrency", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency must be >= 1"));
    assert!(!tmp.path().join("facetlens-report.json").exists());
}

#[test]
fn analyze_project_filter_with_no_match_writes_empty_report() {
    let tmp = tempdir().expect("tempdir");
    let sessions_dir = tmp.path().join("sessions");
    write_session(&sessions_dir, "proj-a", "abc123");

    facetlens(tmp.path(), &sessions_dir)
        .args(["analyze", "--project", "nothing-matches", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"command\": \"analyze\""));

    let raw = fs::read_to_string(tmp.path().join("facetlens-report.json")).expect("read report");
    let report: Value = serde_json::from_str(&raw).expect("report json");
    assert_eq!(report["total_sessions"], 0);
    assert_eq!(report["facets"], Value::Array(Vec::new()));
}

#[test]
fn analyze_rejects_concurrency_beyond_limiter_capacity() {
    let tmp = tempdir().expect("tempdir");
    let sessions_dir = tmp.path().join("sessions");
    write_session(&sessions_dir, "proj-a", "abc123");

    facetlens(tmp.path(), &sessions_dir)
        .args(["analyze", "--concurrency", "3000000000000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency must be <="))
        .stderr(predicate::str::contains("panicked").not());
}

#[test]
fn analyze_accepts_huge_day_window() {
    let tmp = tempdir().expect("tempdir");
    let sessions_dir = tmp.path().join("sessions");
    write_session(&sessions_dir, "proj-a", "abc123");
    fs::create_dir_all(tmp.path().join("facets")).expect("mkdir facets");
    fs::write(
        tmp.path().join("facets/abc123.json"),
        r#"{"sessionId":"abc123","goal":"add retries"}"#,
    )
    .expect("write cached facet");

    facetlens(tmp.path(), &sessions_dir)
        .args(["analyze", "--days", "4294967295"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sessions=1"));
}
