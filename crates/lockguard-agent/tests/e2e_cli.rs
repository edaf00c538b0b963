use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use uuid::Uuid;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn write_file(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap_or_else(|e| panic!("write {} failed: {e}", path.display()));
}

fn run_agent(dir: &Path, args: &[&str]) -> Output {
    let exe = env!("CARGO_BIN_EXE_lockguard-agent");
    Command::new(exe)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .expect("run lockguard-agent")
}

fn describe(out: &Output) -> String {
    format!(
        "status={:?}, stdout={}, stderr={}",
        out.status.code(),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    )
}

#[test]
fn e2e_dry_run_enforce_once_resets_deviation() {
    let dir = unique_temp_dir("lockguard-agent-once");
    let _cleanup = CleanupDir(dir.clone());

    let out = run_agent(&dir, &["--dry-run", "--enforce-once"]);
    assert!(out.status.success(), "enforce-once failed: {}", describe(&out));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("NoChangingLockScreen => Reset { previous: 1 }"), "stdout: {stdout}");
}

#[test]
fn e2e_config_file_overrides_baseline() {
    let dir = unique_temp_dir("lockguard-agent-config");
    let _cleanup = CleanupDir(dir.clone());
    let config_path = dir.join("guard.json");
    write_file(
        &config_path,
        r#"{ "value_name": "LockScreenImage", "baseline": 5, "mode": "set_only" }"#,
    );

    let out = run_agent(
        &dir,
        &["--dry-run", "--enforce-once", "--config", config_path.to_str().expect("utf-8 path")],
    );
    assert!(out.status.success(), "enforce-once failed: {}", describe(&out));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("LockScreenImage => Reset { previous: 6 }"), "stdout: {stdout}");
}

#[test]
fn e2e_invalid_config_fails_and_is_logged() {
    let dir = unique_temp_dir("lockguard-agent-invalid");
    let _cleanup = CleanupDir(dir.clone());
    let config_path = dir.join("guard.json");
    write_file(&config_path, r#"{ "interval_secs": 0 }"#);

    let out = run_agent(&dir, &["--dry-run", "--config", "guard.json"]);
    assert!(!out.status.success(), "invalid config accepted: {}", describe(&out));

    let log = std::fs::read_to_string(dir.join("lockguard-failures.log")).expect("failure log written");
    assert!(log.contains("interval_secs"), "failure log: {log}");
}

#[test]
fn e2e_install_and_uninstall_are_mutually_exclusive() {
    let dir = unique_temp_dir("lockguard-agent-conflict");
    let _cleanup = CleanupDir(dir.clone());

    let out = run_agent(&dir, &["--install", "--uninstall"]);
    assert_eq!(out.status.code(), Some(2), "{}", describe(&out));
}

#[test]
fn e2e_dry_run_console_stops_when_stdin_closes() {
    let dir = unique_temp_dir("lockguard-agent-console");
    let _cleanup = CleanupDir(dir.clone());

    let out = run_agent(&dir, &["--dry-run"]);
    assert!(out.status.success(), "console run failed: {}", describe(&out));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("正在守护"), "stdout: {stdout}");
}

#[test]
fn e2e_interactive_start_prints_usage() {
    let dir = unique_temp_dir("lockguard-agent-usage");
    let _cleanup = CleanupDir(dir.clone());

    let out = run_agent(&dir, &[]);
    assert!(out.status.success(), "usage run failed: {}", describe(&out));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("--install"), "stdout: {stdout}");
}

struct CleanupDir(PathBuf);

impl Drop for CleanupDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}
