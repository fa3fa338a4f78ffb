mod common;

use common::{hook, init_project, message, temp_git_repo, write_transcript};
use serde_json::json;
use std::fs;
use std::path::Path;

fn touch_code(dir: &Path) {
    fs::write(dir.join("main.rs"), "fn main() { println!(\"hi\"); }\n").unwrap();
}

fn stop(dir: &Path) -> serde_json::Value {
    hook(dir, "Stop", json!({"stop_hook_active": false}))
}

#[test]
fn clean_repo_stops_quietly() {
    let repo = temp_git_repo();
    init_project(repo.path(), "strict");
    assert_eq!(stop(repo.path()), json!({}));
}

#[test]
fn strict_blocks_untested_changes() {
    let repo = temp_git_repo();
    init_project(repo.path(), "strict");
    touch_code(repo.path());
    write_transcript(repo.path(), &["cargo build"]);

    let out = stop(repo.path());
    assert_eq!(out["decision"], "block");
    assert_eq!(
        out["reason"],
        "[Harness - STRICT MODE] Cannot stop due to:\n  \
         ! Code was modified but tests were not run\n\n\
         Additional reminders:\n  \
         - Uncommitted changes exist - consider creating a checkpoint\n  \
         - Progress log not updated - consider logging your accomplishments"
    );
}

#[test]
fn strict_approves_once_tests_ran() {
    let repo = temp_git_repo();
    init_project(repo.path(), "strict");
    touch_code(repo.path());
    fs::write(repo.path().join("claude-progress.txt"), "[2026-01-01 00:00:00] edited main\n").unwrap();
    write_transcript(repo.path(), &["cargo build", "cargo test"]);

    let out = stop(repo.path());
    assert!(out.get("decision").is_none());
    assert_eq!(
        message(&out),
        "[Harness] Approved to stop.\n\nReminders:\n  - Uncommitted changes exist - consider creating a checkpoint\n"
    );
}

#[test]
fn standard_mode_reminds_without_blocking() {
    let repo = temp_git_repo();
    init_project(repo.path(), "standard");
    touch_code(repo.path());

    let out = stop(repo.path());
    assert!(out.get("decision").is_none());
    let msg = message(&out);
    assert!(msg.starts_with(
        "[Harness] IMPORTANT - Before stopping:\n  ! Code was modified but tests were not run\n\nAdditional reminders:"
    ));
}

#[test]
fn relaxed_mode_mentions_one_thing() {
    let repo = temp_git_repo();
    init_project(repo.path(), "relaxed");
    touch_code(repo.path());
    assert_eq!(
        message(&stop(repo.path())),
        "[Harness] FYI: Code was modified but tests were not run"
    );
}

#[test]
fn features_in_progress_are_listed() {
    let repo = temp_git_repo();
    init_project(repo.path(), "standard");
    let features = json!({"features": [
        {"id": "1", "name": "login", "status": "in_progress"},
        {"id": "2", "name": "signup", "status": "in_progress"},
        {"id": "3", "name": "reset", "status": "in_progress"},
        {"id": "4", "name": "sso", "status": "in_progress"},
        {"id": "5", "name": "audit", "status": "passing"}
    ]});
    fs::write(repo.path().join("claude-features.json"), features.to_string()).unwrap();
    common::commit_all(repo.path(), "features");

    assert_eq!(
        message(&stop(repo.path())),
        "[Harness] Reminders before stopping:\n  - Features still in progress: login, signup, reset"
    );
}

#[test]
fn abnormal_stops_are_not_checked() {
    let repo = temp_git_repo();
    init_project(repo.path(), "strict");
    touch_code(repo.path());
    let out = hook(repo.path(), "Stop", json!({"stop_reason": "max_tokens"}));
    assert_eq!(out, json!({}));
    let out = hook(repo.path(), "Stop", json!({"stop_hook_active": true}));
    assert_eq!(out, json!({}));
}
