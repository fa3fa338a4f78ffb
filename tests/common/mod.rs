#![allow(dead_code)]

use serde_json::{Value, json};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run the binary with `args`, feeding `stdin` and returning
/// `(exit code, stdout, stderr)`. Host environment variables that would
/// redirect the project directory are cleared.
pub fn run_bin(args: &[&str], stdin: &str) -> (i32, String, String) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_fic-harness"))
        .args(args)
        .env_remove("CLAUDE_PROJECT_DIR")
        .env_remove("CLAUDE_WORKING_DIRECTORY")
        .env_remove("FIC_HARNESS_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn binary");

    // The binary may stop reading early on oversized input.
    let _ = child.stdin.as_mut().unwrap().write_all(stdin.as_bytes());

    let output = child.wait_with_output().unwrap();
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

pub fn run_cli(stdin_json: &str) -> (i32, String, String) {
    run_bin(&[], stdin_json)
}

/// Run an operator subcommand against `dir`.
pub fn run_command(dir: &Path, args: &[&str]) -> (i32, String, String) {
    let mut full = vec!["--project-dir", dir.to_str().unwrap()];
    full.extend_from_slice(args);
    run_bin(&full, "")
}

/// Send one hook event for the project at `cwd` and return the parsed
/// directive. Asserts the hook contract: exit 0 and a single JSON object.
pub fn hook(cwd: &Path, event: &str, fields: Value) -> Value {
    let mut input = json!({
        "session_id": "test-session",
        "transcript_path": cwd.join("transcript.jsonl"),
        "cwd": cwd,
        "permission_mode": "default",
        "hook_event_name": event,
    });
    input
        .as_object_mut()
        .unwrap()
        .extend(fields.as_object().cloned().unwrap_or_default());
    let (code, stdout, stderr) = run_cli(&input.to_string());
    assert_eq!(code, 0, "stderr: {stderr}");
    serde_json::from_str(stdout.trim()).unwrap_or_else(|e| panic!("bad stdout {stdout:?}: {e}"))
}

/// The directive's `systemMessage`, or "" when absent.
pub fn message(output: &Value) -> &str {
    output["systemMessage"].as_str().unwrap_or_default()
}

/// Initialise `dir` through the CLI, with the slow startup steps switched
/// off unless a test opts back in.
pub fn init_project(dir: &Path, strictness: &str) {
    let (code, stdout, stderr) = run_command(dir, &["init", "--strictness", strictness]);
    assert_eq!(code, 0, "init failed: {stdout}{stderr}");
    set_config(dir, "init_script_execution", "false");
    set_config(dir, "baseline_tests_on_startup", "false");
}

/// Rewrite one top-level key in the project's TOML config.
pub fn set_config(dir: &Path, key: &str, value: &str) {
    let path = dir.join(".claude/claude-harness.toml");
    let contents = fs::read_to_string(&path).unwrap();
    let prefix = format!("{key} = ");
    let rewritten: Vec<String> = contents
        .lines()
        .map(|line| {
            if line.starts_with(&prefix) {
                format!("{key} = {value}")
            } else {
                line.to_string()
            }
        })
        .collect();
    fs::write(&path, rewritten.join("\n") + "\n").unwrap();
}

/// Create a temp dir containing a git repo with an initial commit and return it.
/// The `TempDir` must be kept alive for the duration of the test.
pub fn temp_git_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let repo = git2::Repository::init(dir.path()).unwrap();

    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Test").unwrap();
    config.set_str("user.email", "test@test.com").unwrap();

    // Keep harness state out of status, as a real project would.
    fs::write(dir.path().join(".gitignore"), ".claude/\ntranscript.jsonl\n").unwrap();
    fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();
    commit_all(dir.path(), "initial");
    dir
}

pub fn commit_all(dir: &Path, message: &str) {
    let repo = git2::Repository::open(dir).unwrap();
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_oid = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_oid).unwrap();
    let sig = repo.signature().unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap();
}

/// Write a transcript where the assistant ran `commands` through Bash.
pub fn write_transcript(dir: &Path, commands: &[&str]) {
    let lines: Vec<String> = commands
        .iter()
        .map(|cmd| {
            json!({
                "type": "assistant",
                "message": {
                    "role": "assistant",
                    "content": [{"type": "tool_use", "id": "t", "name": "Bash", "input": {"command": cmd}}]
                }
            })
            .to_string()
        })
        .collect();
    fs::write(dir.join("transcript.jsonl"), lines.join("\n") + "\n").unwrap();
}
