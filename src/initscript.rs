//! Guarded execution of the project's `init.sh` at session start.

use crate::process::{format_duration, run_with_timeout};
use crate::util::truncate_chars;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

pub const INIT_SCRIPT: &str = "init.sh";
pub const MAX_SCRIPT_BYTES: u64 = 10_000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_OUTPUT_CHARS: usize = 500;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct InitScriptResult {
    pub executed: bool,
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl InitScriptResult {
    fn refused(error: String) -> Self {
        Self {
            executed: true,
            error: Some(error),
            ..Default::default()
        }
    }

    /// Line for the session summary. `None` when no script exists.
    pub fn report(&self) -> Option<String> {
        if !self.executed {
            return None;
        }
        Some(match (&self.error, self.success) {
            (_, true) if self.output.is_empty() => "init.sh executed successfully".to_string(),
            (_, true) => format!("init.sh executed successfully:\n{}", self.output),
            (Some(err), false) => format!("Warning: {err}"),
            (None, false) => "init.sh execution completed".to_string(),
        })
    }
}

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &fs::Metadata) -> bool {
    true
}

/// Run `init.sh` through bash if it is present, small, and executable.
pub fn run(work_dir: &Path, timeout: Duration) -> InitScriptResult {
    let path = work_dir.join(INIT_SCRIPT);
    let Ok(meta) = fs::metadata(&path) else {
        return InitScriptResult::default();
    };
    if meta.len() > MAX_SCRIPT_BYTES {
        return InitScriptResult::refused(
            "init.sh too large (>10KB), skipping for safety".to_string(),
        );
    }
    if !is_executable(&meta) {
        return InitScriptResult::refused(
            "init.sh not executable (run: chmod +x init.sh)".to_string(),
        );
    }

    let mut cmd = Command::new("bash");
    cmd.arg(&path).current_dir(work_dir);
    let out = match run_with_timeout(cmd, timeout) {
        Ok(out) => out,
        Err(err) => return InitScriptResult::refused(format!("init.sh failed: {err}")),
    };
    if out.timed_out {
        return InitScriptResult::refused(format!(
            "init.sh timed out after {}",
            format_duration(timeout)
        ));
    }

    let output = if out.output.chars().count() > MAX_OUTPUT_CHARS {
        format!("{}...[truncated]", truncate_chars(&out.output, MAX_OUTPUT_CHARS))
    } else {
        out.output
    };
    let error = (!out.success).then(|| match out.exit_code {
        Some(code) => format!("init.sh warning (exit {code})"),
        None => "init.sh failed: terminated by signal".to_string(),
    });
    if let Some(err) = &error {
        tracing::warn!("{err}");
    }
    InitScriptResult {
        executed: true,
        success: out.success,
        output,
        error,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &Path, body: &str, mode: u32) {
        let path = dir.join(INIT_SCRIPT);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    fn missing_script_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(dir.path(), DEFAULT_TIMEOUT);
        assert!(!result.executed);
        assert_eq!(result.report(), None);
    }

    #[test]
    fn runs_and_reports_output() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "#!/bin/bash\necho ready\n", 0o755);
        let result = run(dir.path(), DEFAULT_TIMEOUT);
        assert!(result.success);
        assert_eq!(
            result.report().unwrap(),
            "init.sh executed successfully:\nready\n"
        );
    }

    #[test]
    fn silent_success() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "true\n", 0o700);
        assert_eq!(
            run(dir.path(), DEFAULT_TIMEOUT).report().unwrap(),
            "init.sh executed successfully"
        );
    }

    #[test]
    fn refuses_non_executable() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "echo hi\n", 0o644);
        assert_eq!(
            run(dir.path(), DEFAULT_TIMEOUT).report().unwrap(),
            "Warning: init.sh not executable (run: chmod +x init.sh)"
        );
    }

    #[test]
    fn refuses_large_scripts() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), &"#".repeat(10_001), 0o755);
        let result = run(dir.path(), DEFAULT_TIMEOUT);
        assert_eq!(
            result.error.as_deref(),
            Some("init.sh too large (>10KB), skipping for safety")
        );
    }

    #[test]
    fn nonzero_exit_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "echo partial\nexit 2\n", 0o755);
        let result = run(dir.path(), DEFAULT_TIMEOUT);
        assert!(!result.success);
        assert_eq!(result.output, "partial\n");
        assert_eq!(result.report().unwrap(), "Warning: init.sh warning (exit 2)");
    }

    #[test]
    fn long_output_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "printf 'x%.0s' $(seq 1 800)\n", 0o755);
        let result = run(dir.path(), DEFAULT_TIMEOUT);
        assert_eq!(result.output, format!("{}...[truncated]", "x".repeat(500)));
    }

    #[test]
    fn times_out() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "exec sleep 10\n", 0o755);
        let result = run(dir.path(), Duration::from_millis(200));
        assert_eq!(result.error.as_deref(), Some("init.sh timed out after 0s"));
    }

    #[test]
    fn backgrounded_server_does_not_hold_the_session() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "sleep 8 &\necho started\n", 0o755);
        let start = std::time::Instant::now();
        let result = run(dir.path(), Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_secs(3));
        assert_eq!(result.error.as_deref(), Some("init.sh timed out after 1s"));
    }
}
