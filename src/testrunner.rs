//! Project test-suite detection, execution, and result parsing.

use crate::process::{format_duration, run_with_timeout};
use std::fmt;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Marker file and the command it implies, in priority order. A Makefile
/// only counts when it has a `test:` target.
const PROJECT_TYPES: &[(&str, &[&str])] = &[
    ("package.json", &["npm", "test", "--", "--passWithNoTests"]),
    ("Cargo.toml", &["cargo", "test"]),
    ("go.mod", &["go", "test", "./..."]),
    ("pyproject.toml", &["pytest", "-q"]),
    ("setup.py", &["pytest", "-q"]),
    ("Makefile", &["make", "test"]),
    ("pom.xml", &["mvn", "test", "-q"]),
    ("build.gradle", &["./gradlew", "test"]),
];

const RUN_INDICATORS: &[&str] = &[
    "npm test",
    "pytest",
    "go test",
    "cargo test",
    "make test",
    "mvn test",
    "./gradlew test",
    "pass",
    "fail",
    "passed",
    "failed",
    "test suite",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    NotRun,
    Passed,
    Failed,
    Error,
}

#[derive(Debug, Clone)]
pub struct TestSummary {
    pub result: TestResult,
    pub raw_output: String,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub total: u32,
    pub duration: Duration,
}

impl TestSummary {
    fn new(result: TestResult) -> Self {
        Self {
            result,
            raw_output: String::new(),
            passed: 0,
            failed: 0,
            skipped: 0,
            total: 0,
            duration: Duration::ZERO,
        }
    }

    fn parse_counts(&mut self) {
        for line in self.raw_output.lines().map(str::trim) {
            if line.contains("passed") && line.contains("failed") {
                self.total = count_in_line(line, "total");
                self.passed = count_in_line(line, "passed");
                self.failed = count_in_line(line, "failed");
                self.skipped = count_in_line(line, "skipped");
            }
            if line.ends_with("passed") || line.contains("passed,") {
                self.passed = count_in_line(line, "passed");
                self.failed = count_in_line(line, "failed");
            }
            if line.starts_with("ok ") {
                self.passed += 1;
            } else if line.starts_with("FAIL ") {
                self.failed += 1;
            }
        }
        if self.total == 0 {
            self.total = self.passed + self.failed + self.skipped;
        }
    }
}

impl fmt::Display for TestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.result {
            TestResult::NotRun => return f.write_str("Tests not run"),
            TestResult::Passed if self.total == 0 => return f.write_str("All tests passed"),
            _ if self.total == 0 => return f.write_str("Tests failed"),
            _ => {}
        }
        let parts: Vec<String> = [
            (self.passed, "passed"),
            (self.failed, "failed"),
            (self.skipped, "skipped"),
        ]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{n} {label}"))
        .collect();
        f.write_str(&parts.join(", "))
    }
}

fn makefile_has_test_target(path: &Path) -> bool {
    fs::read_to_string(path)
        .map(|content| content.lines().any(|l| l.starts_with("test:")))
        .unwrap_or(false)
}

/// The test command for the project in `work_dir`, if its type is known.
pub fn detect_test_command(work_dir: &Path) -> Option<&'static [&'static str]> {
    PROJECT_TYPES.iter().find_map(|(marker, argv)| {
        let path = work_dir.join(marker);
        if !path.exists() {
            return None;
        }
        if *marker == "Makefile" && !makefile_has_test_target(&path) {
            return None;
        }
        Some(*argv)
    })
}

/// Run the detected suite. Projects of unknown type yield `NotRun`.
pub fn run(work_dir: &Path, timeout: Duration) -> TestSummary {
    match detect_test_command(work_dir) {
        Some(argv) => run_command(work_dir, argv, timeout),
        None => TestSummary::new(TestResult::NotRun),
    }
}

pub fn run_command(work_dir: &Path, argv: &[&str], timeout: Duration) -> TestSummary {
    let Some((program, args)) = argv.split_first() else {
        return TestSummary::new(TestResult::NotRun);
    };
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(work_dir);

    tracing::debug!(command = argv.join(" "), "running tests");
    let start = Instant::now();
    let outcome = run_with_timeout(cmd, timeout);
    let duration = start.elapsed();

    let mut summary = match outcome {
        Ok(out) if out.timed_out => {
            let mut s = TestSummary::new(TestResult::Error);
            s.raw_output = format!(
                "Test execution timed out after {}",
                format_duration(timeout)
            );
            s.duration = duration;
            return s;
        }
        Ok(out) => {
            let result = if out.success {
                TestResult::Passed
            } else {
                TestResult::Failed
            };
            let mut s = TestSummary::new(result);
            s.raw_output = out.output;
            s
        }
        Err(err) => {
            let mut s = TestSummary::new(TestResult::Error);
            s.raw_output = format!("could not run {program}: {err}");
            s.duration = duration;
            return s;
        }
    };
    summary.duration = duration;
    summary.parse_counts();
    summary
}

/// The number immediately preceding the first occurrence of `keyword`.
fn count_in_line(line: &str, keyword: &str) -> u32 {
    let Some(idx) = line.find(keyword) else {
        return 0;
    };
    let digits: String = line[..idx]
        .chars()
        .rev()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.chars().rev().collect::<String>().parse().unwrap_or(0)
}

/// Whether the transcript shows any sign of a test run.
pub fn did_tests_run(transcript: &str) -> bool {
    let lower = transcript.to_lowercase();
    RUN_INDICATORS.iter().any(|i| lower.contains(i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_of(result: TestResult, output: &str) -> TestSummary {
        let mut s = TestSummary::new(result);
        s.raw_output = output.to_string();
        s.parse_counts();
        s
    }

    #[test]
    fn detection_order() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_test_command(dir.path()), None);

        fs::write(dir.path().join("Makefile"), "build:\n\tcc main.c\n").unwrap();
        assert_eq!(detect_test_command(dir.path()), None);
        fs::write(dir.path().join("Makefile"), "build:\n\tcc\ntest:\n\t./t\n").unwrap();
        assert_eq!(detect_test_command(dir.path()), Some(&["make", "test"][..]));

        fs::write(dir.path().join("setup.py"), "").unwrap();
        assert_eq!(detect_test_command(dir.path()), Some(&["pytest", "-q"][..]));

        fs::write(dir.path().join("Cargo.toml"), "").unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        assert_eq!(
            detect_test_command(dir.path()),
            Some(&["npm", "test", "--", "--passWithNoTests"][..])
        );
    }

    #[test]
    fn counts_before_keywords() {
        assert_eq!(count_in_line("Tests: 3 failed, 12 passed, 15 total", "passed"), 12);
        assert_eq!(count_in_line("Tests: 3 failed, 12 passed, 15 total", "failed"), 3);
        assert_eq!(count_in_line("passed", "passed"), 0);
        assert_eq!(count_in_line("no numbers here", "here"), 0);
    }

    #[test]
    fn parses_jest_totals() {
        let s = summary_of(
            TestResult::Failed,
            "Tests:       1 failed, 2 skipped, 9 passed, 12 total\n",
        );
        assert_eq!((s.passed, s.failed, s.skipped, s.total), (9, 1, 2, 12));
        assert_eq!(s.to_string(), "9 passed, 1 failed, 2 skipped");
    }

    #[test]
    fn parses_pytest_and_go_lines() {
        let s = summary_of(TestResult::Passed, "======= 7 passed in 0.12s\n5 passed");
        assert_eq!(s.passed, 5);

        let s = summary_of(
            TestResult::Failed,
            "ok  \tpkg/a\t0.01s\nok  \tpkg/b\t0.02s\nFAIL \tpkg/c\t0.01s\n",
        );
        assert_eq!((s.passed, s.failed, s.total), (2, 1, 3));
    }

    #[test]
    fn summary_strings() {
        assert_eq!(TestSummary::new(TestResult::NotRun).to_string(), "Tests not run");
        assert_eq!(summary_of(TestResult::Passed, "").to_string(), "All tests passed");
        assert_eq!(summary_of(TestResult::Failed, "boom").to_string(), "Tests failed");
    }

    #[test]
    fn transcript_indicators() {
        assert!(did_tests_run(r#"{"command":"cargo test --all"}"#));
        assert!(did_tests_run("Test Suite finished"));
        assert!(did_tests_run("3 PASSED"));
        assert!(!did_tests_run("edited src/lib.rs"));
    }

    #[cfg(unix)]
    #[test]
    fn runs_commands() {
        let dir = tempfile::tempdir().unwrap();
        let s = run_command(
            dir.path(),
            &["sh", "-c", "echo '4 passed, 0 failed'"],
            Duration::from_secs(10),
        );
        assert_eq!(s.result, TestResult::Passed);
        assert_eq!(s.passed, 4);

        let s = run_command(dir.path(), &["sh", "-c", "exit 1"], Duration::from_secs(10));
        assert_eq!(s.result, TestResult::Failed);

        let s = run_command(dir.path(), &["sleep", "10"], Duration::from_millis(100));
        assert_eq!(s.result, TestResult::Error);
        assert!(s.raw_output.starts_with("Test execution timed out after"));

        assert_eq!(run(dir.path(), DEFAULT_TIMEOUT).result, TestResult::NotRun);
    }
}
