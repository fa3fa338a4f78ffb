//! Read-only repository queries for the session summary and stop checks.

use anyhow::{Context, Result};
use std::path::Path;

const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "rs", "go", "java", "c", "cpp", "h", "hpp", "cs", "rb",
    "swift", "kt", "scala", "php", "vue", "svelte",
];

pub fn is_code_file(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| CODE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Files the harness itself writes under `.claude/`. They never count as
/// user changes.
fn is_harness_path(path: &str) -> bool {
    let Some(rest) = path.strip_prefix(".claude/") else {
        return false;
    };
    ["fic-", ".fic", "claude-harness", ".claude-harness"]
        .iter()
        .any(|prefix| rest.starts_with(prefix))
}

fn short_code(status: git2::Status) -> String {
    if status.contains(git2::Status::WT_NEW) {
        return "??".to_string();
    }
    let index = if status.contains(git2::Status::INDEX_NEW) {
        'A'
    } else if status.contains(git2::Status::INDEX_MODIFIED) {
        'M'
    } else if status.contains(git2::Status::INDEX_DELETED) {
        'D'
    } else if status.contains(git2::Status::INDEX_RENAMED) {
        'R'
    } else if status.contains(git2::Status::INDEX_TYPECHANGE) {
        'T'
    } else {
        ' '
    };
    let worktree = if status.contains(git2::Status::WT_MODIFIED) {
        'M'
    } else if status.contains(git2::Status::WT_DELETED) {
        'D'
    } else if status.contains(git2::Status::WT_RENAMED) {
        'R'
    } else if status.contains(git2::Status::WT_TYPECHANGE) {
        'T'
    } else {
        ' '
    };
    format!("{index}{worktree}")
}

pub struct GitRepo {
    repo: git2::Repository,
}

impl GitRepo {
    /// The repository containing `work_dir`, or `None` outside a work tree.
    pub fn discover(work_dir: &Path) -> Option<Self> {
        let repo = git2::Repository::discover(work_dir).ok()?;
        if repo.is_bare() {
            return None;
        }
        Some(Self { repo })
    }

    fn statuses(&self) -> Result<Vec<(String, git2::Status)>> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .context("checking git status")?;
        Ok(statuses
            .iter()
            .filter_map(|entry| {
                let path = entry.path()?.to_string();
                (!is_harness_path(&path)).then_some((path, entry.status()))
            })
            .collect())
    }

    /// `git status --short` style lines.
    pub fn status_lines(&self) -> Result<Vec<String>> {
        Ok(self
            .statuses()?
            .into_iter()
            .map(|(path, status)| format!("{} {path}", short_code(status)))
            .collect())
    }

    pub fn has_uncommitted_changes(&self) -> Result<bool> {
        Ok(!self.statuses()?.is_empty())
    }

    /// `<short-id> <summary>` for the newest `limit` commits. An unborn
    /// branch has none.
    pub fn recent_commits(&self, limit: usize) -> Result<Vec<String>> {
        let mut walk = self.repo.revwalk().context("starting revwalk")?;
        if walk.push_head().is_err() {
            return Ok(Vec::new());
        }
        let mut commits = Vec::new();
        for oid in walk.take(limit) {
            let oid = oid.context("walking history")?;
            let commit = self
                .repo
                .find_commit(oid)
                .with_context(|| format!("finding commit {oid}"))?;
            let id = oid.to_string();
            commits.push(format!(
                "{} {}",
                &id[..7.min(id.len())],
                commit.summary().unwrap_or_default()
            ));
        }
        Ok(commits)
    }

    /// Paths changed against HEAD (staged or not) plus untracked files.
    pub fn modified_files(&self) -> Result<Vec<String>> {
        let head_tree = self
            .repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_tree().ok());
        let diff = self
            .repo
            .diff_tree_to_workdir_with_index(head_tree.as_ref(), None)
            .context("diffing against HEAD")?;
        let mut files: Vec<String> = diff
            .deltas()
            .filter_map(|d| {
                d.new_file()
                    .path()
                    .or_else(|| d.old_file().path())
                    .and_then(|p| p.to_str())
                    .map(str::to_string)
            })
            .collect();
        for (path, status) in self.statuses()? {
            if status.contains(git2::Status::WT_NEW) && !files.contains(&path) {
                files.push(path);
            }
        }
        files.retain(|p| !is_harness_path(p));
        Ok(files)
    }

    pub fn code_was_modified(&self) -> Result<bool> {
        Ok(self.modified_files()?.iter().any(|f| is_code_file(f)))
    }

    /// Whether `path` (relative to the work tree) differs from HEAD.
    pub fn file_modified(&self, path: &str) -> bool {
        match self.repo.status_file(Path::new(path)) {
            Ok(status) => !status.is_empty() && !status.contains(git2::Status::IGNORED),
            Err(_) => false,
        }
    }
}
