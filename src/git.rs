// src/git.rs
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ChangeError;
use crate::logger::{log, LogLevel, RunLog};

/// Anything that can list paths changed between two revisions.
pub trait ChangeSource {
    /// Newline-separated changed paths. `None` compares the working
    /// revision with its immediate predecessor.
    fn changed_paths(&self, base: Option<&str>) -> Result<String, ChangeError>;
}

pub struct GitCli {
    repo_root: PathBuf,
}

impl GitCli {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

impl ChangeSource for GitCli {
    fn changed_paths(&self, base: Option<&str>) -> Result<String, ChangeError> {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.repo_root)
            .args(["diff", "--name-only", "--diff-filter=ACMR"]);

        match base {
            Some(b) => {
                cmd.arg(format!("{b}...HEAD"));
            }
            None => {
                cmd.args(["HEAD~1", "HEAD"]);
            }
        }

        let out = cmd.output()?;
        if !out.status.success() {
            return Err(ChangeError::Query(
                String::from_utf8_lossy(&out.stderr).trim().to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&out.stdout).to_string())
    }
}

/// Resolve the base revision: an explicit ref wins, then the CI
/// pull-request base (`GITHUB_BASE_REF`, compared against `origin/`).
pub fn resolve_base(explicit: Option<String>) -> Option<String> {
    explicit.filter(|b| !b.trim().is_empty()).or_else(|| {
        std::env::var("GITHUB_BASE_REF")
            .ok()
            .filter(|b| !b.trim().is_empty())
            .map(|b| format!("origin/{}", b.trim()))
    })
}

/// Build the ChangeSet. Query failures (e.g. no predecessor on the very
/// first commit) degrade to "no changes".
pub fn locate_changes(
    source: &dyn ChangeSource,
    base: Option<&str>,
    prefix: &str,
    extension: &str,
    run: &mut RunLog,
) -> Vec<String> {
    match source.changed_paths(base) {
        Ok(raw) => filter_changed(&raw, prefix, extension),
        Err(e) => {
            log(
                run,
                LogLevel::Warn,
                format!("Change query failed, treating as no changes: {e}"),
            );
            Vec::new()
        }
    }
}

pub fn filter_changed(raw: &str, prefix: &str, extension: &str) -> Vec<String> {
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    let mut out: Vec<String> = Vec::new();

    for line in raw.lines() {
        let path = line.trim();
        if path.is_empty() || !path.starts_with(prefix) || !path.ends_with(&suffix) {
            continue;
        }
        if !out.iter().any(|p| p == path) {
            out.push(path.to_string());
        }
    }

    out
}
