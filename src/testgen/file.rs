// src/testgen/file.rs

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use crate::config::{Config, RouteRule};
use crate::detectors::language::Language;
use crate::error::MergeError;
use crate::state::MergeOutcome;
use crate::testgen::ledger::MergeLedger;

/* ============================================================
   Destination
   ============================================================ */

/// Where tests for a source file go, relative to the repository root.
#[derive(Debug, Clone)]
pub struct TestLayout {
    pub test_root: PathBuf,
    pub prefix: String,
    pub routes: Vec<RouteRule>,
}

impl TestLayout {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            test_root: cfg.test_root.clone(),
            prefix: cfg.test_prefix.clone(),
            routes: cfg.routes(),
        }
    }

    /// `<test_root>/<prefix><stem>.<ext>`, unless a route rule names one of
    /// the path's directories or its stem; the last matching rule wins.
    pub fn destination(&self, original: &str) -> PathBuf {
        let path = Path::new(original);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module");

        let mut parts: Vec<&str> = path
            .parent()
            .map(|p| {
                p.components()
                    .filter_map(|c| match c {
                        Component::Normal(s) => s.to_str(),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        parts.push(stem);

        if let Some(rule) = self
            .routes
            .iter()
            .rev()
            .find(|r| parts.iter().any(|p| *p == r.area))
        {
            return self.test_root.join(&rule.file);
        }

        let name = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}{}.{}", self.prefix, stem, ext),
            None => format!("{}{}", self.prefix, stem),
        };
        self.test_root.join(name)
    }
}

/// One machine-readable line per merged module, matched by whole-line equality.
pub fn section_marker(module: &str) -> String {
    let token = Language::from_path(module).comment_token();
    format!("{token} osmotest: module={module}")
}

/* ============================================================
   Merge
   ============================================================ */

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergePlan {
    Create,
    Append { separator: &'static str },
    AlreadyPresent,
    Nothing,
}

/// Decide what merging `content` for `module` into `path` would do.
/// `destination` is the repo-relative name used for the ledger.
pub fn plan_merge(
    path: &Path,
    destination: &Path,
    module: &str,
    content: &str,
    ledger: &MergeLedger,
) -> Result<MergePlan, MergeError> {
    if content.trim().is_empty() {
        return Ok(MergePlan::Nothing);
    }

    let existing = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(MergePlan::Create),
        Err(e) => return Err(MergeError::new(path, e)),
    };

    let marker = section_marker(module);
    if existing.lines().any(|l| l.trim_end() == marker)
        || ledger.contains(destination, module)
        || existing.trim() == content.trim()
    {
        return Ok(MergePlan::AlreadyPresent);
    }

    let separator = if existing.is_empty() || existing.ends_with("\n\n") {
        ""
    } else if existing.ends_with('\n') {
        "\n"
    } else {
        "\n\n"
    };

    Ok(MergePlan::Append { separator })
}

/// Carry out a plan. Only `Create` writes a file wholesale.
pub fn apply_merge(
    plan: &MergePlan,
    path: &Path,
    destination: &Path,
    module: &str,
    content: &str,
    ledger: &mut MergeLedger,
) -> Result<MergeOutcome, MergeError> {
    let outcome_path = destination.to_path_buf();

    match plan {
        MergePlan::Nothing => Ok(MergeOutcome::NothingToWrite),
        MergePlan::AlreadyPresent => Ok(MergeOutcome::AlreadyPresent { path: outcome_path }),

        MergePlan::Create => {
            ensure_parent_dir(path).map_err(|e| MergeError::new(path, e))?;

            let mut file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .map_err(|e| MergeError::new(path, e))?;
            file.write_all(content.as_bytes())
                .map_err(|e| MergeError::new(path, e))?;

            ledger.reset(destination, module, content);
            Ok(MergeOutcome::Created { path: outcome_path })
        }

        MergePlan::Append { separator } => {
            let mut file = fs::OpenOptions::new()
                .append(true)
                .open(path)
                .map_err(|e| MergeError::new(path, e))?;

            let section = format!(
                "{separator}{}\n{}\n",
                section_marker(module),
                content.trim_end()
            );
            file.write_all(section.as_bytes())
                .map_err(|e| MergeError::new(path, e))?;

            ledger.record(destination, module, content);
            Ok(MergeOutcome::Appended { path: outcome_path })
        }
    }
}

/// What a dry run has pretended to write so far, so a second module
/// routed to a not-yet-existing file reports an append, as a real run would.
#[derive(Debug, Default)]
pub struct PlannedWrites {
    modules: HashMap<PathBuf, Vec<String>>,
}

impl PlannedWrites {
    pub fn plan(
        &mut self,
        path: &Path,
        destination: &Path,
        module: &str,
        content: &str,
        ledger: &MergeLedger,
    ) -> Result<MergePlan, MergeError> {
        let seen = self.modules.get(destination);
        let plan = match (plan_merge(path, destination, module, content, ledger)?, seen) {
            (MergePlan::Nothing, _) => MergePlan::Nothing,
            (_, Some(mods)) if mods.iter().any(|m| m == module) => MergePlan::AlreadyPresent,
            (MergePlan::Create, Some(_)) => MergePlan::Append { separator: "\n\n" },
            (plan, _) => plan,
        };

        if matches!(plan, MergePlan::Create | MergePlan::Append { .. }) {
            self.modules
                .entry(destination.to_path_buf())
                .or_default()
                .push(module.to_string());
        }
        Ok(plan)
    }
}

/// Plan and apply in one step. With `dry_run` the plan is reported as
/// if applied but nothing touches the disk.
pub fn merge_tests(
    repo_root: &Path,
    destination: &Path,
    module: &str,
    content: &str,
    ledger: &mut MergeLedger,
    dry_run: Option<&mut PlannedWrites>,
) -> Result<MergeOutcome, MergeError> {
    let path = repo_root.join(destination);

    if let Some(planned) = dry_run {
        let plan = planned.plan(&path, destination, module, content, ledger)?;
        let path = destination.to_path_buf();
        return Ok(match plan {
            MergePlan::Nothing => MergeOutcome::NothingToWrite,
            MergePlan::AlreadyPresent => MergeOutcome::AlreadyPresent { path },
            MergePlan::Create => MergeOutcome::Created { path },
            MergePlan::Append { .. } => MergeOutcome::Appended { path },
        });
    }

    let plan = plan_merge(&path, destination, module, content, ledger)?;
    apply_merge(&plan, &path, destination, module, content, ledger)
}

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> TestLayout {
        TestLayout::from_config(&Config::default())
    }

    #[test]
    fn plain_module_maps_to_prefixed_stem() {
        assert_eq!(
            layout().destination("app/utils.py"),
            PathBuf::from("tests/test_utils.py")
        );
    }

    #[test]
    fn area_directory_routes_to_shared_file() {
        assert_eq!(
            layout().destination("app/routes/users.py"),
            PathBuf::from("tests/test_routes.py")
        );
        assert_eq!(
            layout().destination("app/models.py"),
            PathBuf::from("tests/test_models.py")
        );
    }

    #[test]
    fn last_matching_rule_wins() {
        // matches both `services` (dir) and `models` (stem)
        assert_eq!(
            layout().destination("app/services/models.py"),
            PathBuf::from("tests/test_models.py")
        );
    }

    #[test]
    fn rust_layout_routes_to_rust_files() {
        let cfg = Config {
            extension: "rs".into(),
            ..Config::default()
        };
        assert_eq!(
            TestLayout::from_config(&cfg).destination("src/models/job.rs"),
            PathBuf::from("tests/test_models.rs")
        );
    }

    #[test]
    fn area_must_be_a_whole_segment() {
        assert_eq!(
            layout().destination("app/myroutes.py"),
            PathBuf::from("tests/test_myroutes.py")
        );
    }

    #[test]
    fn marker_is_exact_per_module() {
        assert_eq!(section_marker("app/models.py"), "# osmotest: module=app/models.py");
        assert_eq!(section_marker("src/jobs.rs"), "// osmotest: module=src/jobs.rs");
    }

    #[test]
    fn substring_module_name_is_not_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_models.py");
        fs::write(&path, "# osmotest: module=app/models.pyx\ndef test_a(): pass\n").unwrap();

        let plan = plan_merge(
            &path,
            Path::new("tests/test_models.py"),
            "app/models.py",
            "def test_b(): pass",
            &MergeLedger::default(),
        )
        .unwrap();
        assert_eq!(plan, MergePlan::Append { separator: "\n" });
    }

    #[test]
    fn empty_content_never_touches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = MergeLedger::default();
        let out = merge_tests(
            dir.path(),
            Path::new("tests/test_a.py"),
            "app/a.py",
            "  \n",
            &mut ledger,
            None,
        )
        .unwrap();

        assert_eq!(out, MergeOutcome::NothingToWrite);
        assert!(!dir.path().join("tests").exists());
    }

    #[test]
    fn dry_run_reports_create_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = MergeLedger::default();
        let mut planned = PlannedWrites::default();
        let out = merge_tests(
            dir.path(),
            Path::new("tests/test_a.py"),
            "app/a.py",
            "def test_a(): pass",
            &mut ledger,
            Some(&mut planned),
        )
        .unwrap();

        assert_eq!(out, MergeOutcome::Created { path: "tests/test_a.py".into() });
        assert!(!dir.path().join("tests/test_a.py").exists());
        assert!(ledger.is_empty());
    }

    #[test]
    fn dry_run_second_module_on_same_new_file_appends() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = MergeLedger::default();
        let mut planned = PlannedWrites::default();
        let dest = Path::new("tests/test_routes.py");

        let mut merge = |module: &str| {
            merge_tests(dir.path(), dest, module, "def test_x(): pass", &mut ledger, Some(&mut planned))
                .unwrap()
        };

        assert_eq!(merge("app/routes/a.py"), MergeOutcome::Created { path: dest.into() });
        assert_eq!(merge("app/routes/b.py"), MergeOutcome::Appended { path: dest.into() });
        assert_eq!(merge("app/routes/a.py"), MergeOutcome::AlreadyPresent { path: dest.into() });
        assert!(!dir.path().join("tests").exists());
    }
}
