// src/pipeline.rs
//
// One CI run: probe backend, locate changes, then for each file
// extract -> prompt -> invoke -> sanitize -> merge. Per-file problems
// land in the report; only an unreachable backend stops the run.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::detectors::ast::extract_summary;
use crate::detectors::language::Language;
use crate::error::PipelineError;
use crate::git::{locate_changes, ChangeSource};
use crate::llm::backend::Backend;
use crate::llm::invoke::{check_backend, ModelInvoker};
use crate::llm::prompt::{build_prompt, PromptRequest};
use crate::logger::{log, LogLevel, RunLog};
use crate::state::{FileOutcome, FileReport, GenerationResult, MergeOutcome, RunReport, RunStatus};
use crate::testgen::deps::{external_candidates, update_manifest};
use crate::testgen::file::{merge_tests, PlannedWrites, TestLayout};
use crate::testgen::ledger::MergeLedger;
use crate::testgen::sanitize::sanitize_output;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Base revision; `None` compares against the previous commit.
    pub base: Option<String>,
    pub dry_run: bool,
    pub update_manifest: bool,
    pub dump_prompts: Option<PathBuf>,
}

pub struct Pipeline<'a> {
    repo_root: PathBuf,
    config: &'a Config,
    changes: &'a dyn ChangeSource,
    backend: Arc<dyn Backend>,
    options: RunOptions,
}

/// Mutable state threaded through one run.
struct RunContext<'r> {
    invoker: ModelInvoker,
    layout: TestLayout,
    ledger: MergeLedger,
    ledger_path: PathBuf,
    /// Present only for dry runs.
    planned: Option<PlannedWrites>,
    local_roots: Vec<String>,
    log: &'r mut RunLog,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        config: &'a Config,
        changes: &'a dyn ChangeSource,
        backend: Arc<dyn Backend>,
        options: RunOptions,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            config,
            changes,
            backend,
            options,
        }
    }

    pub fn run(&self, run: &mut RunLog) -> Result<RunReport, PipelineError> {
        self.config.validate()?;

        let label = self.backend.label();
        if !check_backend(&self.backend, self.config.probe_timeout()) {
            log(run, LogLevel::Error, format!("Backend {label} is unreachable, aborting"));
            return Err(PipelineError::BackendUnreachable(label));
        }
        log(run, LogLevel::Info, format!("Backend {label} is reachable"));

        let files = locate_changes(
            self.changes,
            self.options.base.as_deref(),
            &self.config.source_root,
            &self.config.extension,
            run,
        );
        log(
            run,
            LogLevel::Info,
            format!("Found {} changed .{} files", files.len(), self.config.extension),
        );

        let mut report = RunReport {
            dry_run: self.options.dry_run,
            ..RunReport::default()
        };
        if files.is_empty() {
            return Ok(report);
        }

        let layout = TestLayout::from_config(self.config);
        let ledger_path = MergeLedger::path_in(&self.repo_root.join(&layout.test_root));
        let ledger = match MergeLedger::load(&ledger_path) {
            Ok(l) => l,
            Err(e) => {
                log(
                    run,
                    LogLevel::Warn,
                    format!("Ignoring merge ledger, starting empty: {e}"),
                );
                MergeLedger::default()
            }
        };

        let mut ctx = RunContext {
            invoker: ModelInvoker::new(Arc::clone(&self.backend), self.config.request_timeout()),
            layout,
            ledger,
            ledger_path,
            planned: self.options.dry_run.then(PlannedWrites::default),
            local_roots: local_roots(&self.config.source_root),
            log: run,
        };

        let mut new_deps: BTreeSet<String> = BTreeSet::new();
        for file in &files {
            let file_report = self.process_file(file, &mut ctx);
            if matches!(&file_report.outcome, FileOutcome::Merged(m) if m.wrote()) {
                new_deps.extend(file_report.dependencies.iter().cloned());
            }
            report.files.push(file_report);
        }

        if !self.options.dry_run {
            if let Err(e) = ctx.ledger.save(&ctx.ledger_path) {
                log(ctx.log, LogLevel::Warn, format!("Cannot save merge ledger: {e}"));
            }
        }

        report.manifest_added = self.record_dependencies(&new_deps, ctx.log);
        summarize(&report, ctx.log);

        Ok(report)
    }

    fn process_file(&self, file: &str, ctx: &mut RunContext) -> FileReport {
        let mut report = FileReport {
            file: file.to_string(),
            parse_failed: false,
            outcome: FileOutcome::NoTestableSurface,
            destination: None,
            dependencies: Vec::new(),
        };

        log(ctx.log, LogLevel::Info, format!("Analyzing {file}"));

        let content = match fs::read(self.repo_root.join(file)) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                log(ctx.log, LogLevel::Error, format!("Cannot read {file}: {e}"));
                report.outcome = FileOutcome::Unreadable(e.to_string());
                return report;
            }
        };

        let summary = extract_summary(file, content);
        report.parse_failed = summary.parse_failed;

        if summary.parse_failed {
            log(
                ctx.log,
                LogLevel::Warn,
                format!("Could not parse {file}; prompting from raw content"),
            );
        } else if !summary.has_testable_surface() {
            log(
                ctx.log,
                LogLevel::Info,
                format!("No functions or types in {file}, skipping"),
            );
            return report;
        }

        let prompt = build_prompt(&summary);
        drop(summary);
        self.dump_prompt(&prompt, ctx.log);

        log(ctx.log, LogLevel::Info, format!("Generating tests for {file}"));
        let raw = match ctx.invoker.invoke(&prompt) {
            Ok(text) => text,
            Err(e) => {
                log(
                    ctx.log,
                    LogLevel::Error,
                    format!("Generation failed for {file}: {e}"),
                );
                report.outcome = FileOutcome::BackendFailed(e.to_string());
                return report;
            }
        };

        let result = self.generation_result(file, &raw, ctx);
        report.destination = Some(result.destination.clone());
        report.dependencies = result.dependencies.clone();

        if !result.success {
            log(
                ctx.log,
                LogLevel::Warn,
                format!("Model returned no test code for {file}"),
            );
            report.outcome = FileOutcome::EmptyOutput;
            return report;
        }

        report.outcome = match merge_tests(
            &self.repo_root,
            &result.destination,
            &result.original_file,
            &result.sanitized_content,
            &mut ctx.ledger,
            ctx.planned.as_mut(),
        ) {
            Ok(outcome) => {
                log_merge(&outcome, file, ctx.log);
                FileOutcome::Merged(outcome)
            }
            Err(e) => {
                log(ctx.log, LogLevel::Error, e.to_string());
                FileOutcome::MergeFailed(e.to_string())
            }
        };

        report
    }

    fn generation_result(&self, file: &str, raw: &str, ctx: &RunContext) -> GenerationResult {
        let language = Language::from_path(file);
        let sanitized = sanitize_output(raw, language);
        let dependencies =
            external_candidates(&sanitized.dependencies, &ctx.local_roots, language);

        GenerationResult {
            original_file: file.to_string(),
            success: !sanitized.content.is_empty(),
            sanitized_content: sanitized.content,
            destination: ctx.layout.destination(file),
            dependencies,
        }
    }

    fn record_dependencies(&self, names: &BTreeSet<String>, run: &mut RunLog) -> Vec<String> {
        let Some(manifest) = self.config.manifest.as_ref().filter(|_| self.options.update_manifest)
        else {
            return Vec::new();
        };
        if names.is_empty() {
            return Vec::new();
        }

        let names: Vec<String> = names.iter().cloned().collect();
        if self.options.dry_run {
            log(
                run,
                LogLevel::Info,
                format!("Dry run: would check manifest for {}", names.join(", ")),
            );
            return Vec::new();
        }

        match update_manifest(&self.repo_root.join(manifest), &names) {
            Ok(added) => {
                if !added.is_empty() {
                    log(
                        run,
                        LogLevel::Warn,
                        format!(
                            "Added unverified dependencies to {}: {} (inferred from imports; check they are real packages)",
                            manifest.display(),
                            added.join(", ")
                        ),
                    );
                }
                added
            }
            Err(e) => {
                log(run, LogLevel::Error, e.to_string());
                Vec::new()
            }
        }
    }

    fn dump_prompt(&self, prompt: &PromptRequest, run: &mut RunLog) {
        let Some(dir) = &self.options.dump_prompts else {
            return;
        };
        let name = format!("{}.prompt.txt", prompt.filepath.replace(['/', '\\'], "_"));
        let written = fs::create_dir_all(dir).and_then(|_| fs::write(dir.join(&name), &prompt.text));
        if let Err(e) = written {
            log(run, LogLevel::Warn, format!("Cannot dump prompt {name}: {e}"));
        }
    }
}

/// Top-level package names of the project itself, e.g. `app` for `app/`.
fn local_roots(source_root: &str) -> Vec<String> {
    Path::new(source_root)
        .components()
        .next()
        .and_then(|c| c.as_os_str().to_str())
        .filter(|s| !s.is_empty() && *s != ".")
        .map(|s| vec![s.to_string(), "tests".to_string()])
        .unwrap_or_else(|| vec!["tests".to_string()])
}

fn log_merge(outcome: &MergeOutcome, file: &str, run: &mut RunLog) {
    match outcome {
        MergeOutcome::Created { path } => log(
            run,
            LogLevel::Success,
            format!("Created {} for {file}", path.display()),
        ),
        MergeOutcome::Appended { path } => log(
            run,
            LogLevel::Success,
            format!("Appended tests for {file} to {}", path.display()),
        ),
        MergeOutcome::AlreadyPresent { path } => log(
            run,
            LogLevel::Info,
            format!("Tests for {file} already in {}, nothing to do", path.display()),
        ),
        MergeOutcome::NothingToWrite => {
            log(run, LogLevel::Info, format!("Nothing to write for {file}"))
        }
    }
}

fn summarize(report: &RunReport, run: &mut RunLog) {
    let (level, text) = match report.status() {
        RunStatus::NothingToDo => (LogLevel::Info, "No new tests were generated.".to_string()),
        RunStatus::Success => (
            LogLevel::Success,
            format!("Tests generated for {} file(s).", report.writes()),
        ),
        RunStatus::Partial => (
            LogLevel::Warn,
            format!(
                "Tests generated for {} file(s); {} file(s) failed.",
                report.writes(),
                report.failures()
            ),
        ),
        RunStatus::AllFailed => (LogLevel::Error, "Every changed file failed.".to_string()),
    };
    log(run, level, text);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_roots_from_source_root() {
        assert_eq!(local_roots("app/"), ["app", "tests"]);
        assert_eq!(local_roots("src/pkg/"), ["src", "tests"]);
        assert_eq!(local_roots(""), ["tests"]);
    }
}
