use std::path::PathBuf;

use serde::Serialize;

/* ---------- structural summary ---------- */

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionInfo {
    pub name: String,
    /// Parameter names, implicit receiver excluded.
    pub params: Vec<String>,
    pub doc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeInfo {
    pub name: String,
    pub doc: String,
    pub methods: Vec<FunctionInfo>,
}

/// Shape of one source file. Lives from extraction until its prompt is built.
#[derive(Debug, Clone)]
pub struct StructuralSummary {
    pub filepath: String,
    pub functions: Vec<FunctionInfo>,
    pub types: Vec<TypeInfo>,
    pub raw_content: String,
    pub parse_failed: bool,
}

impl StructuralSummary {
    /// Raw-content-only summary for files the parser rejected.
    pub fn unparsed(filepath: &str, raw_content: String) -> Self {
        Self {
            filepath: filepath.to_string(),
            functions: Vec::new(),
            types: Vec::new(),
            raw_content,
            parse_failed: true,
        }
    }

    /// A parsed file with no functions and no types has nothing to test.
    pub fn has_testable_surface(&self) -> bool {
        self.parse_failed || !self.functions.is_empty() || !self.types.is_empty()
    }
}

/* ---------- generation ---------- */

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub original_file: String,
    pub sanitized_content: String,
    pub destination: PathBuf,
    pub dependencies: Vec<String>,
    pub success: bool,
}

/* ---------- merge ---------- */

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// Destination did not exist and was written wholesale.
    Created { path: PathBuf },
    /// A new module section was appended to an existing file.
    Appended { path: PathBuf },
    /// The module's section was already there; file untouched.
    AlreadyPresent { path: PathBuf },
    /// Sanitized content was empty; nothing written.
    NothingToWrite,
}

impl MergeOutcome {
    pub fn wrote(&self) -> bool {
        matches!(self, MergeOutcome::Created { .. } | MergeOutcome::Appended { .. })
    }
}

/* ---------- run report ---------- */

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Generated and merged (or planned, in a dry run).
    Merged(MergeOutcome),
    /// Parsed cleanly but declares no functions or types.
    NoTestableSurface,
    /// Model returned nothing usable after sanitization.
    EmptyOutput,
    BackendFailed(String),
    MergeFailed(String),
    Unreadable(String),
}

impl FileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            FileOutcome::BackendFailed(_) | FileOutcome::MergeFailed(_) | FileOutcome::Unreadable(_)
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: String,
    pub parse_failed: bool,
    pub outcome: FileOutcome,
    pub destination: Option<PathBuf>,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Empty ChangeSet, or every file was a no-op.
    NothingToDo,
    Success,
    /// Some files failed, some did not.
    Partial,
    AllFailed,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub files: Vec<FileReport>,
    pub manifest_added: Vec<String>,
    pub dry_run: bool,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.files.iter().filter(|f| f.outcome.is_failure()).count()
    }

    pub fn writes(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(&f.outcome, FileOutcome::Merged(m) if m.wrote()))
            .count()
    }

    pub fn status(&self) -> RunStatus {
        let failures = self.failures();
        if failures > 0 {
            return if failures == self.files.len() {
                RunStatus::AllFailed
            } else {
                RunStatus::Partial
            };
        }
        if self.writes() == 0 {
            RunStatus::NothingToDo
        } else {
            RunStatus::Success
        }
    }
}
