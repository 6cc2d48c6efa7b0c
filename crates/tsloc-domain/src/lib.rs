use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

/// Final audit counts of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Tally {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl Tally {
    pub fn new(total: usize, succeeded: usize, failed: usize) -> Self {
        Self {
            total,
            succeeded,
            failed,
        }
    }

    pub fn record(&mut self, ok: bool) {
        self.total += 1;
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Everything counted so far becomes a failure (e.g. the artifact was not saved).
    pub fn fail_all(&mut self) {
        self.failed += self.succeeded;
        self.succeeded = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    ExportMulti,
    ExportSingle,
    ImportSingle,
    CatalogCompile,
    Inspect,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::ExportMulti => "export-multi",
            TaskKind::ExportSingle => "export-single",
            TaskKind::ImportSingle => "import-single",
            TaskKind::CatalogCompile => "catalog-compile",
            TaskKind::Inspect => "inspect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaskFailure {
    /// One of `not-found`, `structural-parse`, `write`, `external-tool`, `validation`.
    pub kind: String,
    pub message: String,
}

/// Terminal event of every task, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaskReport {
    pub schema_version: u32,
    pub id: u64,
    pub kind: TaskKind,
    pub tally: Tally,
    /// Artifact written by the task, if any.
    pub output: Option<String>,
    /// Locale columns, filled by the inspect task.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locales: Vec<String>,
    pub error: Option<TaskFailure>,
}

impl TaskReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
