use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tsloc_core::{LocaleCode, SyncError};
use tsloc_domain::{Tally, TaskFailure, TaskKind, TaskReport, SCHEMA_VERSION};
use tsloc_import_ts::ImportOptions;

use crate::catalog::compile_catalogs;
use crate::export::{export_directory, export_document};
use crate::import::import_table_column;
use crate::inspect::inspect_table;
use crate::log::TaskLog;
use crate::Settings;

/// Unit of work accepted by [`Engine::submit`].
#[derive(Debug, Clone)]
pub enum Task {
    ExportDirectory {
        dir: PathBuf,
        output: Option<PathBuf>,
    },
    ExportDocument {
        document: PathBuf,
        locale: Option<LocaleCode>,
        output: Option<PathBuf>,
    },
    ImportColumn {
        table: PathBuf,
        document: PathBuf,
        locale: LocaleCode,
        dry_run: bool,
    },
    CompileCatalogs {
        dir: PathBuf,
    },
    ListLocales {
        table: PathBuf,
    },
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::ExportDirectory { .. } => TaskKind::ExportMulti,
            Task::ExportDocument { .. } => TaskKind::ExportSingle,
            Task::ImportColumn { .. } => TaskKind::ImportSingle,
            Task::CompileCatalogs { .. } => TaskKind::CatalogCompile,
            Task::ListLocales { .. } => TaskKind::Inspect,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// Newline-joined batch of task log lines.
    Log(String),
    Finished(TaskReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running(TaskKind),
}

#[derive(Debug, thiserror::Error)]
#[error("engine worker has stopped")]
pub struct EngineStopped;

struct Job {
    id: u64,
    task: Task,
}

/// Single-worker task queue.
///
/// Tasks run strictly one after another in submission order. Every task ends
/// with exactly one [`TaskEvent::Finished`], sent after its last log batch.
pub struct Engine {
    queue: mpsc::UnboundedSender<Job>,
    state: watch::Receiver<EngineState>,
    worker: JoinHandle<()>,
    flusher: JoinHandle<()>,
    log: TaskLog,
    next_id: AtomicU64,
}

impl Engine {
    /// Spawn the worker. Must be called from within a tokio runtime.
    pub fn start(settings: Settings) -> (Self, mpsc::UnboundedReceiver<TaskEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(EngineState::Idle);

        let log_events = events_tx.clone();
        let log = TaskLog::new(settings.flush_threshold, move |batch| {
            let _ = log_events.send(TaskEvent::Log(batch));
        });
        let flusher = log.spawn_flusher(settings.flush_interval);
        let worker = tokio::spawn(run_worker(
            queue_rx,
            Arc::new(settings),
            log.clone(),
            events_tx,
            state_tx,
        ));

        let engine = Self {
            queue: queue_tx,
            state: state_rx,
            worker,
            flusher,
            log,
            next_id: AtomicU64::new(1),
        };
        (engine, events_rx)
    }

    /// Queue `task` and return its id. Never waits for the worker.
    pub fn submit(&self, task: Task) -> Result<u64, EngineStopped> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(id, kind = task.kind().as_str(), "task queued");
        self.queue.send(Job { id, task }).map_err(|_| EngineStopped)?;
        Ok(id)
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<EngineState> {
        self.state.clone()
    }

    /// Run every queued task to completion, flush the log and stop.
    pub async fn shutdown(self) {
        let Engine {
            queue,
            worker,
            flusher,
            log,
            ..
        } = self;
        drop(queue);
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "engine worker panicked");
        }
        flusher.abort();
        log.flush();
    }
}

async fn run_worker(
    mut queue: mpsc::UnboundedReceiver<Job>,
    settings: Arc<Settings>,
    log: TaskLog,
    events: mpsc::UnboundedSender<TaskEvent>,
    state: watch::Sender<EngineState>,
) {
    while let Some(Job { id, task }) = queue.recv().await {
        let kind = task.kind();
        state.send_replace(EngineState::Running(kind));
        tracing::info!(id, kind = kind.as_str(), "task started");

        let report = execute(id, task, Arc::clone(&settings), log.clone()).await;
        match &report.error {
            None => tracing::info!(
                id,
                kind = kind.as_str(),
                total = report.tally.total,
                succeeded = report.tally.succeeded,
                failed = report.tally.failed,
                "task finished"
            ),
            Some(f) => tracing::error!(id, kind = kind.as_str(), error = %f.message, "task failed"),
        }

        log.flush();
        state.send_replace(EngineState::Idle);
        let _ = events.send(TaskEvent::Finished(report));
    }
}

/// Scratch state of one run. Built fresh for every task.
#[derive(Default)]
struct Run {
    tally: Tally,
    output: Option<PathBuf>,
    locales: Vec<LocaleCode>,
}

async fn execute(id: u64, task: Task, settings: Arc<Settings>, log: TaskLog) -> TaskReport {
    let kind = task.kind();
    let (run, result) = match task {
        Task::CompileCatalogs { dir } => {
            let mut run = Run::default();
            log.line(format!("compiling catalogs in {}", dir.display()));
            let r = compile_catalogs(&dir, &settings.catalog, &log, &mut run.tally).await;
            (run, r.map_err(Failure::Sync))
        }
        blocking => {
            let log = log.clone();
            match tokio::task::spawn_blocking(move || run_blocking(blocking, &settings, &log)).await
            {
                Ok(done) => done,
                Err(e) => (Run::default(), Err(Failure::Panicked(e.to_string()))),
            }
        }
    };

    let error = result.err().map(|f| {
        log.line(format!("error: {f}"));
        f.into_report()
    });
    TaskReport {
        schema_version: SCHEMA_VERSION,
        id,
        kind,
        tally: run.tally,
        output: run.output.map(|p| p.display().to_string()),
        locales: run.locales.into_iter().map(String::from).collect(),
        error,
    }
}

fn run_blocking(task: Task, settings: &Settings, log: &TaskLog) -> (Run, Result<(), Failure>) {
    let mut run = Run::default();
    let result = match task {
        Task::ExportDirectory { dir, output } => {
            let mut opts = settings.export_options();
            opts.output = output.or(opts.output);
            export_directory(&dir, &opts, log, &mut run.tally).map(|p| run.output = Some(p))
        }
        Task::ExportDocument {
            document,
            locale,
            output,
        } => {
            let mut opts = settings.export_options();
            opts.output = output.or(opts.output);
            export_document(&document, locale, &opts, log, &mut run.tally)
                .map(|p| run.output = Some(p))
        }
        Task::ImportColumn {
            table,
            document,
            locale,
            dry_run,
        } => {
            let opts = ImportOptions {
                dry_run,
                backup: settings.backup,
            };
            import_table_column(&table, &document, &locale, opts, log, &mut run.tally).map(|o| {
                if o.written {
                    run.output = Some(o.path);
                }
            })
        }
        Task::ListLocales { table } => {
            inspect_table(&table, log, &mut run.tally).map(|l| run.locales = l)
        }
        Task::CompileCatalogs { .. } => Ok(()),
    };
    (run, result.map_err(Failure::Sync))
}

enum Failure {
    Sync(SyncError),
    Panicked(String),
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Sync(e) => write!(f, "{e}"),
            Failure::Panicked(msg) => write!(f, "task aborted: {msg}"),
        }
    }
}

impl Failure {
    fn into_report(self) -> TaskFailure {
        let kind = match &self {
            Failure::Sync(e) => e.kind().as_str(),
            Failure::Panicked(_) => "internal",
        };
        TaskFailure {
            kind: kind.to_string(),
            message: self.to_string(),
        }
    }
}
