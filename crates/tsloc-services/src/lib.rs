//! Sync flows over the reader/writer crates plus the engine that runs them.
//! Front ends (CLI, GUI) talk to this crate only.

use std::time::Duration;

pub use tsloc_core::{LocaleCode, Result, SyncError};
pub use tsloc_domain::{Tally, TaskKind, TaskReport};
pub use tsloc_export_table::WriteOptions;
pub use tsloc_import_ts::{ImportOptions, ImportOutcome};

pub mod catalog;
pub mod consolidate;
pub mod engine;
pub mod export;
pub mod import;
pub mod inspect;
pub mod log;

pub use catalog::{compile_catalogs, CatalogOptions};
pub use consolidate::consolidate;
pub use engine::{Engine, EngineState, EngineStopped, Task, TaskEvent};
pub use export::{export_directory, export_document, ExportOptions};
pub use import::import_table_column;
pub use inspect::inspect_table;
pub use log::TaskLog;

/// Everything a run needs besides the task itself.
#[derive(Debug, Clone)]
pub struct Settings {
    pub baseline: LocaleCode,
    pub output_name: String,
    pub write: WriteOptions,
    pub backup: bool,
    pub catalog: CatalogOptions,
    pub flush_interval: Duration,
    pub flush_threshold: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            baseline: LocaleCode::default(),
            output_name: export::DEFAULT_OUTPUT_NAME.to_string(),
            write: WriteOptions::default(),
            backup: false,
            catalog: CatalogOptions::default(),
            flush_interval: log::DEFAULT_FLUSH_INTERVAL,
            flush_threshold: log::DEFAULT_FLUSH_THRESHOLD,
        }
    }
}

impl Settings {
    /// Built-in defaults overlaid with whatever `cfg` sets.
    pub fn from_config(cfg: &tsloc_config::TsLocConfig) -> Result<Self> {
        let mut s = Settings::default();
        if let Some(code) = cfg.baseline_locale.as_deref() {
            s.baseline = LocaleCode::new(code)?;
        }
        if let Some(export) = &cfg.export {
            if let Some(name) = &export.output_name {
                s.output_name = name.clone();
            }
            if let Some(sheet) = &export.sheet_name {
                s.write.sheet_name = sheet.clone();
            }
            if let Some(header) = &export.source_header {
                s.write.source_header = header.clone();
            }
        }
        if let Some(backup) = cfg.import.as_ref().and_then(|i| i.backup) {
            s.backup = backup;
        }
        let catalog = cfg.catalog.clone().unwrap_or_default();
        s.catalog.lrelease = CatalogOptions::resolve_compiler(catalog.lrelease.as_deref());
        if let Some(secs) = catalog.timeout_secs {
            s.catalog.timeout = Duration::from_secs(secs);
        }
        if let Some(log) = &cfg.log {
            if let Some(ms) = log.flush_interval_ms {
                s.flush_interval = Duration::from_millis(ms.max(1));
            }
            if let Some(n) = log.flush_threshold {
                s.flush_threshold = n.max(1);
            }
        }
        Ok(s)
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            baseline: self.baseline.clone(),
            output: None,
            output_name: self.output_name.clone(),
            write: self.write.clone(),
        }
    }
}
