use std::path::Path;

use tsloc_core::{LocaleCode, Result, SyncError, TranslationTable, TranslationUnit};
use tsloc_parsers_ts::{DocumentSet, TsUnits};

use crate::log::TaskLog;

/// Build the table for one directory: rows from the baseline document,
/// one extra column per auxiliary document.
///
/// Any malformed document aborts the whole consolidation.
pub fn consolidate(
    dir: &Path,
    baseline: &LocaleCode,
    docs: &DocumentSet,
    log: &TaskLog,
) -> Result<TranslationTable> {
    let Some(baseline_path) = docs.baseline.as_deref() else {
        return Err(SyncError::MissingBaseline {
            expected: format!("{baseline}.ts"),
            dir: dir.to_path_buf(),
        });
    };

    let mut table = TranslationTable::new(baseline.clone());
    for unit in read_logged(baseline, baseline_path, log)? {
        table.insert_baseline(unit);
    }
    tracing::info!(locale = %baseline, rows = table.len(), "baseline loaded");

    for (locale, path) in &docs.auxiliaries {
        let units = read_logged(locale, path, log)?;
        let stats = table.merge_auxiliary(locale.clone(), units);
        if stats.dropped > 0 {
            tracing::warn!(
                locale = %locale,
                path = %path.display(),
                dropped = stats.dropped,
                "units without a baseline row were dropped"
            );
            log.line(format!(
                "{locale}: {} merged, {} not in baseline",
                stats.applied, stats.dropped
            ));
        }
    }
    Ok(table)
}

fn read_logged(locale: &LocaleCode, path: &Path, log: &TaskLog) -> Result<Vec<TranslationUnit>> {
    log.line(format!("reading {}", path.display()));
    let mut units = Vec::new();
    for unit in TsUnits::open(path)? {
        let unit = unit?;
        log.line(format!(
            "[{locale}] {} -> {}",
            unit.source, unit.translation
        ));
        units.push(unit);
    }
    Ok(units)
}
