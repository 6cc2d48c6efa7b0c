use std::path::Path;

use tsloc_core::{LocaleCode, Result};
use tsloc_domain::Tally;
use tsloc_import_table::read_column;
use tsloc_import_ts::{import_into_document, ImportOptions, ImportOutcome};

use crate::log::TaskLog;

/// Apply one locale column of `table` to `document`.
pub fn import_table_column(
    table: &Path,
    document: &Path,
    locale: &LocaleCode,
    opts: ImportOptions,
    log: &TaskLog,
    tally: &mut Tally,
) -> Result<ImportOutcome> {
    log.line(format!("reading column `{locale}` of {}", table.display()));
    let mapping = read_column(table, locale)?;

    let mut entries: Vec<_> = mapping.iter().collect();
    entries.sort();
    for (source, translation) in entries {
        log.line(format!("[{locale}] {source} -> {translation}"));
    }
    log.line(format!("{} entries in column", mapping.len()));

    let outcome = import_into_document(document, &mapping, opts, tally)?;
    for source in &outcome.unmatched {
        tracing::debug!(source = %source, "no table row for unit");
    }
    if outcome.tally.failed > 0 {
        tracing::warn!(
            path = %document.display(),
            unmatched = outcome.tally.failed,
            "units left untouched"
        );
    }

    let verb = if outcome.written { "updated" } else { "checked (dry run)" };
    log.line(format!(
        "{} {verb}: {} of {} units matched",
        document.display(),
        outcome.tally.succeeded,
        outcome.tally.total
    ));
    if let Some(bak) = &outcome.backup {
        log.line(format!("backup at {}", bak.display()));
    }
    Ok(outcome)
}
