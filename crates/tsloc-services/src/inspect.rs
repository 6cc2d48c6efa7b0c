use std::path::Path;

use tsloc_core::{LocaleCode, Result};
use tsloc_domain::Tally;
use tsloc_import_table::{list_locales, read_sheet};

use crate::log::TaskLog;

/// Locale columns offered by `table`, in header order.
pub fn inspect_table(table: &Path, log: &TaskLog, tally: &mut Tally) -> Result<Vec<LocaleCode>> {
    let sheet = read_sheet(table)?;
    let locales = list_locales(&sheet);
    for locale in &locales {
        tally.record(true);
        log.line(format!("locale column: {locale}"));
    }
    log.line(format!(
        "{} locale(s), {} data row(s) in {}",
        locales.len(),
        sheet.rows.len().saturating_sub(1),
        table.display()
    ));
    Ok(locales)
}
