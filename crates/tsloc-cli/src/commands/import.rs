use std::path::PathBuf;

use color_eyre::eyre::{Result, WrapErr};
use tsloc_services::{LocaleCode, Task};

use super::{run_task, Ctx};

pub fn run_import(
    ctx: &mut Ctx,
    table: PathBuf,
    ts: PathBuf,
    lang: String,
    dry_run: bool,
    backup: bool,
) -> Result<()> {
    tracing::debug!(event = "import_args", table = ?table, ts = ?ts, lang = %lang, dry_run, backup);

    let locale = LocaleCode::new(lang).wrap_err("invalid --lang")?;
    ctx.settings.backup |= backup;
    let report = run_task(
        ctx,
        Task::ImportColumn {
            table,
            document: ts.clone(),
            locale,
            dry_run,
        },
    )?;
    if dry_run {
        ui_info!(
            "dry run: {} of {} unit(s) in {} would be updated",
            report.tally.succeeded,
            report.tally.total,
            ts.display()
        );
    }
    Ok(())
}
