use std::path::PathBuf;

use color_eyre::eyre::Result;
use tsloc_services::Task;

use super::{run_task, Ctx, OutputFormat};

pub fn run_locales(ctx: &mut Ctx, table: PathBuf) -> Result<()> {
    tracing::debug!(event = "locales_args", table = ?table);

    let report = run_task(ctx, Task::ListLocales { table })?;
    if ctx.format == OutputFormat::Text {
        for locale in &report.locales {
            println!("{locale}");
        }
    }
    Ok(())
}
