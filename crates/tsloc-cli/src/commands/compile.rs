use std::path::PathBuf;
use std::time::Duration;

use color_eyre::eyre::Result;
use tsloc_services::Task;

use super::{run_task, Ctx};

pub fn run_compile(
    ctx: &mut Ctx,
    dir: PathBuf,
    lrelease: Option<PathBuf>,
    timeout_secs: Option<u64>,
) -> Result<()> {
    tracing::debug!(event = "compile_args", dir = ?dir, lrelease = ?lrelease, timeout_secs = ?timeout_secs);

    if let Some(tool) = lrelease {
        ctx.settings.catalog.lrelease = tool;
    }
    if let Some(secs) = timeout_secs {
        ctx.settings.catalog.timeout = Duration::from_secs(secs);
    }
    run_task(ctx, Task::CompileCatalogs { dir })?;
    Ok(())
}
