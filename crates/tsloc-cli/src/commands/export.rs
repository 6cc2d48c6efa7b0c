use std::path::PathBuf;

use color_eyre::eyre::{Result, WrapErr};
use tsloc_services::{LocaleCode, Task};

use super::{run_task, Ctx};

pub fn run_export(
    ctx: &mut Ctx,
    dir: Option<PathBuf>,
    ts: Option<PathBuf>,
    baseline: Option<String>,
    lang: Option<String>,
    out: Option<PathBuf>,
) -> Result<()> {
    tracing::debug!(event = "export_args", dir = ?dir, ts = ?ts, baseline = ?baseline, lang = ?lang, out = ?out);

    if let Some(code) = baseline {
        ctx.settings.baseline = LocaleCode::new(code).wrap_err("invalid --baseline")?;
    }
    let task = match (dir, ts) {
        (_, Some(document)) => Task::ExportDocument {
            document,
            locale: lang
                .map(LocaleCode::new)
                .transpose()
                .wrap_err("invalid --lang")?,
            output: out,
        },
        (Some(dir), None) => Task::ExportDirectory { dir, output: out },
        (None, None) => Task::ExportDirectory {
            dir: PathBuf::from("."),
            output: out,
        },
    };
    run_task(ctx, task)?;
    Ok(())
}
