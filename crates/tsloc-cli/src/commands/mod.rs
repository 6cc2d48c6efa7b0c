pub mod compile;
pub mod export;
pub mod import;
pub mod locales;
pub mod schema;

use color_eyre::eyre::{eyre, Result, WrapErr};
use tsloc_domain::TaskReport;
use tsloc_services::{Engine, Settings, Task, TaskEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Per-invocation state shared by every subcommand.
pub struct Ctx {
    pub format: OutputFormat,
    pub quiet: bool,
    pub settings: Settings,
}

/// Run one task on a fresh engine, streaming its log to stderr, and hand back
/// the final report. A report carrying an error becomes an `Err`.
pub fn run_task(ctx: &Ctx, task: Task) -> Result<TaskReport> {
    let runtime = tokio::runtime::Runtime::new().wrap_err("cannot start async runtime")?;
    let report = runtime.block_on(async {
        let (engine, mut events) = Engine::start(ctx.settings.clone());
        engine.submit(task)?;
        let mut report = None;
        while let Some(event) = events.recv().await {
            match event {
                TaskEvent::Log(batch) => {
                    if !ctx.quiet && ctx.format == OutputFormat::Text {
                        for line in batch.lines() {
                            eprintln!("  {line}");
                        }
                    }
                }
                TaskEvent::Finished(r) => {
                    report = Some(r);
                    break;
                }
            }
        }
        engine.shutdown().await;
        report.ok_or_else(|| eyre!("engine stopped without a report"))
    })?;

    print_report(ctx, &report)?;
    match &report.error {
        None => Ok(report),
        Some(f) => Err(eyre!("{} ({})", f.message, f.kind)),
    }
}

fn print_report(ctx: &Ctx, report: &TaskReport) -> Result<()> {
    if ctx.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    let t = report.tally;
    if report.error.is_some() {
        ui_err!(
            "{} failed after {} of {} item(s) succeeded",
            report.kind.as_str(),
            t.succeeded,
            t.total
        );
        return Ok(());
    }
    if let Some(out) = &report.output {
        ui_ok!("{} saved to {out}", report.kind.as_str());
    }
    if t.failed > 0 {
        ui_warn!("total {}, succeeded {}, failed {}", t.total, t.succeeded, t.failed);
    } else if !ctx.quiet {
        ui_info!("total {}, succeeded {}, failed {}", t.total, t.succeeded, t.failed);
    }
    Ok(())
}
