#[macro_use]
mod ui;
mod commands;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use commands::{Ctx, OutputFormat};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use tsloc_services::Settings;

#[derive(Parser)]
#[command(
    name = "tsloc",
    version,
    about = "Sync Qt .ts translation files with spreadsheet tables"
)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Only print the final result
    #[arg(short, long, global = true)]
    quiet: bool,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export .ts documents into one translation table
    Export {
        /// Directory holding `<baseline>.ts` and the other locale documents
        #[arg(long, conflicts_with = "ts")]
        dir: Option<PathBuf>,
        /// Export a single document instead of a directory
        #[arg(long)]
        ts: Option<PathBuf>,
        /// Locale whose document defines the rows
        #[arg(long)]
        baseline: Option<String>,
        /// Column name for a single document (default: its file stem)
        #[arg(long, requires = "ts")]
        lang: Option<String>,
        /// Table path; `.csv` writes CSV, anything else a workbook
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Apply one locale column of a table to a .ts document
    Import {
        #[arg(long)]
        table: PathBuf,
        #[arg(long)]
        ts: PathBuf,
        #[arg(long)]
        lang: String,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, default_value_t = false)]
        backup: bool,
    },

    /// Compile every .ts document in a directory to .qm with lrelease
    Compile {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        lrelease: Option<PathBuf>,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// List the locale columns of a table
    Locales {
        #[arg(long)]
        table: PathBuf,
    },

    /// Write JSON schemas of the report types
    Schema {
        #[arg(long, default_value = "")]
        out_dir: PathBuf,
    },
}

trait Runnable {
    fn run(self, ctx: &mut Ctx, schema_dir: Option<String>) -> Result<()>;
}

impl Runnable for Commands {
    fn run(self, ctx: &mut Ctx, schema_dir: Option<String>) -> Result<()> {
        let cmd_name = format!("{:?}", self);
        info!("▶ Starting command: {}", cmd_name);

        let result = match self {
            Commands::Export {
                dir,
                ts,
                baseline,
                lang,
                out,
            } => commands::export::run_export(ctx, dir, ts, baseline, lang, out),
            Commands::Import {
                table,
                ts,
                lang,
                dry_run,
                backup,
            } => commands::import::run_import(ctx, table, ts, lang, dry_run, backup),
            Commands::Compile {
                dir,
                lrelease,
                timeout_secs,
            } => commands::compile::run_compile(ctx, dir, lrelease, timeout_secs),
            Commands::Locales { table } => commands::locales::run_locales(ctx, table),
            Commands::Schema { out_dir } => commands::schema::run_schema(out_dir, schema_dir),
        };

        match &result {
            Ok(_) => info!("✔ Finished command: {}", cmd_name),
            Err(e) => error!("✖ Command {} failed: {:?}", cmd_name, e),
        }
        result
    }
}

fn init_tracing(quiet: bool) -> WorkerGuard {
    let log_dir = std::env::var_os("TSLOC_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = rolling::daily(log_dir, "tsloc.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if quiet { "error" } else { "info" };
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        );

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(file_writer)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
    guard
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let _guard = init_tracing(cli.quiet);

    let use_color = !cli.no_color
        && std::io::stdout().is_terminal()
        && std::env::var_os("NO_COLOR").is_none();
    ui::set_color(use_color);

    let cfg = tsloc_config::load_config().wrap_err("cannot load tsloc.toml")?;
    let settings = Settings::from_config(&cfg).wrap_err("invalid configuration")?;
    let schema_dir = cfg.schema.and_then(|s| s.out_dir);

    let mut ctx = Ctx {
        format: cli.format,
        quiet: cli.quiet,
        settings,
    };
    cli.cmd.run(&mut ctx, schema_dir)
}
