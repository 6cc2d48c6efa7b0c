use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, Command};
use tsloc_core::{Result, SyncError};
use tsloc_domain::Tally;
use tsloc_parsers_ts::list_ts_files;

use crate::log::TaskLog;

pub const DEFAULT_COMPILER: &str = "lrelease";
pub const COMPILER_ENV: &str = "TSLOC_LRELEASE";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct CatalogOptions {
    pub lrelease: PathBuf,
    pub timeout: Duration,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            lrelease: PathBuf::from(DEFAULT_COMPILER),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl CatalogOptions {
    /// Configured path, then `$TSLOC_LRELEASE`, then `lrelease` on `PATH`.
    pub fn resolve_compiler(configured: Option<&str>) -> PathBuf {
        configured
            .map(str::to_string)
            .or_else(|| std::env::var(COMPILER_ENV).ok())
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_COMPILER))
    }
}

/// `app_en.ts` -> `app_en.qm`.
pub fn catalog_path(document: &Path) -> PathBuf {
    document.with_extension("qm")
}

enum CompileFailure {
    MissingTool(io::Error),
    Spawn(io::Error),
    Exit { code: Option<i32>, stderr: String },
    Timeout { stderr: String },
}

impl std::fmt::Display for CompileFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileFailure::MissingTool(e) | CompileFailure::Spawn(e) => write!(f, "{e}"),
            CompileFailure::Exit { code: Some(c), stderr } => {
                write!(f, "exit code {c}: {}", stderr.trim())
            }
            CompileFailure::Exit { code: None, stderr } => {
                write!(f, "terminated by signal: {}", stderr.trim())
            }
            CompileFailure::Timeout { stderr } if stderr.trim().is_empty() => {
                write!(f, "timed out")
            }
            CompileFailure::Timeout { stderr } => write!(f, "timed out: {}", stderr.trim()),
        }
    }
}

/// Compile every `.ts` document in `dir` into the `.qm` next to it, one at a
/// time. Per-file failures are counted and the loop moves on; a compiler that
/// cannot be found aborts the run.
pub async fn compile_catalogs(
    dir: &Path,
    opts: &CatalogOptions,
    log: &TaskLog,
    tally: &mut Tally,
) -> Result<()> {
    let files = list_ts_files(dir)?;
    if files.is_empty() {
        return Err(SyncError::NotFound {
            what: ".ts documents",
            path: dir.to_path_buf(),
        });
    }
    let tool = opts.lrelease.display().to_string();
    if opts.lrelease.components().count() > 1 && !opts.lrelease.exists() {
        return Err(SyncError::ExternalTool {
            tool,
            message: "compiler not found".into(),
        });
    }

    tally.total = files.len();
    for ts in &files {
        let qm = catalog_path(ts);
        log.line(format!("compiling {}", ts.display()));
        match compile_one(opts, ts, &qm).await {
            Ok(()) => {
                tally.succeeded += 1;
                log.line(format!("compiled {}", qm.display()));
            }
            Err(CompileFailure::MissingTool(e)) => {
                tracing::error!(tool = %tool, error = %e, "compiler not found");
                return Err(SyncError::ExternalTool {
                    tool,
                    message: format!("compiler not found: {e}"),
                });
            }
            Err(failure) => {
                tally.failed += 1;
                tracing::warn!(path = %ts.display(), reason = %failure, "compile failed");
                log.line(format!("failed {}: {failure}", ts.display()));
            }
        }
    }
    Ok(())
}

/// Grace period for the stderr reader once the compiler has exited or been
/// killed. A grandchild can keep the pipe open past that.
const STDERR_GRACE: Duration = Duration::from_millis(500);

async fn compile_one(
    opts: &CatalogOptions,
    ts: &Path,
    qm: &Path,
) -> std::result::Result<(), CompileFailure> {
    let mut child = Command::new(&opts.lrelease)
        .arg(ts)
        .arg("-qm")
        .arg(qm)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CompileFailure::MissingTool(e),
            _ => CompileFailure::Spawn(e),
        })?;

    let captured = Arc::new(Mutex::new(Vec::new()));
    let reader = child.stderr.take().map(|pipe| tokio::spawn(drain(pipe, Arc::clone(&captured))));

    let waited = tokio::time::timeout(opts.timeout, child.wait()).await;
    if waited.is_err() {
        if let Err(e) = child.kill().await {
            tracing::warn!(path = %ts.display(), error = %e, "cannot kill compiler");
        }
    }
    if let Some(reader) = reader {
        if tokio::time::timeout(STDERR_GRACE, reader).await.is_err() {
            tracing::debug!(path = %ts.display(), "compiler stderr still open, using what was read");
        }
    }
    let stderr = {
        let bytes = captured.lock().unwrap_or_else(|p| p.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    };

    let status = match waited {
        Ok(status) => status.map_err(CompileFailure::Spawn)?,
        Err(_) => return Err(CompileFailure::Timeout { stderr }),
    };
    if status.success() {
        Ok(())
    } else {
        Err(CompileFailure::Exit {
            code: status.code(),
            stderr,
        })
    }
}

/// Copy `pipe` into `into` until EOF, keeping partial output readable.
async fn drain(mut pipe: ChildStderr, into: Arc<Mutex<Vec<u8>>>) {
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => into
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .extend_from_slice(&chunk[..n]),
            Err(e) => {
                tracing::debug!(error = %e, "compiler stderr read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tsloc_core::ErrorKind;

    #[test]
    fn catalog_replaces_only_the_extension() {
        assert_eq!(
            catalog_path(Path::new("/x/app.ts.d/app_en.ts")),
            PathBuf::from("/x/app.ts.d/app_en.qm")
        );
    }

    #[test]
    fn configured_compiler_wins() {
        assert_eq!(
            CatalogOptions::resolve_compiler(Some("/opt/qt/bin/lrelease")),
            PathBuf::from("/opt/qt/bin/lrelease")
        );
    }

    #[tokio::test]
    async fn missing_compiler_aborts() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("en.ts"), "<TS/>").unwrap();
        let opts = CatalogOptions {
            lrelease: tmp.path().join("no-such-lrelease"),
            timeout: Duration::from_secs(5),
        };
        let err = compile_catalogs(tmp.path(), &opts, &TaskLog::discard(), &mut Tally::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalTool);
    }

    #[cfg(unix)]
    mod fake_tool {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Shell stand-in for lrelease: `$1` is the .ts, `$3` the .qm.
        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-lrelease");
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn docs(dir: &Path) -> PathBuf {
            let docs = dir.join("docs");
            fs::create_dir(&docs).unwrap();
            fs::write(docs.join("en.ts"), "<TS/>").unwrap();
            fs::write(docs.join("de.ts"), "<TS/>").unwrap();
            docs
        }

        #[tokio::test]
        async fn successful_runs_write_catalogs() {
            let tmp = tempfile::tempdir().unwrap();
            let docs = docs(tmp.path());
            let opts = CatalogOptions {
                lrelease: script(tmp.path(), "cp \"$1\" \"$3\""),
                timeout: Duration::from_secs(10),
            };
            let mut tally = Tally::default();
            compile_catalogs(&docs, &opts, &TaskLog::discard(), &mut tally)
                .await
                .unwrap();
            assert_eq!(tally, Tally::new(2, 2, 0));
            assert!(docs.join("en.qm").exists());
            assert!(docs.join("de.qm").exists());
        }

        #[tokio::test]
        async fn non_zero_exit_counts_as_failure_and_continues() {
            let tmp = tempfile::tempdir().unwrap();
            let docs = docs(tmp.path());
            let opts = CatalogOptions {
                lrelease: script(
                    tmp.path(),
                    "case \"$1\" in *de.ts) echo broken >&2; exit 3;; esac\ncp \"$1\" \"$3\"",
                ),
                timeout: Duration::from_secs(10),
            };
            let (log, batches) = crate::log::collecting(1000);
            let mut tally = Tally::default();
            compile_catalogs(&docs, &opts, &log, &mut tally).await.unwrap();
            log.flush();

            assert_eq!(tally, Tally::new(2, 1, 1));
            assert!(docs.join("en.qm").exists());
            let text = batches.lock().unwrap().join("\n");
            assert!(text.contains("exit code 3: broken"));
        }

        #[tokio::test]
        async fn hung_compiler_times_out() {
            let tmp = tempfile::tempdir().unwrap();
            let docs = docs(tmp.path());
            let opts = CatalogOptions {
                lrelease: script(tmp.path(), "exec sleep 30"),
                timeout: Duration::from_millis(200),
            };
            let mut tally = Tally::default();
            compile_catalogs(&docs, &opts, &TaskLog::discard(), &mut tally)
                .await
                .unwrap();
            assert_eq!(tally, Tally::new(2, 0, 2));
        }

        #[tokio::test]
        async fn timeout_reports_what_the_compiler_printed() {
            let tmp = tempfile::tempdir().unwrap();
            let docs = docs(tmp.path());
            let opts = CatalogOptions {
                lrelease: script(tmp.path(), "echo 'stuck on lock' >&2\nexec sleep 30"),
                timeout: Duration::from_millis(300),
            };
            let (log, batches) = crate::log::collecting(1000);
            let mut tally = Tally::default();
            let started = std::time::Instant::now();
            compile_catalogs(&docs, &opts, &log, &mut tally).await.unwrap();
            log.flush();

            assert_eq!(tally, Tally::new(2, 0, 2));
            assert!(started.elapsed() < Duration::from_secs(10));
            let text = batches.lock().unwrap().join("\n");
            assert!(text.contains("timed out: stuck on lock"), "{text}");
        }
    }
}
