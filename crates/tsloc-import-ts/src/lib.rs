use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tsloc_core::{Result, SyncError};
use tsloc_domain::Tally;

mod patch;

pub use patch::{patch_document, PatchOutcome};

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Compute the tally without touching the document.
    pub dry_run: bool,
    /// Copy the original to `<name>.ts.bak` before replacing it.
    pub backup: bool,
}

#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub path: PathBuf,
    pub tally: Tally,
    pub matched: Vec<String>,
    pub unmatched: Vec<String>,
    pub written: bool,
    pub backup: Option<PathBuf>,
}

/// Patch `mapping` into the document at `path` and persist it atomically.
///
/// `tally` is filled as soon as the document has been scanned. If persisting
/// fails afterwards, every counted unit is reported as failed.
pub fn import_into_document(
    path: &Path,
    mapping: &HashMap<String, String>,
    opts: ImportOptions,
    tally: &mut Tally,
) -> Result<ImportOutcome> {
    let content =
        fs::read_to_string(path).map_err(|e| SyncError::from_read("document", path, e))?;
    let patched = patch_document(&content, mapping, path)?;
    tracing::debug!(
        path = %path.display(),
        total = patched.tally.total,
        matched = patched.tally.succeeded,
        "document patched in memory"
    );

    *tally = patched.tally;
    let mut outcome = ImportOutcome {
        path: path.to_path_buf(),
        tally: patched.tally,
        matched: patched.matched,
        unmatched: patched.unmatched,
        written: false,
        backup: None,
    };
    if opts.dry_run {
        return Ok(outcome);
    }

    match persist(path, &patched.content, opts.backup) {
        Ok(backup) => {
            outcome.backup = backup;
            outcome.written = true;
            Ok(outcome)
        }
        Err(e) => {
            tally.fail_all();
            Err(e)
        }
    }
}

fn persist(path: &Path, content: &str, backup: bool) -> Result<Option<PathBuf>> {
    // Surface permission/lock problems on the destination itself rather than
    // on the temp file.
    OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| SyncError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut bak_path = None;
    if backup {
        let bak = path.with_extension("ts.bak");
        fs::copy(path, &bak).map_err(|e| SyncError::Write {
            path: bak.clone(),
            source: e,
        })?;
        tracing::warn!(event = "backup", from = %path.display(), to = %bak.display());
        bak_path = Some(bak);
    }

    write_atomic(path, content.as_bytes())?;
    Ok(bak_path)
}

/// Write through a temp file in the destination directory, then rename it
/// over `path`. The destination keeps its permissions.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let wrap = |source: std::io::Error| SyncError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(wrap)?;
    tmp.write_all(bytes).map_err(wrap)?;
    tmp.as_file().sync_all().map_err(wrap)?;
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions()).map_err(wrap)?;
    }
    tmp.persist(path).map_err(|e| wrap(e.error))?;
    Ok(())
}
