use rust_xlsxwriter::{Workbook, XlsxError};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tsloc_core::{Result, SyncError, TranslationTable};
use tsloc_domain::Tally;

pub const DEFAULT_SOURCE_HEADER: &str = "source text";
pub const DEFAULT_SHEET_NAME: &str = "Translations";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Xlsx,
    Csv,
}

impl TableFormat {
    /// `.csv` selects CSV; every other extension is written as a workbook.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => TableFormat::Csv,
            _ => TableFormat::Xlsx,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub sheet_name: String,
    pub source_header: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            source_header: DEFAULT_SOURCE_HEADER.to_string(),
        }
    }
}

/// `dir/translations.xlsx` -> `dir/translations_<n>.xlsx`; `n == 0` is the base itself.
fn candidate_path(base: &Path, n: usize) -> PathBuf {
    if n == 0 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{stem}_{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{n}"),
    };
    base.with_file_name(name)
}

/// First of `base`, `base_1`, `base_2`, … that does not exist yet.
pub fn allocate_output_path(base: &Path) -> PathBuf {
    let mut n = 0;
    loop {
        let candidate = candidate_path(base, n);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Like [`allocate_output_path`] but claims the path with an empty file, so
/// concurrent writers in this process never get the same one.
pub fn reserve_output_path(base: &Path) -> Result<PathBuf> {
    let mut n = 0;
    loop {
        let candidate = candidate_path(base, n);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => {
                return Err(SyncError::Write {
                    path: candidate,
                    source: e,
                })
            }
        }
    }
}

fn xlsx_io(err: XlsxError) -> io::Error {
    match err {
        XlsxError::IoError(e) => e,
        other => io::Error::other(other.to_string()),
    }
}

/// Serialize `table` next to `base` (collision-free) and return the path written.
///
/// Each data row is recorded in `tally`: it succeeds only if every one of its
/// cells was accepted by the format. If the artifact cannot be saved the
/// placeholder is removed and every row counts as failed.
pub fn write_table(
    table: &TranslationTable,
    base: &Path,
    opts: &WriteOptions,
    tally: &mut Tally,
) -> Result<PathBuf> {
    if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| SyncError::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let path = reserve_output_path(base)?;
    let saved = match TableFormat::from_path(&path) {
        TableFormat::Xlsx => write_xlsx(table, &path, opts, tally),
        TableFormat::Csv => write_csv(table, &path, opts, tally),
    };
    match saved {
        Ok(()) => {
            tracing::info!(path = %path.display(), rows = tally.total, failed = tally.failed, "table saved");
            Ok(path)
        }
        Err(source) => {
            let _ = fs::remove_file(&path);
            tally.fail_all();
            Err(SyncError::Write { path, source })
        }
    }
}

fn header<'a>(table: &'a TranslationTable, opts: &'a WriteOptions) -> Vec<&'a str> {
    std::iter::once(opts.source_header.as_str())
        .chain(table.locales().iter().map(|l| l.as_str()))
        .collect()
}

fn write_xlsx(
    table: &TranslationTable,
    path: &Path,
    opts: &WriteOptions,
    tally: &mut Tally,
) -> io::Result<()> {
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(opts.sheet_name.as_str()).map_err(xlsx_io)?;
        for (col, label) in header(table, opts).into_iter().enumerate() {
            let col = u16::try_from(col).map_err(io::Error::other)?;
            sheet.write_string(0, col, label).map_err(xlsx_io)?;
        }
        for (i, row) in table.rows().iter().enumerate() {
            let Ok(r) = u32::try_from(i + 1) else {
                tally.record(false);
                continue;
            };
            let mut ok = true;
            let cells = std::iter::once(row.source()).chain(table.row_cells(row));
            for (col, value) in cells.enumerate() {
                let accepted = u16::try_from(col)
                    .ok()
                    .is_some_and(|c| sheet.write_string(r, c, value).is_ok());
                if !accepted {
                    tracing::warn!(row = r + 1, col = col + 1, "cell rejected");
                    ok = false;
                }
            }
            tally.record(ok);
        }
    }
    workbook.save(path).map_err(xlsx_io)
}

fn write_csv(
    table: &TranslationTable,
    path: &Path,
    opts: &WriteOptions,
    tally: &mut Tally,
) -> io::Result<()> {
    let mut wtr = csv::Writer::from_path(path).map_err(io::Error::other)?;
    wtr.write_record(header(table, opts))
        .map_err(io::Error::other)?;
    for row in table.rows() {
        let record: Vec<&str> = std::iter::once(row.source())
            .chain(table.row_cells(row))
            .collect();
        let ok = wtr.write_record(&record).is_ok();
        if !ok {
            tracing::warn!(source = %row.source(), "row rejected");
        }
        tally.record(ok);
    }
    wtr.flush()
}
