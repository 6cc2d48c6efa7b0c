use std::path::{Path, PathBuf};

use tsloc_core::{LocaleCode, Result, SyncError, TranslationTable};
use tsloc_domain::Tally;
use tsloc_export_table::{write_table, WriteOptions};
use tsloc_parsers_ts::{list_ts_files, locale_code_from_file_name, partition_baseline, TsUnits};

use crate::consolidate::consolidate;
use crate::log::TaskLog;

pub const DEFAULT_OUTPUT_NAME: &str = "translations.xlsx";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub baseline: LocaleCode,
    /// Explicit table path; otherwise `output_name` next to the input.
    pub output: Option<PathBuf>,
    pub output_name: String,
    pub write: WriteOptions,
}

impl ExportOptions {
    pub fn new(baseline: LocaleCode) -> Self {
        Self {
            baseline,
            output: None,
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            write: WriteOptions::default(),
        }
    }

    fn target(&self, next_to: &Path) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| next_to.join(&self.output_name))
    }
}

/// Consolidate every `.ts` document in `dir` into one table and save it.
pub fn export_directory(
    dir: &Path,
    opts: &ExportOptions,
    log: &TaskLog,
    tally: &mut Tally,
) -> Result<PathBuf> {
    log.line(format!("scanning {}", dir.display()));
    let files = list_ts_files(dir)?;
    if files.is_empty() {
        return Err(SyncError::NotFound {
            what: ".ts documents",
            path: dir.to_path_buf(),
        });
    }
    log.line(format!("found {} document(s)", files.len()));

    let docs = partition_baseline(&files, &opts.baseline);
    let table = consolidate(dir, &opts.baseline, &docs, log)?;
    save(&table, &opts.target(dir), opts, log, tally)
}

/// Two-column table (source plus one locale) for a single document.
///
/// The locale column is named after the document unless `locale` is given.
pub fn export_document(
    document: &Path,
    locale: Option<LocaleCode>,
    opts: &ExportOptions,
    log: &TaskLog,
    tally: &mut Tally,
) -> Result<PathBuf> {
    let locale = locale
        .or_else(|| {
            document
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(locale_code_from_file_name)
        })
        .unwrap_or_else(|| opts.baseline.clone());

    log.line(format!("reading {}", document.display()));
    let mut table = TranslationTable::new(locale.clone());
    for unit in TsUnits::open(document)? {
        let unit = unit?;
        log.line(format!("[{locale}] {} -> {}", unit.source, unit.translation));
        table.insert_baseline(unit);
    }

    let next_to = match document.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    save(&table, &opts.target(next_to), opts, log, tally)
}

fn save(
    table: &TranslationTable,
    base: &Path,
    opts: &ExportOptions,
    log: &TaskLog,
    tally: &mut Tally,
) -> Result<PathBuf> {
    let path = write_table(table, base, &opts.write, tally)?;
    log.line(format!(
        "saved {} ({} rows, {} failed)",
        path.display(),
        tally.total,
        tally.failed
    ));
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tsloc_core::ErrorKind;

    const ZN: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<TS version=\"2.1\" language=\"zh_CN\">\n<context>\n<name>Main</name>\n<message>\n<source>hello</source>\n<translation>你好</translation>\n</message>\n<message>\n<source>bye</source>\n<translation>再见</translation>\n</message>\n</context>\n</TS>\n";
    const EN: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<TS version=\"2.1\" language=\"en\">\n<context>\n<name>Main</name>\n<message>\n<source>hello</source>\n<translation>Hello</translation>\n</message>\n<message>\n<source>orphan</source>\n<translation>Orphan</translation>\n</message>\n</context>\n</TS>\n";

    fn code(s: &str) -> LocaleCode {
        LocaleCode::new(s).unwrap()
    }

    fn csv_opts() -> ExportOptions {
        ExportOptions {
            output_name: "translations.csv".into(),
            ..ExportOptions::new(code("zn"))
        }
    }

    #[test]
    fn directory_export_writes_next_to_documents() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("zn.ts"), ZN).unwrap();
        fs::write(tmp.path().join("en.ts"), EN).unwrap();

        let mut tally = Tally::default();
        let path = export_directory(tmp.path(), &csv_opts(), &TaskLog::discard(), &mut tally)
            .unwrap();

        assert_eq!(path, tmp.path().join("translations.csv"));
        assert_eq!(tally, Tally::new(2, 2, 0));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "source text,zn,en\nhello,你好,Hello\nbye,再见,\n"
        );
    }

    #[test]
    fn repeated_export_never_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("zn.ts"), ZN).unwrap();

        let opts = csv_opts();
        let log = TaskLog::discard();
        let first = export_directory(tmp.path(), &opts, &log, &mut Tally::default()).unwrap();
        let second = export_directory(tmp.path(), &opts, &log, &mut Tally::default()).unwrap();
        assert_ne!(first, second);
        assert_eq!(second, tmp.path().join("translations_1.csv"));
    }

    #[test]
    fn empty_directory_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = export_directory(
            tmp.path(),
            &csv_opts(),
            &TaskLog::discard(),
            &mut Tally::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn single_document_uses_its_file_name_as_column() {
        let tmp = tempfile::tempdir().unwrap();
        let ts = tmp.path().join("en.ts");
        fs::write(&ts, EN).unwrap();

        let mut tally = Tally::default();
        let path = export_document(&ts, None, &csv_opts(), &TaskLog::discard(), &mut tally)
            .unwrap();
        assert_eq!(tally, Tally::new(2, 2, 0));
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "source text,en\nhello,Hello\norphan,Orphan\n"
        );
    }
}
