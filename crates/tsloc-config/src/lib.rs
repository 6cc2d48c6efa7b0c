use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "tsloc.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TsLocConfig {
    /// Stem of the anchor document (`<baseline>.ts`).
    pub baseline_locale: Option<String>,
    pub export: Option<ExportCfg>,
    pub import: Option<ImportCfg>,
    pub catalog: Option<CatalogCfg>,
    pub log: Option<LogCfg>,
    pub schema: Option<SchemaCfg>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportCfg {
    /// File name of the table written next to the documents.
    pub output_name: Option<String>,
    pub sheet_name: Option<String>,
    pub source_header: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportCfg {
    pub backup: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogCfg {
    pub lrelease: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogCfg {
    pub flush_interval_ms: Option<u64>,
    pub flush_threshold: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaCfg {
    pub out_dir: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Parse one config file. A missing file is not an error.
pub fn load_file(path: &Path) -> Result<Option<TsLocConfig>, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    toml::from_str(&text)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Search order: `./tsloc.toml`, then `$CONFIG_DIR/tsloc/tsloc.toml`.
/// Earlier files win field by field.
pub fn load_config() -> Result<TsLocConfig, ConfigError> {
    let mut candidates = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(CONFIG_FILE));
    }
    if let Some(base) = dirs::config_dir() {
        candidates.push(base.join("tsloc").join(CONFIG_FILE));
    }
    load_layered(&candidates)
}

pub fn load_layered(paths: &[PathBuf]) -> Result<TsLocConfig, ConfigError> {
    let mut merged = TsLocConfig::default();
    for path in paths {
        if let Some(cfg) = load_file(path)? {
            tracing::debug!(path = %path.display(), "config loaded");
            merged = merge(merged, cfg);
        }
    }
    Ok(merged)
}

fn merge(mut a: TsLocConfig, b: TsLocConfig) -> TsLocConfig {
    if a.baseline_locale.is_none() {
        a.baseline_locale = b.baseline_locale;
    }
    a.export = merge_opt(a.export, b.export, merge_export);
    a.import = merge_opt(a.import, b.import, merge_import);
    a.catalog = merge_opt(a.catalog, b.catalog, merge_catalog);
    a.log = merge_opt(a.log, b.log, merge_log);
    a.schema = merge_opt(a.schema, b.schema, merge_schema);
    a
}

fn merge_opt<T>(a: Option<T>, b: Option<T>, f: fn(T, T) -> T) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (None, Some(b)) => Some(b),
        (Some(a), None) => Some(a),
        (None, None) => None,
    }
}

fn merge_export(mut a: ExportCfg, b: ExportCfg) -> ExportCfg {
    if a.output_name.is_none() {
        a.output_name = b.output_name;
    }
    if a.sheet_name.is_none() {
        a.sheet_name = b.sheet_name;
    }
    if a.source_header.is_none() {
        a.source_header = b.source_header;
    }
    a
}

fn merge_import(mut a: ImportCfg, b: ImportCfg) -> ImportCfg {
    if a.backup.is_none() {
        a.backup = b.backup;
    }
    a
}

fn merge_catalog(mut a: CatalogCfg, b: CatalogCfg) -> CatalogCfg {
    if a.lrelease.is_none() {
        a.lrelease = b.lrelease;
    }
    if a.timeout_secs.is_none() {
        a.timeout_secs = b.timeout_secs;
    }
    a
}

fn merge_log(mut a: LogCfg, b: LogCfg) -> LogCfg {
    if a.flush_interval_ms.is_none() {
        a.flush_interval_ms = b.flush_interval_ms;
    }
    if a.flush_threshold.is_none() {
        a.flush_threshold = b.flush_threshold;
    }
    a
}

fn merge_schema(mut a: SchemaCfg, b: SchemaCfg) -> SchemaCfg {
    if a.out_dir.is_none() {
        a.out_dir = b.out_dir;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earlier_layers_win_per_field() {
        let tmp = tempfile::tempdir().unwrap();
        let local = tmp.path().join("local.toml");
        let global = tmp.path().join("global.toml");
        std::fs::write(
            &local,
            "baseline_locale = \"zh_CN\"\n[catalog]\ntimeout_secs = 5\n",
        )
        .unwrap();
        std::fs::write(
            &global,
            "baseline_locale = \"zn\"\n[catalog]\nlrelease = \"/opt/qt/bin/lrelease\"\ntimeout_secs = 60\n[export]\noutput_name = \"all.csv\"\n",
        )
        .unwrap();

        let cfg = load_layered(&[local, tmp.path().join("missing.toml"), global]).unwrap();
        assert_eq!(cfg.baseline_locale.as_deref(), Some("zh_CN"));
        let catalog = cfg.catalog.unwrap();
        assert_eq!(catalog.timeout_secs, Some(5));
        assert_eq!(catalog.lrelease.as_deref(), Some("/opt/qt/bin/lrelease"));
        assert_eq!(cfg.export.unwrap().output_name.as_deref(), Some("all.csv"));
    }

    #[test]
    fn invalid_toml_names_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tsloc.toml");
        std::fs::write(&path, "baseline_locale = [").unwrap();
        let err = load_file(&path).unwrap_err();
        assert!(err.to_string().contains("tsloc.toml"));
    }
}
