use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod table;

pub use table::{MergeStats, TableRow, TranslationTable};

/// Workspace-wide result alias.
pub type Result<T> = std::result::Result<T, SyncError>;

/// A single `(source, translation)` pairing read from a `.ts` document.
///
/// Identity is the exact source text: no trimming, no case folding.
/// The translation may legitimately be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub source: String,
    pub translation: String,
}

impl TranslationUnit {
    pub fn new(source: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            translation: translation.into(),
        }
    }
}

/// XML end-of-line handling: `\r\n` and a lone `\r` both become `\n`.
///
/// Apply to raw document text before entity expansion so that an explicit
/// `&#13;` survives.
pub fn normalize_line_ends(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Short locale tag such as `zn`, `en` or `zh_CN`.
///
/// Compared exactly, which is also how table headers are matched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocaleCode(String);

impl LocaleCode {
    pub fn new(code: impl Into<String>) -> Result<Self> {
        let code = code.into();
        if code.trim().is_empty() || code.contains(['/', '\\']) {
            return Err(SyncError::InvalidLocale(code));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `zn`, the baseline locale when nothing else is configured.
impl Default for LocaleCode {
    fn default() -> Self {
        Self("zn".to_string())
    }
}

impl fmt::Display for LocaleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LocaleCode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for LocaleCode {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<LocaleCode> for String {
    fn from(code: LocaleCode) -> Self {
        code.0
    }
}

impl AsRef<str> for LocaleCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Coarse classification used for reporting and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    StructuralParse,
    Write,
    ExternalTool,
    Validation,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not-found",
            ErrorKind::StructuralParse => "structural-parse",
            ErrorKind::Write => "write",
            ErrorKind::ExternalTool => "external-tool",
            ErrorKind::Validation => "validation",
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{what} not found: {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    #[error("locale `{locale}` is not a column of {}", path.display())]
    LocaleNotFound { locale: String, path: PathBuf },

    #[error("malformed document {}: {message}", path.display())]
    StructuralParse { path: PathBuf, message: String },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool}: {message}")]
    ExternalTool { tool: String, message: String },

    #[error("baseline document `{expected}` not found in {}", dir.display())]
    MissingBaseline { expected: String, dir: PathBuf },

    #[error("invalid locale code `{0}`")]
    InvalidLocale(String),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::NotFound { .. } | SyncError::LocaleNotFound { .. } => ErrorKind::NotFound,
            SyncError::StructuralParse { .. } => ErrorKind::StructuralParse,
            SyncError::Write { .. } | SyncError::Io { .. } => ErrorKind::Write,
            SyncError::ExternalTool { .. } => ErrorKind::ExternalTool,
            SyncError::MissingBaseline { .. } | SyncError::InvalidLocale(_) => {
                ErrorKind::Validation
            }
        }
    }

    /// Map an `open`/`read` failure, turning `ENOENT` into `NotFound`.
    pub fn from_read(what: &'static str, path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            SyncError::NotFound { what, path }
        } else {
            SyncError::Io { path, source: err }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_code_rejects_blank_and_paths() {
        assert!(LocaleCode::new("").is_err());
        assert!(LocaleCode::new("   ").is_err());
        assert!(LocaleCode::new("../en").is_err());
        assert_eq!(LocaleCode::new("zh_CN").unwrap().as_str(), "zh_CN");
    }

    #[test]
    fn line_ends_collapse_to_newline() {
        assert_eq!(normalize_line_ends("a\r\nb\rc\nd"), "a\nb\nc\nd");
        assert_eq!(normalize_line_ends("\r\r\n"), "\n\n");
        assert!(matches!(normalize_line_ends("plain\n"), Cow::Borrowed(_)));
    }

    #[test]
    fn error_kinds_follow_taxonomy() {
        let e = SyncError::LocaleNotFound {
            locale: "fr".into(),
            path: "t.xlsx".into(),
        };
        assert_eq!(e.kind(), ErrorKind::NotFound);
        let e = SyncError::MissingBaseline {
            expected: "zn.ts".into(),
            dir: "i18n".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Validation);
        let e = SyncError::from_read(
            "document",
            "a.ts",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert_eq!(e.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn write_error_surfaces_os_reason() {
        let e = SyncError::Write {
            path: "zn.ts".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(e.to_string().contains("zn.ts"));
        assert!(e.to_string().to_lowercase().contains("permission denied"));
    }
}
