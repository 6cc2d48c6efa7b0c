use calamine::{open_workbook_auto, Reader};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tsloc_core::{normalize_line_ends, LocaleCode, Result, SyncError};

/// First worksheet of a table artifact, every cell rendered as a string.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub path: PathBuf,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn header(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or_default()
    }

    fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

/// Workbook formats that store control characters as `_xHHHH_` escapes.
fn is_ooxml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| ["xlsx", "xlsm", "xlsb"].iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Decode the `_xHHHH_` escapes of an OOXML string. `_x005F_` is an escaped
/// underscore, so `_x005F_x0041_` yields the literal `_x0041_`.
pub fn decode_ooxml_escapes(text: &str) -> Cow<'_, str> {
    if !text.contains("_x") {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find("_x") {
        out.push_str(&rest[..at]);
        let tail = &rest[at..];
        let decoded = tail
            .get(2..6)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .filter(|_| tail.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[7..];
            }
            None => {
                out.push('_');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Load `.csv` files directly and anything else through calamine
/// (`.xlsx`, `.xlsm`, `.xls`, `.ods`).
pub fn read_sheet(path: &Path) -> Result<Sheet> {
    if !path.is_file() {
        return Err(SyncError::NotFound {
            what: "table",
            path: path.to_path_buf(),
        });
    }
    let structural = |message: String| SyncError::StructuralParse {
        path: path.to_path_buf(),
        message,
    };

    let rows = if is_csv(path) {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| structural(e.to_string()))?;
        let mut rows: Vec<Vec<String>> = Vec::new();
        for rec in rdr.records() {
            let rec = rec.map_err(|e| structural(e.to_string()))?;
            rows.push(rec.iter().map(str::to_string).collect());
        }
        rows
    } else {
        let mut workbook = open_workbook_auto(path).map_err(|e| structural(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| structural("workbook has no worksheet".to_string()))?
            .map_err(|e| structural(e.to_string()))?;
        // Absolute indices: row 0 is the header even if the used range starts later.
        let (row0, col0) = range.start().unwrap_or((0, 0));
        let escaped = is_ooxml(path);
        let mut rows = vec![Vec::new(); row0 as usize];
        for r in range.rows() {
            let mut cells = vec![String::new(); col0 as usize];
            cells.extend(r.iter().map(|c| {
                let text = c.to_string();
                if escaped {
                    decode_ooxml_escapes(&text).into_owned()
                } else {
                    text
                }
            }));
            rows.push(cells);
        }
        rows
    };

    tracing::debug!(path = %path.display(), rows = rows.len(), "table loaded");
    Ok(Sheet {
        path: path.to_path_buf(),
        rows,
    })
}

/// Locale labels from the header, column 2 onwards, blanks skipped.
pub fn list_locales(sheet: &Sheet) -> Vec<LocaleCode> {
    sheet
        .header()
        .iter()
        .skip(1)
        .filter_map(|label| LocaleCode::new(label.as_str()).ok())
        .collect()
}

/// `source -> translation` for `locale`'s column. Rows with an empty source
/// are skipped and a repeated source keeps the last row's value. Keys get the
/// same line-end normalization as document text.
pub fn column_mapping(sheet: &Sheet, locale: &LocaleCode) -> Result<HashMap<String, String>> {
    let col = sheet
        .header()
        .iter()
        .position(|label| label == locale.as_str())
        .ok_or_else(|| SyncError::LocaleNotFound {
            locale: locale.to_string(),
            path: sheet.path.clone(),
        })?;

    let mut mapping = HashMap::new();
    for row in 1..sheet.rows.len() {
        let source = sheet.cell(row, 0);
        if source.is_empty() {
            continue;
        }
        mapping.insert(
            normalize_line_ends(source).into_owned(),
            sheet.cell(row, col).to_string(),
        );
    }
    Ok(mapping)
}

/// Read `path` and extract one locale column.
pub fn read_column(path: &Path, locale: &LocaleCode) -> Result<HashMap<String, String>> {
    column_mapping(&read_sheet(path)?, locale)
}
