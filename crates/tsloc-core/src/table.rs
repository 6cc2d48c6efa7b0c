use std::collections::HashMap;

use crate::{LocaleCode, TranslationUnit};

/// One row of the table: a baseline source text plus its per-locale translations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    source: String,
    translations: HashMap<LocaleCode, String>,
}

impl TableRow {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn get(&self, locale: &LocaleCode) -> Option<&str> {
        self.translations.get(locale).map(String::as_str)
    }
}

/// What happened to one auxiliary document during a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Units whose source text exists in the baseline.
    pub applied: usize,
    /// Units discarded because the baseline does not know their source text.
    pub dropped: usize,
}

/// Source text keyed table with one column per locale.
///
/// Rows only ever come from the baseline locale, in baseline document order.
/// Auxiliary locales can fill cells of existing rows but never add rows.
#[derive(Debug, Clone)]
pub struct TranslationTable {
    locales: Vec<LocaleCode>,
    rows: Vec<TableRow>,
    index: HashMap<String, usize>,
}

impl TranslationTable {
    pub fn new(baseline: LocaleCode) -> Self {
        Self {
            locales: vec![baseline],
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a table from baseline units in one go.
    pub fn seed(baseline: LocaleCode, units: impl IntoIterator<Item = TranslationUnit>) -> Self {
        let mut table = Self::new(baseline);
        for unit in units {
            table.insert_baseline(unit);
        }
        table
    }

    pub fn baseline(&self) -> &LocaleCode {
        &self.locales[0]
    }

    /// Column order: baseline first, then auxiliaries in first-seen order.
    pub fn locales(&self) -> &[LocaleCode] {
        &self.locales
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, source: &str) -> bool {
        self.index.contains_key(source)
    }

    pub fn translation(&self, source: &str, locale: &LocaleCode) -> Option<&str> {
        self.index
            .get(source)
            .and_then(|&i| self.rows[i].get(locale))
    }

    /// Add or update a baseline row. A repeated source keeps its first
    /// position and takes the latest translation.
    pub fn insert_baseline(&mut self, unit: TranslationUnit) {
        let baseline = self.locales[0].clone();
        match self.index.get(&unit.source) {
            Some(&i) => {
                self.rows[i].translations.insert(baseline, unit.translation);
            }
            None => {
                self.index.insert(unit.source.clone(), self.rows.len());
                let mut translations = HashMap::new();
                translations.insert(baseline, unit.translation);
                self.rows.push(TableRow {
                    source: unit.source,
                    translations,
                });
            }
        }
    }

    /// Register a column. Returns `false` if the locale already had one.
    pub fn add_locale(&mut self, locale: LocaleCode) -> bool {
        if self.locales.contains(&locale) {
            return false;
        }
        self.locales.push(locale);
        true
    }

    /// Fill one cell of an existing row. Returns `false` (and changes nothing)
    /// when the source text is not a baseline key.
    pub fn merge_unit(&mut self, locale: &LocaleCode, unit: TranslationUnit) -> bool {
        let Some(&i) = self.index.get(&unit.source) else {
            return false;
        };
        self.rows[i]
            .translations
            .insert(locale.clone(), unit.translation);
        true
    }

    /// Register `locale` and merge every unit of one auxiliary document.
    ///
    /// The baseline column only takes values from the baseline document: a
    /// document carrying the baseline code has all of its units dropped.
    pub fn merge_auxiliary(
        &mut self,
        locale: LocaleCode,
        units: impl IntoIterator<Item = TranslationUnit>,
    ) -> MergeStats {
        let mut stats = MergeStats::default();
        if &locale == self.baseline() {
            stats.dropped = units.into_iter().count();
            return stats;
        }
        self.add_locale(locale.clone());
        for unit in units {
            if self.merge_unit(&locale, unit) {
                stats.applied += 1;
            } else {
                stats.dropped += 1;
            }
        }
        stats
    }

    /// Cells for one row in column order, empty where a locale has no entry.
    pub fn row_cells<'a>(&'a self, row: &'a TableRow) -> impl Iterator<Item = &'a str> + 'a {
        self.locales
            .iter()
            .map(move |l| row.get(l).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> LocaleCode {
        LocaleCode::new(s).unwrap()
    }

    #[test]
    fn auxiliary_keys_absent_from_baseline_are_dropped() {
        let mut table = TranslationTable::seed(code("zn"), [TranslationUnit::new("hello", "你好")]);
        let stats = table.merge_auxiliary(
            code("en"),
            [
                TranslationUnit::new("hello", "Hello"),
                TranslationUnit::new("bye", "Bye"),
            ],
        );

        assert_eq!(stats, MergeStats { applied: 1, dropped: 1 });
        assert_eq!(table.len(), 1);
        assert!(!table.contains("bye"));
        assert_eq!(table.translation("hello", &code("en")), Some("Hello"));
        assert_eq!(table.translation("hello", &code("zn")), Some("你好"));
    }

    #[test]
    fn rows_keep_baseline_order_and_first_position_of_duplicates() {
        let table = TranslationTable::seed(
            code("zn"),
            [
                TranslationUnit::new("b", "1"),
                TranslationUnit::new("a", "2"),
                TranslationUnit::new("b", "3"),
            ],
        );
        let sources: Vec<_> = table.rows().iter().map(TableRow::source).collect();
        assert_eq!(sources, ["b", "a"]);
        assert_eq!(table.translation("b", &code("zn")), Some("3"));
    }

    #[test]
    fn columns_are_unique_in_first_seen_order() {
        let mut table = TranslationTable::seed(code("zn"), [TranslationUnit::new("k", "v")]);
        table.merge_auxiliary(code("en"), [TranslationUnit::new("k", "first")]);
        table.merge_auxiliary(code("de"), []);
        table.merge_auxiliary(code("en"), [TranslationUnit::new("k", "second")]);

        assert_eq!(table.locales(), &[code("zn"), code("en"), code("de")]);
        assert_eq!(table.translation("k", &code("en")), Some("second"));

        let cells: Vec<_> = table.row_cells(&table.rows()[0]).collect();
        assert_eq!(cells, ["v", "second", ""]);
    }

    #[test]
    fn baseline_column_ignores_auxiliary_merges() {
        let mut table = TranslationTable::seed(code("zn"), [TranslationUnit::new("k", "原文")]);
        let stats = table.merge_auxiliary(code("zn"), [TranslationUnit::new("k", "other")]);

        assert_eq!(stats, MergeStats { applied: 0, dropped: 1 });
        assert_eq!(table.baseline(), &code("zn"));
        assert_eq!(table.locales(), &[code("zn")]);
        assert_eq!(table.translation("k", &code("zn")), Some("原文"));
    }

    #[test]
    fn empty_translations_are_recorded() {
        let table = TranslationTable::seed(code("zn"), [TranslationUnit::new("k", "")]);
        assert_eq!(table.translation("k", &code("zn")), Some(""));
    }
}
