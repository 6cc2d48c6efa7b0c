use quick_xml::escape::unescape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tsloc_core::{normalize_line_ends, LocaleCode, Result, SyncError, TranslationUnit};
use walkdir::WalkDir;

/// Elements the reader cares about. Everything else only contributes text
/// when nested inside a captured element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Message,
    Source,
    Translation,
    Other,
}

fn classify(name: &[u8]) -> Tag {
    match name {
        b"message" => Tag::Message,
        b"source" => Tag::Source,
        b"translation" => Tag::Translation,
        _ => Tag::Other,
    }
}

/// Owned summary of one XML event, so the read buffer can be reused.
enum Step {
    Open(Tag),
    Close(Tag),
    Empty(Tag),
    Text(String),
    Eof,
    Skip,
}

/// Element whose text is currently being collected.
struct Capture {
    tag: Tag,
    depth: usize,
    text: String,
}

/// Lazy, fused iterator over the units of one `.ts` document.
///
/// A unit is the nearest preceding `source` of the same `message` paired with
/// the next `translation`. Units with an empty source are skipped. The first
/// XML error is yielded as `StructuralParse` and ends the sequence.
pub struct TsUnits<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    path: PathBuf,
    capture: Option<Capture>,
    source: Option<String>,
    done: bool,
}

impl TsUnits<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| SyncError::from_read("document", path, e))?;
        Ok(Self::from_reader(BufReader::new(file), path))
    }
}

impl<R: BufRead> TsUnits<R> {
    pub fn from_reader(inner: R, path: &Path) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.config_mut().trim_text(false);
        Self {
            reader,
            buf: Vec::new(),
            path: path.to_path_buf(),
            capture: None,
            source: None,
            done: false,
        }
    }

    fn structural(&self, message: impl std::fmt::Display) -> SyncError {
        SyncError::StructuralParse {
            path: self.path.clone(),
            message: format!("{message} (at byte {})", self.reader.buffer_position()),
        }
    }

    fn read_step(&mut self) -> std::result::Result<Step, String> {
        self.buf.clear();
        let step = match self.reader.read_event_into(&mut self.buf) {
            Ok(Event::Start(e)) => Step::Open(classify(e.local_name().as_ref())),
            Ok(Event::End(e)) => Step::Close(classify(e.local_name().as_ref())),
            Ok(Event::Empty(e)) => Step::Empty(classify(e.local_name().as_ref())),
            Ok(Event::Text(t)) => {
                if self.capture.is_none() {
                    Step::Skip
                } else {
                    let raw = std::str::from_utf8(&t).map_err(|e| e.to_string())?;
                    let text = unescape(&normalize_line_ends(raw))
                        .map_err(|e| e.to_string())?
                        .into_owned();
                    Step::Text(text)
                }
            }
            Ok(Event::CData(c)) => {
                if self.capture.is_none() {
                    Step::Skip
                } else {
                    Step::Text(normalize_line_ends(&String::from_utf8_lossy(&c)).into_owned())
                }
            }
            Ok(Event::Eof) => Step::Eof,
            Ok(_) => Step::Skip,
            Err(e) => return Err(e.to_string()),
        };
        Ok(step)
    }

    /// Pair a finished translation with the pending source, if any.
    fn take_unit(&mut self, translation: String) -> Option<TranslationUnit> {
        let source = self.source.take()?;
        if source.is_empty() {
            return None;
        }
        tracing::trace!(path = %self.path.display(), source = %source, "unit");
        Some(TranslationUnit {
            source,
            translation,
        })
    }
}

impl<R: BufRead> Iterator for TsUnits<R> {
    type Item = Result<TranslationUnit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let step = match self.read_step() {
                Ok(step) => step,
                Err(msg) => {
                    self.done = true;
                    return Some(Err(self.structural(msg)));
                }
            };

            if let Some(cap) = self.capture.as_mut() {
                match step {
                    Step::Text(t) => cap.text.push_str(&t),
                    Step::Open(_) => cap.depth += 1,
                    Step::Close(_) if cap.depth > 0 => cap.depth -= 1,
                    Step::Close(_) => {
                        let Some(cap) = self.capture.take() else {
                            continue;
                        };
                        match cap.tag {
                            Tag::Source => self.source = Some(cap.text),
                            _ => {
                                if let Some(unit) = self.take_unit(cap.text) {
                                    return Some(Ok(unit));
                                }
                            }
                        }
                    }
                    Step::Eof => {
                        self.done = true;
                        return Some(Err(self.structural("unexpected end of document")));
                    }
                    Step::Empty(_) | Step::Skip => {}
                }
                continue;
            }

            match step {
                Step::Open(tag @ (Tag::Source | Tag::Translation)) => {
                    self.capture = Some(Capture {
                        tag,
                        depth: 0,
                        text: String::new(),
                    });
                }
                Step::Open(Tag::Message) | Step::Close(Tag::Message) => self.source = None,
                Step::Empty(Tag::Source) => self.source = Some(String::new()),
                Step::Empty(Tag::Translation) => {
                    if let Some(unit) = self.take_unit(String::new()) {
                        return Some(Ok(unit));
                    }
                }
                Step::Eof => {
                    self.done = true;
                    return None;
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for TsUnits<R> {}

/// Read a whole document into memory.
pub fn read_units(path: &Path) -> Result<Vec<TranslationUnit>> {
    TsUnits::open(path)?.collect()
}

/// `zh_CN.ts` -> `zh_CN`. The suffix match ignores ASCII case.
pub fn locale_code_from_file_name(name: &str) -> Option<LocaleCode> {
    let cut = name.len().checked_sub(3)?;
    let suffix = name.get(cut..)?;
    if !suffix.eq_ignore_ascii_case(".ts") {
        return None;
    }
    LocaleCode::new(&name[..cut]).ok()
}

fn is_ts_file_name(name: &str) -> bool {
    name.len() > 3
        && name
            .get(name.len() - 3..)
            .is_some_and(|s| s.eq_ignore_ascii_case(".ts"))
}

/// `.ts` files directly inside `dir`, sorted by file name.
pub fn list_ts_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SyncError::NotFound {
            what: "directory",
            path: dir.to_path_buf(),
        });
    }
    let mut out = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "unreadable directory entry skipped");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_str().is_some_and(is_ts_file_name) {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

/// Documents of one directory, split into the baseline anchor and the rest.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    pub baseline: Option<PathBuf>,
    pub auxiliaries: Vec<(LocaleCode, PathBuf)>,
}

/// The baseline is the file literally named `<baseline>.ts`; every other
/// `.ts` file becomes an auxiliary tagged with its inferred locale code.
/// Further files whose code equals the baseline (`zn.TS` next to `zn.ts`)
/// are skipped so they cannot overwrite the baseline column.
pub fn partition_baseline(files: &[PathBuf], baseline: &LocaleCode) -> DocumentSet {
    let mut set = DocumentSet::default();
    for path in files {
        let Some(code) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(locale_code_from_file_name)
        else {
            tracing::warn!(path = %path.display(), "cannot infer locale code, skipped");
            continue;
        };
        if &code != baseline {
            set.auxiliaries.push((code, path.clone()));
        } else if set.baseline.is_none() {
            set.baseline = Some(path.clone());
        } else {
            tracing::warn!(
                path = %path.display(),
                locale = %code,
                "second document for the baseline locale, skipped"
            );
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units_of(xml: &str) -> Vec<Result<TranslationUnit>> {
        TsUnits::from_reader(xml.as_bytes(), Path::new("mem.ts")).collect()
    }

    const DOC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE TS>
<TS version="2.1" language="en">
<context>
    <name>MainWindow</name>
    <message>
        <location filename="main.qml" line="12"/>
        <source>Open &amp; save</source>
        <translation>打开并保存</translation>
    </message>
    <message>
        <source>Quit</source>
        <translation type="unfinished"></translation>
    </message>
    <message>
        <source>Empty slot</source>
        <translation type="unfinished"/>
    </message>
    <message>
        <source></source>
        <translation>ignored</translation>
    </message>
</context>
</TS>
"#;

    #[test]
    fn pairs_source_with_following_translation() {
        let units: Vec<_> = units_of(DOC).into_iter().map(|u| u.unwrap()).collect();
        assert_eq!(
            units,
            vec![
                TranslationUnit::new("Open & save", "打开并保存"),
                TranslationUnit::new("Quit", ""),
                TranslationUnit::new("Empty slot", ""),
            ]
        );
    }

    #[test]
    fn source_does_not_leak_across_messages() {
        let xml = "<TS><context><message><source>a</source></message>\
                   <message><translation>b</translation></message></context></TS>";
        assert!(units_of(xml).is_empty());
    }

    #[test]
    fn whitespace_and_cdata_are_kept() {
        let xml = "<TS><context><message><source>  a  </source>\
                   <translation><![CDATA[<b>x</b>]]></translation></message></context></TS>";
        let units: Vec<_> = units_of(xml).into_iter().map(|u| u.unwrap()).collect();
        assert_eq!(units, vec![TranslationUnit::new("  a  ", "<b>x</b>")]);
    }

    #[test]
    fn line_ends_are_normalized_but_char_refs_kept() {
        let xml = "<TS>\r\n<context><message><source>line one\r\nline two\rthree</source>\r\n\
                   <translation><![CDATA[a\r\nb]]>&#13;</translation></message></context></TS>";
        let units: Vec<_> = units_of(xml).into_iter().map(|u| u.unwrap()).collect();
        assert_eq!(
            units,
            vec![TranslationUnit::new("line one\nline two\nthree", "a\nb\r")]
        );
    }

    #[test]
    fn malformed_document_yields_one_error_then_ends() {
        let xml = "<TS><context><message><source>a</source><translation>b</translation></message>\
                   <message><source>c</translation></message></context></TS>";
        let mut it = TsUnits::from_reader(xml.as_bytes(), Path::new("bad.ts"));
        assert_eq!(it.next().unwrap().unwrap(), TranslationUnit::new("a", "b"));
        let err = it.next().unwrap().unwrap_err();
        assert!(matches!(err, SyncError::StructuralParse { .. }));
        assert!(err.to_string().contains("bad.ts"));
        assert!(it.next().is_none());
        assert!(it.next().is_none());
    }

    #[test]
    fn locale_code_inference_strips_suffix_case_insensitively() {
        assert_eq!(locale_code_from_file_name("zh_CN.ts").unwrap().as_str(), "zh_CN");
        assert_eq!(locale_code_from_file_name("EN.TS").unwrap().as_str(), "EN");
        assert!(locale_code_from_file_name("readme.txt").is_none());
        assert!(locale_code_from_file_name(".ts").is_none());
    }

    #[test]
    fn lists_and_partitions_directory() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["en.ts", "zn.ts", "de.TS", "xzn.ts", "notes.txt"] {
            std::fs::write(tmp.path().join(name), "<TS/>").unwrap();
        }
        std::fs::create_dir(tmp.path().join("nested.ts")).unwrap();

        let files = list_ts_files(tmp.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["de.TS", "en.ts", "xzn.ts", "zn.ts"]);

        let set = partition_baseline(&files, &LocaleCode::new("zn").unwrap());
        assert_eq!(set.baseline.unwrap(), tmp.path().join("zn.ts"));
        let codes: Vec<_> = set.auxiliaries.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(codes, ["de", "en", "xzn"]);
    }

    #[test]
    fn baseline_code_is_claimed_once() {
        let files = [PathBuf::from("i18n/en.ts"), PathBuf::from("i18n/zn.TS"), PathBuf::from("i18n/zn.ts")];
        let set = partition_baseline(&files, &LocaleCode::new("zn").unwrap());
        assert_eq!(set.baseline.unwrap(), PathBuf::from("i18n/zn.TS"));
        let codes: Vec<_> = set.auxiliaries.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(codes, ["en"]);
    }

    #[test]
    fn reads_crlf_document_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("en.ts");
        std::fs::write(&path, DOC.replace('\n', "\r\n").replace("Quit", "Quit\r\nnow")).unwrap();
        let units = read_units(&path).unwrap();
        assert_eq!(units.len(), 3);
        assert_eq!(units[1], TranslationUnit::new("Quit\nnow", ""));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_entries_are_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let locked = tmp.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::write(locked.join("en.ts"), "<TS/>").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        let readable_anyway = std::fs::read_dir(&locked).is_ok();

        let files = list_ts_files(&locked);
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        if readable_anyway {
            // privileged user, permission bits are not enforced
            return;
        }
        assert!(files.unwrap().is_empty());
    }

    #[test]
    fn missing_directory_is_not_found() {
        let err = list_ts_files(Path::new("/definitely/not/here")).unwrap_err();
        assert_eq!(err.kind(), tsloc_core::ErrorKind::NotFound);
    }
}
