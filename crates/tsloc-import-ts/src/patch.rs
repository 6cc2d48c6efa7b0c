use quick_xml::escape::{escape, unescape};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;
use tsloc_core::{normalize_line_ends, Result, SyncError};
use tsloc_domain::Tally;

const UNFINISHED: &str = "unfinished";

/// Result of patching one document in memory.
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub content: String,
    /// `total` = units with both a source and a translation slot,
    /// `succeeded` = mapping hits, `failed` = mapping misses.
    pub tally: Tally,
    pub matched: Vec<String>,
    pub unmatched: Vec<String>,
}

#[derive(Debug)]
struct TranslationSlot {
    start_tag: Range<usize>,
    /// `None` for a self-closing `<translation/>`.
    content: Option<Range<usize>>,
}

#[derive(Debug, Default)]
struct MessageScan {
    source: Option<String>,
    translation: Option<TranslationSlot>,
}

enum Capture {
    Source { depth: usize, text: String },
    Translation { depth: usize, start_tag: Range<usize> },
}

struct Replacement {
    range: Range<usize>,
    text: String,
}

/// Rewrite the translations of every unit whose source is a key of `mapping`.
///
/// Only the content of hit `translation` elements and their
/// `type="unfinished"` attribute change; every other byte is copied through.
pub fn patch_document(
    content: &str,
    mapping: &HashMap<String, String>,
    path: &Path,
) -> Result<PatchOutcome> {
    let (bom, body) = match content.strip_prefix('\u{feff}') {
        Some(rest) => ("\u{feff}", rest),
        None => ("", content),
    };

    let structural = |message: String| SyncError::StructuralParse {
        path: path.to_path_buf(),
        message,
    };

    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(false);

    let mut replacements: Vec<Replacement> = Vec::new();
    let mut outcome = PatchOutcome {
        content: String::new(),
        tally: Tally::default(),
        matched: Vec::new(),
        unmatched: Vec::new(),
    };
    let mut message: Option<MessageScan> = None;
    let mut capture: Option<Capture> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| structural(format!("{e} (at byte {})", reader.buffer_position())))?;
        let after = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => match capture.as_mut() {
                Some(Capture::Source { depth, .. }) | Some(Capture::Translation { depth, .. }) => {
                    *depth += 1
                }
                None => match e.local_name().as_ref() {
                    b"message" => message = Some(MessageScan::default()),
                    b"source" if message.as_ref().is_some_and(|m| m.source.is_none()) => {
                        capture = Some(Capture::Source {
                            depth: 0,
                            text: String::new(),
                        });
                    }
                    b"translation"
                        if message.as_ref().is_some_and(|m| m.translation.is_none()) =>
                    {
                        let start = tag_start(body, after).ok_or_else(|| {
                            structural(format!("cannot locate <translation> before byte {after}"))
                        })?;
                        capture = Some(Capture::Translation {
                            depth: 0,
                            start_tag: start..after,
                        });
                    }
                    _ => {}
                },
            },
            Event::End(e) => match capture.take() {
                Some(Capture::Source { depth, text }) if depth > 0 => {
                    capture = Some(Capture::Source {
                        depth: depth - 1,
                        text,
                    })
                }
                Some(Capture::Translation { depth, start_tag }) if depth > 0 => {
                    capture = Some(Capture::Translation {
                        depth: depth - 1,
                        start_tag,
                    })
                }
                Some(Capture::Source { text, .. }) => {
                    if let Some(m) = message.as_mut() {
                        m.source = Some(text);
                    }
                }
                Some(Capture::Translation { start_tag, .. }) => {
                    let end_start = body[..after].rfind("</").ok_or_else(|| {
                        structural(format!("cannot locate </translation> before byte {after}"))
                    })?;
                    if let Some(m) = message.as_mut() {
                        m.translation = Some(TranslationSlot {
                            content: Some(start_tag.end..end_start),
                            start_tag,
                        });
                    }
                }
                None => {
                    if e.local_name().as_ref() == b"message" {
                        if let Some(scan) = message.take() {
                            finish_message(scan, body, mapping, &mut outcome, &mut replacements);
                        }
                    }
                }
            },
            Event::Empty(e) => {
                if capture.is_none() {
                    if let Some(m) = message.as_mut() {
                        match e.local_name().as_ref() {
                            b"source" if m.source.is_none() => m.source = Some(String::new()),
                            b"translation" if m.translation.is_none() => {
                                let start = tag_start(body, after).ok_or_else(|| {
                                    structural(format!(
                                        "cannot locate <translation/> before byte {after}"
                                    ))
                                })?;
                                m.translation = Some(TranslationSlot {
                                    start_tag: start..after,
                                    content: None,
                                });
                            }
                            _ => {}
                        }
                    }
                }
            }
            Event::Text(t) => {
                if let Some(Capture::Source { text, .. }) = capture.as_mut() {
                    let raw = std::str::from_utf8(&t)
                        .map_err(|e| structural(format!("{e} (at byte {after})")))?;
                    let s = unescape(&normalize_line_ends(raw))
                        .map_err(|e| structural(format!("{e} (at byte {after})")))?
                        .into_owned();
                    text.push_str(&s);
                }
            }
            Event::CData(c) => {
                if let Some(Capture::Source { text, .. }) = capture.as_mut() {
                    text.push_str(&normalize_line_ends(&String::from_utf8_lossy(&c)));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    replacements.sort_by_key(|r| r.range.start);
    let mut out = String::with_capacity(content.len() + 64);
    out.push_str(bom);
    let mut cursor = 0usize;
    for r in replacements {
        out.push_str(&body[cursor..r.range.start]);
        out.push_str(&r.text);
        cursor = r.range.end;
    }
    out.push_str(&body[cursor..]);
    outcome.content = out;
    Ok(outcome)
}

fn finish_message(
    scan: MessageScan,
    body: &str,
    mapping: &HashMap<String, String>,
    outcome: &mut PatchOutcome,
    replacements: &mut Vec<Replacement>,
) {
    let (Some(source), Some(slot)) = (scan.source, scan.translation) else {
        return;
    };
    let Some(value) = mapping.get(&source) else {
        outcome.tally.record(false);
        outcome.unmatched.push(source);
        return;
    };
    outcome.tally.record(true);

    let raw_tag = &body[slot.start_tag.clone()];
    let tag = strip_unfinished(raw_tag);
    let escaped = escape(value.as_str());
    match slot.content {
        Some(content) => {
            if tag != raw_tag {
                replacements.push(Replacement {
                    range: slot.start_tag,
                    text: tag,
                });
            }
            replacements.push(Replacement {
                range: content,
                text: escaped.into_owned(),
            });
        }
        None if value.is_empty() => {
            if tag != raw_tag {
                replacements.push(Replacement {
                    range: slot.start_tag,
                    text: tag,
                });
            }
        }
        None => {
            let open = tag.trim_end_matches('>').trim_end_matches('/').trim_end();
            replacements.push(Replacement {
                range: slot.start_tag,
                text: format!("{open}>{escaped}</translation>"),
            });
        }
    }
    outcome.matched.push(source);
}

/// Start of the tag that ends right before `end`. Attribute values cannot
/// contain `<`, so the last one is the tag opener.
fn tag_start(body: &str, end: usize) -> Option<usize> {
    body.get(..end)?.rfind('<')
}

/// Remove a `type="unfinished"` attribute from a raw start tag, leaving the
/// rest of the tag byte-identical.
pub(crate) fn strip_unfinished(tag: &str) -> String {
    let bytes = tag.as_bytes();
    // skip `<name`
    let mut i = 1;
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' && bytes[i] != b'/'
    {
        i += 1;
    }
    loop {
        let ws_start = i;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] == b'>' || bytes[i] == b'/' {
            return tag.to_string();
        }
        let name_start = i;
        while i < bytes.len() && bytes[i] != b'=' && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let name = &tag[name_start..i];
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'=') {
            i += 1;
        }
        let Some(&quote) = bytes.get(i) else {
            return tag.to_string();
        };
        if quote != b'"' && quote != b'\'' {
            return tag.to_string();
        }
        let value_start = i + 1;
        let Some(len) = tag[value_start..].find(quote as char) else {
            return tag.to_string();
        };
        let value_end = value_start + len;
        i = value_end + 1;
        if name == "type" && &tag[value_start..value_end] == UNFINISHED {
            return format!("{}{}", &tag[..ws_start], &tag[i..]);
        }
    }
}
