//! Shared helpers for zip-packaged office formats (OOXML and OpenDocument).

use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

pub(crate) type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

pub(crate) fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, String> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("Failed to open archive: {}", e))
}

/// Read a member as UTF-8, inflating at most `max_bytes`. `Ok(None)` when the
/// member does not exist.
pub(crate) fn read_entry(archive: &mut Archive<'_>, name: &str, max_bytes: u64) -> Result<Option<String>, String> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(format!("Failed to open {}: {}", name, e)),
    };
    if entry.size() > max_bytes {
        return Err(format!(
            "{} inflates to {} bytes, limit is {}",
            name,
            entry.size(),
            max_bytes
        ));
    }

    // The declared size can lie; cap what is actually inflated.
    let mut raw = Vec::new();
    entry
        .take(max_bytes.saturating_add(1))
        .read_to_end(&mut raw)
        .map_err(|e| format!("Failed to read {}: {}", name, e))?;
    if raw.len() as u64 > max_bytes {
        return Err(format!("{} inflates past the {} byte limit", name, max_bytes));
    }
    String::from_utf8(raw)
        .map(Some)
        .map_err(|e| format!("{} is not UTF-8: {}", name, e))
}

/// Members named `<prefix><N><suffix>`, sorted by N.
pub(crate) fn numbered_entries(archive: &Archive<'_>, prefix: &str, suffix: &str) -> Vec<(u32, String)> {
    let mut entries: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let n = name.strip_prefix(prefix)?.strip_suffix(suffix)?.parse::<u32>().ok()?;
            Some((n, name.to_string()))
        })
        .collect();
    entries.sort_by_key(|(n, _)| *n);
    entries
}

/// Value of an attribute by qualified name.
pub(crate) fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Text held inside `text_tags`, with a line break after every `para_tags`
/// element. Empty lines are dropped.
///
/// `text_tags` may nest (ODF spans inside paragraphs).
pub(crate) fn collect_paragraphs(xml: &str, text_tags: &[&[u8]], para_tags: &[&[u8]]) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut line = String::new();
    let mut lines = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if text_tags.contains(&e.name().as_ref()) {
                    depth += 1;
                }
            }
            Ok(Event::Empty(ref e)) => {
                if let Some(s) = inline_break(e.name().as_ref()) {
                    line.push_str(s);
                }
            }
            Ok(Event::Text(e)) => {
                if depth > 0 {
                    let text = e.unescape().map_err(|e| format!("XML parsing error: {}", e))?;
                    line.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                if text_tags.contains(&name.as_ref()) {
                    depth = depth.saturating_sub(1);
                }
                if para_tags.contains(&name.as_ref()) {
                    push_line(&mut lines, &mut line);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parsing error: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    push_line(&mut lines, &mut line);
    Ok(lines.join("\n"))
}

fn push_line(lines: &mut Vec<String>, line: &mut String) {
    let trimmed = line.trim();
    if !trimmed.is_empty() {
        lines.push(trimmed.to_string());
    }
    line.clear();
}

/// Self-closing elements that stand for whitespace.
pub(crate) fn inline_break(name: &[u8]) -> Option<&'static str> {
    match name {
        b"w:tab" | b"text:tab" => Some("\t"),
        b"w:br" | b"text:line-break" => Some("\n"),
        b"text:s" => Some(" "),
        _ => None,
    }
}
