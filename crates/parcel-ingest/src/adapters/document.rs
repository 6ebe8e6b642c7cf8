//! Document extraction: PDF, DOCX, ODT and RTF.
//!
//! Parsing runs on the blocking pool. Legacy `.doc` has no reader and yields
//! no content.

use std::path::Path;

use tracing::{error, warn};

use parcel_core::{CanonicalType, PipelineConfig};

use super::office::{collect_paragraphs, open_archive, read_entry};
use super::{display_name, read_bounded, text_or_empty, truncate_to_bytes, ModelInput};

const PDF: &str = "application/pdf";
const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const ODT: &str = "application/vnd.oasis.opendocument.text";
const RTF: &str = "application/rtf";

pub async fn extract(path: &Path, file_type: &CanonicalType, config: &PipelineConfig) -> ModelInput {
    let file = display_name(path);
    let parse: fn(&[u8], u64) -> Result<String, String> = match file_type.as_str() {
        PDF => extract_pdf_text,
        DOCX => extract_docx_text,
        ODT => extract_odt_text,
        RTF | "text/rtf" => extract_rtf_text,
        other => {
            warn!(file = %file, mime = other, "No reader for document format, skipping content");
            return ModelInput::Empty;
        }
    };
    let Some(bytes) = read_bounded(path, config.text_max_bytes).await else {
        return ModelInput::Empty;
    };

    let entry_limit = config.archive_entry_max_bytes;
    match tokio::task::spawn_blocking(move || parse(&bytes, entry_limit)).await {
        Ok(Ok(text)) => text_or_empty(truncate_to_bytes(text, config.text_max_bytes)),
        Ok(Err(e)) => {
            warn!(file = %file, mime = %file_type, error = %e, "Document text extraction failed");
            ModelInput::Empty
        }
        Err(e) => {
            error!(file = %file, error = %e, "Document extraction task failed");
            ModelInput::Empty
        }
    }
}

fn extract_pdf_text(bytes: &[u8], _entry_limit: u64) -> Result<String, String> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| format!("PDF parsing failed: {}", e))?;
    Ok(text
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

fn extract_docx_text(bytes: &[u8], entry_limit: u64) -> Result<String, String> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry(&mut archive, "word/document.xml", entry_limit)?
        .ok_or_else(|| "word/document.xml missing".to_string())?;
    collect_paragraphs(&xml, &[b"w:t"], &[b"w:p"])
}

fn extract_odt_text(bytes: &[u8], entry_limit: u64) -> Result<String, String> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry(&mut archive, "content.xml", entry_limit)?
        .ok_or_else(|| "content.xml missing".to_string())?;
    collect_paragraphs(&xml, &[b"text:p", b"text:h"], &[b"text:p", b"text:h"])
}

fn extract_rtf_text(bytes: &[u8], _entry_limit: u64) -> Result<String, String> {
    if !bytes.starts_with(b"{\\rtf") {
        return Err("missing {\\rtf header".to_string());
    }
    Ok(strip_rtf(&String::from_utf8_lossy(bytes)))
}

/// Destinations whose content is not body text.
const RTF_SKIP_DESTINATIONS: &[&str] = &[
    "fonttbl", "colortbl", "stylesheet", "info", "pict", "header", "footer", "listtable",
    "listoverridetable", "generator", "themedata", "datastore",
];

/// Plain text of an RTF document: control words dropped, `\par` as newline,
/// `\'hh` escapes decoded as Latin-1, `\uN` decoded as UTF-16 with its
/// fallback characters skipped, non-body destinations skipped.
pub fn strip_rtf(rtf: &str) -> String {
    let mut out = String::new();
    // (skip flag, \uc count) per open group
    let mut groups: Vec<(bool, usize)> = Vec::new();
    let mut skipping = false;
    let mut fallback_len = 1usize;
    let mut high_surrogate: Option<u16> = None;
    let mut chars = rtf.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => groups.push((skipping, fallback_len)),
            '}' => (skipping, fallback_len) = groups.pop().unwrap_or((false, 1)),
            '\\' => match chars.peek().copied() {
                Some(esc @ ('\\' | '{' | '}')) => {
                    chars.next();
                    if !skipping {
                        out.push(esc);
                    }
                }
                Some('\'') => {
                    chars.next();
                    let hex: String = chars.by_ref().take(2).collect();
                    if let (false, Ok(byte)) = (skipping, u8::from_str_radix(&hex, 16)) {
                        out.push(byte as char);
                    }
                }
                Some('*') => {
                    chars.next();
                    skipping = true;
                }
                Some(ch) if ch.is_ascii_alphabetic() => {
                    let mut word = String::new();
                    while let Some(&ch) = chars.peek() {
                        if !ch.is_ascii_alphabetic() {
                            break;
                        }
                        word.push(ch);
                        chars.next();
                    }
                    let mut param = String::new();
                    if chars.peek() == Some(&'-') {
                        param.push('-');
                        chars.next();
                    }
                    while let Some(&ch) = chars.peek() {
                        if !ch.is_ascii_digit() {
                            break;
                        }
                        param.push(ch);
                        chars.next();
                    }
                    // a single space delimits the control word
                    if chars.peek() == Some(&' ') {
                        chars.next();
                    }
                    let param = param.parse::<i32>().ok();

                    if RTF_SKIP_DESTINATIONS.contains(&word.as_str()) {
                        skipping = true;
                        continue;
                    }
                    match (word.as_str(), param) {
                        ("uc", Some(n)) => fallback_len = usize::try_from(n).unwrap_or(0),
                        ("u", Some(n)) => {
                            skip_unicode_fallback(&mut chars, fallback_len);
                            if !skipping {
                                // negative values encode units above 0x7FFF
                                let unit = if n < 0 { n + 0x1_0000 } else { n };
                                if let Ok(unit) = u16::try_from(unit) {
                                    push_utf16_unit(&mut out, &mut high_surrogate, unit);
                                }
                            }
                        }
                        _ if skipping => {}
                        ("par" | "line" | "sect" | "page", _) => out.push('\n'),
                        ("tab", _) => out.push('\t'),
                        _ => {}
                    }
                }
                Some(_) => {
                    chars.next();
                }
                None => {}
            },
            '\r' | '\n' => {}
            _ if !skipping => out.push(c),
            _ => {}
        }
    }

    out.lines().map(str::trim_end).collect::<Vec<_>>().join("\n").trim().to_string()
}

/// Skip the `count` fallback characters that follow `\uN`. A `\'hh` escape
/// counts as one character; a group boundary or control word ends the run.
fn skip_unicode_fallback(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, count: usize) {
    for _ in 0..count {
        match chars.peek().copied() {
            Some('{' | '}') | None => return,
            Some('\\') => {
                let mut ahead = chars.clone();
                ahead.next();
                if ahead.peek() != Some(&'\'') {
                    return;
                }
                chars.next();
                chars.next();
                chars.next();
                chars.next();
            }
            Some(_) => {
                chars.next();
            }
        }
    }
}

fn push_utf16_unit(out: &mut String, high_surrogate: &mut Option<u16>, unit: u16) {
    match (high_surrogate.take(), unit) {
        (Some(high), 0xDC00..=0xDFFF) => out.extend(
            char::decode_utf16([high, unit]).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)),
        ),
        (_, 0xD800..=0xDBFF) => *high_surrogate = Some(unit),
        (_, _) => out.push(char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER)),
    }
}
