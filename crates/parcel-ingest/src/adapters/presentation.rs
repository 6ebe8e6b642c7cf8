//! Presentation extraction (PPTX, ODP). Slides render as `## Slide N`
//! sections in deck order.

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{error, warn};

use parcel_core::{CanonicalType, PipelineConfig};

use super::office::{collect_paragraphs, inline_break, numbered_entries, open_archive, read_entry};
use super::{display_name, read_bounded, text_or_empty, truncate_to_bytes, ModelInput};

const PPTX: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";
const ODP: &str = "application/vnd.oasis.opendocument.presentation";

pub async fn extract(path: &Path, file_type: &CanonicalType, config: &PipelineConfig) -> ModelInput {
    let file = display_name(path);
    let parse: fn(&[u8], u64) -> Result<Vec<String>, String> = match file_type.as_str() {
        PPTX => pptx_slides,
        ODP => odp_slides,
        other => {
            warn!(file = %file, mime = other, "No reader for presentation format, skipping content");
            return ModelInput::Empty;
        }
    };
    let Some(bytes) = read_bounded(path, config.text_max_bytes).await else {
        return ModelInput::Empty;
    };

    let entry_limit = config.archive_entry_max_bytes;
    match tokio::task::spawn_blocking(move || parse(&bytes, entry_limit)).await {
        Ok(Ok(slides)) => text_or_empty(truncate_to_bytes(render_slides(&slides), config.text_max_bytes)),
        Ok(Err(e)) => {
            warn!(file = %file, error = %e, "Malformed presentation, skipping content");
            ModelInput::Empty
        }
        Err(e) => {
            error!(file = %file, error = %e, "Presentation extraction task failed");
            ModelInput::Empty
        }
    }
}

/// Slides keep their deck number even when they carry no text.
fn render_slides(slides: &[String]) -> String {
    slides
        .iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| format!("## Slide {}\n{}\n", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn pptx_slides(bytes: &[u8], entry_limit: u64) -> Result<Vec<String>, String> {
    let mut archive = open_archive(bytes)?;
    let mut slides = Vec::new();
    for (_, name) in numbered_entries(&archive, "ppt/slides/slide", ".xml") {
        match read_entry(&mut archive, &name, entry_limit)? {
            Some(xml) => slides.push(collect_paragraphs(&xml, &[b"a:t"], &[b"a:p"])?),
            None => slides.push(String::new()),
        }
    }
    Ok(slides)
}

/// One entry per `draw:page` in `content.xml`.
fn odp_slides(bytes: &[u8], entry_limit: u64) -> Result<Vec<String>, String> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry(&mut archive, "content.xml", entry_limit)?
        .ok_or_else(|| "content.xml missing".to_string())?;

    let mut reader = Reader::from_str(&xml);
    let mut buf = Vec::new();
    let mut slides = Vec::new();
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"draw:page" => lines.clear(),
                b"text:p" | b"text:h" => depth += 1,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if depth > 0 => {
                if let Some(s) = inline_break(e.name().as_ref()) {
                    line.push_str(s);
                }
            }
            Ok(Event::Text(e)) if depth > 0 => {
                line.push_str(&e.unescape().map_err(|e| e.to_string())?);
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"text:p" | b"text:h" => {
                    depth = depth.saturating_sub(1);
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        lines.push(trimmed.to_string());
                    }
                    line.clear();
                }
                b"draw:page" => slides.push(lines.join("\n")),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("content.xml: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(slides)
}
