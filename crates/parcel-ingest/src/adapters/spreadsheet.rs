//! Spreadsheet extraction (XLSX, ODS).
//!
//! Each sheet renders as a `## Sheet N` heading followed by pipe-delimited
//! rows. Legacy binary `.xls` has no reader here and yields no content.

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{error, warn};

use parcel_core::defaults::SPREADSHEET_MAX_COLUMN;
use parcel_core::{CanonicalType, Error, PipelineConfig};

use super::csv::render_rows;
use super::office::{attribute, numbered_entries, open_archive, read_entry};
use super::{display_name, read_bounded, text_or_empty, truncate_to_bytes, ModelInput};

const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const ODS: &str = "application/vnd.oasis.opendocument.spreadsheet";

type Sheet = Vec<Vec<String>>;

/// Bounds applied while parsing, before anything is rendered.
#[derive(Debug, Clone, Copy)]
struct ParseLimits {
    entry_bytes: u64,
    cells: usize,
}

impl ParseLimits {
    fn from_config(config: &PipelineConfig) -> Self {
        // a rendered cell costs at least "| " plus a separator byte
        let cells = usize::try_from(config.text_max_bytes / 3).unwrap_or(usize::MAX).max(1);
        Self {
            entry_bytes: config.archive_entry_max_bytes,
            cells,
        }
    }
}

/// Cells (padding included) that may still be materialized.
struct CellBudget(usize);

impl CellBudget {
    fn take(&mut self, cells: usize) -> bool {
        match self.0.checked_sub(cells) {
            Some(rest) => {
                self.0 = rest;
                true
            }
            None => {
                self.0 = 0;
                false
            }
        }
    }

    fn exhausted(&self) -> bool {
        self.0 == 0
    }
}

pub async fn extract(path: &Path, file_type: &CanonicalType, config: &PipelineConfig) -> ModelInput {
    let file = display_name(path);
    let parse: fn(&[u8], ParseLimits) -> std::result::Result<Vec<Sheet>, String> = match file_type.as_str() {
        XLSX => parse_xlsx,
        ODS => parse_ods,
        other => {
            warn!(file = %file, mime = other, "No reader for spreadsheet format, skipping content");
            return ModelInput::Empty;
        }
    };
    let Some(bytes) = read_bounded(path, config.text_max_bytes).await else {
        return ModelInput::Empty;
    };

    let max_bytes = config.text_max_bytes;
    let limits = ParseLimits::from_config(config);
    let rendered = tokio::task::spawn_blocking(move || {
        parse(&bytes, limits).map(|sheets| render_sheets(&sheets, max_bytes))
    })
    .await
        .map_err(|e| Error::Internal(format!("Spreadsheet task failed: {}", e)));

    match rendered {
        Ok(Ok(text)) => text_or_empty(text),
        Ok(Err(e)) => {
            warn!(file = %file, error = %e, "Malformed spreadsheet, skipping content");
            ModelInput::Empty
        }
        Err(e) => {
            error!(file = %file, error = %e, "Spreadsheet extraction failed");
            ModelInput::Empty
        }
    }
}

fn render_sheets(sheets: &[Sheet], max_bytes: u64) -> String {
    let mut out = String::new();
    for (i, rows) in sheets.iter().enumerate() {
        if rows.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("## Sheet {}\n", i + 1));
        out.push_str(&render_rows(rows, max_bytes));
        if out.len() as u64 >= max_bytes {
            break;
        }
    }
    truncate_to_bytes(out, max_bytes)
}

// =============================================================================
// XLSX
// =============================================================================

fn parse_xlsx(bytes: &[u8], limits: ParseLimits) -> std::result::Result<Vec<Sheet>, String> {
    let mut archive = open_archive(bytes)?;
    let shared = match read_entry(&mut archive, "xl/sharedStrings.xml", limits.entry_bytes)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let mut budget = CellBudget(limits.cells);
    let mut sheets = Vec::new();
    for (_, name) in numbered_entries(&archive, "xl/worksheets/sheet", ".xml") {
        if budget.exhausted() {
            break;
        }
        if let Some(xml) = read_entry(&mut archive, &name, limits.entry_bytes)? {
            sheets.push(parse_xlsx_sheet(&xml, &shared, &mut budget)?);
        }
    }
    Ok(sheets)
}

/// Strings table: one entry per `<si>`, rich-text runs concatenated.
fn parse_shared_strings(xml: &str) -> std::result::Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                current.push_str(&e.unescape().map_err(|e| e.to_string())?);
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"t" => in_text = false,
                b"si" => strings.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("sharedStrings.xml: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Rows of one worksheet. Stops early, keeping what was read, once `budget`
/// runs out.
fn parse_xlsx_sheet(xml: &str, shared: &[String], budget: &mut CellBudget) -> std::result::Result<Sheet, String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell_type = String::new();
    let mut cell_column: Option<usize> = None;
    let mut value = String::new();
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"row" => row.clear(),
                b"c" => {
                    cell_type = attribute(e, b"t").unwrap_or_default();
                    cell_column = match attribute(e, b"r") {
                        Some(r) => Some(
                            column_index(&r).ok_or_else(|| format!("cell reference out of range: {}", r))?,
                        ),
                        None => None,
                    };
                    value.clear();
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Text(e)) if in_value => {
                value.push_str(&e.unescape().map_err(|e| e.to_string())?);
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    let col = cell_column.unwrap_or(row.len()).max(row.len());
                    if !budget.take(col - row.len() + 1) {
                        push_row(&mut rows, &mut row);
                        break;
                    }
                    row.resize(col, String::new());
                    row.push(resolve_cell(&cell_type, &value, shared));
                }
                b"row" => push_row(&mut rows, &mut row),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("worksheet: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

fn resolve_cell(cell_type: &str, value: &str, shared: &[String]) -> String {
    match cell_type {
        "s" => value
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i).cloned())
            .unwrap_or_default(),
        "b" => match value.trim() {
            "1" => "TRUE".to_string(),
            "0" => "FALSE".to_string(),
            other => other.to_string(),
        },
        _ => value.to_string(),
    }
}

/// Zero-based column index from a cell reference like `C12`. `None` when
/// the reference has no column or it lies past `XFD`.
fn column_index(reference: &str) -> Option<usize> {
    let mut n = 0usize;
    let mut letters = 0;
    for b in reference.bytes().take_while(u8::is_ascii_alphabetic) {
        letters += 1;
        if letters > 3 {
            return None;
        }
        n = n * 26 + usize::from(b.to_ascii_uppercase() - b'A' + 1);
    }
    let index = n.checked_sub(1)?;
    (index <= SPREADSHEET_MAX_COLUMN).then_some(index)
}

// =============================================================================
// ODS
// =============================================================================

fn parse_ods(bytes: &[u8], limits: ParseLimits) -> std::result::Result<Vec<Sheet>, String> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry(&mut archive, "content.xml", limits.entry_bytes)?
        .ok_or_else(|| "content.xml missing".to_string())?;
    let mut budget = CellBudget(limits.cells);

    let mut reader = Reader::from_str(&xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    let mut rows: Sheet = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_cell = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"table:table" => rows.clear(),
                b"table:table-row" => row.clear(),
                b"table:table-cell" => {
                    in_cell = true;
                    cell.clear();
                }
                b"text:p" if in_cell && !cell.is_empty() => cell.push(' '),
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"table:table-cell" => {
                if !budget.take(1) {
                    break;
                }
                row.push(String::new());
            }
            Ok(Event::Text(e)) if in_cell => {
                cell.push_str(&e.unescape().map_err(|e| e.to_string())?);
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"table:table-cell" => {
                    in_cell = false;
                    if !budget.take(1) {
                        break;
                    }
                    row.push(std::mem::take(&mut cell));
                }
                b"table:table-row" => push_row(&mut rows, &mut row),
                b"table:table" => sheets.push(std::mem::take(&mut rows)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("content.xml: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    if budget.exhausted() {
        push_row(&mut rows, &mut row);
        if !rows.is_empty() {
            sheets.push(rows);
        }
    }
    Ok(sheets)
}

/// Keep a row unless every cell is blank; trailing blank cells are dropped.
fn push_row(rows: &mut Sheet, row: &mut Vec<String>) {
    while row.last().is_some_and(|c| c.trim().is_empty()) {
        row.pop();
    }
    if !row.is_empty() {
        rows.push(std::mem::take(row));
    }
    row.clear();
}
