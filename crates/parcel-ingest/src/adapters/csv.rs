//! CSV / TSV extraction.
//!
//! Rows render as pipe-delimited lines (`| a | b |`) so the model sees the
//! column structure. Malformed input (an unterminated quote) yields no content.

use std::path::Path;

use tracing::warn;

use parcel_core::{CanonicalType, PipelineConfig};

use super::text::decode_text;
use super::{display_name, read_bounded, text_or_empty, truncate_to_bytes, ModelInput};

/// Input the parser refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedCsv {
    /// 1-based line where the offending quote opened.
    pub line: usize,
}

pub async fn extract(path: &Path, file_type: &CanonicalType, config: &PipelineConfig) -> ModelInput {
    let Some(bytes) = read_bounded(path, config.text_max_bytes).await else {
        return ModelInput::Empty;
    };
    let text = decode_text(&bytes);
    let delimiter = delimiter_for(file_type);

    match parse_delimited(&text, delimiter) {
        Ok(rows) => text_or_empty(render_rows(&rows, config.text_max_bytes)),
        Err(e) => {
            warn!(file = %display_name(path), line = e.line, "Unterminated quote in delimited file, skipping content");
            ModelInput::Empty
        }
    }
}

/// TAB for tab-separated types, comma otherwise.
pub fn delimiter_for(file_type: &CanonicalType) -> char {
    match file_type.as_str() {
        "text/tab-separated-values" => '\t',
        _ => ',',
    }
}

/// Parse delimited text with RFC 4180 quoting: quoted fields may contain the
/// delimiter, line breaks and doubled quotes. Blank lines are skipped.
pub fn parse_delimited(text: &str, delimiter: char) -> Result<Vec<Vec<String>>, MalformedCsv> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut line = 1;
    let mut quote_line = 0;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
                quote_line = line;
            }
            c if c == delimiter => {
                row.push(std::mem::take(&mut field));
                quoted = false;
            }
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                line += 1;
                finish_row(&mut rows, &mut row, &mut field, quoted);
                quoted = false;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(MalformedCsv { line: quote_line });
    }
    finish_row(&mut rows, &mut row, &mut field, quoted);
    Ok(rows)
}

fn finish_row(rows: &mut Vec<Vec<String>>, row: &mut Vec<String>, field: &mut String, quoted: bool) {
    if row.is_empty() && field.is_empty() && !quoted {
        return;
    }
    row.push(std::mem::take(field));
    rows.push(std::mem::take(row));
}

/// Render rows as `| a | b |` lines, stopping once `max_bytes` is reached.
pub fn render_rows(rows: &[Vec<String>], max_bytes: u64) -> String {
    let mut out = String::new();
    for row in rows {
        let cells: Vec<String> = row.iter().map(|cell| escape_cell(cell)).collect();
        out.push_str("| ");
        out.push_str(&cells.join(" | "));
        out.push_str(" |\n");
        if out.len() as u64 >= max_bytes {
            break;
        }
    }
    truncate_to_bytes(out, max_bytes)
}

fn escape_cell(cell: &str) -> String {
    cell.trim()
        .replace('|', "\\|")
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let rows = parse_delimited("name,age,city\nAlice,30,NYC\nBob,25,LA\n", ',').unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["Alice", "30", "NYC"]);
    }

    #[test]
    fn test_parse_quoted_fields() {
        let rows = parse_delimited("a,\"b, c\",\"say \"\"hi\"\"\"\r\n1,2,3", ',').unwrap();
        assert_eq!(rows[0], vec!["a", "b, c", "say \"hi\""]);
        assert_eq!(rows[1], vec!["1", "2", "3"]);
    }

    #[test]
    fn test_parse_quoted_newline() {
        let rows = parse_delimited("note,\"line one\nline two\"\nx,y", ',').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1], "line one\nline two");
    }

    #[test]
    fn test_parse_empty_quoted_field_is_kept() {
        let rows = parse_delimited("\"\"\n", ',').unwrap();
        assert_eq!(rows, vec![vec![String::new()]]);
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let rows = parse_delimited("a,b\n\n\nc,d\n", ',').unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_parse_tab_delimiter() {
        let rows = parse_delimited("a\tb,c\n1\t2", '\t').unwrap();
        assert_eq!(rows[0], vec!["a", "b,c"]);
    }

    #[test]
    fn test_unterminated_quote_is_malformed() {
        let err = parse_delimited("a,b\nc,\"open\nmore", ',').unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_render_rows() {
        let rows = vec![
            vec!["name".to_string(), "note".to_string()],
            vec!["Ada".to_string(), "a|b".to_string()],
        ];
        assert_eq!(render_rows(&rows, 1024), "| name | note |\n| Ada | a\\|b |\n");
    }

    #[test]
    fn test_render_rows_bounded() {
        let rows: Vec<Vec<String>> = (0..100).map(|i| vec![i.to_string()]).collect();
        let rendered = render_rows(&rows, 20);
        assert!(rendered.len() <= 20);
        assert!(rendered.starts_with("| 0 |\n"));
    }

    #[test]
    fn test_delimiter_for() {
        assert_eq!(delimiter_for(&CanonicalType::from_static("text/tab-separated-values")), '\t');
        assert_eq!(delimiter_for(&CanonicalType::from_static("text/csv")), ',');
    }

    #[tokio::test]
    async fn test_extract_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        std::fs::write(&path, "name,age\nAlice,30\n").unwrap();

        let input = extract(&path, &CanonicalType::from_static("text/csv"), &PipelineConfig::default()).await;
        assert_eq!(input, ModelInput::Text("| name | age |\n| Alice | 30 |\n".to_string()));
    }

    #[tokio::test]
    async fn test_extract_malformed_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.csv");
        std::fs::write(&path, "a,\"never closed\n").unwrap();

        let input = extract(&path, &CanonicalType::from_static("text/csv"), &PipelineConfig::default()).await;
        assert_eq!(input, ModelInput::Empty);
    }
}
