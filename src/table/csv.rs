//! Minimal RFC 4180 reader and writer

use crate::error::{AppError, Result};
use crate::table::Table;
use std::path::Path;

/// Parse CSV text with a header row into a [`Table`]
pub fn read_csv(input: &str) -> Result<Table> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let records = parse_records(input)?;

    let mut records = records
        .into_iter()
        .filter(|(_, fields)| !(fields.len() == 1 && fields[0].trim().is_empty()));

    let (_, headers) = records.next().ok_or_else(|| AppError::Parse {
        line: 1,
        message: "input is empty; a header row is required".to_string(),
    })?;

    let mut table = Table::new(headers);
    for (line, fields) in records {
        if fields.len() > table.n_columns() {
            return Err(AppError::Parse {
                line,
                message: format!(
                    "expected at most {} fields, found {}",
                    table.n_columns(),
                    fields.len()
                ),
            });
        }
        table.push_row(fields);
    }

    Ok(table)
}

/// Read a CSV file into a [`Table`]
pub fn read_csv_file(path: &Path) -> Result<Table> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
    read_csv(&content)
}

/// Render a [`Table`] as CSV text
pub fn write_csv(table: &Table) -> String {
    let mut out = String::new();
    write_record(&mut out, table.headers());
    for row in table.rows() {
        write_record(&mut out, row);
    }
    out
}

/// Write a [`Table`] to a CSV file
pub fn write_csv_file(table: &Table, path: &Path) -> Result<()> {
    std::fs::write(path, write_csv(table)).map_err(|e| AppError::io(path, e))
}

fn write_record(out: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\r', '\n']) {
            out.push('"');
            out.push_str(&escape_csv(field));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

fn escape_csv(s: &str) -> String {
    s.replace('"', "\"\"")
}

/// Split the input into records, each tagged with the line it starts on
fn parse_records(input: &str) -> Result<Vec<(usize, Vec<String>)>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut quote_opened_at = 0;

    let mut chars = input.chars().peekable();
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
            '"' if field.is_empty() => {
                in_quotes = true;
                quote_opened_at = line;
            }
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                fields.push(std::mem::take(&mut field));
                records.push((record_line, std::mem::take(&mut fields)));
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(AppError::Parse {
            line: quote_opened_at,
            message: "unterminated quoted field".to_string(),
        });
    }

    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push((record_line, fields));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_simple() {
        let table = read_csv("cvss_score,severity\n9.8,CRITICAL\n5.0,MEDIUM\n").unwrap();

        assert_eq!(table.headers(), &["cvss_score", "severity"]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.rows()[1], vec!["5.0", "MEDIUM"]);
    }

    #[test]
    fn test_read_quoted_fields() {
        let input = "family,note\r\n\"Web Servers, Apache\",\"said \"\"hi\"\"\"\r\n";
        let table = read_csv(input).unwrap();

        assert_eq!(table.rows()[0][0], "Web Servers, Apache");
        assert_eq!(table.rows()[0][1], "said \"hi\"");
    }

    #[test]
    fn test_quoted_newline_stays_in_field() {
        let table = read_csv("a,b\n\"line1\nline2\",x\n").unwrap();
        assert_eq!(table.n_rows(), 1);
        assert_eq!(table.rows()[0][0], "line1\nline2");
    }

    #[test]
    fn test_bom_and_blank_lines() {
        let table = read_csv("\u{feff}a,b\n\n1,2\n\n").unwrap();
        assert_eq!(table.headers(), &["a", "b"]);
        assert_eq!(table.n_rows(), 1);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = read_csv("a,b,c\n1\n").unwrap();
        assert_eq!(table.rows()[0], vec!["1", "", ""]);
    }

    #[test]
    fn test_long_row_is_error() {
        let err = read_csv("a,b\n1,2\n1,2,3\n").unwrap_err();
        assert!(matches!(err, AppError::Parse { line: 3, .. }));
    }

    #[test]
    fn test_empty_input_is_error() {
        assert!(matches!(read_csv(""), Err(AppError::Parse { line: 1, .. })));
        assert!(matches!(read_csv("\n\n"), Err(AppError::Parse { .. })));
    }

    #[test]
    fn test_unterminated_quote() {
        let err = read_csv("a\n\"open\n").unwrap_err();
        assert!(matches!(err, AppError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_header_only() {
        let table = read_csv("a,b\n").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.n_columns(), 2);
    }

    #[test]
    fn test_write_quotes_only_when_needed() {
        let table = Table::from_rows(&["family", "n"], &[&["Web Servers, Apache", "1"]]);
        assert_eq!(write_csv(&table), "family,n\n\"Web Servers, Apache\",1\n");
    }

    #[test]
    fn test_write_then_read_preserves_cells() {
        let table = Table::from_rows(&["a", "b"], &[&["x\"y", "line1\nline2"]]);
        assert_eq!(read_csv(&write_csv(&table)).unwrap(), table);
    }
}
