//! Minimal RFC-4180 reader.
//!
//! Handles quoted fields, doubled quotes, separators and newlines inside
//! quotes, CRLF line endings and a leading UTF-8 BOM. Every record carries the
//! 1-based line it started on so row-level diagnostics can point at the file.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRecord {
    pub line: usize,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    UnterminatedQuote { line: usize },
}

impl std::fmt::Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableError::UnterminatedQuote { line } => {
                write!(f, "quoted field starting on line {line} is never closed")
            }
        }
    }
}

impl std::error::Error for TableError {}

/// Splits `text` into records. Blank lines are skipped.
pub fn read_table(text: &str) -> Result<Vec<TableRecord>, TableError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut out = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quote_line = 0;
    let mut line = 1;
    let mut record_line = 1;

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
                    field.push('\n');
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => {
                in_quotes = true;
                quote_line = line;
            }
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                fields.push(std::mem::take(&mut field));
                push_record(&mut out, record_line, std::mem::take(&mut fields));
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(TableError::UnterminatedQuote { line: quote_line });
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        push_record(&mut out, record_line, fields);
    }

    Ok(out)
}

fn push_record(out: &mut Vec<TableRecord>, line: usize, fields: Vec<String>) {
    let blank = fields.iter().all(|f| f.trim().is_empty());
    if !blank {
        out.push(TableRecord { line, fields });
    }
}

#[cfg(test)]
mod tests {
    use super::{TableError, read_table};

    fn fields(text: &str) -> Vec<Vec<String>> {
        read_table(text)
            .expect("table")
            .into_iter()
            .map(|r| r.fields)
            .collect()
    }

    #[test]
    fn splits_plain_rows() {
        assert_eq!(
            fields("a,b,c\n1,2,3\n"),
            vec![vec!["a", "b", "c"], vec!["1", "2", "3"]]
        );
    }

    #[test]
    fn quoted_fields_keep_separators_and_newlines() {
        let rows = read_table("id,text\n1,\"hello, \"\"world\"\"\nbye\"\n2,x\n").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].fields[1], "hello, \"world\"\nbye");
        assert_eq!(rows[1].line, 2);
        assert_eq!(rows[2].line, 4);
    }

    #[test]
    fn crlf_bom_and_blank_lines() {
        let rows = read_table("\u{feff}a,b\r\n\r\n1,2\r\n,\r\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fields, vec!["a", "b"]);
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn last_row_without_newline_and_trailing_empty_field() {
        assert_eq!(fields("a,b\n1,"), vec![vec!["a", "b"], vec!["1", ""]]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let err = read_table("a\n\"oops\n").unwrap_err();
        assert_eq!(err, TableError::UnterminatedQuote { line: 2 });
    }
}
