//! Minimal RFC 4180 encoding for journal rows

const LINE_END: &str = "\r\n";

/// Encode one row, CRLF-terminated.
pub(super) fn encode_row(fields: &[&str]) -> String {
    let mut row = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            row.push(',');
        }
        push_field(&mut row, field);
    }
    row.push_str(LINE_END);
    row
}

/// Fields containing a delimiter, quote, or line break are wrapped in
/// double quotes with internal quotes doubled.
fn push_field(out: &mut String, field: &str) {
    let needs_quoting = field
        .chars()
        .any(|c| c == ',' || c == '"' || c == '\n' || c == '\r');
    if !needs_quoting {
        out.push_str(field);
        return;
    }
    out.push('"');
    for c in field.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
}

/// Split journal content into rows of fields.
///
/// Accepts both CRLF and LF line endings. Blank lines are skipped.
pub(super) fn parse_rows(content: &str) -> Result<Vec<Vec<String>>, String> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(std::mem::take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_fields_are_not_quoted() {
        assert_eq!(encode_row(&["a", "b c", "d"]), "a,b c,d\r\n");
    }

    #[test]
    fn special_characters_are_quoted() {
        assert_eq!(
            encode_row(&["x,y", "say \"hi\"", "1\n2"]),
            "\"x,y\",\"say \"\"hi\"\"\",\"1\n2\"\r\n"
        );
    }

    #[test]
    fn parses_quoted_fields_and_mixed_line_endings() {
        let content = "a,\"b,\"\"c\"\"\"\r\n\nd,\"e\nf\"\n";
        assert_eq!(
            parse_rows(content).unwrap(),
            vec![
                vec!["a".to_string(), "b,\"c\"".to_string()],
                vec!["d".to_string(), "e\nf".to_string()],
            ]
        );
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(parse_rows("a,\"b\n").is_err());
    }
}
