//! Source-level preprocessing: comment removal and statement splitting.
//!
//! Both passes understand string literals, quoted identifiers and
//! dollar-quoted bodies, so `--` or `;` inside them is left alone.

/// A single statement cut out of a script.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatement {
    /// Statement text without the terminating semicolon.
    pub text: String,
    /// 1-based line of the statement's first character.
    pub line: usize,
}

/// Remove `-- ...` and `/* ... */` comments, keeping literals intact.
///
/// Newlines inside removed comments are preserved so line numbers in
/// later error messages still match the input.
pub fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;

    while i < sql.len() {
        let rest = &sql[i..];
        if rest.starts_with("--") {
            // The newline itself is kept by the next iteration.
            i = rest.find('\n').map_or(sql.len(), |n| i + n);
        } else if rest.starts_with("/*") {
            let end = block_comment_end(sql, i);
            out.extend(sql[i..end].chars().filter(|c| *c == '\n'));
            out.push(' ');
            i = end;
        } else if let Some(end) = literal_end(sql, i) {
            out.push_str(&sql[i..end]);
            i = end;
        } else {
            let Some(c) = rest.chars().next() else { break };
            out.push(c);
            i += c.len_utf8();
        }
    }

    out
}

/// Split a comment-free script at top-level semicolons.
///
/// Empty statements are dropped. An unterminated literal swallows the rest
/// of the input into the final statement, where the lexer reports it.
pub fn split_statements(sql: &str) -> Vec<RawStatement> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < sql.len() {
        if let Some(end) = literal_end(sql, i) {
            i = end;
            continue;
        }
        let Some(c) = sql[i..].chars().next() else { break };
        if c == ';' {
            push_statement(&mut statements, sql, start, i);
            start = i + 1;
        }
        i += c.len_utf8();
    }
    push_statement(&mut statements, sql, start, sql.len());

    statements
}

fn push_statement(statements: &mut Vec<RawStatement>, sql: &str, start: usize, end: usize) {
    let chunk = &sql[start..end];
    let text = chunk.trim();
    if text.is_empty() {
        return;
    }
    let leading = chunk.len() - chunk.trim_start().len();
    let line = 1 + sql[..start + leading].matches('\n').count();
    statements.push(RawStatement {
        text: text.to_string(),
        line,
    });
}

/// End offset (exclusive) of a block comment starting at `start`.
/// Block comments nest, as in PostgreSQL.
fn block_comment_end(sql: &str, start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < sql.len() {
        let rest = &sql[i..];
        if rest.starts_with("/*") {
            depth += 1;
            i += 2;
        } else if rest.starts_with("*/") {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
        } else {
            i += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    sql.len()
}

/// If a literal (string, quoted identifier or dollar-quoted body) starts at
/// `start`, return the offset just past its end.
pub(crate) fn literal_end(sql: &str, start: usize) -> Option<usize> {
    let rest = &sql[start..];
    let first = rest.chars().next()?;
    match first {
        '\'' => {
            let escapes = is_escape_string_prefix(sql, start);
            Some(quoted_end(sql, start, '\'', escapes))
        }
        '"' => Some(quoted_end(sql, start, '"', false)),
        '$' => {
            let tag = dollar_tag_at(sql, start)?;
            let body_start = start + tag.len();
            Some(
                sql[body_start..]
                    .find(tag)
                    .map_or(sql.len(), |n| body_start + n + tag.len()),
            )
        }
        _ => None,
    }
}

fn quoted_end(sql: &str, start: usize, quote: char, escapes: bool) -> usize {
    let mut chars = sql[start..].char_indices().skip(1).peekable();
    while let Some((offset, c)) = chars.next() {
        if escapes && c == '\\' {
            chars.next();
        } else if c == quote {
            // Doubled quote is an escaped quote.
            if chars.peek().map(|(_, n)| *n) == Some(quote) {
                chars.next();
            } else {
                return start + offset + c.len_utf8();
            }
        }
    }
    sql.len()
}

/// `E'...'` strings honour backslash escapes.
fn is_escape_string_prefix(sql: &str, quote_at: usize) -> bool {
    let before = &sql[..quote_at];
    let mut prev = before.chars().rev();
    match (prev.next(), prev.next()) {
        (Some('E' | 'e'), None) => true,
        (Some('E' | 'e'), Some(c)) => !(c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// Recognize `$$` or `$tag$` at `start`. Returns the full delimiter.
pub(crate) fn dollar_tag_at(sql: &str, start: usize) -> Option<&str> {
    // `a$b$` is an identifier, not a dollar quote.
    if let Some(prev) = sql[..start].chars().next_back() {
        if prev.is_alphanumeric() || prev == '_' || prev == '$' {
            return None;
        }
    }
    let rest = &sql[start + 1..];
    for (offset, c) in rest.char_indices() {
        match c {
            '$' => return Some(&sql[start..start + offset + 2]),
            c if c.is_alphabetic() || c == '_' => {}
            c if c.is_ascii_digit() && offset > 0 => {}
            _ => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_line_and_block_comments() {
        let sql = "-- header\nCREATE TABLE t (/* inline */ id INT); -- trailing\n";
        let stripped = strip_comments(sql);
        assert!(!stripped.contains("header"));
        assert!(!stripped.contains("inline"));
        assert!(!stripped.contains("trailing"));
        assert!(stripped.contains("CREATE TABLE t ("));
        assert_eq!(stripped.matches('\n').count(), 2);
    }

    #[test]
    fn test_comment_markers_inside_literals_survive() {
        let sql = "CREATE TABLE t (note TEXT DEFAULT '-- not a comment', \"a/*b\" INT);";
        assert_eq!(strip_comments(sql), sql);
    }

    #[test]
    fn test_nested_block_comment() {
        let stripped = strip_comments("a /* outer /* inner */ still */ b");
        assert_eq!(stripped, "a   b");
    }

    #[test]
    fn test_split_respects_literals() {
        let sql = "CREATE TABLE a (x TEXT DEFAULT ';');\nCREATE TABLE b (y INT);";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].text, "CREATE TABLE a (x TEXT DEFAULT ';')");
        assert_eq!(statements[1].line, 2);
    }

    #[test]
    fn test_split_dollar_quoted_body() {
        let sql = "CREATE FUNCTION f() RETURNS void AS $fn$ BEGIN; END; $fn$ LANGUAGE plpgsql; SELECT 1";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].text.ends_with("LANGUAGE plpgsql"));
    }

    #[test]
    fn test_dollar_tag_detection() {
        assert_eq!(dollar_tag_at("$$ x $$", 0), Some("$$"));
        assert_eq!(dollar_tag_at("$body$ x", 0), Some("$body$"));
        assert_eq!(dollar_tag_at("$1", 0), None);
        assert_eq!(dollar_tag_at("a$b$", 1), None);
    }

    #[test]
    fn test_escape_string() {
        let sql = r"SELECT E'it\'s'; SELECT 2";
        assert_eq!(split_statements(sql).len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(split_statements("").is_empty());
        assert!(split_statements(" ;\n; ").is_empty());
    }
}
