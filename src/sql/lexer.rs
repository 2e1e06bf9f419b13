//! SQL lexer for tokenizing a single DDL statement.

use super::source::dollar_tag_at;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

/// SQL token types.
///
/// Keywords are not separate variants: DDL lets most keywords double as
/// identifiers, so the parser matches unquoted [`Token::Ident`] words
/// case-insensitively instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Unquoted word, as written.
    Ident(String),
    /// `"quoted"` identifier with the quotes removed.
    QuotedIdent(String),
    /// String literal contents (single- or dollar-quoted).
    Str(String),
    Num(String),
    /// Positional parameter such as `$1`.
    Param(String),
    /// Operator run such as `::`, `=`, `<>`, `->>`.
    Op(String),

    // Symbols
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Dot,

    // End of input
    Eof,
}

/// A token plus its byte range in the statement text.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("Unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),
    #[error("Unterminated quoted identifier starting at offset {0}")]
    UnterminatedIdentifier(usize),
    #[error("Unterminated dollar-quoted string starting at offset {0}")]
    UnterminatedDollarQuote(usize),
}

const OPERATOR_CHARS: &str = "+-*/<>=~!@#%^&|`?:";

/// SQL lexer.
pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    current: Option<(usize, char)>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut chars = input.char_indices().peekable();
        let current = chars.next();
        Self {
            input,
            chars,
            current,
        }
    }

    fn advance(&mut self) {
        self.current = self.chars.next();
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.current.map_or(self.input.len(), |(i, _)| i)
    }

    fn current_char(&self) -> Option<char> {
        self.current.map(|(_, c)| c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current_char() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.current_char() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        ident
    }

    fn read_quoted(&mut self, quote: char, escapes: bool) -> Option<String> {
        self.advance(); // skip opening quote
        let mut s = String::new();
        while let Some(c) = self.current_char() {
            if c == quote {
                // Doubled quote is an escaped quote
                if self.peek() == Some(quote) {
                    s.push(c);
                    self.advance();
                    self.advance();
                } else {
                    self.advance(); // skip closing quote
                    return Some(s);
                }
            } else if escapes && c == '\\' {
                self.advance();
                if let Some(escaped) = self.current_char() {
                    match escaped {
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        'r' => s.push('\r'),
                        _ => s.push(escaped),
                    }
                    self.advance();
                }
            } else {
                s.push(c);
                self.advance();
            }
        }
        None
    }

    fn read_dollar_quoted(&mut self, start: usize, tag: &str) -> Result<String, LexError> {
        let body_start = start + tag.len();
        let Some(len) = self.input[body_start..].find(tag) else {
            return Err(LexError::UnterminatedDollarQuote(start));
        };
        let body = self.input[body_start..body_start + len].to_string();
        let resume = body_start + len + tag.len();
        while self.current.is_some_and(|(i, _)| i < resume) {
            self.advance();
        }
        Ok(body)
    }

    fn read_number(&mut self) -> String {
        let mut num = String::new();
        let mut has_dot = false;
        let mut has_exp = false;

        while let Some(c) = self.current_char() {
            if c.is_ascii_digit() {
                num.push(c);
                self.advance();
            } else if c == '.' && !has_dot && !has_exp {
                has_dot = true;
                num.push(c);
                self.advance();
            } else if (c == 'e' || c == 'E')
                && !has_exp
                && self.peek().is_some_and(|n| n.is_ascii_digit() || n == '-' || n == '+')
            {
                has_exp = true;
                num.push(c);
                self.advance();
                if let Some(sign) = self.current_char().filter(|s| *s == '-' || *s == '+') {
                    num.push(sign);
                    self.advance();
                }
            } else {
                break;
            }
        }
        num
    }

    fn read_operator(&mut self) -> String {
        let mut op = String::new();
        while let Some(c) = self.current_char() {
            if OPERATOR_CHARS.contains(c) {
                op.push(c);
                self.advance();
            } else {
                break;
            }
        }
        op
    }

    fn next_token(&mut self) -> Result<Spanned, LexError> {
        self.skip_whitespace();
        let start = self.offset();

        let token = match self.current_char() {
            None => Token::Eof,

            Some('(') => {
                self.advance();
                Token::LParen
            }
            Some(')') => {
                self.advance();
                Token::RParen
            }
            Some('[') => {
                self.advance();
                Token::LBracket
            }
            Some(']') => {
                self.advance();
                Token::RBracket
            }
            Some(',') => {
                self.advance();
                Token::Comma
            }
            Some(';') => {
                self.advance();
                Token::Semicolon
            }
            Some('.') => {
                self.advance();
                Token::Dot
            }

            Some('"') => match self.read_quoted('"', false) {
                Some(ident) => Token::QuotedIdent(ident),
                None => return Err(LexError::UnterminatedIdentifier(start)),
            },

            Some('\'') => match self.read_quoted('\'', false) {
                Some(s) => Token::Str(s),
                None => return Err(LexError::UnterminatedString(start)),
            },

            Some('$') => {
                if let Some(tag) = dollar_tag_at(self.input, start) {
                    let tag = tag.to_string();
                    Token::Str(self.read_dollar_quoted(start, &tag)?)
                } else {
                    self.advance();
                    let digits = self.read_number();
                    Token::Param(format!("${}", digits))
                }
            }

            Some(c) if c.is_ascii_digit() => Token::Num(self.read_number()),

            Some(c) if c.is_alphabetic() || c == '_' => {
                let ident = self.read_identifier();
                // E'...' escape string
                if ident.eq_ignore_ascii_case("e") && self.current_char() == Some('\'') {
                    match self.read_quoted('\'', true) {
                        Some(s) => Token::Str(s),
                        None => return Err(LexError::UnterminatedString(start)),
                    }
                } else {
                    Token::Ident(ident)
                }
            }

            Some(c) if OPERATOR_CHARS.contains(c) => Token::Op(self.read_operator()),

            Some(c) => {
                // Anything else is passed through as a one-character operator
                self.advance();
                Token::Op(c.to_string())
            }
        };

        Ok(Spanned {
            token,
            start,
            end: self.offset(),
        })
    }

    /// Collect all tokens, ending with [`Token::Eof`].
    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.next_token()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                break;
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<Token> {
        Lexer::new(sql)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_simple_create_table() {
        let tokens = kinds("CREATE TABLE users (id INT);");

        assert_eq!(tokens[0], Token::Ident("CREATE".to_string()));
        assert_eq!(tokens[1], Token::Ident("TABLE".to_string()));
        assert_eq!(tokens[2], Token::Ident("users".to_string()));
        assert_eq!(tokens[3], Token::LParen);
        assert_eq!(tokens[4], Token::Ident("id".to_string()));
        assert_eq!(tokens[5], Token::Ident("INT".to_string()));
        assert_eq!(tokens[6], Token::RParen);
        assert_eq!(tokens[7], Token::Semicolon);
        assert_eq!(tokens[8], Token::Eof);
    }

    #[test]
    fn test_quoted_identifiers() {
        let tokens = kinds(r#"CREATE TABLE "User Table" ("say ""hi""" INT);"#);

        assert_eq!(tokens[2], Token::QuotedIdent("User Table".to_string()));
        assert_eq!(tokens[4], Token::QuotedIdent("say \"hi\"".to_string()));
    }

    #[test]
    fn test_spans_cover_source() {
        let sql = "DEFAULT gen_random_uuid()";
        let tokens = Lexer::new(sql).tokenize().unwrap();
        assert_eq!(&sql[tokens[1].start..tokens[3].end], "gen_random_uuid()");
    }

    #[test]
    fn test_cast_and_numbers() {
        let tokens = kinds("'{}'::jsonb 0.00 1e-3");
        assert_eq!(tokens[0], Token::Str("{}".to_string()));
        assert_eq!(tokens[1], Token::Op("::".to_string()));
        assert_eq!(tokens[2], Token::Ident("jsonb".to_string()));
        assert_eq!(tokens[3], Token::Num("0.00".to_string()));
        assert_eq!(tokens[4], Token::Num("1e-3".to_string()));
    }

    #[test]
    fn test_dollar_quoted_body() {
        let tokens = kinds("AS $$ BEGIN RETURN NEW; END; $$ LANGUAGE plpgsql");
        assert_eq!(tokens[1], Token::Str(" BEGIN RETURN NEW; END; ".to_string()));
        assert_eq!(tokens[2], Token::Ident("LANGUAGE".to_string()));
    }

    #[test]
    fn test_params_and_escape_strings() {
        let tokens = kinds(r"$1 E'a\'b'");
        assert_eq!(tokens[0], Token::Param("$1".to_string()));
        assert_eq!(tokens[1], Token::Str("a'b".to_string()));
    }

    #[test]
    fn test_unterminated_literals() {
        assert_eq!(
            Lexer::new("DEFAULT 'oops").tokenize(),
            Err(LexError::UnterminatedString(8))
        );
        assert!(matches!(
            Lexer::new("CREATE TABLE \"t (id INT)").tokenize(),
            Err(LexError::UnterminatedIdentifier(13))
        ));
        assert!(matches!(
            Lexer::new("AS $$ never closed").tokenize(),
            Err(LexError::UnterminatedDollarQuote(3))
        ));
    }
}
