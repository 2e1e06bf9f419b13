//! SQL parser for PostgreSQL DDL scripts.
//!
//! A script is cut into statements first, and each statement is lexed and
//! parsed on its own: a malformed statement is recorded in
//! [`ParsedScript::errors`] and parsing continues with the next one.

use super::lexer::{LexError, Lexer, Spanned, Token};
use super::source::{split_statements, strip_comments};
use super::types::{normalize_type, TypeWord};
use crate::ast::{
    ParseOutcome, ParsedColumn, ParsedEnumType, ParsedForeignKey, ParsedFunction, ParsedIndex,
    ParsedParameter, ParsedPolicy, ParsedScript, ParsedTable, ParsedTrigger,
    ParsedUniqueConstraint,
};
use crate::validate::Warning;
use crate::vocabulary::{
    DataType, PolicyCommand, ReferentialAction, TriggerEvent, TriggerTiming,
    COLUMN_CONSTRAINT_KEYWORDS, TABLE_CONSTRAINT_KEYWORDS,
};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt::Display;
use thiserror::Error;
use tracing::{debug, warn};

/// Deepest parenthesis nesting accepted inside one statement.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Words that end a function's `RETURNS` clause or option list.
const FUNCTION_OPTION_KEYWORDS: &[&str] = &[
    "AS", "LANGUAGE", "SECURITY", "IMMUTABLE", "STABLE", "VOLATILE", "STRICT", "CALLED",
    "PARALLEL", "COST", "ROWS", "LEAKPROOF", "NOT", "WINDOW", "SET", "EXTERNAL", "SUPPORT",
    "TRANSFORM", "BEGIN", "RETURN",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Lowercase unquoted identifiers the way PostgreSQL does. Off by
    /// default: identifiers are kept as written and compared
    /// case-sensitively.
    pub fold_unquoted_identifiers: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("{0}")]
    Lex(#[from] LexError),
    #[error("Expected {expected}, found {found}")]
    Expected {
        expected: &'static str,
        found: String,
    },
    #[error("Missing table name")]
    MissingTableName,
    #[error("Table {0} has no columns")]
    NoColumns(String),
    #[error("Column {0} has no data type")]
    MissingType(String),
    #[error("Unbalanced parentheses")]
    UnbalancedParentheses,
    #[error("Parentheses nested deeper than {0} levels")]
    NestingTooDeep(usize),
    #[error("Unknown column {column} in table {table}")]
    UnknownColumn { table: String, column: String },
    #[error("Foreign key has {columns} column(s) but references {targets}")]
    ForeignKeyArity { columns: usize, targets: usize },
    #[error("Invalid referential action: {0}")]
    InvalidAction(String),
    #[error("Unsupported syntax: {0}")]
    Unsupported(String),
}

/// A statement that failed to parse.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("statement {index} (line {line}): {error}")]
pub struct StatementError {
    /// 0-based statement index within the script.
    pub index: usize,
    pub line: usize,
    /// Start of the statement text, for display.
    pub snippet: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: ParseError,
}

fn serialize_display<S: Serializer, T: Display>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Parse every `CREATE TABLE` statement in `sql`.
///
/// Never fails as a whole: input without tables yields an empty outcome,
/// and malformed statements are reported individually next to the tables
/// that did parse.
pub fn parse_create_table_statements(sql: &str) -> ParseOutcome {
    parse_script(sql, &ParseOptions::default()).into()
}

/// Parse a DDL script into tables, indexes, types, functions, triggers and
/// policies.
pub fn parse_script(sql: &str, options: &ParseOptions) -> ParsedScript {
    let stripped = strip_comments(sql);
    let mut script = ParsedScript::default();

    for (index, raw) in split_statements(&stripped).iter().enumerate() {
        let result = Lexer::new(&raw.text)
            .tokenize()
            .map_err(ParseError::from)
            .and_then(|tokens| {
                let mut parser = Parser::new(&raw.text, tokens, *options, index);
                let statement = parser.parse_statement()?;
                Ok((statement, parser.warnings))
            });

        let applied = result.and_then(|(statement, warnings)| {
            script.warnings.extend(warnings);
            apply_statement(&mut script, statement, index)
        });

        if let Err(error) = applied {
            warn!(statement = index, line = raw.line, %error, "failed to parse statement");
            script.errors.push(StatementError {
                index,
                line: raw.line,
                snippet: snippet(&raw.text),
                error,
            });
        }
    }

    script
}

fn snippet(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > 60 {
        format!("{}...", collapsed.chars().take(60).collect::<String>())
    } else {
        collapsed
    }
}

enum Statement {
    CreateTable(ParsedTable),
    CreateIndex(ParsedIndex),
    CreateEnum(ParsedEnumType),
    CreateFunction(ParsedFunction),
    CreateTrigger(ParsedTrigger),
    CreatePolicy(ParsedPolicy),
    AlterTable {
        table: String,
        actions: Vec<AlterAction>,
    },
    Comment {
        target: CommentTarget,
        text: Option<String>,
    },
    Skipped(String),
}

enum AlterAction {
    AddColumn(ParsedColumn),
    AddConstraint(TableConstraint),
    SetTriggerEnabled(String, bool),
}

enum CommentTarget {
    Table(String),
    Column(String, String),
    Index(String),
}

enum TableConstraint {
    PrimaryKey(Vec<String>),
    Unique {
        name: Option<String>,
        columns: Vec<String>,
    },
    ForeignKey {
        name: Option<String>,
        columns: Vec<String>,
        target: String,
        target_columns: Vec<String>,
        on_delete: Option<ReferentialAction>,
        on_update: Option<ReferentialAction>,
    },
}

fn apply_statement(
    script: &mut ParsedScript,
    statement: Statement,
    index: usize,
) -> Result<(), ParseError> {
    match statement {
        Statement::CreateTable(table) => script.tables.push(table),
        Statement::CreateIndex(idx) => script.indexes.push(idx),
        Statement::CreateEnum(ty) => script.enum_types.push(ty),
        Statement::CreateFunction(func) => script.functions.push(func),
        Statement::CreateTrigger(trigger) => script.triggers.push(trigger),
        Statement::CreatePolicy(policy) => script.policies.push(policy),
        Statement::AlterTable { table, actions } => {
            for action in actions {
                apply_alter_action(script, &table, action, index)?;
            }
        }
        Statement::Comment { target, text } => apply_comment(script, target, text, index),
        Statement::Skipped(kind) => {
            debug!(statement = index, %kind, "skipping statement");
        }
    }
    Ok(())
}

fn apply_alter_action(
    script: &mut ParsedScript,
    table_name: &str,
    action: AlterAction,
    index: usize,
) -> Result<(), ParseError> {
    if let AlterAction::SetTriggerEnabled(name, enabled) = action {
        match script
            .triggers
            .iter_mut()
            .find(|t| t.name == name && t.table == table_name)
        {
            Some(trigger) => trigger.enabled = enabled,
            None => script.warnings.push(Warning::OrphanStatement {
                statement: index,
                target: format!("trigger {} on {}", name, table_name),
            }),
        }
        return Ok(());
    }

    let Some(table) = script.table_mut(table_name) else {
        script.warnings.push(Warning::OrphanStatement {
            statement: index,
            target: format!("table {}", table_name),
        });
        return Ok(());
    };

    match action {
        AlterAction::AddColumn(column) => table.columns.push(column),
        AlterAction::AddConstraint(constraint) => apply_table_constraint(table, constraint)?,
        AlterAction::SetTriggerEnabled(..) => {}
    }
    Ok(())
}

fn apply_comment(
    script: &mut ParsedScript,
    target: CommentTarget,
    text: Option<String>,
    index: usize,
) {
    let found = match &target {
        CommentTarget::Table(name) => script.table_mut(name).map(|t| t.comment = text).is_some(),
        CommentTarget::Column(table, column) => script
            .table_mut(table)
            .and_then(|t| t.column_mut(column))
            .map(|c| c.comment = text)
            .is_some(),
        CommentTarget::Index(name) => script
            .indexes
            .iter_mut()
            .find(|i| &i.name == name)
            .map(|i| i.comment = text)
            .is_some(),
    };

    if !found {
        let target = match target {
            CommentTarget::Table(name) => format!("table {}", name),
            CommentTarget::Column(table, column) => format!("column {}.{}", table, column),
            CommentTarget::Index(name) => format!("index {}", name),
        };
        script.warnings.push(Warning::OrphanStatement {
            statement: index,
            target,
        });
    }
}

/// Apply a table-level constraint to the columns it names.
fn apply_table_constraint(
    table: &mut ParsedTable,
    constraint: TableConstraint,
) -> Result<(), ParseError> {
    let table_name = table.name.clone();
    let unknown = |column: &str| ParseError::UnknownColumn {
        table: table_name.clone(),
        column: column.to_string(),
    };

    match constraint {
        TableConstraint::PrimaryKey(columns) => {
            for name in &columns {
                let col = table.column_mut(name).ok_or_else(|| unknown(name))?;
                col.primary_key = true;
                col.not_null = true;
            }
        }
        TableConstraint::Unique { name, columns } => {
            if let [single] = columns.as_slice() {
                table.column_mut(single).ok_or_else(|| unknown(single))?.unique = true;
            } else {
                if let Some(missing) = columns.iter().find(|c| !table.columns.iter().any(|t| &t.name == *c)) {
                    return Err(unknown(missing));
                }
                table
                    .unique_constraints
                    .push(ParsedUniqueConstraint { name, columns });
            }
        }
        TableConstraint::ForeignKey {
            name,
            columns,
            target,
            target_columns,
            on_delete,
            on_update,
        } => {
            // Without a column list the reference is to the target's key,
            // which by convention is `id`.
            let target_columns = if target_columns.is_empty() {
                vec!["id".to_string(); columns.len()]
            } else {
                target_columns
            };
            if target_columns.len() != columns.len() {
                return Err(ParseError::ForeignKeyArity {
                    columns: columns.len(),
                    targets: target_columns.len(),
                });
            }
            let count = columns.len();
            for (column, field) in columns.iter().zip(target_columns) {
                let col = table.column_mut(column).ok_or_else(|| unknown(column))?;
                // Table-level constraints replace any inline reference.
                col.foreign_key = Some(ParsedForeignKey {
                    table: target.clone(),
                    field,
                    on_delete,
                    on_update,
                    constraint_name: name.clone(),
                    column_count: count,
                });
            }
        }
    }
    Ok(())
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    /// Tokens at or after `limit` read as end of input.
    limit: usize,
    options: ParseOptions,
    statement: usize,
    warnings: Vec<Warning>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: Vec<Spanned>, options: ParseOptions, statement: usize) -> Self {
        // Drop the trailing Eof so `limit` alone decides where input ends.
        let tokens: Vec<Spanned> = tokens
            .into_iter()
            .filter(|t| t.token != Token::Eof)
            .collect();
        let limit = tokens.len();
        Self {
            source,
            tokens,
            pos: 0,
            limit,
            options,
            statement,
            warnings: Vec::new(),
        }
    }

    fn current(&self) -> &Token {
        self.token_at(self.pos)
    }

    fn token_at(&self, pos: usize) -> &Token {
        if pos < self.limit {
            self.tokens.get(pos).map_or(&Token::Eof, |t| &t.token)
        } else {
            &Token::Eof
        }
    }

    fn advance(&mut self) {
        if self.pos < self.limit {
            self.pos += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current(), Token::Eof | Token::Semicolon)
    }

    fn is_keyword(token: &Token, keyword: &str) -> bool {
        matches!(token, Token::Ident(s) if s.eq_ignore_ascii_case(keyword))
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        Self::is_keyword(self.current(), keyword)
    }

    fn at_any_keyword(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.at_keyword(k))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &'static str) -> Result<(), ParseError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.expected(keyword))
        }
    }

    fn expect_token(&mut self, token: Token, expected: &'static str) -> Result<(), ParseError> {
        if *self.current() == token {
            self.advance();
            Ok(())
        } else {
            Err(self.expected(expected))
        }
    }

    fn expected(&self, expected: &'static str) -> ParseError {
        ParseError::Expected {
            expected,
            found: describe(self.current()),
        }
    }

    fn warn_ignored(&mut self, clause: impl Into<String>) {
        let clause = clause.into();
        debug!(statement = self.statement, %clause, "ignoring clause");
        self.warnings.push(Warning::IgnoredClause {
            statement: self.statement,
            clause,
        });
    }

    /// Identifier value, folded when configured.
    fn ident_value(&self, token: &Token) -> Option<String> {
        match token {
            Token::Ident(s) if self.options.fold_unquoted_identifiers => Some(s.to_lowercase()),
            Token::Ident(s) | Token::QuotedIdent(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn parse_ident(&mut self, expected: &'static str) -> Result<String, ParseError> {
        match self.ident_value(self.current()) {
            Some(value) => {
                self.advance();
                Ok(value)
            }
            None => Err(self.expected(expected)),
        }
    }

    /// `a.b.c` as its parts.
    fn parse_name_parts(&mut self, expected: &'static str) -> Result<Vec<String>, ParseError> {
        let mut parts = vec![self.parse_ident(expected)?];
        while *self.current() == Token::Dot {
            self.advance();
            parts.push(self.parse_ident(expected)?);
        }
        Ok(parts)
    }

    /// Schema-qualified name; only the object name is kept.
    fn parse_qualified_name(&mut self, expected: &'static str) -> Result<String, ParseError> {
        let mut parts = self.parse_name_parts(expected)?;
        Ok(parts.pop().unwrap_or_default())
    }

    /// Source text covered by tokens `start..end`.
    fn raw(&self, start: usize, end: usize) -> String {
        if start >= end || start >= self.tokens.len() {
            return String::new();
        }
        let from = self.tokens[start].start;
        let to = self.tokens[end.min(self.tokens.len()) - 1].end;
        self.source[from..to].trim().to_string()
    }

    /// Index of the `)` matching the `(` at `open`.
    fn find_group_end(&self, open: usize) -> Result<usize, ParseError> {
        let mut depth = 0usize;
        let mut i = open;
        while i < self.limit {
            match self.token_at(i) {
                Token::LParen => {
                    depth += 1;
                    if depth > MAX_NESTING_DEPTH {
                        return Err(ParseError::NestingTooDeep(MAX_NESTING_DEPTH));
                    }
                }
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                _ => {}
            }
            i += 1;
        }
        Err(ParseError::UnbalancedParentheses)
    }

    /// Split `start..end` at commas outside parentheses and brackets.
    fn split_top_level(&self, start: usize, end: usize) -> Result<Vec<(usize, usize)>, ParseError> {
        let mut parts = Vec::new();
        let mut depth = 0usize;
        let mut part_start = start;
        for i in start..end {
            match self.token_at(i) {
                Token::LParen | Token::LBracket => {
                    depth += 1;
                    if depth > MAX_NESTING_DEPTH {
                        return Err(ParseError::NestingTooDeep(MAX_NESTING_DEPTH));
                    }
                }
                Token::RParen | Token::RBracket => {
                    depth = depth.checked_sub(1).ok_or(ParseError::UnbalancedParentheses)?;
                }
                Token::Comma if depth == 0 => {
                    parts.push((part_start, i));
                    part_start = i + 1;
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(ParseError::UnbalancedParentheses);
        }
        parts.push((part_start, end));
        Ok(parts)
    }

    /// Run `f` with input restricted to tokens `start..end`.
    fn with_range<T>(
        &mut self,
        start: usize,
        end: usize,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let (saved_pos, saved_limit) = (self.pos, self.limit);
        self.pos = start;
        self.limit = end;
        let result = f(self);
        self.pos = saved_pos;
        self.limit = saved_limit;
        result
    }

    /// Skip one token, or a whole parenthesized group.
    fn skip_unit(&mut self) -> Result<(), ParseError> {
        if *self.current() == Token::LParen {
            self.pos = self.find_group_end(self.pos)? + 1;
        } else {
            self.advance();
        }
        Ok(())
    }

    /// Text inside the parenthesized group at the cursor.
    fn parse_group_text(&mut self, expected: &'static str) -> Result<String, ParseError> {
        if *self.current() != Token::LParen {
            return Err(self.expected(expected));
        }
        let close = self.find_group_end(self.pos)?;
        let text = self.raw(self.pos + 1, close);
        self.pos = close + 1;
        Ok(text)
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        if self.eat_keyword("CREATE") {
            if self.eat_keyword("OR") {
                self.expect_keyword("REPLACE")?;
            }
            while self.at_any_keyword(&["TEMP", "TEMPORARY", "UNLOGGED", "GLOBAL", "LOCAL"]) {
                self.advance();
            }
            let unique = self.eat_keyword("UNIQUE");

            if self.at_keyword("TABLE") {
                self.parse_create_table().map(Statement::CreateTable)
            } else if self.at_keyword("INDEX") {
                self.parse_create_index(unique).map(Statement::CreateIndex)
            } else if self.at_keyword("TYPE") {
                self.parse_create_type()
            } else if self.at_keyword("FUNCTION") {
                self.parse_create_function().map(Statement::CreateFunction)
            } else if self.at_keyword("TRIGGER") {
                self.parse_create_trigger().map(Statement::CreateTrigger)
            } else if self.at_keyword("POLICY") {
                self.parse_create_policy().map(Statement::CreatePolicy)
            } else {
                Ok(Statement::Skipped(format!("CREATE {}", describe(self.current()))))
            }
        } else if self.at_keyword("ALTER") {
            self.advance();
            if self.at_keyword("TABLE") {
                self.parse_alter_table()
            } else {
                Ok(Statement::Skipped(format!("ALTER {}", describe(self.current()))))
            }
        } else if self.at_keyword("COMMENT") {
            self.parse_comment()
        } else {
            Ok(Statement::Skipped(describe(self.current())))
        }
    }

    fn parse_create_table(&mut self) -> Result<ParsedTable, ParseError> {
        self.advance(); // TABLE

        // IF NOT EXISTS
        if self.eat_keyword("IF") {
            self.expect_keyword("NOT")?;
            self.expect_keyword("EXISTS")?;
        }

        let name = match self.current() {
            Token::Ident(_) | Token::QuotedIdent(_) => self.parse_qualified_name("table name")?,
            _ => return Err(ParseError::MissingTableName),
        };

        if *self.current() != Token::LParen {
            if self.at_keyword("AS") || self.at_keyword("PARTITION") || self.at_keyword("OF") {
                return Err(ParseError::Unsupported(format!(
                    "CREATE TABLE {} {}",
                    name,
                    describe(self.current())
                )));
            }
            return Err(self.expected("'(' after table name"));
        }

        let open = self.pos;
        let close = self.find_group_end(open)?;

        let mut table = ParsedTable {
            name,
            columns: Vec::new(),
            unique_constraints: Vec::new(),
            comment: None,
        };
        let mut constraints = Vec::new();

        let clauses = if close == open + 1 {
            Vec::new()
        } else {
            self.split_top_level(open + 1, close)?
        };

        for (start, end) in clauses {
            if start == end {
                return Err(ParseError::Expected {
                    expected: "column definition",
                    found: describe(self.token_at(start)),
                });
            }
            let first = self.token_at(start).clone();
            if TABLE_CONSTRAINT_KEYWORDS.iter().any(|k| Self::is_keyword(&first, k)) {
                if let Some(c) = self.with_range(start, end, |p| p.parse_table_constraint())? {
                    constraints.push(c);
                }
            } else if Self::is_keyword(&first, "LIKE") {
                let clause = self.raw(start, end);
                self.warn_ignored(clause);
            } else {
                let column = self.with_range(start, end, |p| p.parse_column_def())?;
                table.columns.push(column);
            }
        }

        self.pos = close + 1;
        if !self.is_at_end() {
            let options = self.raw(self.pos, self.limit);
            self.warn_ignored(format!("table options: {}", options));
        }

        if table.columns.is_empty() {
            return Err(ParseError::NoColumns(table.name));
        }

        for constraint in constraints {
            apply_table_constraint(&mut table, constraint)?;
        }

        Ok(table)
    }

    fn parse_column_def(&mut self) -> Result<ParsedColumn, ParseError> {
        let name = self.parse_ident("column name")?;

        // Type
        let mut words: Vec<TypeWord> = Vec::new();
        let mut params: Option<String> = None;
        let mut array_dims = 0;

        loop {
            match self.current().clone() {
                Token::Ident(word)
                    if COLUMN_CONSTRAINT_KEYWORDS
                        .iter()
                        .any(|k| word.eq_ignore_ascii_case(k)) =>
                {
                    break;
                }
                Token::Ident(word) if word.eq_ignore_ascii_case("ARRAY") && !words.is_empty() => {
                    self.advance();
                    array_dims += 1;
                }
                Token::Ident(text) => {
                    self.advance();
                    words.push(TypeWord {
                        text,
                        quoted: false,
                    });
                }
                Token::QuotedIdent(text) => {
                    self.advance();
                    words.push(TypeWord { text, quoted: true });
                }
                Token::Dot if !words.is_empty() => {
                    self.advance();
                    let (next, quoted) = match self.current().clone() {
                        Token::Ident(s) => (s, false),
                        Token::QuotedIdent(s) => (s, true),
                        _ => return Err(self.expected("type name after '.'")),
                    };
                    self.advance();
                    if let Some(last) = words.last_mut() {
                        last.text = format!("{}.{}", last.text, next);
                        last.quoted |= quoted;
                    }
                }
                Token::LParen if params.is_none() && !words.is_empty() => {
                    let text = self.parse_group_text("type parameters")?;
                    params = Some(text.chars().filter(|c| !c.is_whitespace()).collect());
                }
                Token::LBracket if !words.is_empty() => {
                    self.advance();
                    if matches!(self.current(), Token::Num(_)) {
                        self.advance();
                    }
                    self.expect_token(Token::RBracket, "']'")?;
                    array_dims += 1;
                }
                _ => break,
            }
        }

        if words.is_empty() {
            return Err(ParseError::MissingType(name));
        }

        let data_type = normalize_type(&words, params.as_deref(), array_dims);
        let mut column = ParsedColumn::new(name, data_type);
        let mut constraint_name: Option<String> = None;

        // Constraints
        while !self.is_at_end() {
            if self.eat_keyword("CONSTRAINT") {
                constraint_name = Some(self.parse_ident("constraint name")?);
            } else if self.eat_keyword("NOT") {
                self.expect_keyword("NULL")?;
                column.not_null = true;
            } else if self.eat_keyword("NULL") {
                column.not_null = false;
            } else if self.eat_keyword("PRIMARY") {
                self.expect_keyword("KEY")?;
                column.primary_key = true;
            } else if self.eat_keyword("UNIQUE") {
                column.unique = true;
            } else if self.eat_keyword("DEFAULT") {
                column.default_value = Some(self.parse_default_value()?);
            } else if self.eat_keyword("REFERENCES") {
                let (target, target_columns) = self.parse_reference()?;
                if target_columns.len() > 1 {
                    return Err(ParseError::ForeignKeyArity {
                        columns: 1,
                        targets: target_columns.len(),
                    });
                }
                let (on_delete, on_update) = self.parse_on_actions()?;
                column.foreign_key = Some(ParsedForeignKey {
                    table: target,
                    field: target_columns
                        .into_iter()
                        .next()
                        .unwrap_or_else(|| "id".to_string()),
                    on_delete,
                    on_update,
                    constraint_name: constraint_name.take(),
                    column_count: 1,
                });
            } else if self.eat_keyword("CHECK") {
                let check = self.parse_group_text("CHECK expression")?;
                self.warn_ignored(format!("CHECK ({}) on column {}", check, column.name));
            } else if self.eat_keyword("COLLATE") {
                let collation = self.parse_qualified_name("collation")?;
                debug!(column = %column.name, %collation, "ignoring collation");
            } else {
                // GENERATED ..., DEFERRABLE and anything unknown
                let start = self.pos;
                self.skip_unit()?;
                while !self.is_at_end() && !self.at_any_keyword(COLUMN_CONSTRAINT_KEYWORDS) {
                    self.skip_unit()?;
                }
                let clause = self.raw(start, self.pos);
                self.warn_ignored(format!("{} on column {}", clause, column.name));
            }
        }

        Ok(column)
    }

    /// Capture a default expression as opaque text.
    fn parse_default_value(&mut self) -> Result<String, ParseError> {
        if self.is_at_end() {
            return Err(self.expected("default expression"));
        }
        let start = self.pos;
        // The first unit is always part of the expression (`DEFAULT NULL`).
        self.skip_unit()?;
        while !self.is_at_end() && !self.at_any_keyword(COLUMN_CONSTRAINT_KEYWORDS) {
            self.skip_unit()?;
        }
        Ok(self.raw(start, self.pos))
    }

    fn parse_column_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect_token(Token::LParen, "'('")?;
        let mut cols = Vec::new();

        loop {
            cols.push(self.parse_ident("column name")?);
            match self.current() {
                Token::Comma => self.advance(),
                Token::RParen => {
                    self.advance();
                    break;
                }
                _ => return Err(self.expected("',' or ')'")),
            }
        }

        Ok(cols)
    }

    /// `table [(col, ...)]` after REFERENCES.
    fn parse_reference(&mut self) -> Result<(String, Vec<String>), ParseError> {
        let target = self.parse_qualified_name("referenced table")?;
        let columns = if *self.current() == Token::LParen {
            self.parse_column_list()?
        } else {
            Vec::new()
        };
        Ok((target, columns))
    }

    fn parse_on_actions(
        &mut self,
    ) -> Result<(Option<ReferentialAction>, Option<ReferentialAction>), ParseError> {
        let mut on_delete = None;
        let mut on_update = None;

        loop {
            if self.eat_keyword("ON") {
                if self.eat_keyword("DELETE") {
                    on_delete = Some(self.parse_action()?);
                } else if self.eat_keyword("UPDATE") {
                    on_update = Some(self.parse_action()?);
                } else {
                    return Err(self.expected("DELETE or UPDATE"));
                }
            } else if self.eat_keyword("MATCH") || self.eat_keyword("INITIALLY") {
                self.advance();
            } else if self.at_keyword("NOT")
                && Self::is_keyword(self.token_at(self.pos + 1), "DEFERRABLE")
            {
                self.advance();
                self.advance();
            } else if !self.eat_keyword("DEFERRABLE") {
                break;
            }
        }

        Ok((on_delete, on_update))
    }

    fn parse_action(&mut self) -> Result<ReferentialAction, ParseError> {
        let action = if self.eat_keyword("CASCADE") {
            ReferentialAction::Cascade
        } else if self.eat_keyword("RESTRICT") {
            ReferentialAction::Restrict
        } else if self.eat_keyword("SET") {
            if self.eat_keyword("NULL") {
                ReferentialAction::SetNull
            } else if self.eat_keyword("DEFAULT") {
                ReferentialAction::SetDefault
            } else {
                return Err(ParseError::InvalidAction(format!("SET {}", describe(self.current()))));
            }
        } else if self.eat_keyword("NO") {
            self.expect_keyword("ACTION")?;
            ReferentialAction::NoAction
        } else {
            return Err(ParseError::InvalidAction(describe(self.current())));
        };
        Ok(action)
    }

    /// Table-level constraint. `None` for constraints the model drops.
    fn parse_table_constraint(&mut self) -> Result<Option<TableConstraint>, ParseError> {
        let name = if self.eat_keyword("CONSTRAINT") {
            Some(self.parse_ident("constraint name")?)
        } else {
            None
        };

        if self.eat_keyword("PRIMARY") {
            self.expect_keyword("KEY")?;
            Ok(Some(TableConstraint::PrimaryKey(self.parse_column_list()?)))
        } else if self.eat_keyword("UNIQUE") {
            if self.eat_keyword("NULLS") {
                self.eat_keyword("NOT");
                self.expect_keyword("DISTINCT")?;
            }
            let columns = self.parse_column_list()?;
            Ok(Some(TableConstraint::Unique { name, columns }))
        } else if self.eat_keyword("FOREIGN") {
            self.expect_keyword("KEY")?;
            let columns = self.parse_column_list()?;
            self.expect_keyword("REFERENCES")?;
            let (target, target_columns) = self.parse_reference()?;
            let (on_delete, on_update) = self.parse_on_actions()?;
            Ok(Some(TableConstraint::ForeignKey {
                name,
                columns,
                target,
                target_columns,
                on_delete,
                on_update,
            }))
        } else if self.at_keyword("CHECK") || self.at_keyword("EXCLUDE") {
            let clause = self.raw(self.pos, self.limit);
            self.warn_ignored(clause);
            Ok(None)
        } else {
            Err(self.expected("PRIMARY KEY, UNIQUE, FOREIGN KEY or CHECK"))
        }
    }

    fn parse_create_index(&mut self, unique: bool) -> Result<ParsedIndex, ParseError> {
        self.advance(); // INDEX
        self.eat_keyword("CONCURRENTLY");
        if self.eat_keyword("IF") {
            self.expect_keyword("NOT")?;
            self.expect_keyword("EXISTS")?;
        }
        if self.at_keyword("ON") {
            return Err(ParseError::Unsupported("index without a name".to_string()));
        }
        let name = self.parse_qualified_name("index name")?;
        self.expect_keyword("ON")?;
        self.eat_keyword("ONLY");
        let table = self.parse_qualified_name("table name")?;

        let method = if self.eat_keyword("USING") {
            Some(self.parse_ident("index method")?)
        } else {
            None
        };

        if *self.current() != Token::LParen {
            return Err(self.expected("'(' before index columns"));
        }
        let close = self.find_group_end(self.pos)?;
        let mut columns = Vec::new();
        for (start, end) in self.split_top_level(self.pos + 1, close)? {
            let item = if end == start + 1 {
                self.ident_value(self.token_at(start))
            } else {
                None
            };
            let item = item.unwrap_or_else(|| self.raw(start, end));
            if item.is_empty() {
                return Err(ParseError::Expected {
                    expected: "index column",
                    found: describe(self.token_at(start)),
                });
            }
            columns.push(item);
        }
        self.pos = close + 1;

        let mut where_clause = None;
        while !self.is_at_end() {
            if self.eat_keyword("WHERE") {
                where_clause = Some(self.raw(self.pos, self.limit));
                break;
            }
            let start = self.pos;
            self.skip_unit()?;
            let clause = self.raw(start, self.pos);
            self.warn_ignored(format!("{} on index {}", clause, name));
        }

        Ok(ParsedIndex {
            name,
            table,
            columns,
            method,
            unique,
            where_clause,
            comment: None,
        })
    }

    fn parse_create_type(&mut self) -> Result<Statement, ParseError> {
        self.advance(); // TYPE
        let name = self.parse_qualified_name("type name")?;
        if !(self.eat_keyword("AS") && self.eat_keyword("ENUM")) {
            return Ok(Statement::Skipped(format!("CREATE TYPE {}", name)));
        }

        self.expect_token(Token::LParen, "'('")?;
        let mut values = Vec::new();
        while *self.current() != Token::RParen {
            match self.current().clone() {
                Token::Str(value) => {
                    values.push(value);
                    self.advance();
                }
                _ => return Err(self.expected("enum label")),
            }
            if *self.current() == Token::Comma {
                self.advance();
            }
        }
        self.advance();

        Ok(Statement::CreateEnum(ParsedEnumType { name, values }))
    }

    fn parse_create_function(&mut self) -> Result<ParsedFunction, ParseError> {
        self.advance(); // FUNCTION
        let name = self.parse_qualified_name("function name")?;

        if *self.current() != Token::LParen {
            return Err(self.expected("'(' after function name"));
        }
        let close = self.find_group_end(self.pos)?;
        let mut parameters = Vec::new();
        if close > self.pos + 1 {
            for (start, end) in self.split_top_level(self.pos + 1, close)? {
                parameters.push(self.with_range(start, end, |p| p.parse_parameter())?);
            }
        }
        self.pos = close + 1;

        self.expect_keyword("RETURNS")?;
        let start = self.pos;
        while !self.is_at_end() && !self.at_any_keyword(FUNCTION_OPTION_KEYWORDS) {
            self.skip_unit()?;
        }
        let return_type = self.raw(start, self.pos);
        if return_type.is_empty() {
            return Err(self.expected("return type"));
        }

        let mut body = None;
        let mut language = "plpgsql".to_string();
        let mut security_definer = false;

        while !self.is_at_end() {
            if self.eat_keyword("AS") {
                match self.current().clone() {
                    Token::Str(text) => {
                        body = Some(text);
                        self.advance();
                    }
                    _ => return Err(self.expected("function body")),
                }
            } else if self.eat_keyword("LANGUAGE") {
                language = match self.current().clone() {
                    Token::Ident(s) | Token::QuotedIdent(s) | Token::Str(s) => s.to_lowercase(),
                    _ => return Err(self.expected("language name")),
                };
                self.advance();
            } else if self.eat_keyword("SECURITY") {
                security_definer = self.eat_keyword("DEFINER");
                if !security_definer {
                    self.expect_keyword("INVOKER")?;
                }
            } else if self.at_keyword("BEGIN") || self.at_keyword("RETURN") {
                return Err(ParseError::Unsupported("SQL-standard function body".to_string()));
            } else {
                // Volatility, SET, COST and friends carry no model state.
                self.skip_unit()?;
                while !self.is_at_end() && !self.at_any_keyword(FUNCTION_OPTION_KEYWORDS) {
                    self.skip_unit()?;
                }
            }
        }

        let Some(body) = body else {
            return Err(self.expected("AS <function body>"));
        };

        Ok(ParsedFunction {
            name,
            parameters,
            return_type,
            body,
            language,
            security_definer,
        })
    }

    fn parse_parameter(&mut self) -> Result<ParsedParameter, ParseError> {
        if self.at_any_keyword(&["IN", "OUT", "INOUT", "VARIADIC"]) {
            self.advance();
        }
        let start = self.pos;
        let mut default_at = None;
        while !self.is_at_end() {
            if self.at_keyword("DEFAULT") || matches!(self.current(), Token::Op(op) if op == "=") {
                default_at = Some(self.pos);
                break;
            }
            self.skip_unit()?;
        }
        let decl_end = default_at.unwrap_or(self.pos);
        let default = default_at.map(|at| self.raw(at + 1, self.limit));

        let decl = self.raw(start, decl_end);
        if decl.is_empty() {
            return Err(self.expected("parameter type"));
        }

        // `name type` unless the whole declaration is itself a type.
        let named = decl_end > start + 1
            && DataType::from_keyword(&decl).is_none()
            && !matches!(
                self.token_at(start + 1),
                Token::LParen | Token::LBracket | Token::Dot
            );

        let (name, param_type) = match self.ident_value(self.token_at(start)) {
            Some(name) if named => (name, self.raw(start + 1, decl_end)),
            _ => (String::new(), decl),
        };

        Ok(ParsedParameter {
            name,
            param_type,
            default,
        })
    }

    fn parse_create_trigger(&mut self) -> Result<ParsedTrigger, ParseError> {
        self.advance(); // TRIGGER
        let name = self.parse_ident("trigger name")?;

        let timing = if self.eat_keyword("BEFORE") {
            TriggerTiming::Before
        } else if self.eat_keyword("AFTER") {
            TriggerTiming::After
        } else if self.eat_keyword("INSTEAD") {
            self.expect_keyword("OF")?;
            TriggerTiming::InsteadOf
        } else {
            return Err(self.expected("BEFORE, AFTER or INSTEAD OF"));
        };

        let event = match self.current() {
            Token::Ident(word) => TriggerEvent::from_str(word),
            _ => None,
        }
        .ok_or_else(|| self.expected("INSERT, UPDATE, DELETE or TRUNCATE"))?;
        self.advance();

        if self.eat_keyword("OF") {
            let start = self.pos;
            while !self.is_at_end() && !self.at_keyword("ON") && !self.at_keyword("OR") {
                self.advance();
            }
            let columns = self.raw(start, self.pos);
            self.warn_ignored(format!("UPDATE OF {} on trigger {}", columns, name));
        }
        if self.at_keyword("OR") {
            return Err(ParseError::Unsupported(format!(
                "trigger {} fires on more than one event",
                name
            )));
        }

        self.expect_keyword("ON")?;
        let table = self.parse_qualified_name("table name")?;

        let mut for_each_row = false;
        let mut when_condition = None;

        loop {
            if self.eat_keyword("FOR") {
                self.eat_keyword("EACH");
                if self.eat_keyword("ROW") {
                    for_each_row = true;
                } else {
                    self.expect_keyword("STATEMENT")?;
                }
            } else if self.eat_keyword("WHEN") {
                when_condition = Some(self.parse_group_text("'(' after WHEN")?);
            } else if self.eat_keyword("EXECUTE") {
                break;
            } else if self.is_at_end() {
                return Err(self.expected("EXECUTE FUNCTION"));
            } else {
                // FROM, DEFERRABLE, REFERENCING ...
                let start = self.pos;
                self.skip_unit()?;
                let clause = self.raw(start, self.pos);
                self.warn_ignored(format!("{} on trigger {}", clause, name));
            }
        }

        if !(self.eat_keyword("FUNCTION") || self.eat_keyword("PROCEDURE")) {
            return Err(self.expected("FUNCTION or PROCEDURE"));
        }
        let function_name = self.parse_qualified_name("function name")?;
        if *self.current() == Token::LParen {
            let args = self.parse_group_text("'('")?;
            if !args.is_empty() {
                self.warn_ignored(format!("trigger arguments ({}) on trigger {}", args, name));
            }
        }

        Ok(ParsedTrigger {
            name,
            table,
            timing,
            event,
            for_each_row,
            when_condition,
            function_name,
            enabled: true,
        })
    }

    fn parse_create_policy(&mut self) -> Result<ParsedPolicy, ParseError> {
        self.advance(); // POLICY
        let name = self.parse_ident("policy name")?;
        self.expect_keyword("ON")?;
        let table = self.parse_qualified_name("table name")?;

        let mut policy = ParsedPolicy {
            name,
            table,
            permissive: true,
            command: PolicyCommand::All,
            roles: Vec::new(),
            using_expression: None,
            with_check_expression: None,
        };

        while !self.is_at_end() {
            if self.eat_keyword("AS") {
                if self.eat_keyword("RESTRICTIVE") {
                    policy.permissive = false;
                } else {
                    self.expect_keyword("PERMISSIVE")?;
                }
            } else if self.eat_keyword("FOR") {
                policy.command = match self.current() {
                    Token::Ident(word) => PolicyCommand::from_str(word),
                    _ => None,
                }
                .ok_or_else(|| self.expected("ALL, SELECT, INSERT, UPDATE or DELETE"))?;
                self.advance();
            } else if self.eat_keyword("TO") {
                loop {
                    policy.roles.push(self.parse_ident("role name")?);
                    if *self.current() != Token::Comma {
                        break;
                    }
                    self.advance();
                }
            } else if self.eat_keyword("USING") {
                policy.using_expression = Some(self.parse_group_text("'(' after USING")?);
            } else if self.eat_keyword("WITH") {
                self.expect_keyword("CHECK")?;
                policy.with_check_expression =
                    Some(self.parse_group_text("'(' after WITH CHECK")?);
            } else {
                return Err(self.expected("AS, FOR, TO, USING or WITH CHECK"));
            }
        }

        Ok(policy)
    }

    fn parse_alter_table(&mut self) -> Result<Statement, ParseError> {
        self.advance(); // TABLE
        if self.eat_keyword("IF") {
            self.expect_keyword("EXISTS")?;
        }
        self.eat_keyword("ONLY");
        let table = self.parse_qualified_name("table name")?;

        let mut actions = Vec::new();
        for (start, end) in self.split_top_level(self.pos, self.limit)? {
            if let Some(action) = self.with_range(start, end, |p| p.parse_alter_action())? {
                actions.push(action);
            }
        }

        Ok(Statement::AlterTable { table, actions })
    }

    fn parse_alter_action(&mut self) -> Result<Option<AlterAction>, ParseError> {
        if self.eat_keyword("ADD") {
            if self.at_any_keyword(TABLE_CONSTRAINT_KEYWORDS) {
                return Ok(self.parse_table_constraint()?.map(AlterAction::AddConstraint));
            }
            self.eat_keyword("COLUMN");
            if self.eat_keyword("IF") {
                self.expect_keyword("NOT")?;
                self.expect_keyword("EXISTS")?;
            }
            return Ok(Some(AlterAction::AddColumn(self.parse_column_def()?)));
        }

        let enabled = if self.at_keyword("ENABLE") {
            true
        } else if self.at_keyword("DISABLE") {
            false
        } else {
            let clause = self.raw(self.pos, self.limit);
            self.warn_ignored(format!("ALTER TABLE {}", clause));
            return Ok(None);
        };
        self.advance();
        self.eat_keyword("ALWAYS");
        self.eat_keyword("REPLICA");

        if self.eat_keyword("TRIGGER") {
            let name = self.parse_ident("trigger name")?;
            return Ok(Some(AlterAction::SetTriggerEnabled(name, enabled)));
        }
        // Row level security is derived from the policies on export.
        debug!(statement = self.statement, "ignoring row level security toggle");
        Ok(None)
    }

    fn parse_comment(&mut self) -> Result<Statement, ParseError> {
        self.advance(); // COMMENT
        self.expect_keyword("ON")?;

        let kind = if self.eat_keyword("TABLE") {
            "TABLE"
        } else if self.eat_keyword("COLUMN") {
            "COLUMN"
        } else if self.eat_keyword("INDEX") {
            "INDEX"
        } else {
            return Ok(Statement::Skipped(format!("COMMENT ON {}", describe(self.current()))));
        };

        let mut parts = self.parse_name_parts("object name")?;
        self.expect_keyword("IS")?;
        let text = match self.current().clone() {
            Token::Str(s) => Some(s),
            Token::Ident(s) if s.eq_ignore_ascii_case("NULL") => None,
            _ => return Err(self.expected("comment string or NULL")),
        };
        self.advance();

        let last = parts.pop().unwrap_or_default();
        let target = match kind {
            "TABLE" => CommentTarget::Table(last),
            "INDEX" => CommentTarget::Index(last),
            _ => match parts.pop() {
                Some(table) => CommentTarget::Column(table, last),
                None => return Err(self.expected("table.column")),
            },
        };

        Ok(Statement::Comment { target, text })
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(s) | Token::Num(s) | Token::Op(s) | Token::Param(s) => s.clone(),
        Token::QuotedIdent(s) => format!("\"{}\"", s),
        Token::Str(s) => format!("'{}'", s),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::LBracket => "'['".to_string(),
        Token::RBracket => "']'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Semicolon => "';'".to_string(),
        Token::Dot => "'.'".to_string(),
        Token::Eof => "end of statement".to_string(),
    }
}
