//! Parsed statement structures, before conversion into the canonical model.
//!
//! Everything here mirrors the SQL text closely: types are normalized type
//! strings, referential actions are whatever the statement spelled out.

use crate::sql::StatementError;
use crate::validate::Warning;
use crate::vocabulary::{PolicyCommand, ReferentialAction, TriggerEvent, TriggerTiming};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedForeignKey {
    pub table: String,
    pub field: String,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
    pub constraint_name: Option<String>,
    /// Number of columns in the constraint this column belongs to.
    pub column_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedColumn {
    pub name: String,
    /// Normalized type text, e.g. `VARCHAR(255)`, `TEXT[]`, `citext`.
    pub data_type: String,
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub default_value: Option<String>,
    pub foreign_key: Option<ParsedForeignKey>,
    pub comment: Option<String>,
}

impl ParsedColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            not_null: false,
            primary_key: false,
            unique: false,
            default_value: None,
            foreign_key: None,
            comment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedUniqueConstraint {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedTable {
    pub name: String,
    pub columns: Vec<ParsedColumn>,
    /// Multi-column `UNIQUE (a, b)` constraints. Single-column ones are
    /// folded into [`ParsedColumn::unique`].
    pub unique_constraints: Vec<ParsedUniqueConstraint>,
    pub comment: Option<String>,
}

impl ParsedTable {
    pub fn column_mut(&mut self, name: &str) -> Option<&mut ParsedColumn> {
        self.columns.iter_mut().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedIndex {
    pub name: String,
    pub table: String,
    /// Column names, or raw expression text for expression items.
    pub columns: Vec<String>,
    pub method: Option<String>,
    pub unique: bool,
    pub where_clause: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedEnumType {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedParameter {
    pub name: String,
    pub param_type: String,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedFunction {
    pub name: String,
    pub parameters: Vec<ParsedParameter>,
    pub return_type: String,
    pub body: String,
    pub language: String,
    pub security_definer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedTrigger {
    pub name: String,
    pub table: String,
    pub timing: TriggerTiming,
    pub event: TriggerEvent,
    pub for_each_row: bool,
    pub when_condition: Option<String>,
    pub function_name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedPolicy {
    pub name: String,
    pub table: String,
    pub permissive: bool,
    pub command: PolicyCommand,
    pub roles: Vec<String>,
    pub using_expression: Option<String>,
    pub with_check_expression: Option<String>,
}

/// Result of [`crate::sql::parse_create_table_statements`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseOutcome {
    pub tables: Vec<ParsedTable>,
    pub errors: Vec<StatementError>,
    pub warnings: Vec<Warning>,
}

/// Everything recognized in a script, in statement order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedScript {
    pub tables: Vec<ParsedTable>,
    pub indexes: Vec<ParsedIndex>,
    pub enum_types: Vec<ParsedEnumType>,
    pub functions: Vec<ParsedFunction>,
    pub triggers: Vec<ParsedTrigger>,
    pub policies: Vec<ParsedPolicy>,
    pub errors: Vec<StatementError>,
    pub warnings: Vec<Warning>,
}

impl ParsedScript {
    pub fn has_entities(&self) -> bool {
        !(self.tables.is_empty()
            && self.indexes.is_empty()
            && self.enum_types.is_empty()
            && self.functions.is_empty()
            && self.triggers.is_empty()
            && self.policies.is_empty())
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut ParsedTable> {
        self.tables.iter_mut().find(|t| t.name == name)
    }
}

impl From<ParsedScript> for ParseOutcome {
    fn from(script: ParsedScript) -> Self {
        Self {
            tables: script.tables,
            errors: script.errors,
            warnings: script.warnings,
        }
    }
}
