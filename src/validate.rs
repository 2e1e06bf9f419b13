//! Conflict detection and model checks.
//!
//! Nothing here resolves a problem; it only reports. The import flow and
//! the UI decide what to do with the lists.

use crate::ast::ParsedTable;
use crate::model::{
    DatabaseField, DatabaseIndex, DatabasePolicy, DatabaseSchema, DatabaseTable, DatabaseTrigger,
};
use crate::vocabulary::{DataType, TriggerEvent, TriggerTiming};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Non-fatal findings. The affected entity is still imported or emitted.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    #[error("{table}.{field} references table {target}, which is not defined")]
    UnresolvedTable {
        table: String,
        field: String,
        target: String,
    },
    #[error("{table}.{field} references {target_table}.{target_field}, which is not defined")]
    UnresolvedField {
        table: String,
        field: String,
        target_table: String,
        target_field: String,
    },
    #[error("{table}.{field} has unrecognized type {type_name}; it is kept verbatim")]
    UnrecognizedType {
        table: String,
        field: String,
        type_name: String,
    },
    #[error("trigger {trigger} calls {function}, which is not defined in this script")]
    UnresolvedFunction { trigger: String, function: String },
    #[error("statement {statement}: ignored {clause}")]
    IgnoredClause { statement: usize, clause: String },
    #[error("statement {statement}: {target} does not exist")]
    OrphanStatement { statement: usize, target: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictError {
    #[error("Duplicate table name: {name}")]
    DuplicateTable { name: String },
    #[error("Duplicate column {column} in table {table}")]
    DuplicateColumn { table: String, column: String },
    #[error("Duplicate index name: {name}")]
    DuplicateIndex { name: String },
}

/// A canonical-model invariant that does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("{table}.{field}: primary key column must not be nullable")]
    NullablePrimaryKey { table: String, field: String },
    #[error("{table}.{field}: primary key column must be unique")]
    NonUniquePrimaryKey { table: String, field: String },
    #[error("{table}.{field}: foreign key has no target")]
    EmptyForeignKey { table: String, field: String },
    #[error("{table}: table has no fields")]
    NoFields { table: String },
    #[error("{table}.{field}: field is declared more than once")]
    DuplicateField { table: String, field: String },
    #[error("empty name for {0}")]
    EmptyName(&'static str),
    #[error("index {index}: no columns")]
    EmptyIndex { index: String },
    #[error("index {index}: partial index without a WHERE clause")]
    PartialWithoutPredicate { index: String },
    #[error("policy {policy}: USING is not allowed for {command} policies")]
    UsingNotAllowed { policy: String, command: String },
    #[error("policy {policy}: WITH CHECK is not allowed for {command} policies")]
    WithCheckNotAllowed { policy: String, command: String },
    #[error("trigger {trigger}: INSTEAD OF triggers must be FOR EACH ROW")]
    InsteadOfPerStatement { trigger: String },
    #[error("trigger {trigger}: TRUNCATE triggers must be FOR EACH STATEMENT")]
    TruncatePerRow { trigger: String },
}

/// Anything with a table name and ordered column names.
///
/// Lets the same checks run before conversion (on parsed tables) and after
/// (on the canonical model).
pub trait TableShape {
    fn table_name(&self) -> &str;
    fn column_names(&self) -> Vec<&str>;
}

impl TableShape for ParsedTable {
    fn table_name(&self) -> &str {
        &self.name
    }

    fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

impl TableShape for DatabaseTable {
    fn table_name(&self) -> &str {
        &self.name
    }

    fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Names that occur more than once, each listed once in first-seen order.
pub fn duplicate_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order = Vec::new();
    for name in names {
        let count = counts.entry(name).or_insert(0);
        if *count == 0 {
            order.push(name);
        }
        *count += 1;
    }
    order
        .into_iter()
        .filter(|name| counts.get(name).is_some_and(|c| *c > 1))
        .map(str::to_string)
        .collect()
}

/// Duplicate table names, compared case-sensitively.
pub fn detect_table_name_conflicts<T: TableShape>(tables: &[T]) -> Vec<String> {
    duplicate_names(tables.iter().map(|t| t.table_name()))
}

/// Duplicate column names within one table.
pub fn detect_duplicate_columns<T: TableShape>(table: &T) -> Vec<String> {
    duplicate_names(table.column_names())
}

pub fn detect_duplicate_index_names(indexes: &[DatabaseIndex]) -> Vec<String> {
    duplicate_names(indexes.iter().map(|i| i.name.as_str()))
}

/// Foreign keys in `tables` whose target is in neither `tables` nor `known`.
pub fn detect_unresolved_references(
    tables: &[DatabaseTable],
    known: &[DatabaseTable],
) -> Vec<Warning> {
    let mut warnings = Vec::new();

    for table in tables {
        for field in &table.fields {
            let Some(fk) = &field.foreign_key else {
                continue;
            };
            let target = tables
                .iter()
                .chain(known)
                .find(|t| t.name == fk.table);
            match target {
                None => warnings.push(Warning::UnresolvedTable {
                    table: table.name.clone(),
                    field: field.name.clone(),
                    target: fk.table.clone(),
                }),
                Some(target) if target.field(&fk.field).is_none() => {
                    warnings.push(Warning::UnresolvedField {
                        table: table.name.clone(),
                        field: field.name.clone(),
                        target_table: fk.table.clone(),
                        target_field: fk.field.clone(),
                    })
                }
                Some(_) => {}
            }
        }
    }

    warnings
}

/// Fields whose type is outside the vocabulary.
pub fn detect_unrecognized_types(tables: &[DatabaseTable]) -> Vec<Warning> {
    tables
        .iter()
        .flat_map(|table| {
            table.fields.iter().filter_map(move |field| {
                match field.data_type.array_parts().0 {
                    DataType::Other(name) => Some(Warning::UnrecognizedType {
                        table: table.name.clone(),
                        field: field.name.clone(),
                        type_name: name.clone(),
                    }),
                    _ => None,
                }
            })
        })
        .collect()
}

pub fn check_field_invariants(table: &str, field: &DatabaseField) -> Result<(), InvariantViolation> {
    if field.name.is_empty() {
        return Err(InvariantViolation::EmptyName("field"));
    }
    if field.primary_key && field.nullable {
        return Err(InvariantViolation::NullablePrimaryKey {
            table: table.to_string(),
            field: field.name.clone(),
        });
    }
    if field.primary_key && !field.unique {
        return Err(InvariantViolation::NonUniquePrimaryKey {
            table: table.to_string(),
            field: field.name.clone(),
        });
    }
    if let Some(fk) = &field.foreign_key {
        if fk.table.is_empty() || fk.field.is_empty() {
            return Err(InvariantViolation::EmptyForeignKey {
                table: table.to_string(),
                field: field.name.clone(),
            });
        }
    }
    Ok(())
}

pub fn check_table_invariants(table: &DatabaseTable) -> Result<(), InvariantViolation> {
    if table.name.is_empty() {
        return Err(InvariantViolation::EmptyName("table"));
    }
    if table.fields.is_empty() {
        return Err(InvariantViolation::NoFields {
            table: table.name.clone(),
        });
    }
    if let Some(field) = detect_duplicate_columns(table).into_iter().next() {
        return Err(InvariantViolation::DuplicateField {
            table: table.name.clone(),
            field,
        });
    }
    table
        .fields
        .iter()
        .try_for_each(|field| check_field_invariants(&table.name, field))
}

pub fn check_index_invariants(index: &DatabaseIndex) -> Result<(), InvariantViolation> {
    if index.name.is_empty() {
        return Err(InvariantViolation::EmptyName("index"));
    }
    if index.columns.is_empty() {
        return Err(InvariantViolation::EmptyIndex {
            index: index.name.clone(),
        });
    }
    let has_predicate = index
        .where_clause
        .as_deref()
        .is_some_and(|w| !w.trim().is_empty());
    if index.is_partial && !has_predicate {
        return Err(InvariantViolation::PartialWithoutPredicate {
            index: index.name.clone(),
        });
    }
    Ok(())
}

pub fn check_trigger_invariants(trigger: &DatabaseTrigger) -> Result<(), InvariantViolation> {
    if trigger.name.is_empty() {
        return Err(InvariantViolation::EmptyName("trigger"));
    }
    if trigger.trigger_timing == TriggerTiming::InsteadOf && !trigger.for_each_row {
        return Err(InvariantViolation::InsteadOfPerStatement {
            trigger: trigger.name.clone(),
        });
    }
    if trigger.trigger_event == TriggerEvent::Truncate && trigger.for_each_row {
        return Err(InvariantViolation::TruncatePerRow {
            trigger: trigger.name.clone(),
        });
    }
    Ok(())
}

pub fn check_policy_invariants(policy: &DatabasePolicy) -> Result<(), InvariantViolation> {
    if policy.name.is_empty() {
        return Err(InvariantViolation::EmptyName("policy"));
    }
    if policy.using_expression.is_some() && !policy.command.allows_using() {
        return Err(InvariantViolation::UsingNotAllowed {
            policy: policy.name.clone(),
            command: policy.command.as_str().to_string(),
        });
    }
    if policy.with_check_expression.is_some() && !policy.command.allows_with_check() {
        return Err(InvariantViolation::WithCheckNotAllowed {
            policy: policy.name.clone(),
            command: policy.command.as_str().to_string(),
        });
    }
    Ok(())
}

/// Everything [`validate_schema`] found.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub conflicts: Vec<ConflictError>,
    pub warnings: Vec<Warning>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty() && self.warnings.is_empty()
    }
}

/// Run every conflict and reference check over a whole schema.
pub fn validate_schema(schema: &DatabaseSchema) -> ValidationReport {
    let mut report = ValidationReport::default();

    report.conflicts.extend(
        detect_table_name_conflicts(&schema.tables)
            .into_iter()
            .map(|name| ConflictError::DuplicateTable { name }),
    );

    let mut seen = HashSet::new();
    for table in &schema.tables {
        // Same-named tables report their columns once.
        if !seen.insert(table.name.as_str()) {
            continue;
        }
        report
            .conflicts
            .extend(detect_duplicate_columns(table).into_iter().map(|column| {
                ConflictError::DuplicateColumn {
                    table: table.name.clone(),
                    column,
                }
            }));
    }

    report.conflicts.extend(
        detect_duplicate_index_names(&schema.indexes)
            .into_iter()
            .map(|name| ConflictError::DuplicateIndex { name }),
    );

    report
        .warnings
        .extend(detect_unresolved_references(&schema.tables, &[]));
    report
        .warnings
        .extend(detect_unrecognized_types(&schema.tables));

    report
}
