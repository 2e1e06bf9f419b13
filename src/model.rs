//! Canonical schema model.
//!
//! This is the shape the persistence layer stores as JSON and the shape the
//! generator reads. Field names serialize in camelCase except where the
//! stored documents use snake_case (indexes, functions, triggers, policies).

use crate::vocabulary::{
    DataType, FunctionType, IndexType, PolicyCommand, ReferentialAction, TriggerEvent,
    TriggerTiming,
};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_language() -> String {
    "plpgsql".to_string()
}

fn default_role() -> String {
    "public".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    pub table: String,
    pub field: String,
    #[serde(default)]
    pub on_delete: ReferentialAction,
    #[serde(default)]
    pub on_update: ReferentialAction,
    /// Only set for multi-column constraints or names that differ from
    /// the `<table>_<column>_fkey` default. Fields sharing a name form one
    /// composite constraint.
    ///
    /// A single-column constraint that spells out the default name is read
    /// as `None`; both generate the same SQL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_name: Option<String>,
}

impl ForeignKey {
    pub fn new(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
            constraint_name: None,
        }
    }

    /// Name PostgreSQL gives an unnamed single-column constraint.
    pub fn default_name(table: &str, column: &str) -> String {
        format!("{}_{}_fkey", table, column)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseField {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// Raw parameter text, e.g. `255` or `10,2`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_params: Option<String>,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKey>,
}

impl DatabaseField {
    pub fn new(id: impl Into<String>, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data_type,
            type_params: None,
            nullable: true,
            primary_key: false,
            unique: false,
            default_value: None,
            comment: None,
            foreign_key: None,
        }
    }

    /// Mark as (part of) the primary key, keeping the PK invariant.
    pub fn into_primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self.unique = true;
        self
    }

    /// Type text as it appears in DDL, e.g. `VARCHAR(255)` or `TEXT[]`.
    pub fn type_sql(&self) -> String {
        let (inner, dims) = self.data_type.array_parts();
        let mut sql = inner.sql_keyword();
        if let Some(params) = &self.type_params {
            sql.push('(');
            sql.push_str(params);
            sql.push(')');
        }
        sql.push_str(&"[]".repeat(dims));
        sql
    }
}

/// Canvas placement. Carried through untouched; the core never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseTable {
    pub id: String,
    pub name: String,
    pub fields: Vec<DatabaseField>,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl DatabaseTable {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            fields: Vec::new(),
            position: Position::default(),
            width: None,
            height: None,
            comment: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&DatabaseField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_key_fields(&self) -> impl Iterator<Item = &DatabaseField> {
        self.fields.iter().filter(|f| f.primary_key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseIndex {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub table_name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub index_type: IndexType,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub is_partial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseFunction {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub function_type: FunctionType,
    #[serde(default)]
    pub parameters: Vec<FunctionParameter>,
    pub return_type: String,
    /// Opaque body text; never parsed.
    #[serde(default)]
    pub function_body: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub security_definer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_function_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_schedule: Option<String>,
    #[serde(default)]
    pub is_cron_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DatabaseFunction {
    /// Parameter types as used in `GRANT ... ON FUNCTION name(types)`.
    pub fn signature_types(&self) -> String {
        self.parameters
            .iter()
            .map(|p| p.param_type.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseTrigger {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub table_name: String,
    #[serde(default)]
    pub trigger_event: TriggerEvent,
    #[serde(default)]
    pub trigger_timing: TriggerTiming,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_id: Option<String>,
    pub function_name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub for_each_row: bool,
    /// `WHEN` condition without the surrounding parentheses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabasePolicy {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub table_name: String,
    #[serde(default)]
    pub command: PolicyCommand,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub using_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_check_expression: Option<String>,
    #[serde(default = "default_true")]
    pub is_permissive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseEnumType {
    pub name: String,
    pub values: Vec<String>,
}

/// A fully populated canonical model, as handed to the exporter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSchema {
    #[serde(default)]
    pub tables: Vec<DatabaseTable>,
    #[serde(default)]
    pub indexes: Vec<DatabaseIndex>,
    #[serde(default)]
    pub functions: Vec<DatabaseFunction>,
    #[serde(default)]
    pub triggers: Vec<DatabaseTrigger>,
    #[serde(default)]
    pub policies: Vec<DatabasePolicy>,
    #[serde(default)]
    pub enum_types: Vec<DatabaseEnumType>,
}

impl DatabaseSchema {
    pub fn table(&self, name: &str) -> Option<&DatabaseTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.indexes.is_empty()
            && self.functions.is_empty()
            && self.triggers.is_empty()
            && self.policies.is_empty()
            && self.enum_types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_sql() {
        let mut field = DatabaseField::new("f1", "price", DataType::Decimal);
        field.type_params = Some("10,2".into());
        assert_eq!(field.type_sql(), "DECIMAL(10,2)");

        let tags = DatabaseField::new(
            "f2",
            "tags",
            DataType::Array(Box::new(DataType::Varchar)),
        );
        assert_eq!(tags.type_sql(), "VARCHAR[]");
    }

    #[test]
    fn test_primary_key_invariant() {
        let field = DatabaseField::new("f1", "id", DataType::Uuid).into_primary_key();
        assert!(field.primary_key);
        assert!(field.unique);
        assert!(!field.nullable);
    }

    #[test]
    fn test_field_json_shape() {
        let json = r#"{
            "id": "f1",
            "name": "user_id",
            "type": "UUID",
            "nullable": false,
            "foreignKey": { "table": "users", "field": "id", "onDelete": "CASCADE" }
        }"#;
        let field: DatabaseField = serde_json::from_str(json).unwrap();
        assert_eq!(field.data_type, DataType::Uuid);
        assert!(!field.primary_key);
        let fk = field.foreign_key.unwrap();
        assert_eq!(fk.on_delete, ReferentialAction::Cascade);
        assert_eq!(fk.on_update, ReferentialAction::NoAction);
    }

    #[test]
    fn test_schema_defaults() {
        let schema: DatabaseSchema = serde_json::from_str(r#"{"tables": []}"#).unwrap();
        assert!(schema.is_empty());
    }
}
