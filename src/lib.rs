pub mod ast;
pub mod config;
pub mod convert;
pub mod events;
pub mod exporter;
pub mod generator;
pub mod model;
pub mod project;
pub mod sql;
pub mod validate;
pub mod vocabulary;

use wasm_bindgen::prelude::*;

use convert::convert_script;
use exporter::{export_database, ExportOptions};
use generator::{generate_all_tables_sql, GeneratorOptions};
use model::{DatabaseSchema, DatabaseTable};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sql::{parse_script, ParseOptions, StatementError};
use validate::{duplicate_names, Warning};

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// What [`sql_to_schema`] hands back to JavaScript.
#[derive(Debug, Serialize)]
pub struct SchemaImport {
    pub schema: DatabaseSchema,
    pub errors: Vec<StatementError>,
    pub warnings: Vec<Warning>,
}

fn from_json<T: DeserializeOwned>(json: &str) -> Result<T, String> {
    serde_json::from_str(json).map_err(|e| e.to_string())
}

fn options_from_json<T: DeserializeOwned + Default>(json: Option<String>) -> Result<T, String> {
    match json.as_deref().map(str::trim) {
        None | Some("") => Ok(T::default()),
        Some(json) => from_json(json),
    }
}

/// Parse SQL and return the canonical schema as JSON, with per-statement
/// errors and warnings alongside.
#[wasm_bindgen(js_name = "sqlToSchema")]
pub fn sql_to_schema(sql: &str, options: Option<String>) -> Result<String, String> {
    let options: ParseOptions = options_from_json(options)?;
    let script = parse_script(sql, &options);
    let conversion = convert_script(&script);

    let mut warnings = script.warnings;
    warnings.extend(conversion.warnings);

    let result = SchemaImport {
        schema: conversion.schema,
        errors: script.errors,
        warnings,
    };
    serde_json::to_string(&result).map_err(|e| e.to_string())
}

/// Generate `CREATE TABLE` statements from a JSON array of tables.
#[wasm_bindgen(js_name = "schemaToSql")]
pub fn schema_to_sql(tables: &str, options: Option<String>) -> Result<String, String> {
    let tables: Vec<DatabaseTable> = from_json(tables)?;
    let options: GeneratorOptions = options_from_json(options)?;
    generate_all_tables_sql(&tables, &options).map_err(|e| e.to_string())
}

/// Full export script for a JSON-encoded [`DatabaseSchema`].
#[wasm_bindgen(js_name = "exportDatabase")]
pub fn export_database_sql(schema: &str, options: Option<String>) -> Result<String, String> {
    let schema: DatabaseSchema = from_json(schema)?;
    let options: ExportOptions = options_from_json(options)?;
    export_database(&schema, options).map_err(|e| e.to_string())
}

/// Only the name matters for conflict detection, so parsed and canonical
/// tables are both accepted.
#[derive(Deserialize)]
struct NamedTable {
    name: String,
}

/// Table names appearing more than once in a JSON array of tables.
#[wasm_bindgen(js_name = "detectTableNameConflicts")]
pub fn detect_table_name_conflicts_js(tables: &str) -> Result<js_sys::Array, String> {
    let names = table_name_conflicts(tables)?;
    Ok(names.into_iter().map(JsValue::from).collect())
}

fn table_name_conflicts(tables: &str) -> Result<Vec<String>, String> {
    let tables: Vec<NamedTable> = from_json(tables)?;
    Ok(duplicate_names(tables.iter().map(|t| t.name.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_to_schema_json() {
        let json = sql_to_schema(
            "CREATE TABLE users (id UUID PRIMARY KEY, bio TEXT); CREATE TABLE (",
            None,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["schema"]["tables"][0]["name"], "users");
        assert_eq!(value["schema"]["tables"][0]["fields"][0]["primaryKey"], true);
        assert_eq!(value["errors"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_json_round_trip_through_generator() {
        let json = sql_to_schema("CREATE TABLE notes (id SERIAL PRIMARY KEY, body TEXT NOT NULL);", None)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let tables = value["schema"]["tables"].to_string();

        let sql = schema_to_sql(&tables, Some(r#"{"if_not_exists": false}"#.into())).unwrap();
        assert!(sql.starts_with("CREATE TABLE notes ("));
        assert!(sql.contains("body TEXT NOT NULL"));
    }

    #[test]
    fn test_bad_json_is_an_error_string() {
        assert!(schema_to_sql("not json", None).is_err());
        assert!(export_database_sql("{}", Some("42".into())).is_err());
    }

    #[test]
    fn test_conflicts_from_json() {
        let names = table_name_conflicts(
            r#"[{"name":"users","fields":[]},{"name":"users","columns":[]},{"name":"posts"}]"#,
        )
        .unwrap();
        assert_eq!(names, vec!["users"]);
    }
}
