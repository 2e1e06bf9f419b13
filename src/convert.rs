//! Parsed structures to canonical model.

use crate::ast::{
    ParsedColumn, ParsedFunction, ParsedIndex, ParsedPolicy, ParsedScript, ParsedTable,
    ParsedTrigger,
};
use crate::model::{
    DatabaseEnumType, DatabaseField, DatabaseFunction, DatabaseIndex, DatabasePolicy,
    DatabaseSchema, DatabaseTable, DatabaseTrigger, ForeignKey, FunctionParameter,
};
use crate::sql::types::{map_type, split_type};
use crate::validate::{detect_unrecognized_types, Warning};
use crate::vocabulary::{FunctionType, IndexType};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Result of [`convert_script`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct Conversion {
    pub schema: DatabaseSchema,
    pub warnings: Vec<Warning>,
}

/// Map parsed tables onto the canonical model with fresh ids.
///
/// Pure: the input is not touched, and two calls give equal output apart
/// from the ids.
pub fn convert_parsed_tables_to_database(parsed: &[ParsedTable]) -> Vec<DatabaseTable> {
    convert_tables(parsed, &[])
}

/// Map a whole parsed script, resolving enum types and trigger functions
/// declared in the same script.
pub fn convert_script(script: &ParsedScript) -> Conversion {
    let enum_names: Vec<String> = script.enum_types.iter().map(|e| e.name.clone()).collect();

    let tables = convert_tables(&script.tables, &enum_names);

    let mut indexes: Vec<DatabaseIndex> = script.indexes.iter().map(convert_index).collect();
    for table in &script.tables {
        for constraint in &table.unique_constraints {
            let name = constraint.name.clone().unwrap_or_else(|| {
                format!("{}_{}_key", table.name, constraint.columns.join("_"))
            });
            indexes.push(DatabaseIndex {
                id: new_id(),
                name,
                table_name: table.name.clone(),
                columns: constraint.columns.clone(),
                index_type: IndexType::Btree,
                is_unique: true,
                is_partial: false,
                where_clause: None,
                description: None,
            });
        }
    }

    let functions: Vec<DatabaseFunction> = script.functions.iter().map(convert_function).collect();

    let mut warnings = detect_unrecognized_types(&tables);

    let triggers = script
        .triggers
        .iter()
        .map(|trigger| {
            let converted = convert_trigger(trigger, &functions);
            if converted.function_id.is_none() {
                warnings.push(Warning::UnresolvedFunction {
                    trigger: trigger.name.clone(),
                    function: trigger.function_name.clone(),
                });
            }
            converted
        })
        .collect();

    let schema = DatabaseSchema {
        tables,
        indexes,
        functions,
        triggers,
        policies: script.policies.iter().map(convert_policy).collect(),
        enum_types: script
            .enum_types
            .iter()
            .map(|e| DatabaseEnumType {
                name: e.name.clone(),
                values: e.values.clone(),
            })
            .collect(),
    };

    debug!(
        tables = schema.tables.len(),
        indexes = schema.indexes.len(),
        functions = schema.functions.len(),
        triggers = schema.triggers.len(),
        policies = schema.policies.len(),
        "converted script"
    );

    Conversion { schema, warnings }
}

fn convert_tables(parsed: &[ParsedTable], enum_names: &[String]) -> Vec<DatabaseTable> {
    parsed
        .iter()
        .map(|table| convert_table(table, enum_names))
        .collect()
}

fn convert_table(table: &ParsedTable, enum_names: &[String]) -> DatabaseTable {
    let mut converted = DatabaseTable::new(new_id(), table.name.clone());
    converted.comment = table.comment.clone();
    converted.fields = table
        .columns
        .iter()
        .map(|column| convert_column(&table.name, column, enum_names))
        .collect();
    converted
}

fn convert_column(table: &str, column: &ParsedColumn, enum_names: &[String]) -> DatabaseField {
    let spec = split_type(&column.data_type);

    let mut field = DatabaseField::new(new_id(), column.name.clone(), map_type(&spec, enum_names));
    field.type_params = spec.params;
    field.nullable = !(column.not_null || column.primary_key);
    field.unique = column.unique || column.primary_key;
    field.primary_key = column.primary_key;
    field.default_value = column.default_value.clone();
    field.comment = column.comment.clone();

    field.foreign_key = column.foreign_key.as_ref().map(|fk| {
        // Default names are implied; keep only names that carry information.
        let constraint_name = fk.constraint_name.clone().filter(|name| {
            fk.column_count > 1 || *name != ForeignKey::default_name(table, &column.name)
        });
        ForeignKey {
            table: fk.table.clone(),
            field: fk.field.clone(),
            on_delete: fk.on_delete.unwrap_or_default(),
            on_update: fk.on_update.unwrap_or_default(),
            constraint_name,
        }
    });

    field
}

fn convert_index(index: &ParsedIndex) -> DatabaseIndex {
    let index_type = match index.method.as_deref() {
        None => IndexType::default(),
        Some(method) => IndexType::from_str(method).unwrap_or_else(|| {
            warn!(index = %index.name, %method, "unknown index method, using btree");
            IndexType::default()
        }),
    };

    DatabaseIndex {
        id: new_id(),
        name: index.name.clone(),
        table_name: index.table.clone(),
        columns: index.columns.clone(),
        index_type,
        is_unique: index.unique,
        is_partial: index.where_clause.is_some(),
        where_clause: index.where_clause.clone(),
        description: index.comment.clone(),
    }
}

fn convert_function(function: &ParsedFunction) -> DatabaseFunction {
    DatabaseFunction {
        id: new_id(),
        name: function.name.clone(),
        function_type: FunctionType::Plpgsql,
        parameters: function
            .parameters
            .iter()
            .map(|p| FunctionParameter {
                name: p.name.clone(),
                param_type: p.param_type.clone(),
                default: p.default.clone(),
            })
            .collect(),
        return_type: function.return_type.clone(),
        function_body: function.body.trim().to_string(),
        language: function.language.clone(),
        security_definer: function.security_definer,
        edge_function_name: None,
        cron_schedule: None,
        is_cron_enabled: false,
        description: None,
    }
}

fn convert_trigger(trigger: &ParsedTrigger, functions: &[DatabaseFunction]) -> DatabaseTrigger {
    DatabaseTrigger {
        id: new_id(),
        name: trigger.name.clone(),
        table_name: trigger.table.clone(),
        trigger_event: trigger.event,
        trigger_timing: trigger.timing,
        function_id: functions
            .iter()
            .find(|f| f.name == trigger.function_name)
            .map(|f| f.id.clone()),
        function_name: trigger.function_name.clone(),
        is_active: trigger.enabled,
        for_each_row: trigger.for_each_row,
        conditions: trigger.when_condition.clone(),
    }
}

fn convert_policy(policy: &ParsedPolicy) -> DatabasePolicy {
    let role = if policy.roles.is_empty() {
        "public".to_string()
    } else {
        policy.roles.join(", ")
    };

    DatabasePolicy {
        id: new_id(),
        name: policy.name.clone(),
        table_name: policy.table.clone(),
        command: policy.command,
        role,
        using_expression: policy.using_expression.clone(),
        with_check_expression: policy.with_check_expression.clone(),
        is_permissive: policy.permissive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{parse_create_table_statements, parse_script, ParseOptions};
    use crate::vocabulary::{DataType, ReferentialAction};

    fn strip_ids(mut tables: Vec<DatabaseTable>) -> Vec<DatabaseTable> {
        for table in &mut tables {
            table.id.clear();
            for field in &mut table.fields {
                field.id.clear();
            }
        }
        tables
    }

    #[test]
    fn test_primary_key_normalization() {
        let outcome = parse_create_table_statements(
            "CREATE TABLE users (id UUID PRIMARY KEY DEFAULT gen_random_uuid());",
        );
        let tables = convert_parsed_tables_to_database(&outcome.tables);
        let id = &tables[0].fields[0];
        assert_eq!(id.data_type, DataType::Uuid);
        assert!(id.primary_key);
        assert!(!id.nullable);
        assert!(id.unique);
        assert_eq!(id.default_value.as_deref(), Some("gen_random_uuid()"));
    }

    #[test]
    fn test_conversion_is_pure() {
        let outcome = parse_create_table_statements(
            "CREATE TABLE t (a VARCHAR(20) NOT NULL, b DECIMAL(10, 2), c TEXT[]);",
        );
        let first = convert_parsed_tables_to_database(&outcome.tables);
        let second = convert_parsed_tables_to_database(&outcome.tables);
        assert_ne!(first[0].id, second[0].id);
        assert_eq!(strip_ids(first.clone()), strip_ids(second));

        let fields = &first[0].fields;
        assert_eq!(fields[0].data_type, DataType::Varchar);
        assert_eq!(fields[0].type_params.as_deref(), Some("20"));
        assert!(!fields[0].nullable);
        assert_eq!(fields[1].type_params.as_deref(), Some("10,2"));
        assert_eq!(fields[2].data_type, DataType::Array(Box::new(DataType::Text)));
    }

    #[test]
    fn test_field_ids_unique_within_table() {
        let outcome = parse_create_table_statements("CREATE TABLE t (a INT, b INT, c INT);");
        let tables = convert_parsed_tables_to_database(&outcome.tables);
        let ids: std::collections::HashSet<_> = tables[0].fields.iter().map(|f| &f.id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_foreign_key_names() {
        let outcome = parse_create_table_statements(
            "CREATE TABLE posts (\
               user_id UUID CONSTRAINT posts_user_id_fkey REFERENCES users(id), \
               topic_id UUID CONSTRAINT posts_topic_fk REFERENCES topics(id) ON DELETE NO ACTION);",
        );
        let tables = convert_parsed_tables_to_database(&outcome.tables);
        let user = tables[0].fields[0].foreign_key.as_ref().unwrap();
        assert_eq!(user.constraint_name, None);
        assert_eq!(user.on_delete, ReferentialAction::NoAction);

        let topic = tables[0].fields[1].foreign_key.as_ref().unwrap();
        assert_eq!(topic.constraint_name.as_deref(), Some("posts_topic_fk"));
        assert_eq!(topic.on_delete, ReferentialAction::NoAction);
    }

    #[test]
    fn test_convert_script() {
        let script = parse_script(
            "CREATE TYPE status AS ENUM ('draft', 'live');\n\
             CREATE TABLE posts (id INT PRIMARY KEY, state status, geo geometry, a INT, b INT, UNIQUE (a, b));\n\
             CREATE INDEX posts_geo_idx ON posts USING gist (geo);\n\
             CREATE FUNCTION stamp() RETURNS trigger LANGUAGE plpgsql AS $$ BEGIN RETURN NEW; END $$;\n\
             CREATE TRIGGER posts_stamp BEFORE INSERT ON posts FOR EACH ROW EXECUTE FUNCTION stamp();\n\
             CREATE TRIGGER posts_audit AFTER DELETE ON posts EXECUTE FUNCTION audit();\n\
             CREATE POLICY read_all ON posts FOR SELECT USING (true);",
            &ParseOptions::default(),
        );
        let conversion = convert_script(&script);
        let schema = &conversion.schema;

        let fields = &schema.tables[0].fields;
        assert_eq!(fields[1].data_type, DataType::Enum("status".into()));
        assert_eq!(fields[2].data_type, DataType::Other("geometry".into()));

        assert_eq!(schema.indexes.len(), 2);
        assert_eq!(schema.indexes[0].index_type, IndexType::Gist);
        assert_eq!(schema.indexes[1].name, "posts_a_b_key");
        assert!(schema.indexes[1].is_unique);

        assert_eq!(
            schema.triggers[0].function_id.as_deref(),
            Some(schema.functions[0].id.as_str())
        );
        assert!(!schema.triggers[1].for_each_row);
        assert_eq!(schema.policies[0].role, "public");

        assert_eq!(
            conversion.warnings,
            vec![
                Warning::UnrecognizedType {
                    table: "posts".into(),
                    field: "geo".into(),
                    type_name: "geometry".into(),
                },
                Warning::UnresolvedFunction {
                    trigger: "posts_audit".into(),
                    function: "audit".into(),
                },
            ]
        );
    }
}
