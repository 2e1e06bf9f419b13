//! Full-database export script.
//!
//! Sections are always emitted in dependency order: extensions, types,
//! tables, indexes, functions, triggers, row level security, grants.

use crate::generator::{
    generate_all_tables_sql, generate_enum_type_sql, generate_function_sql, generate_index_sql,
    generate_policy_sql, generate_trigger_sql, quote_ident, GenerationError, GeneratorOptions,
};
use crate::model::DatabaseSchema;
use crate::vocabulary::{DataType, FunctionType};
use serde::{Deserialize, Serialize};
use tracing::info;

const EMAIL_DOMAIN_SQL: &str = "DO $$ BEGIN\n  \
CREATE DOMAIN email AS TEXT CHECK (VALUE ~* '^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\\.[A-Za-z]{2,}$');\n\
EXCEPTION\n  WHEN duplicate_object THEN NULL;\nEND $$;\n";

fn default_grant_roles() -> Vec<String> {
    vec![
        "anon".to_string(),
        "authenticated".to_string(),
        "service_role".to_string(),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub generator: GeneratorOptions,
    pub include_extensions: bool,
    pub include_rls: bool,
    pub include_grants: bool,
    pub grant_roles: Vec<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            generator: GeneratorOptions::default(),
            include_extensions: true,
            include_rls: true,
            include_grants: true,
            grant_roles: default_grant_roles(),
        }
    }
}

/// Composes the per-entity generators into one script.
///
/// Read-only with respect to the schema it is given.
pub struct SqlExporter<'a> {
    schema: &'a DatabaseSchema,
    options: ExportOptions,
}

impl<'a> SqlExporter<'a> {
    pub fn new(schema: &'a DatabaseSchema, options: ExportOptions) -> Self {
        Self { schema, options }
    }

    pub fn export(&self) -> Result<String, GenerationError> {
        let schema = self.schema;
        let mut sections = vec![self.header()];

        if self.options.include_extensions {
            sections.push(section("Extensions", self.extensions_sql()));
        }
        sections.push(section("Types", self.types_sql()));

        if !schema.tables.is_empty() {
            sections.push(section(
                "Tables",
                generate_all_tables_sql(&schema.tables, &self.options.generator)?,
            ));
        }

        let mut indexes = String::new();
        for index in &schema.indexes {
            indexes.push_str(&generate_index_sql(index, &self.options.generator)?);
        }
        sections.push(section("Indexes", indexes));

        let mut functions = Vec::new();
        for function in &schema.functions {
            functions.push(generate_function_sql(function, &self.options.generator)?);
        }
        sections.push(section("Functions", functions.join("\n")));

        let mut triggers = Vec::new();
        for trigger in &schema.triggers {
            triggers.push(generate_trigger_sql(trigger)?);
        }
        sections.push(section("Triggers", triggers.join("\n")));

        if self.options.include_rls {
            sections.push(section("Row Level Security", self.rls_sql()?));
        }
        if self.options.include_grants {
            sections.push(section("Grants", self.grants_sql()));
        }

        let script = sections
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        info!(
            tables = schema.tables.len(),
            indexes = schema.indexes.len(),
            functions = schema.functions.len(),
            triggers = schema.triggers.len(),
            policies = schema.policies.len(),
            bytes = script.len(),
            "exported database"
        );

        Ok(script)
    }

    fn header(&self) -> String {
        let schema = self.schema;
        format!(
            "-- Database export generated by schemaforge\n\
             -- {} tables, {} indexes, {} functions, {} triggers, {} policies\n",
            schema.tables.len(),
            schema.indexes.len(),
            schema.functions.len(),
            schema.triggers.len(),
            schema.policies.len()
        )
    }

    fn extensions_sql(&self) -> String {
        let mut output = String::from(
            "CREATE EXTENSION IF NOT EXISTS pgcrypto;\nCREATE EXTENSION IF NOT EXISTS \"uuid-ossp\";\n",
        );
        let functions = &self.schema.functions;
        if functions.iter().any(|f| f.function_type == FunctionType::Edge) {
            output.push_str("CREATE EXTENSION IF NOT EXISTS pg_net;\n");
        }
        if functions
            .iter()
            .any(|f| f.function_type == FunctionType::Cron && f.is_cron_enabled)
        {
            output.push_str("CREATE EXTENSION IF NOT EXISTS pg_cron;\n");
        }
        output
    }

    fn types_sql(&self) -> String {
        let mut output = String::new();

        let uses_email = self
            .schema
            .tables
            .iter()
            .flat_map(|t| &t.fields)
            .any(|f| matches!(f.data_type.array_parts().0, DataType::Email));
        if uses_email {
            output.push_str(EMAIL_DOMAIN_SQL);
        }

        for enum_type in &self.schema.enum_types {
            output.push_str(&generate_enum_type_sql(enum_type));
        }
        output
    }

    fn rls_sql(&self) -> Result<String, GenerationError> {
        let policies = &self.schema.policies;

        // Tables with policies, first-seen order.
        let mut tables: Vec<&str> = Vec::new();
        for policy in policies {
            if !tables.contains(&policy.table_name.as_str()) {
                tables.push(&policy.table_name);
            }
        }

        let mut output = String::new();
        for table in &tables {
            output.push_str(&format!(
                "ALTER TABLE {} ENABLE ROW LEVEL SECURITY;\n",
                quote_ident(table)
            ));
        }
        for policy in policies {
            output.push('\n');
            output.push_str(&generate_policy_sql(policy)?);
        }
        Ok(output)
    }

    fn grants_sql(&self) -> String {
        if self.options.grant_roles.is_empty() {
            return String::new();
        }
        let roles = self
            .options
            .grant_roles
            .iter()
            .map(|r| quote_ident(r))
            .collect::<Vec<_>>()
            .join(", ");

        let mut output = format!("GRANT USAGE ON SCHEMA public TO {};\n", roles);
        for table in &self.schema.tables {
            output.push_str(&format!(
                "GRANT ALL ON TABLE {} TO {};\n",
                quote_ident(&table.name),
                roles
            ));
        }
        for function in &self.schema.functions {
            output.push_str(&format!(
                "GRANT EXECUTE ON FUNCTION {}({}) TO {};\n",
                quote_ident(&function.name),
                function.signature_types(),
                roles
            ));
        }
        output
    }
}

fn section(title: &str, body: String) -> String {
    if body.trim().is_empty() {
        return String::new();
    }
    format!("-- {}\n{}", title, body)
}

/// Export with the given options.
pub fn export_database(
    schema: &DatabaseSchema,
    options: ExportOptions,
) -> Result<String, GenerationError> {
    SqlExporter::new(schema, options).export()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DatabaseField, DatabaseFunction, DatabaseIndex, DatabasePolicy, DatabaseTable,
        DatabaseTrigger,
    };
    use crate::vocabulary::{IndexType, PolicyCommand, TriggerEvent, TriggerTiming};

    fn sample_schema() -> DatabaseSchema {
        let mut profiles = DatabaseTable::new("t1", "profiles");
        profiles.fields = vec![
            DatabaseField::new("f1", "id", DataType::Uuid).into_primary_key(),
            DatabaseField::new("f2", "contact", DataType::Email),
        ];

        DatabaseSchema {
            tables: vec![profiles],
            indexes: vec![DatabaseIndex {
                id: "i1".into(),
                name: "profiles_contact_idx".into(),
                table_name: "profiles".into(),
                columns: vec!["contact".into()],
                index_type: IndexType::Hash,
                is_unique: false,
                is_partial: false,
                where_clause: None,
                description: None,
            }],
            functions: vec![DatabaseFunction {
                id: "fn1".into(),
                name: "welcome".into(),
                function_type: FunctionType::Edge,
                parameters: Vec::new(),
                return_type: "trigger".into(),
                function_body: String::new(),
                language: "plpgsql".into(),
                security_definer: false,
                edge_function_name: None,
                cron_schedule: None,
                is_cron_enabled: false,
                description: None,
            }],
            triggers: vec![DatabaseTrigger {
                id: "tr1".into(),
                name: "profiles_welcome".into(),
                table_name: "profiles".into(),
                trigger_event: TriggerEvent::Insert,
                trigger_timing: TriggerTiming::After,
                function_id: Some("fn1".into()),
                function_name: "welcome".into(),
                is_active: true,
                for_each_row: true,
                conditions: None,
            }],
            policies: vec![DatabasePolicy {
                id: "p1".into(),
                name: "read_own".into(),
                table_name: "profiles".into(),
                command: PolicyCommand::Select,
                role: "authenticated".into(),
                using_expression: Some("auth.uid() = id".into()),
                with_check_expression: None,
                is_permissive: true,
            }],
            enum_types: Vec::new(),
        }
    }

    #[test]
    fn test_section_order() {
        let sql = SqlExporter::new(&sample_schema(), ExportOptions::default())
            .export()
            .unwrap();

        let positions: Vec<usize> = [
            "CREATE EXTENSION IF NOT EXISTS pgcrypto",
            "CREATE DOMAIN email",
            "CREATE TABLE IF NOT EXISTS profiles",
            "CREATE INDEX IF NOT EXISTS profiles_contact_idx",
            "CREATE OR REPLACE FUNCTION welcome()",
            "CREATE TRIGGER profiles_welcome",
            "ALTER TABLE profiles ENABLE ROW LEVEL SECURITY",
            "CREATE POLICY read_own ON profiles",
            "GRANT USAGE ON SCHEMA public TO anon, authenticated, service_role",
        ]
        .iter()
        .map(|needle| sql.find(needle).unwrap_or_else(|| panic!("missing {}", needle)))
        .collect();

        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", sql);
        assert!(sql.contains("CREATE EXTENSION IF NOT EXISTS pg_net;"));
        assert!(!sql.contains("pg_cron"));
        assert!(sql.contains("GRANT EXECUTE ON FUNCTION welcome() TO anon, authenticated, service_role;"));
    }

    #[test]
    fn test_optional_sections() {
        let options = ExportOptions {
            include_extensions: false,
            include_rls: false,
            include_grants: false,
            ..ExportOptions::default()
        };
        let sql = export_database(&sample_schema(), options).unwrap();
        assert!(!sql.contains("CREATE EXTENSION"));
        assert!(!sql.contains("ROW LEVEL SECURITY"));
        assert!(!sql.contains("GRANT"));
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS profiles"));
    }

    #[test]
    fn test_empty_schema_export() {
        let sql = export_database(&DatabaseSchema::default(), ExportOptions::default()).unwrap();
        assert!(sql.starts_with("-- Database export generated by schemaforge\n"));
        assert!(sql.contains("GRANT USAGE ON SCHEMA public"));
        assert!(!sql.contains("CREATE TABLE"));
    }

    #[test]
    fn test_export_is_deterministic() {
        let schema = sample_schema();
        let first = export_database(&schema, ExportOptions::default()).unwrap();
        let second = export_database(&schema, ExportOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_export_propagates_invariant_errors() {
        let mut schema = sample_schema();
        schema.indexes[0].columns.clear();
        assert!(export_database(&schema, ExportOptions::default()).is_err());
    }
}
