//! Generator for turning the canonical model back into PostgreSQL DDL.
//!
//! Output is deterministic: entities are emitted in input order and every
//! clause in a fixed position, so identical input gives byte-identical SQL.

use crate::model::{
    DatabaseEnumType, DatabaseField, DatabaseFunction, DatabaseIndex, DatabasePolicy,
    DatabaseTable, DatabaseTrigger, ForeignKey,
};
use crate::validate::{
    check_index_invariants, check_policy_invariants, check_table_invariants,
    check_trigger_invariants, InvariantViolation,
};
use crate::vocabulary::{is_reserved_word, DataType, FunctionType, ReferentialAction};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned by [`generate_all_tables_sql`] when there is nothing to emit.
pub const EMPTY_SCHEMA_PLACEHOLDER: &str =
    "-- No tables defined yet. Add a table to generate SQL.\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    /// Emit `COMMENT ON` statements for tables, columns and indexes.
    pub include_comments: bool,
    pub if_not_exists: bool,
    /// Project URL that edge-function wrappers post to.
    pub edge_function_base_url: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            include_comments: true,
            if_not_exists: true,
            edge_function_base_url: "https://your-project.supabase.co".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
    #[error("{table}: foreign key {constraint} mixes targets or actions across its columns")]
    InconsistentForeignKey { table: String, constraint: String },
    #[error("function {function}: cron is enabled but no schedule is set")]
    MissingCronSchedule { function: String },
}

/// Quote an identifier unless PostgreSQL would read it back unchanged.
pub fn quote_ident(name: &str) -> String {
    let mut chars = name.chars();
    let plain = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$')
        && !is_reserved_word(name);

    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Single-quoted SQL string literal.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn column_type_sql(field: &DatabaseField) -> String {
    match field.data_type.array_parts() {
        (DataType::Enum(name), dims) => format!("{}{}", quote_ident(name), "[]".repeat(dims)),
        (DataType::Other(name), dims) => {
            let mut sql = other_type_name_sql(name);
            if let Some(params) = &field.type_params {
                sql.push('(');
                sql.push_str(params);
                sql.push(')');
            }
            sql.push_str(&"[]".repeat(dims));
            sql
        }
        _ => field.type_sql(),
    }
}

/// Unrecognized type names keep their case across a reparse: a single name
/// is quoted part by part (`"Geo"`, `public."Geo"`), a multi-word name is
/// written as is when every word is plain and quoted whole otherwise.
fn other_type_name_sql(name: &str) -> String {
    if name.contains(' ') {
        let plain = name.split(' ').all(|word| quote_ident(word) == word);
        if plain {
            name.to_string()
        } else {
            format!("\"{}\"", name.replace('"', "\"\""))
        }
    } else {
        name.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
    }
}

/// Index items are column names or opaque expressions.
fn index_item_sql(item: &str) -> String {
    if item.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
        quote_ident(item)
    } else {
        item.to_string()
    }
}

fn ident_list(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `CREATE TABLE` for one table, followed by its comments.
///
/// `all_tables` is only used to annotate foreign keys whose target table is
/// not part of the schema; pass an empty slice to skip that check.
pub fn generate_table_sql(
    table: &DatabaseTable,
    all_tables: &[DatabaseTable],
    options: &GeneratorOptions,
) -> Result<String, GenerationError> {
    check_table_invariants(table)?;

    let table_name = quote_ident(&table.name);
    let mut lines: Vec<String> = table.fields.iter().map(column_sql).collect();

    // Primary key
    let pk: Vec<&str> = table
        .primary_key_fields()
        .map(|f| f.name.as_str())
        .collect();
    if !pk.is_empty() {
        lines.push(format!(
            "  CONSTRAINT {} PRIMARY KEY ({})",
            quote_ident(&format!("{}_pkey", table.name)),
            ident_list(&pk)
        ));
    }

    // Foreign keys, grouped by constraint
    for (name, fields) in foreign_key_groups(table) {
        let mut line = String::new();
        let fk = fields[0].1;

        let consistent = fields.iter().all(|(_, other)| {
            other.table == fk.table
                && other.on_delete == fk.on_delete
                && other.on_update == fk.on_update
        });
        if !consistent {
            return Err(GenerationError::InconsistentForeignKey {
                table: table.name.clone(),
                constraint: name,
            });
        }

        let missing = !all_tables.is_empty() && !all_tables.iter().any(|t| t.name == fk.table);
        if missing && options.include_comments {
            line.push_str(&format!(
                "  -- {} is not defined in this schema\n",
                fk.table
            ));
        }

        let columns: Vec<&str> = fields.iter().map(|(f, _)| f.name.as_str()).collect();
        let targets: Vec<&str> = fields.iter().map(|(_, fk)| fk.field.as_str()).collect();
        line.push_str(&format!(
            "  CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({})",
            quote_ident(&name),
            ident_list(&columns),
            quote_ident(&fk.table),
            ident_list(&targets)
        ));
        if fk.on_delete != ReferentialAction::NoAction {
            line.push_str(&format!(" ON DELETE {}", fk.on_delete));
        }
        if fk.on_update != ReferentialAction::NoAction {
            line.push_str(&format!(" ON UPDATE {}", fk.on_update));
        }
        lines.push(line);
    }

    let mut output = String::new();
    output.push_str("CREATE TABLE ");
    if options.if_not_exists {
        output.push_str("IF NOT EXISTS ");
    }
    output.push_str(&format!("{} (\n", table_name));
    output.push_str(&lines.join(",\n"));
    output.push_str("\n);\n");

    if options.include_comments {
        if let Some(comment) = &table.comment {
            output.push_str(&format!(
                "COMMENT ON TABLE {} IS {};\n",
                table_name,
                quote_literal(comment)
            ));
        }
        for field in &table.fields {
            if let Some(comment) = &field.comment {
                output.push_str(&format!(
                    "COMMENT ON COLUMN {}.{} IS {};\n",
                    table_name,
                    quote_ident(&field.name),
                    quote_literal(comment)
                ));
            }
        }
    }

    Ok(output)
}

/// Column line: name, type, then NOT NULL, DEFAULT, UNIQUE in that order.
fn column_sql(field: &DatabaseField) -> String {
    let mut line = format!("  {} {}", quote_ident(&field.name), column_type_sql(field));
    if !field.nullable {
        line.push_str(" NOT NULL");
    }
    if let Some(default) = &field.default_value {
        line.push_str(&format!(" DEFAULT {}", default));
    }
    // Primary key columns are unique through the key constraint.
    if field.unique && !field.primary_key {
        line.push_str(" UNIQUE");
    }
    line
}

/// Foreign keys grouped by constraint name, in first-column order.
fn foreign_key_groups(table: &DatabaseTable) -> Vec<(String, Vec<(&DatabaseField, &ForeignKey)>)> {
    let mut groups: Vec<(String, Vec<(&DatabaseField, &ForeignKey)>)> = Vec::new();

    for field in &table.fields {
        let Some(fk) = &field.foreign_key else {
            continue;
        };
        let name = fk
            .constraint_name
            .clone()
            .unwrap_or_else(|| ForeignKey::default_name(&table.name, &field.name));

        match groups.iter_mut().find(|(n, _)| *n == name) {
            Some((_, members)) => members.push((field, fk)),
            None => groups.push((name, vec![(field, fk)])),
        }
    }

    groups
}

/// All tables in input order. The caller owns dependency ordering.
pub fn generate_all_tables_sql(
    tables: &[DatabaseTable],
    options: &GeneratorOptions,
) -> Result<String, GenerationError> {
    if tables.is_empty() {
        return Ok(EMPTY_SCHEMA_PLACEHOLDER.to_string());
    }

    let mut parts = Vec::with_capacity(tables.len());
    for table in tables {
        parts.push(generate_table_sql(table, tables, options)?);
    }
    Ok(parts.join("\n"))
}

pub fn generate_index_sql(
    index: &DatabaseIndex,
    options: &GeneratorOptions,
) -> Result<String, GenerationError> {
    check_index_invariants(index)?;

    let mut output = String::from("CREATE ");
    if index.is_unique {
        output.push_str("UNIQUE ");
    }
    output.push_str("INDEX ");
    if options.if_not_exists {
        output.push_str("IF NOT EXISTS ");
    }

    let columns: Vec<String> = index.columns.iter().map(|c| index_item_sql(c)).collect();
    output.push_str(&format!(
        "{} ON {} USING {} ({})",
        quote_ident(&index.name),
        quote_ident(&index.table_name),
        index.index_type.method(),
        columns.join(", ")
    ));

    if let Some(predicate) = index.where_clause.as_deref().filter(|w| !w.trim().is_empty()) {
        output.push_str(&format!(" WHERE {}", predicate.trim()));
    }
    output.push_str(";\n");

    if options.include_comments {
        if let Some(description) = &index.description {
            output.push_str(&format!(
                "COMMENT ON INDEX {} IS {};\n",
                quote_ident(&index.name),
                quote_literal(description)
            ));
        }
    }

    Ok(output)
}

/// `CREATE TYPE ... AS ENUM`. Not idempotent: PostgreSQL has no
/// `IF NOT EXISTS` for types.
pub fn generate_enum_type_sql(enum_type: &DatabaseEnumType) -> String {
    let values: Vec<String> = enum_type.values.iter().map(|v| quote_literal(v)).collect();
    format!(
        "CREATE TYPE {} AS ENUM ({});\n",
        quote_ident(&enum_type.name),
        values.join(", ")
    )
}

/// Smallest dollar-quote tag that does not occur in `body`.
fn dollar_tag(body: &str) -> String {
    if !body.contains("$$") {
        return "$$".to_string();
    }
    let mut tag = "$fn$".to_string();
    let mut n = 1;
    while body.contains(&tag) {
        tag = format!("$fn{}$", n);
        n += 1;
    }
    tag
}

pub fn generate_function_sql(
    function: &DatabaseFunction,
    options: &GeneratorOptions,
) -> Result<String, GenerationError> {
    if function.name.is_empty() {
        return Err(InvariantViolation::EmptyName("function").into());
    }
    if function.function_type == FunctionType::Cron
        && function.is_cron_enabled
        && function.cron_schedule.as_deref().is_none_or(|s| s.trim().is_empty())
    {
        return Err(GenerationError::MissingCronSchedule {
            function: function.name.clone(),
        });
    }

    let (body, language) = match function.function_type {
        FunctionType::Edge => (edge_function_body(function, options), "plpgsql"),
        FunctionType::Plpgsql | FunctionType::Cron => {
            (function.function_body.trim().to_string(), function.language.as_str())
        }
    };

    let params: Vec<String> = function
        .parameters
        .iter()
        .map(|p| {
            let mut param = if p.name.is_empty() {
                p.param_type.clone()
            } else {
                format!("{} {}", p.name, p.param_type)
            };
            if let Some(default) = &p.default {
                param.push_str(&format!(" DEFAULT {}", default));
            }
            param
        })
        .collect();

    let tag = dollar_tag(&body);
    let mut output = format!(
        "CREATE OR REPLACE FUNCTION {}({})\nRETURNS {}\nLANGUAGE {}\n",
        quote_ident(&function.name),
        params.join(", "),
        function.return_type,
        language
    );
    if function.security_definer {
        output.push_str("SECURITY DEFINER\n");
    }
    output.push_str(&format!("AS {}\n{}\n{};\n", tag, body, tag));

    if function.function_type == FunctionType::Cron && function.is_cron_enabled {
        let schedule = function.cron_schedule.as_deref().unwrap_or_default().trim();
        output.push_str(&format!(
            "SELECT cron.schedule({}, {}, $$SELECT {}()$$);\n",
            quote_literal(&function.name),
            quote_literal(schedule),
            quote_ident(&function.name)
        ));
    }

    Ok(output)
}

/// plpgsql wrapper that forwards a call to an edge function over `pg_net`.
fn edge_function_body(function: &DatabaseFunction, options: &GeneratorOptions) -> String {
    let edge_name = function
        .edge_function_name
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or(&function.name);
    let url = format!(
        "{}/functions/v1/{}",
        options.edge_function_base_url.trim_end_matches('/'),
        edge_name
    );

    let return_type = function.return_type.trim().to_lowercase();
    let payload = if return_type == "trigger" {
        "jsonb_build_object('type', TG_OP, 'table', TG_TABLE_NAME, \
         'record', to_jsonb(NEW), 'old_record', to_jsonb(OLD))"
            .to_string()
    } else if function.parameters.iter().any(|p| !p.name.is_empty()) {
        let pairs: Vec<String> = function
            .parameters
            .iter()
            .filter(|p| !p.name.is_empty())
            .map(|p| format!("{}, {}", quote_literal(&p.name), p.name))
            .collect();
        format!("jsonb_build_object({})", pairs.join(", "))
    } else {
        "'{}'::jsonb".to_string()
    };
    let finish = match return_type.as_str() {
        "trigger" => "RETURN COALESCE(NEW, OLD);",
        "void" => "RETURN;",
        _ => "RETURN NULL;",
    };

    format!(
        "DECLARE\n  request_id bigint;\nBEGIN\n  SELECT net.http_post(\n    url := {},\n    \
         headers := '{{\"Content-Type\": \"application/json\"}}'::jsonb,\n    \
         body := {}\n  ) INTO request_id;\n  {}\nEND;",
        quote_literal(&url),
        payload,
        finish
    )
}

/// Drop-and-create pair, plus a `DISABLE TRIGGER` for inactive triggers.
pub fn generate_trigger_sql(trigger: &DatabaseTrigger) -> Result<String, GenerationError> {
    check_trigger_invariants(trigger)?;

    let name = quote_ident(&trigger.name);
    let table = quote_ident(&trigger.table_name);

    let mut output = format!("DROP TRIGGER IF EXISTS {} ON {};\n", name, table);
    output.push_str(&format!(
        "CREATE TRIGGER {}\n  {} {} ON {}\n  FOR EACH {}\n",
        name,
        trigger.trigger_timing.as_str(),
        trigger.trigger_event.as_str(),
        table,
        if trigger.for_each_row { "ROW" } else { "STATEMENT" }
    ));
    if let Some(condition) = trigger.conditions.as_deref().filter(|c| !c.trim().is_empty()) {
        output.push_str(&format!("  WHEN ({})\n", condition.trim()));
    }
    output.push_str(&format!(
        "  EXECUTE FUNCTION {}();\n",
        quote_ident(&trigger.function_name)
    ));

    if !trigger.is_active {
        output.push_str(&format!(
            "ALTER TABLE {} DISABLE TRIGGER {};\n",
            table, name
        ));
    }

    Ok(output)
}

/// Drop-and-create pair for one row level security policy.
pub fn generate_policy_sql(policy: &DatabasePolicy) -> Result<String, GenerationError> {
    check_policy_invariants(policy)?;

    let name = quote_ident(&policy.name);
    let table = quote_ident(&policy.table_name);
    let role = if policy.role.trim().is_empty() {
        "public"
    } else {
        policy.role.trim()
    };

    let mut output = format!("DROP POLICY IF EXISTS {} ON {};\n", name, table);
    output.push_str(&format!(
        "CREATE POLICY {} ON {}\n  AS {}\n  FOR {}\n  TO {}",
        name,
        table,
        if policy.is_permissive { "PERMISSIVE" } else { "RESTRICTIVE" },
        policy.command.as_str(),
        role
    ));
    if let Some(using) = &policy.using_expression {
        output.push_str(&format!("\n  USING ({})", using.trim()));
    }
    if let Some(check) = &policy.with_check_expression {
        output.push_str(&format!("\n  WITH CHECK ({})", check.trim()));
    }
    output.push_str(";\n");

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FunctionParameter;
    use crate::vocabulary::{IndexType, PolicyCommand, TriggerEvent, TriggerTiming};

    fn field(name: &str, data_type: DataType) -> DatabaseField {
        DatabaseField::new(format!("f-{}", name), name, data_type)
    }

    fn users() -> DatabaseTable {
        let mut table = DatabaseTable::new("t1", "users");
        let mut id = field("id", DataType::Uuid).into_primary_key();
        id.default_value = Some("gen_random_uuid()".into());
        let mut email = field("email", DataType::Varchar);
        email.type_params = Some("255".into());
        email.nullable = false;
        email.unique = true;
        table.fields = vec![id, email];
        table
    }

    fn posts(on_delete: ReferentialAction) -> DatabaseTable {
        let mut table = DatabaseTable::new("t2", "posts");
        let id = field("id", DataType::Uuid).into_primary_key();
        let mut user_id = field("user_id", DataType::Uuid);
        user_id.nullable = false;
        let mut fk = ForeignKey::new("users", "id");
        fk.on_delete = on_delete;
        user_id.foreign_key = Some(fk);
        table.fields = vec![id, user_id];
        table
    }

    #[test]
    fn test_generate_users_table() {
        let sql = generate_table_sql(&users(), &[], &GeneratorOptions::default()).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS users (\n  \
             id UUID NOT NULL DEFAULT gen_random_uuid(),\n  \
             email VARCHAR(255) NOT NULL UNIQUE,\n  \
             CONSTRAINT users_pkey PRIMARY KEY (id)\n);\n"
        );
    }

    #[test]
    fn test_on_delete_omitted_for_no_action() {
        let options = GeneratorOptions::default();
        let sql = generate_table_sql(&posts(ReferentialAction::NoAction), &[], &options).unwrap();
        assert!(sql.contains("CONSTRAINT posts_user_id_fkey FOREIGN KEY (user_id) REFERENCES users(id)\n"));
        assert!(!sql.contains("ON DELETE"));

        let sql = generate_table_sql(&posts(ReferentialAction::Cascade), &[], &options).unwrap();
        assert!(sql.contains(
            "CONSTRAINT posts_user_id_fkey FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE"
        ));
    }

    #[test]
    fn test_default_constraint_name_is_implied() {
        let options = GeneratorOptions::default();
        let implied = generate_table_sql(&posts(ReferentialAction::NoAction), &[], &options).unwrap();

        let mut named = posts(ReferentialAction::NoAction);
        if let Some(fk) = named.fields[1].foreign_key.as_mut() {
            fk.constraint_name = Some(ForeignKey::default_name("posts", "user_id"));
        }
        assert_eq!(generate_table_sql(&named, &[], &options).unwrap(), implied);
    }

    #[test]
    fn test_missing_target_is_annotated() {
        let tables = vec![posts(ReferentialAction::NoAction)];
        let sql = generate_all_tables_sql(&tables, &GeneratorOptions::default()).unwrap();
        assert!(sql.contains("-- users is not defined in this schema\n"));
    }

    #[test]
    fn test_empty_placeholder() {
        let sql = generate_all_tables_sql(&[], &GeneratorOptions::default()).unwrap();
        assert_eq!(sql, EMPTY_SCHEMA_PLACEHOLDER);
    }

    #[test]
    fn test_composite_keys() {
        let mut table = DatabaseTable::new("t", "line_items");
        let mut order_id = field("order_id", DataType::Int).into_primary_key();
        let mut product_id = field("product_id", DataType::Int).into_primary_key();
        for (f, target) in [(&mut order_id, "order_id"), (&mut product_id, "product_id")] {
            let mut fk = ForeignKey::new("order_products", target);
            fk.constraint_name = Some("line_items_op_fk".into());
            f.foreign_key = Some(fk);
        }
        table.fields = vec![order_id, product_id];

        let sql = generate_table_sql(&table, &[], &GeneratorOptions::default()).unwrap();
        assert!(sql.contains("CONSTRAINT line_items_pkey PRIMARY KEY (order_id, product_id)"));
        assert!(sql.contains(
            "CONSTRAINT line_items_op_fk FOREIGN KEY (order_id, product_id) \
             REFERENCES order_products(order_id, product_id)"
        ));
    }

    #[test]
    fn test_invariant_violation_refuses_to_emit() {
        let mut table = users();
        table.fields[0].nullable = true;
        let err = generate_table_sql(&table, &[], &GeneratorOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Invariant(InvariantViolation::NullablePrimaryKey { .. })
        ));
    }

    #[test]
    fn test_duplicate_field_refuses_to_emit() {
        let mut table = DatabaseTable::new("t", "dupes");
        table.fields = vec![field("a", DataType::Int), field("a", DataType::Text)];
        let err = generate_table_sql(&table, &[], &GeneratorOptions::default()).unwrap_err();
        assert_eq!(
            err,
            GenerationError::Invariant(InvariantViolation::DuplicateField {
                table: "dupes".into(),
                field: "a".into(),
            })
        );
    }

    #[test]
    fn test_unrecognized_type_names() {
        let mut table = DatabaseTable::new("t", "places");
        let mut geo = field("geo", DataType::Other("MyGeo".into()));
        geo.type_params = Some("4326".into());
        table.fields = vec![
            field("shape", DataType::Other("public.Shape".into())),
            geo,
            field("tags", DataType::Array(Box::new(DataType::Other("citext".into())))),
        ];

        let sql = generate_table_sql(&table, &[], &GeneratorOptions::default()).unwrap();
        assert!(sql.contains("  shape public.\"Shape\",\n"));
        assert!(sql.contains("  geo \"MyGeo\"(4326),\n"));
        assert!(sql.contains("  tags citext[]\n"));
    }

    #[test]
    fn test_comments_and_quoting() {
        let mut table = DatabaseTable::new("t", "UserProfiles");
        table.comment = Some("Who's who".into());
        let mut name = field("user", DataType::Text);
        name.comment = Some("display name".into());
        table.fields = vec![name];

        let sql = generate_table_sql(&table, &[], &GeneratorOptions::default()).unwrap();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"UserProfiles\" (\n  \"user\" TEXT\n);\n"));
        assert!(sql.contains("COMMENT ON TABLE \"UserProfiles\" IS 'Who''s who';\n"));
        assert!(sql.contains("COMMENT ON COLUMN \"UserProfiles\".\"user\" IS 'display name';\n"));

        let options = GeneratorOptions {
            include_comments: false,
            ..GeneratorOptions::default()
        };
        assert!(!generate_table_sql(&table, &[], &options).unwrap().contains("COMMENT"));
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "users");
        assert_eq!(quote_ident("user_2"), "user_2");
        assert_eq!(quote_ident("Users"), "\"Users\"");
        assert_eq!(quote_ident("order"), "\"order\"");
        assert_eq!(quote_ident("exclude"), "\"exclude\"");
        assert_eq!(quote_ident("like"), "\"like\"");
        assert_eq!(quote_ident("2fa"), "\"2fa\"");
        assert_eq!(quote_ident("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_generate_index() {
        let index = DatabaseIndex {
            id: "i1".into(),
            name: "posts_recent_idx".into(),
            table_name: "posts".into(),
            columns: vec!["author_id".into(), "created_at DESC".into()],
            index_type: IndexType::Btree,
            is_unique: false,
            is_partial: true,
            where_clause: Some("published = true".into()),
            description: None,
        };
        let sql = generate_index_sql(&index, &GeneratorOptions::default()).unwrap();
        assert_eq!(
            sql,
            "CREATE INDEX IF NOT EXISTS posts_recent_idx ON posts USING btree \
             (author_id, created_at DESC) WHERE published = true;\n"
        );

        let broken = DatabaseIndex {
            where_clause: None,
            ..index
        };
        assert!(generate_index_sql(&broken, &GeneratorOptions::default()).is_err());
    }

    fn function(function_type: FunctionType) -> DatabaseFunction {
        DatabaseFunction {
            id: "fn1".into(),
            name: "notify_signup".into(),
            function_type,
            parameters: Vec::new(),
            return_type: "trigger".into(),
            function_body: "BEGIN\n  RETURN NEW;\nEND;".into(),
            language: "plpgsql".into(),
            security_definer: true,
            edge_function_name: Some("send-welcome".into()),
            cron_schedule: None,
            is_cron_enabled: false,
            description: None,
        }
    }

    #[test]
    fn test_generate_function() {
        let sql = generate_function_sql(&function(FunctionType::Plpgsql), &GeneratorOptions::default())
            .unwrap();
        assert_eq!(
            sql,
            "CREATE OR REPLACE FUNCTION notify_signup()\nRETURNS trigger\nLANGUAGE plpgsql\n\
             SECURITY DEFINER\nAS $$\nBEGIN\n  RETURN NEW;\nEND;\n$$;\n"
        );
    }

    #[test]
    fn test_function_body_with_dollar_quotes() {
        let mut func = function(FunctionType::Plpgsql);
        func.function_body = "BEGIN EXECUTE $$SELECT 1$$; END;".into();
        func.parameters.push(FunctionParameter {
            name: "p_limit".into(),
            param_type: "integer".into(),
            default: Some("10".into()),
        });
        let sql = generate_function_sql(&func, &GeneratorOptions::default()).unwrap();
        assert!(sql.starts_with("CREATE OR REPLACE FUNCTION notify_signup(p_limit integer DEFAULT 10)"));
        assert!(sql.contains("AS $fn$\nBEGIN EXECUTE $$SELECT 1$$; END;\n$fn$;\n"));
    }

    #[test]
    fn test_edge_function_wrapper() {
        let options = GeneratorOptions {
            edge_function_base_url: "https://abc.supabase.co/".into(),
            ..GeneratorOptions::default()
        };
        let sql = generate_function_sql(&function(FunctionType::Edge), &options).unwrap();
        assert!(sql.contains("url := 'https://abc.supabase.co/functions/v1/send-welcome'"));
        assert!(sql.contains("jsonb_build_object('type', TG_OP"));
        assert!(sql.contains("RETURN COALESCE(NEW, OLD);"));
        assert!(sql.contains("LANGUAGE plpgsql"));
    }

    #[test]
    fn test_cron_function() {
        let mut func = function(FunctionType::Cron);
        func.return_type = "void".into();
        func.is_cron_enabled = true;
        assert_eq!(
            generate_function_sql(&func, &GeneratorOptions::default()),
            Err(GenerationError::MissingCronSchedule {
                function: "notify_signup".into()
            })
        );

        func.cron_schedule = Some("0 * * * *".into());
        let sql = generate_function_sql(&func, &GeneratorOptions::default()).unwrap();
        assert!(sql.ends_with(
            "SELECT cron.schedule('notify_signup', '0 * * * *', $$SELECT notify_signup()$$);\n"
        ));
    }

    #[test]
    fn test_generate_trigger() {
        let trigger = DatabaseTrigger {
            id: "tr1".into(),
            name: "posts_touch".into(),
            table_name: "posts".into(),
            trigger_event: TriggerEvent::Update,
            trigger_timing: TriggerTiming::Before,
            function_id: None,
            function_name: "touch".into(),
            is_active: false,
            for_each_row: true,
            conditions: Some("OLD.* IS DISTINCT FROM NEW.*".into()),
        };
        let sql = generate_trigger_sql(&trigger).unwrap();
        assert_eq!(
            sql,
            "DROP TRIGGER IF EXISTS posts_touch ON posts;\n\
             CREATE TRIGGER posts_touch\n  BEFORE UPDATE ON posts\n  FOR EACH ROW\n  \
             WHEN (OLD.* IS DISTINCT FROM NEW.*)\n  EXECUTE FUNCTION touch();\n\
             ALTER TABLE posts DISABLE TRIGGER posts_touch;\n"
        );

        let truncate = DatabaseTrigger {
            trigger_event: TriggerEvent::Truncate,
            ..trigger
        };
        assert!(generate_trigger_sql(&truncate).is_err());
    }

    #[test]
    fn test_generate_policy() {
        let policy = DatabasePolicy {
            id: "p1".into(),
            name: "Owners can edit".into(),
            table_name: "posts".into(),
            command: PolicyCommand::Update,
            role: "authenticated".into(),
            using_expression: Some("auth.uid() = author".into()),
            with_check_expression: Some("auth.uid() = author".into()),
            is_permissive: true,
        };
        let sql = generate_policy_sql(&policy).unwrap();
        assert_eq!(
            sql,
            "DROP POLICY IF EXISTS \"Owners can edit\" ON posts;\n\
             CREATE POLICY \"Owners can edit\" ON posts\n  AS PERMISSIVE\n  FOR UPDATE\n  \
             TO authenticated\n  USING (auth.uid() = author)\n  WITH CHECK (auth.uid() = author);\n"
        );
    }

    #[test]
    fn test_generate_enum_type() {
        let ty = DatabaseEnumType {
            name: "mood".into(),
            values: vec!["happy".into(), "it's fine".into()],
        };
        assert_eq!(
            generate_enum_type_sql(&ty),
            "CREATE TYPE mood AS ENUM ('happy', 'it''s fine');\n"
        );
    }
}
