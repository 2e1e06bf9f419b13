//! Project-level import flow: parse, check, convert, merge.

use crate::convert::convert_script;
use crate::events::{SchemaEvent, SchemaEventBus};
use crate::exporter::{ExportOptions, SqlExporter};
use crate::generator::GenerationError;
use crate::model::{DatabaseIndex, DatabaseSchema, DatabaseTable};
use crate::sql::{parse_script, ParseOptions, StatementError};
use crate::validate::{
    detect_duplicate_columns, detect_duplicate_index_names, detect_table_name_conflicts,
    detect_unresolved_references, duplicate_names, ConflictError, Warning,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// What to do with incoming tables whose names already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Reject the whole import. Index name clashes are rejected too.
    #[default]
    Strict,
    /// Append anyway. The result may hold duplicates; see
    /// [`ImportReport::conflicts_after_merge`].
    Add,
    /// Replace existing tables of the same name.
    Overwrite,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    /// Tables appended to the project.
    pub imported: Vec<String>,
    /// Existing tables replaced in place.
    pub overwritten: Vec<String>,
    pub parse_errors: Vec<StatementError>,
    pub warnings: Vec<Warning>,
    /// Duplicate table names left in the project after an `Add` merge.
    pub conflicts_after_merge: Vec<String>,
    /// Duplicate index names left in the project after an `Add` merge.
    pub index_conflicts: Vec<ConflictError>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImportError {
    #[error("Table names already in use: {}", tables.join(", "))]
    Conflict { tables: Vec<String> },
    #[error("Index names already in use: {}", indexes.join(", "))]
    IndexConflict { indexes: Vec<String> },
    #[error("Table {table} declares duplicate columns: {}", columns.join(", "))]
    DuplicateColumns { table: String, columns: Vec<String> },
    #[error("Nothing to import ({} statement(s) failed to parse)", errors.len())]
    NothingToImport { errors: Vec<StatementError> },
}

/// Dry run of [`Project::import_sql`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportPreview {
    pub tables: Vec<String>,
    /// Names that repeat within the script or clash with the project.
    pub conflicts: Vec<String>,
    pub parse_errors: Vec<StatementError>,
    pub warnings: Vec<Warning>,
}

/// One project's schema plus the bus its changes are announced on.
#[derive(Debug, Clone)]
pub struct Project {
    id: String,
    schema: DatabaseSchema,
    events: SchemaEventBus,
    parse_options: ParseOptions,
}

impl Project {
    pub fn new(id: impl Into<String>, events: SchemaEventBus) -> Self {
        Self::with_schema(id, DatabaseSchema::default(), events)
    }

    pub fn with_schema(id: impl Into<String>, schema: DatabaseSchema, events: SchemaEventBus) -> Self {
        Self {
            id: id.into(),
            schema,
            events,
            parse_options: ParseOptions::default(),
        }
    }

    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.parse_options = options;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn schema(&self) -> &DatabaseSchema {
        &self.schema
    }

    /// Parse `sql` and report what an import would do, without changing
    /// anything.
    pub fn preview_import(&self, sql: &str) -> ImportPreview {
        let script = parse_script(sql, &self.parse_options);
        let conversion = convert_script(&script);

        let conflicts = duplicate_names(
            self.schema
                .tables
                .iter()
                .map(|t| t.name.as_str())
                .chain(script.tables.iter().map(|t| t.name.as_str())),
        );

        let mut warnings = script.warnings;
        warnings.extend(conversion.warnings);
        warnings.extend(detect_unresolved_references(
            &conversion.schema.tables,
            &self.schema.tables,
        ));

        ImportPreview {
            tables: script.tables.iter().map(|t| t.name.clone()).collect(),
            conflicts,
            parse_errors: script.errors,
            warnings,
        }
    }

    /// Import every statement in `sql` that parses.
    ///
    /// Statements that fail to parse are reported, not fatal. Duplicate
    /// names inside the script itself are always rejected; clashes with
    /// existing tables are handled according to `mode`.
    pub fn import_sql(&mut self, sql: &str, mode: ImportMode) -> Result<ImportReport, ImportError> {
        let script = parse_script(sql, &self.parse_options);
        if !script.has_entities() {
            return Err(ImportError::NothingToImport {
                errors: script.errors,
            });
        }

        let repeated = detect_table_name_conflicts(&script.tables);
        if !repeated.is_empty() {
            return Err(ImportError::Conflict { tables: repeated });
        }
        for table in &script.tables {
            let columns = detect_duplicate_columns(table);
            if !columns.is_empty() {
                return Err(ImportError::DuplicateColumns {
                    table: table.name.clone(),
                    columns,
                });
            }
        }

        let clashing: Vec<String> = script
            .tables
            .iter()
            .filter(|t| self.schema.table(&t.name).is_some())
            .map(|t| t.name.clone())
            .collect();
        if mode == ImportMode::Strict && !clashing.is_empty() {
            return Err(ImportError::Conflict { tables: clashing });
        }

        let conversion = convert_script(&script);
        let incoming = conversion.schema;

        // Composite UNIQUE constraints only become indexes during conversion.
        if mode == ImportMode::Strict {
            let taken: Vec<String> = incoming
                .indexes
                .iter()
                .filter(|i| self.schema.indexes.iter().any(|e| e.name == i.name))
                .map(|i| i.name.clone())
                .collect();
            if !taken.is_empty() {
                return Err(ImportError::IndexConflict { indexes: taken });
            }
        }

        let mut report = ImportReport {
            parse_errors: script.errors,
            ..ImportReport::default()
        };
        report.warnings.extend(script.warnings);
        report.warnings.extend(conversion.warnings);
        report
            .warnings
            .extend(detect_unresolved_references(&incoming.tables, &self.schema.tables));

        for table in incoming.tables {
            let existing = match mode {
                ImportMode::Overwrite => self.schema.tables.iter_mut().find(|t| t.name == table.name),
                ImportMode::Strict | ImportMode::Add => None,
            };
            match existing {
                Some(slot) => {
                    report.overwritten.push(table.name.clone());
                    *slot = table;
                }
                None => {
                    report.imported.push(table.name.clone());
                    self.schema.tables.push(table);
                }
            }
        }

        let merged = SchemaEvent::ObjectsImported {
            project_id: self.id.clone(),
            indexes: incoming.indexes.iter().map(|i| i.name.clone()).collect(),
            functions: incoming.functions.iter().map(|f| f.name.clone()).collect(),
            triggers: incoming.triggers.iter().map(|t| t.name.clone()).collect(),
            policies: incoming.policies.iter().map(|p| p.name.clone()).collect(),
            enum_types: incoming.enum_types.iter().map(|e| e.name.clone()).collect(),
        };
        let any_objects = !(incoming.indexes.is_empty()
            && incoming.functions.is_empty()
            && incoming.triggers.is_empty()
            && incoming.policies.is_empty()
            && incoming.enum_types.is_empty());

        let overwrite = mode == ImportMode::Overwrite;
        merge_by(&mut self.schema.indexes, incoming.indexes, overwrite, |a, b| a.name == b.name);
        merge_by(&mut self.schema.functions, incoming.functions, overwrite, |a, b| a.name == b.name);
        merge_by(&mut self.schema.triggers, incoming.triggers, overwrite, |a, b| {
            a.name == b.name && a.table_name == b.table_name
        });
        merge_by(&mut self.schema.policies, incoming.policies, overwrite, |a, b| {
            a.name == b.name && a.table_name == b.table_name
        });
        merge_by(&mut self.schema.enum_types, incoming.enum_types, overwrite, |a, b| a.name == b.name);

        report.conflicts_after_merge = detect_table_name_conflicts(&self.schema.tables);
        if !report.conflicts_after_merge.is_empty() {
            warn!(
                project_id = %self.id,
                tables = ?report.conflicts_after_merge,
                "project holds duplicate table names after merge"
            );
        }
        if mode == ImportMode::Add {
            report.index_conflicts = detect_duplicate_index_names(&self.schema.indexes)
                .into_iter()
                .map(|name| ConflictError::DuplicateIndex { name })
                .collect();
            if !report.index_conflicts.is_empty() {
                warn!(
                    project_id = %self.id,
                    indexes = report.index_conflicts.len(),
                    "project holds duplicate index names after merge"
                );
            }
        }

        info!(
            project_id = %self.id,
            imported = report.imported.len(),
            overwritten = report.overwritten.len(),
            parse_errors = report.parse_errors.len(),
            warnings = report.warnings.len(),
            "imported SQL"
        );

        if !report.imported.is_empty() {
            self.events.publish(SchemaEvent::TablesImported {
                project_id: self.id.clone(),
                tables: report.imported.clone(),
            });
        }
        if !report.overwritten.is_empty() {
            self.events.publish(SchemaEvent::TablesOverwritten {
                project_id: self.id.clone(),
                tables: report.overwritten.clone(),
            });
        }
        if any_objects {
            self.events.publish(merged);
        }

        Ok(report)
    }

    /// Add an index; names are unique per project.
    pub fn add_index(&mut self, mut index: DatabaseIndex) -> Result<(), ConflictError> {
        if self.schema.indexes.iter().any(|i| i.name == index.name) {
            return Err(ConflictError::DuplicateIndex { name: index.name });
        }
        if index.id.is_empty() {
            index.id = Uuid::new_v4().to_string();
        }
        let name = index.name.clone();
        self.schema.indexes.push(index);
        self.events.publish(SchemaEvent::IndexAdded {
            project_id: self.id.clone(),
            index: name,
        });
        Ok(())
    }

    pub fn remove_index(&mut self, name: &str) -> Option<DatabaseIndex> {
        let position = self.schema.indexes.iter().position(|i| i.name == name)?;
        let removed = self.schema.indexes.remove(position);
        self.events.publish(SchemaEvent::IndexRemoved {
            project_id: self.id.clone(),
            index: removed.name.clone(),
        });
        Some(removed)
    }

    pub fn table(&self, name: &str) -> Option<&DatabaseTable> {
        self.schema.table(name)
    }

    pub fn export_sql(&self, options: ExportOptions) -> Result<String, GenerationError> {
        SqlExporter::new(&self.schema, options).export()
    }
}

/// Append `incoming`, replacing matches in place when `overwrite` is set.
fn merge_by<T>(existing: &mut Vec<T>, incoming: Vec<T>, overwrite: bool, same: impl Fn(&T, &T) -> bool) {
    for item in incoming {
        let slot = if overwrite {
            existing.iter_mut().find(|e| same(e, &item))
        } else {
            None
        };
        match slot {
            Some(slot) => *slot = item,
            None => existing.push(item),
        }
    }
}
