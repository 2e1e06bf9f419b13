use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use schemaforge::SchemaImport;
use schemaforge::config::Config;
use schemaforge::convert::convert_script;
use schemaforge::exporter::export_database;
use schemaforge::generator::generate_all_tables_sql;
use schemaforge::model::DatabaseSchema;
use schemaforge::sql::parse_script;
use schemaforge::validate::{Warning, validate_schema};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse SQL and print the canonical schema as JSON
    Parse {
        /// SQL file; reads stdin if not set
        input: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
    /// Report parse errors, name conflicts, unresolved references and
    /// invariant violations. Exits with status 1 if anything is wrong.
    Check {
        /// SQL file; reads stdin if not set
        input: Option<PathBuf>,
    },
    /// Regenerate canonical CREATE TABLE statements from SQL
    Generate {
        /// SQL file; reads stdin if not set
        input: Option<PathBuf>,
        /// Path to write the SQL. Prints to stdout if not set.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Produce the full database script from SQL or a JSON schema
    Export {
        /// `.json` schema or SQL file; reads SQL from stdin if not set
        input: Option<PathBuf>,
        /// Path to write the SQL. Prints to stdout if not set.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        process::exit(2);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    init_logging(&config)?;

    match cli.command {
        Commands::Parse { input, pretty } => {
            let sql = read_input(input.as_deref())?;
            let script = parse_script(&sql, &config.parse);
            let conversion = convert_script(&script);

            let mut warnings = script.warnings;
            warnings.extend(conversion.warnings);
            let result = SchemaImport {
                schema: conversion.schema,
                errors: script.errors,
                warnings,
            };
            let json = if pretty {
                serde_json::to_string_pretty(&result)?
            } else {
                serde_json::to_string(&result)?
            };
            println!("{}", json);
        }
        Commands::Check { input } => {
            let sql = read_input(input.as_deref())?;
            if !check(&sql, &config) {
                process::exit(1);
            }
        }
        Commands::Generate { input, out } => {
            let sql = read_input(input.as_deref())?;
            let script = parse_script(&sql, &config.parse);
            for error in &script.errors {
                eprintln!("skipped {}", error);
            }
            let schema = convert_script(&script).schema;
            let output = generate_all_tables_sql(&schema.tables, &config.export.generator)?;
            write_output(out.as_deref(), &output)?;
        }
        Commands::Export { input, out } => {
            let schema = load_schema(input.as_deref(), &config)?;
            let output = export_database(&schema, config.export.clone())?;
            write_output(out.as_deref(), &output)?;
        }
    }

    Ok(())
}

fn init_logging(config: &Config) -> Result<()> {
    let level = config.max_level()?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(())
}

/// Print every problem found; true when there were none.
fn check(sql: &str, config: &Config) -> bool {
    let script = parse_script(sql, &config.parse);
    let mut clean = true;

    for error in &script.errors {
        println!("error: {}", error);
        clean = false;
    }
    for warning in &script.warnings {
        println!("warning: {}", warning);
    }

    let conversion = convert_script(&script);
    // Type and reference warnings are recomputed by validate_schema below.
    for warning in &conversion.warnings {
        if matches!(warning, Warning::UnresolvedFunction { .. }) {
            println!("warning: {}", warning);
        }
    }

    let schema = conversion.schema;
    let report = validate_schema(&schema);
    for conflict in &report.conflicts {
        println!("conflict: {}", conflict);
        clean = false;
    }
    for warning in &report.warnings {
        println!("warning: {}", warning);
    }

    if let Err(e) = export_database(&schema, config.export.clone()) {
        println!("error: {}", e);
        clean = false;
    }

    if clean {
        println!(
            "ok: {} tables, {} indexes, {} functions, {} triggers, {} policies",
            schema.tables.len(),
            schema.indexes.len(),
            schema.functions.len(),
            schema.triggers.len(),
            schema.policies.len()
        );
    }
    clean
}

fn load_schema(input: Option<&Path>, config: &Config) -> Result<DatabaseSchema> {
    let is_json = input.is_some_and(|p| p.extension().is_some_and(|e| e == "json"));
    let content = read_input(input)?;
    if is_json {
        return serde_json::from_str(&content).context("parsing JSON schema");
    }

    let script = parse_script(&content, &config.parse);
    if !script.errors.is_empty() {
        for error in &script.errors {
            eprintln!("{}", error);
        }
        bail!("{} statement(s) failed to parse", script.errors.len());
    }
    Ok(convert_script(&script).schema)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            Ok(buffer)
        }
    }
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
        }
        None => {
            print!("{}", content);
            Ok(())
        }
    }
}
