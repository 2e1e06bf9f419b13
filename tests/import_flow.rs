use pretty_assertions::assert_eq;
use schemaforge::events::{SchemaEvent, SchemaEventBus};
use schemaforge::exporter::ExportOptions;
use schemaforge::project::{ImportError, ImportMode, Project};
use schemaforge::sql::ParseOptions;
use schemaforge::validate::Warning;

const USERS: &str = "CREATE TABLE users (id UUID PRIMARY KEY, email VARCHAR(255) UNIQUE NOT NULL);";
const POSTS: &str =
    "CREATE TABLE posts (id UUID PRIMARY KEY, user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE);";

#[test]
fn test_references_resolve_against_existing_tables() {
    let mut project = Project::new("shop", SchemaEventBus::default());
    project.import_sql(USERS, ImportMode::Strict).unwrap();

    let report = project.import_sql(POSTS, ImportMode::Strict).unwrap();
    assert_eq!(report.imported, vec!["posts"]);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);

    let sql = project.export_sql(ExportOptions::default()).unwrap();
    let users_at = sql.find("CREATE TABLE IF NOT EXISTS users").unwrap();
    let posts_at = sql.find("CREATE TABLE IF NOT EXISTS posts").unwrap();
    assert!(users_at < posts_at);
    assert!(!sql.contains("is not defined in this schema"));
}

#[test]
fn test_unknown_field_in_known_table_warns() {
    let mut project = Project::new("shop", SchemaEventBus::default());
    project.import_sql(USERS, ImportMode::Strict).unwrap();

    let report = project
        .import_sql(
            "CREATE TABLE carts (id INT, owner UUID REFERENCES users(uuid));",
            ImportMode::Strict,
        )
        .unwrap();
    assert_eq!(
        report.warnings,
        vec![Warning::UnresolvedField {
            table: "carts".into(),
            field: "owner".into(),
            target_table: "users".into(),
            target_field: "uuid".into(),
        }]
    );
}

#[test]
fn test_consumers_of_one_project_see_its_events_only() {
    let bus = SchemaEventBus::default();
    let mut shop = Project::new("shop", bus.clone());
    let mut blog = Project::new("blog", bus.clone());

    let mut shop_watcher = bus.subscribe("shop");
    let mut blog_watcher = bus.subscribe("blog");

    shop.import_sql(USERS, ImportMode::Strict).unwrap();
    blog.import_sql(POSTS, ImportMode::Strict).unwrap();
    shop.import_sql(USERS, ImportMode::Overwrite).unwrap();

    assert_eq!(
        shop_watcher.try_recv().unwrap(),
        SchemaEvent::TablesImported {
            project_id: "shop".into(),
            tables: vec!["users".into()],
        }
    );
    assert_eq!(
        shop_watcher.try_recv().unwrap(),
        SchemaEvent::TablesOverwritten {
            project_id: "shop".into(),
            tables: vec!["users".into()],
        }
    );
    assert!(shop_watcher.try_recv().is_err());

    assert_eq!(blog_watcher.try_recv().unwrap().project_id(), "blog");
    assert!(blog_watcher.try_recv().is_err());
}

#[test]
fn test_strict_failure_leaves_project_untouched() {
    let mut project = Project::new("shop", SchemaEventBus::default());
    project.import_sql(USERS, ImportMode::Strict).unwrap();
    let before = project.schema().clone();

    let err = project
        .import_sql(&format!("{}\n{}", POSTS, USERS), ImportMode::Strict)
        .unwrap_err();
    assert_eq!(
        err,
        ImportError::Conflict {
            tables: vec!["users".into()]
        }
    );
    assert_eq!(project.schema(), &before);
}

#[test]
fn test_folding_option_applies_to_imports() {
    let mut project = Project::new("shop", SchemaEventBus::default()).with_parse_options(ParseOptions {
        fold_unquoted_identifiers: true,
    });
    project
        .import_sql("CREATE TABLE Users (ID UUID PRIMARY KEY, \"Nick\" TEXT);", ImportMode::Strict)
        .unwrap();

    let users = project.table("users").unwrap();
    assert_eq!(users.fields[0].name, "id");
    assert_eq!(users.fields[1].name, "Nick");
}
