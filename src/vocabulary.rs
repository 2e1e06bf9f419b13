//! Closed vocabulary of column types and constraint keywords.
//!
//! Both directions of the round trip (parsing and generation) recognize
//! exactly the members listed here. Types outside the set are carried as
//! [`DataType::Other`] so they survive a round trip unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Recognized column data types.
///
/// `INT`/`INTEGER` and `BOOL`/`BOOLEAN` are distinct members:
/// the keyword the user chose is the keyword that gets generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    Uuid,
    Text,
    Varchar,
    Char,
    Integer,
    Int,
    Bigint,
    Smallint,
    Serial,
    Bigserial,
    Smallserial,
    Boolean,
    Bool,
    Timestamp,
    Timestamptz,
    Date,
    Time,
    Timetz,
    Interval,
    Json,
    Jsonb,
    Decimal,
    Numeric,
    Real,
    DoublePrecision,
    Float,
    Bytea,
    Email,
    Array(Box<DataType>),
    /// User-defined enum type declared with `CREATE TYPE ... AS ENUM`.
    Enum(String),
    /// Anything not in the vocabulary, kept verbatim.
    Other(String),
}

/// Coarse grouping used for default colorization and labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeCategory {
    Identifier,
    Text,
    Numeric,
    Boolean,
    Temporal,
    Json,
    Binary,
    Array,
    Enum,
    Other,
}

impl DataType {
    /// Look up a single (already whitespace-normalized) keyword.
    ///
    /// Matching is case-insensitive. Returns `None` for names outside the
    /// vocabulary.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let upper = keyword.trim().to_uppercase();
        let ty = match upper.as_str() {
            "UUID" => Self::Uuid,
            "TEXT" => Self::Text,
            "VARCHAR" | "CHARACTER VARYING" => Self::Varchar,
            "CHAR" | "CHARACTER" => Self::Char,
            "INTEGER" => Self::Integer,
            "INT" => Self::Int,
            "BIGINT" => Self::Bigint,
            "SMALLINT" => Self::Smallint,
            "SERIAL" => Self::Serial,
            "BIGSERIAL" => Self::Bigserial,
            "SMALLSERIAL" => Self::Smallserial,
            "BOOLEAN" => Self::Boolean,
            "BOOL" => Self::Bool,
            "TIMESTAMP" | "TIMESTAMP WITHOUT TIME ZONE" => Self::Timestamp,
            "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" => Self::Timestamptz,
            "DATE" => Self::Date,
            "TIME" | "TIME WITHOUT TIME ZONE" => Self::Time,
            "TIMETZ" | "TIME WITH TIME ZONE" => Self::Timetz,
            "INTERVAL" => Self::Interval,
            "JSON" => Self::Json,
            "JSONB" => Self::Jsonb,
            "DECIMAL" => Self::Decimal,
            "NUMERIC" => Self::Numeric,
            "REAL" => Self::Real,
            "DOUBLE PRECISION" => Self::DoublePrecision,
            "FLOAT" => Self::Float,
            "BYTEA" => Self::Bytea,
            "EMAIL" => Self::Email,
            _ => return None,
        };
        Some(ty)
    }

    /// The keyword emitted in generated DDL, without parameters.
    pub fn sql_keyword(&self) -> String {
        match self {
            Self::Uuid => "UUID".into(),
            Self::Text => "TEXT".into(),
            Self::Varchar => "VARCHAR".into(),
            Self::Char => "CHAR".into(),
            Self::Integer => "INTEGER".into(),
            Self::Int => "INT".into(),
            Self::Bigint => "BIGINT".into(),
            Self::Smallint => "SMALLINT".into(),
            Self::Serial => "SERIAL".into(),
            Self::Bigserial => "BIGSERIAL".into(),
            Self::Smallserial => "SMALLSERIAL".into(),
            Self::Boolean => "BOOLEAN".into(),
            Self::Bool => "BOOL".into(),
            Self::Timestamp => "TIMESTAMP".into(),
            Self::Timestamptz => "TIMESTAMPTZ".into(),
            Self::Date => "DATE".into(),
            Self::Time => "TIME".into(),
            Self::Timetz => "TIMETZ".into(),
            Self::Interval => "INTERVAL".into(),
            Self::Json => "JSON".into(),
            Self::Jsonb => "JSONB".into(),
            Self::Decimal => "DECIMAL".into(),
            Self::Numeric => "NUMERIC".into(),
            Self::Real => "REAL".into(),
            Self::DoublePrecision => "DOUBLE PRECISION".into(),
            Self::Float => "FLOAT".into(),
            Self::Bytea => "BYTEA".into(),
            // Declared as a domain by the exporter.
            Self::Email => "email".into(),
            Self::Array(inner) => inner.sql_keyword(),
            Self::Enum(name) | Self::Other(name) => name.clone(),
        }
    }

    /// Number of `[]` suffixes and the innermost element type.
    pub fn array_parts(&self) -> (&DataType, usize) {
        let mut ty = self;
        let mut dims = 0;
        while let Self::Array(inner) = ty {
            ty = inner;
            dims += 1;
        }
        (ty, dims)
    }

    pub fn category(&self) -> TypeCategory {
        match self {
            Self::Uuid | Self::Serial | Self::Bigserial | Self::Smallserial => {
                TypeCategory::Identifier
            }
            Self::Text | Self::Varchar | Self::Char | Self::Email => TypeCategory::Text,
            Self::Integer
            | Self::Int
            | Self::Bigint
            | Self::Smallint
            | Self::Decimal
            | Self::Numeric
            | Self::Real
            | Self::DoublePrecision
            | Self::Float => TypeCategory::Numeric,
            Self::Boolean | Self::Bool => TypeCategory::Boolean,
            Self::Timestamp
            | Self::Timestamptz
            | Self::Date
            | Self::Time
            | Self::Timetz
            | Self::Interval => TypeCategory::Temporal,
            Self::Json | Self::Jsonb => TypeCategory::Json,
            Self::Bytea => TypeCategory::Binary,
            Self::Array(_) => TypeCategory::Array,
            Self::Enum(_) => TypeCategory::Enum,
            Self::Other(_) => TypeCategory::Other,
        }
    }

    /// Short human-readable label shown next to a column.
    pub fn label(&self) -> String {
        match self {
            Self::Email => "EMAIL".to_string(),
            Self::Enum(name) => format!("ENUM {}", name),
            Self::Array(_) => {
                let (inner, dims) = self.array_parts();
                format!("{}{}", inner.label(), "[]".repeat(dims))
            }
            other => other.sql_keyword(),
        }
    }

    /// True for the auto-incrementing integer pseudo-types.
    pub fn is_serial(&self) -> bool {
        matches!(self, Self::Serial | Self::Bigserial | Self::Smallserial)
    }
}

impl From<String> for DataType {
    fn from(s: String) -> Self {
        if let Some(inner) = s.strip_suffix("[]") {
            return Self::Array(Box::new(Self::from(inner.to_string())));
        }
        if let Some(name) = s.strip_prefix("ENUM:") {
            return Self::Enum(name.to_string());
        }
        Self::from_keyword(&s).unwrap_or(Self::Other(s))
    }
}

impl From<DataType> for String {
    fn from(ty: DataType) -> Self {
        match ty {
            DataType::Email => "EMAIL".to_string(),
            DataType::Enum(name) => format!("ENUM:{}", name),
            DataType::Array(inner) => format!("{}[]", String::from(*inner)),
            other => other.sql_keyword(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// `ON DELETE` / `ON UPDATE` action of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
    #[serde(rename = "RESTRICT")]
    Restrict,
    #[default]
    #[serde(rename = "NO ACTION")]
    NoAction,
}

impl ReferentialAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Index access method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexType {
    #[default]
    Btree,
    Hash,
    Gin,
    Gist,
    Spgist,
    Brin,
}

impl IndexType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "btree" => Some(Self::Btree),
            "hash" => Some(Self::Hash),
            "gin" => Some(Self::Gin),
            "gist" => Some(Self::Gist),
            "spgist" => Some(Self::Spgist),
            "brin" => Some(Self::Brin),
            _ => None,
        }
    }

    /// Method name as written after `USING`.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Btree => "btree",
            Self::Hash => "hash",
            Self::Gin => "gin",
            Self::Gist => "gist",
            Self::Spgist => "spgist",
            Self::Brin => "brin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionType {
    #[default]
    Plpgsql,
    Edge,
    Cron,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerEvent {
    #[default]
    Insert,
    Update,
    Delete,
    Truncate,
}

impl TriggerEvent {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            "TRUNCATE" => Some(Self::Truncate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TriggerTiming {
    #[default]
    #[serde(rename = "BEFORE")]
    Before,
    #[serde(rename = "AFTER")]
    After,
    #[serde(rename = "INSTEAD OF")]
    InsteadOf,
}

impl TriggerTiming {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "BEFORE",
            Self::After => "AFTER",
            Self::InsteadOf => "INSTEAD OF",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyCommand {
    Select,
    Insert,
    Update,
    Delete,
    #[default]
    All,
}

impl PolicyCommand {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SELECT" => Some(Self::Select),
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            "ALL" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::All => "ALL",
        }
    }

    /// Whether a `USING` expression is meaningful for this command.
    pub fn allows_using(&self) -> bool {
        !matches!(self, Self::Insert)
    }

    /// Whether a `WITH CHECK` expression is meaningful for this command.
    pub fn allows_with_check(&self) -> bool {
        !matches!(self, Self::Select | Self::Delete)
    }
}

/// Keywords that end a column's type and start its constraint list.
pub const COLUMN_CONSTRAINT_KEYWORDS: &[&str] = &[
    "NOT",
    "NULL",
    "PRIMARY",
    "UNIQUE",
    "DEFAULT",
    "REFERENCES",
    "CHECK",
    "CONSTRAINT",
    "COLLATE",
    "GENERATED",
];

/// Keywords that open a table-level constraint clause.
pub const TABLE_CONSTRAINT_KEYWORDS: &[&str] =
    &["CONSTRAINT", "PRIMARY", "FOREIGN", "UNIQUE", "CHECK", "EXCLUDE"];

/// PostgreSQL reserved words that must be quoted when used as identifiers.
const RESERVED_WORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both",
    "case", "cast", "check", "collate", "column", "constraint", "create", "current_catalog",
    "current_date", "current_role", "current_time", "current_timestamp", "current_user",
    "default", "deferrable", "desc", "distinct", "do", "else", "end", "except", "false",
    "fetch", "for", "foreign", "from", "grant", "group", "having", "in", "initially",
    "intersect", "into", "lateral", "leading", "limit", "localtime", "localtimestamp", "not",
    "null", "offset", "on", "only", "or", "order", "placing", "primary", "references",
    "returning", "select", "session_user", "some", "symmetric", "table", "then", "to",
    "trailing", "true", "union", "unique", "user", "using", "variadic", "when", "where",
    "window", "with",
];

/// Whether `word` must be quoted to be read back as an identifier. Besides
/// the reserved words this covers anything that opens a table element other
/// than a column, such as `exclude` or `like`.
pub fn is_reserved_word(word: &str) -> bool {
    let lower = word.to_lowercase();
    RESERVED_WORDS.contains(&lower.as_str())
        || lower == "like"
        || TABLE_CONSTRAINT_KEYWORDS
            .iter()
            .any(|k| k.eq_ignore_ascii_case(&lower))
}
