//! PostgreSQL DDL front end.

mod lexer;
mod parser;
mod source;
pub mod types;

pub use lexer::LexError;
pub use parser::{
    parse_create_table_statements, parse_script, ParseError, ParseOptions, StatementError,
    MAX_NESTING_DEPTH,
};
