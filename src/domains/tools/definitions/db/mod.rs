//! SQLite database tool.

pub mod query;
mod tool;

pub use tool::DatabaseQueryTool;
