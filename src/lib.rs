//! # sea-orm-tagging
//!
//! Diagnostic SQL comments for SeaORM database operations.
//!
//! This crate prefixes the next SQL statement sent through a connection with a
//! comment naming where it came from (file, line, caller) or any custom text, so
//! the statement can be traced back from slow query logs, `pg_stat_activity` or
//! `SHOW PROCESSLIST`. The comment never changes what the statement does.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sea_orm::Database;
//! use sea_orm::sea_query::{Alias, Asterisk};
//! use sea_orm_tagging::{sql_tag, TaggedConnection};
//!
//! let db = Database::connect("postgres://localhost/mydb").await?;
//! let tagged_db = TaggedConnection::from(db);
//!
//! tagged_db.tag_with_comment(sql_tag!("monthly_report"));
//! let mut orders = tagged_db.select();
//! orders.column(Asterisk).from(Alias::new("orders"));
//! let rows = orders.run().await?;
//! ```
//!
//! ## Comment Format
//!
//! A single line tag:
//!
//! ```text
//! /* 2024-05-01T12:30:45.123456: monthly report */
//! SELECT * FROM "orders"
//! ```
//!
//! A tag with several lines:
//!
//! ```text
//! /*
//! Date: 2024-05-01T12:30:45.123456
//! File: src/report.rs
//! Line: 42
//! */
//! SELECT * FROM "orders"
//! ```
//!
//! Timestamps are UTC with microsecond precision, taken when the SQL text is
//! produced.
//!
//! ## One Tag, One Statement
//!
//! A tag is used by exactly one statement. Tagging the connection and then
//! creating a query with [`TaggedConnection::select`] (or `insert`, `update`,
//! `delete`) hands the tag to that query; the query prepends it when it is
//! built or run, and later statements are untagged. Executing a statement
//! directly on the connection, including SeaORM entity queries, consumes the
//! tag in the same way.

mod config;
mod connection;
mod error;
mod parser;
mod query;
mod table;
mod tag;

pub use config::TaggerConfig;
pub use connection::{TaggedConnection, TaggingExt};
pub use error::{TaggerError, TaggerResult};
pub use query::{
    InsertOutcome, QueryKind, Taggable, TaggableStatement, TaggedDelete, TaggedInsert, TaggedQuery,
    TaggedSelect, TaggedStatement, TaggedUpdate,
};
pub use table::TaggedTable;
pub use tag::{caller_tag, render_comment, Clock, IntoCommentLines, TagState};

/// Tag lines for the call site: `File:` and `Line:`, plus `Function:` when a
/// name is given.
///
/// ```rust
/// use sea_orm_tagging::sql_tag;
///
/// let tag = sql_tag!("load_orders");
/// assert_eq!(tag[0], format!("File: {}", file!()));
/// assert_eq!(tag[2], "Function: load_orders");
/// ```
#[macro_export]
macro_rules! sql_tag {
    () => {
        $crate::caller_tag(file!(), line!(), None)
    };
    ($function:expr) => {
        $crate::caller_tag(file!(), line!(), Some($function))
    };
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{sql_tag, Taggable, TaggedConnection, TaggerConfig, TaggingExt};
}
