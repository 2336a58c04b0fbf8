//! Error types for the tagging layer.

use sea_orm::sea_query;
use sea_orm::DbErr;
use thiserror::Error;

/// Errors raised while building, tagging or running a query.
///
/// Errors from the database itself are passed through untouched in
/// [`TaggerError::Database`].
#[derive(Debug, Error)]
pub enum TaggerError {
    /// SQL text was requested from a query that has no connection to compile it with.
    #[error("Unable to build query without associated driver")]
    MissingDriver,

    /// A statement outside of SELECT/INSERT/UPDATE/DELETE was handed to the tagging bridge.
    #[error("Unable to tag SQL query, received non supported query type: {0}")]
    UnsupportedQueryType(&'static str),

    /// The operation cannot be supported by a tagging connection.
    #[error("{0} method not implemented")]
    NotImplemented(&'static str),

    /// Error reported by the underlying database connection.
    #[error(transparent)]
    Database(#[from] DbErr),

    /// Error reported by the query builder.
    #[error(transparent)]
    Builder(#[from] sea_query::error::Error),
}

/// Result alias used throughout the crate.
pub type TaggerResult<T> = Result<T, TaggerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            TaggerError::MissingDriver.to_string(),
            "Unable to build query without associated driver"
        );
        assert_eq!(
            TaggerError::NotImplemented("with_prefix").to_string(),
            "with_prefix method not implemented"
        );
        assert_eq!(
            TaggerError::UnsupportedQueryType("sea_query::table::create::TableCreateStatement")
                .to_string(),
            "Unable to tag SQL query, received non supported query type: \
             sea_query::table::create::TableCreateStatement"
        );
    }

    #[test]
    fn test_database_error_is_transparent() {
        let err = TaggerError::from(DbErr::Custom("boom".into()));
        assert_eq!(err.to_string(), DbErr::Custom("boom".into()).to_string());
    }
}
