//! Configuration for tagging behavior.

use chrono::Utc;

use crate::tag::Clock;

/// Configuration options for a [`TaggedConnection`](crate::TaggedConnection).
///
/// # Example
///
/// ```rust
/// use sea_orm_tagging::TaggerConfig;
///
/// let config = TaggerConfig::default()
///     .with_table_prefix("app_")
///     .with_tag_logging(true);
/// ```
#[derive(Debug, Clone)]
pub struct TaggerConfig {
    /// Prefix prepended to every table name passed to the query constructors.
    /// Default: `""`
    pub table_prefix: String,

    /// Database name reported by [`TaggedConnection::name`](crate::TaggedConnection::name).
    /// Default: `None`
    pub database_name: Option<String>,

    /// Whether to include the tag text in debug events.
    /// Default: `false` (tags may carry caller-supplied data)
    pub log_tags: bool,

    /// Clock used to timestamp comments.
    /// Default: [`Utc::now`]
    pub clock: Clock,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            database_name: None,
            log_tags: false,
            clock: Utc::now,
        }
    }
}

impl TaggerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table name prefix.
    ///
    /// The prefix is fixed for the lifetime of the connection.
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Set a database name.
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }

    /// Enable or disable tag text in debug events.
    pub fn with_tag_logging(mut self, enabled: bool) -> Self {
        self.log_tags = enabled;
        self
    }

    /// Replace the clock used for comment timestamps.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Create a development-friendly configuration that logs tag text.
    pub fn development() -> Self {
        Self {
            log_tags: true,
            ..Self::default()
        }
    }

    /// Create a production-safe configuration that keeps tag text out of logs.
    pub fn production() -> Self {
        Self {
            log_tags: false,
            ..Self::default()
        }
    }
}
