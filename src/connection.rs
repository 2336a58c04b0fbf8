//! Tagging database connection wrapper.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Query};
use sea_orm::{
    AccessMode, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr,
    ExecResult, IsolationLevel, QueryResult, Statement, StreamTrait, TransactionError,
    TransactionTrait, Value,
};

use crate::config::TaggerConfig;
use crate::error::{TaggerError, TaggerResult};
use crate::parser;
use crate::query::{
    Taggable, TaggableStatement, TaggedDelete, TaggedInsert, TaggedQuery, TaggedSelect,
    TaggedStatement, TaggedUpdate,
};
use crate::table::TaggedTable;
use crate::tag::{IntoCommentLines, TagState};

/// A SeaORM `DatabaseConnection` that prefixes the next statement with a
/// diagnostic comment.
///
/// A tag set with [`tag_with_comment`](Self::tag_with_comment) is used by
/// exactly one statement: either the next query object created through
/// [`select`](Self::select), [`insert`](Self::insert),
/// [`update`](Self::update) or [`delete`](Self::delete), which takes the tag
/// over, or the next statement executed directly on this connection. Either
/// way the connection holds no tag afterwards.
///
/// The wrapper implements `ConnectionTrait`, `StreamTrait` and
/// `TransactionTrait`, so SeaORM entity queries run against it are tagged as
/// well.
///
/// Each connection owns its own pending slot. Tagging from several tasks
/// through one connection may attach a tag to another task's query; use one
/// connection per task when that matters.
///
/// # Example
///
/// ```rust,ignore
/// use sea_orm::sea_query::{Alias, Asterisk};
/// use sea_orm::Database;
/// use sea_orm_tagging::{sql_tag, TaggedConnection};
///
/// let db = TaggedConnection::from(Database::connect("postgres://localhost/mydb").await?);
///
/// db.tag_with_comment(sql_tag!("monthly_report"));
/// let mut orders = db.select();
/// orders.column(Asterisk).from(Alias::new("orders"));
/// let rows = orders.run().await?;
/// ```
#[derive(Debug)]
pub struct TaggedConnection {
    inner: DatabaseConnection,
    config: Arc<TaggerConfig>,
    pending: Mutex<TagState>,
}

impl TaggedConnection {
    /// Create a new tagging connection with the given configuration.
    pub fn new(connection: DatabaseConnection, config: TaggerConfig) -> Self {
        let pending = Mutex::new(TagState::with_clock(config.clock));
        Self {
            inner: connection,
            config: Arc::new(config),
            pending,
        }
    }

    /// Create a new tagging connection with default configuration.
    pub fn wrap(connection: DatabaseConnection) -> Self {
        Self::new(connection, TaggerConfig::default())
    }

    /// Get a reference to the underlying `DatabaseConnection`.
    ///
    /// Statements executed on it directly are never tagged.
    pub fn inner(&self) -> &DatabaseConnection {
        &self.inner
    }

    /// Get the tagging configuration.
    pub fn config(&self) -> &TaggerConfig {
        &self.config
    }

    /// Consume the wrapper and return the inner `DatabaseConnection`.
    pub fn into_inner(self) -> DatabaseConnection {
        self.inner
    }

    /// Configured database name.
    pub fn name(&self) -> Option<&str> {
        self.config.database_name.as_deref()
    }

    /// Table name prefix applied by the query constructors.
    pub fn prefix(&self) -> &str {
        &self.config.table_prefix
    }

    /// Changing the prefix of a live tagging connection is not supported.
    pub fn with_prefix(&self, _prefix: &str) -> TaggerResult<Self> {
        Err(TaggerError::NotImplemented("with_prefix"))
    }

    /// Table-scoped query helpers for `name` (without prefix).
    pub fn table(&self, name: impl Into<String>) -> TaggedTable<'_> {
        TaggedTable::new(self, name)
    }

    /// Tag the next statement created or executed through this connection.
    ///
    /// Replaces any tag still pending. Blank lines are dropped, and input
    /// without any remaining line leaves the current state untouched.
    pub fn tag_with_comment(&self, comment: impl IntoCommentLines) -> &Self {
        let mut pending = self.lock_pending();
        pending.set(comment);

        if self.config.log_tags {
            if let Some(lines) = pending.lines() {
                tracing::debug!(tag.text = %lines.join(" | "), "SQL tag armed");
            }
        }

        self
    }

    /// Whether a tag is waiting for the next statement.
    pub fn has_pending_tag(&self) -> bool {
        self.lock_pending().is_pending()
    }

    /// Create a SELECT query, handing it the pending tag.
    pub fn select(&self) -> TaggedSelect<'_> {
        self.attach(Query::select())
    }

    /// Create an INSERT query into `table`, handing it the pending tag.
    pub fn insert(&self, table: &str) -> TaggedInsert<'_> {
        let statement = Query::insert()
            .into_table(Alias::new(self.full_table_name(table)))
            .to_owned();
        self.attach(statement)
    }

    /// Create an UPDATE query on `table`, handing it the pending tag.
    pub fn update(&self, table: &str) -> TaggedUpdate<'_> {
        let statement = Query::update()
            .table(Alias::new(self.full_table_name(table)))
            .to_owned();
        self.attach(statement)
    }

    /// Create a DELETE query on `table`, handing it the pending tag.
    pub fn delete(&self, table: &str) -> TaggedDelete<'_> {
        let statement = Query::delete()
            .from_table(Alias::new(self.full_table_name(table)))
            .to_owned();
        self.attach(statement)
    }

    /// Wrap an externally built statement, handing it the pending tag.
    ///
    /// Only SeaQuery SELECT, INSERT, UPDATE and DELETE statements can be
    /// tagged; anything else fails with
    /// [`TaggerError::UnsupportedQueryType`] and leaves the pending tag in
    /// place.
    pub fn tag_query<Q: Any>(&self, query: Q) -> TaggerResult<TaggedQuery<'_>> {
        let mut query = TaggedQuery::from_any(query)?.with_driver(&self.inner);
        let operation = query.kind().as_str();

        let state = query.tag_state_mut();
        state.set_clock(self.config.clock);
        self.hand_over(state, operation);

        Ok(query)
    }

    /// Execute raw SQL with bound `values` and return the affected row count.
    pub async fn execute_raw<I>(&self, sql: &str, values: I) -> Result<u64, DbErr>
    where
        I: IntoIterator<Item = Value>,
    {
        let statement = Statement::from_sql_and_values(self.get_database_backend(), sql, values);
        Ok(self.execute(statement).await?.rows_affected())
    }

    /// Run raw SQL with bound `values` and return every row.
    pub async fn query_raw<I>(&self, sql: &str, values: I) -> Result<Vec<QueryResult>, DbErr>
    where
        I: IntoIterator<Item = Value>,
    {
        let statement = Statement::from_sql_and_values(self.get_database_backend(), sql, values);
        self.query_all(statement).await
    }

    pub(crate) fn full_table_name(&self, table: &str) -> String {
        format!("{}{}", self.config.table_prefix, table)
    }

    /// Get the database backend name for log fields.
    fn db_system(&self) -> &'static str {
        match self.inner.get_database_backend() {
            DbBackend::Postgres => "postgresql",
            DbBackend::MySql => "mysql",
            DbBackend::Sqlite => "sqlite",
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, TagState> {
        // Poisoning is ignored: the slot only holds plain data.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn attach<S: TaggableStatement>(&self, statement: S) -> TaggedStatement<'_, S> {
        let mut query = TaggedStatement::from_parts(
            statement,
            &self.inner,
            TagState::with_clock(self.config.clock),
        );
        self.hand_over(query.tag_state_mut(), S::KIND.as_str());
        query
    }

    fn hand_over(&self, target: &mut TagState, operation: &'static str) {
        let mut pending = self.lock_pending();
        if let Some(lines) = pending.lines() {
            tracing::debug!(
                db.operation = operation,
                tag.lines = lines.len(),
                "SQL tag handed to query"
            );
        }
        pending.transfer_to(target);
    }

    /// Prefix `sql` with the pending comment, consuming it.
    fn tag_sql(&self, sql: &str) -> Option<String> {
        let comment = self.lock_pending().format_comment();
        if comment.is_empty() {
            return None;
        }

        let table = parser::table(sql);
        tracing::debug!(
            db.system = %self.db_system(),
            db.operation = parser::operation(sql),
            db.sql.table = table.as_deref().unwrap_or(""),
            "SQL tag prepended to statement"
        );

        Some(format!("{}{}", comment, sql))
    }

    fn tag_statement(&self, mut stmt: Statement) -> Statement {
        if let Some(sql) = self.tag_sql(&stmt.sql) {
            stmt.sql = sql;
        }
        stmt
    }
}

impl From<DatabaseConnection> for TaggedConnection {
    fn from(connection: DatabaseConnection) -> Self {
        Self::wrap(connection)
    }
}

impl AsRef<DatabaseConnection> for TaggedConnection {
    fn as_ref(&self) -> &DatabaseConnection {
        &self.inner
    }
}

#[async_trait]
impl ConnectionTrait for TaggedConnection {
    fn get_database_backend(&self) -> DbBackend {
        self.inner.get_database_backend()
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        let stmt = self.tag_statement(stmt);
        self.inner.execute(stmt).await
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        match self.tag_sql(sql) {
            Some(tagged) => self.inner.execute_unprepared(&tagged).await,
            None => self.inner.execute_unprepared(sql).await,
        }
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        let stmt = self.tag_statement(stmt);
        self.inner.query_one(stmt).await
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        let stmt = self.tag_statement(stmt);
        self.inner.query_all(stmt).await
    }

    fn support_returning(&self) -> bool {
        self.inner.support_returning()
    }

    fn is_mock_connection(&self) -> bool {
        self.inner.is_mock_connection()
    }
}

impl StreamTrait for TaggedConnection {
    type Stream<'a> = <DatabaseConnection as StreamTrait>::Stream<'a>;

    /// The pending tag is consumed when the returned future is first polled.
    fn stream<'a>(
        &'a self,
        stmt: Statement,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Stream<'a>, DbErr>> + 'a + Send>> {
        Box::pin(async move {
            let stmt = self.tag_statement(stmt);
            self.inner.stream(stmt).await
        })
    }
}

#[async_trait]
impl TransactionTrait for TaggedConnection {
    async fn begin(&self) -> Result<DatabaseTransaction, DbErr> {
        self.inner.begin().await
    }

    async fn begin_with_config(
        &self,
        isolation_level: Option<IsolationLevel>,
        access_mode: Option<AccessMode>,
    ) -> Result<DatabaseTransaction, DbErr> {
        self.inner
            .begin_with_config(isolation_level, access_mode)
            .await
    }

    async fn transaction<F, T, E>(&self, callback: F) -> Result<T, TransactionError<E>>
    where
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>
            + Send,
        T: Send,
        E: std::fmt::Display + std::fmt::Debug + Send,
    {
        self.inner.transaction(callback).await
    }

    async fn transaction_with_config<F, T, E>(
        &self,
        callback: F,
        isolation_level: Option<IsolationLevel>,
        access_mode: Option<AccessMode>,
    ) -> Result<T, TransactionError<E>>
    where
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>
            + Send,
        T: Send,
        E: std::fmt::Display + std::fmt::Debug + Send,
    {
        self.inner
            .transaction_with_config(callback, isolation_level, access_mode)
            .await
    }
}

/// Extension trait for easy wrapping of database connections.
pub trait TaggingExt {
    /// Wrap this connection with SQL tagging.
    fn with_tagging(self) -> TaggedConnection;

    /// Wrap this connection with custom tagging configuration.
    fn with_tagging_config(self, config: TaggerConfig) -> TaggedConnection;
}

impl TaggingExt for DatabaseConnection {
    fn with_tagging(self) -> TaggedConnection {
        TaggedConnection::wrap(self)
    }

    fn with_tagging_config(self, config: TaggerConfig) -> TaggedConnection {
        TaggedConnection::new(self, config)
    }
}
