//! Tag-aware wrappers around SeaQuery DML statements.

use std::any::{type_name, Any};
use std::fmt;
use std::ops::{Deref, DerefMut};

use sea_orm::sea_query::{DeleteStatement, InsertStatement, SelectStatement, UpdateStatement};
use sea_orm::{ConnectionTrait, DatabaseConnection, QueryResult, Statement, StatementBuilder};

use crate::error::{TaggerError, TaggerResult};
use crate::tag::{Clock, IntoCommentLines, TagState};

/// The statement kinds that can carry a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl QueryKind {
    /// Returns the kind as the SQL operation keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Select => "SELECT",
            QueryKind::Insert => "INSERT",
            QueryKind::Update => "UPDATE",
            QueryKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

mod private {
    pub trait Sealed {}

    impl Sealed for super::SelectStatement {}
    impl Sealed for super::InsertStatement {}
    impl Sealed for super::UpdateStatement {}
    impl Sealed for super::DeleteStatement {}
}

/// SeaQuery statements that [`TaggedStatement`] can wrap.
///
/// Sealed: only SELECT, INSERT, UPDATE and DELETE statements implement it.
pub trait TaggableStatement: StatementBuilder + private::Sealed {
    const KIND: QueryKind;
}

impl TaggableStatement for SelectStatement {
    const KIND: QueryKind = QueryKind::Select;
}

impl TaggableStatement for InsertStatement {
    const KIND: QueryKind = QueryKind::Insert;
}

impl TaggableStatement for UpdateStatement {
    const KIND: QueryKind = QueryKind::Update;
}

impl TaggableStatement for DeleteStatement {
    const KIND: QueryKind = QueryKind::Delete;
}

/// Objects holding a pending tag for their next statement.
pub trait Taggable {
    /// Access the underlying tag state.
    fn tag_state_mut(&mut self) -> &mut TagState;

    /// Tag the next statement produced by this object with `comment`.
    ///
    /// Blank lines are dropped; input with no remaining lines is ignored.
    fn tag_with_comment(&mut self, comment: impl IntoCommentLines) -> &mut Self
    where
        Self: Sized,
    {
        self.tag_state_mut().set(comment);
        self
    }
}

/// A SeaQuery statement together with the connection that compiles it and a
/// pending tag.
///
/// Derefs to the wrapped statement, so the usual builder methods are
/// available directly:
///
/// ```rust
/// use sea_orm::sea_query::{Alias, Query};
/// use sea_orm_tagging::{Taggable, TaggedSelect};
///
/// let mut select = TaggedSelect::new(Query::select());
/// select.column(Alias::new("id")).from(Alias::new("users"));
/// select.tag_with_comment("monthly report");
/// assert!(select.has_pending_tag());
/// ```
///
/// A clone copies the statement and driver but starts without a pending tag.
#[derive(Debug, Clone)]
pub struct TaggedStatement<'c, S> {
    statement: S,
    driver: Option<&'c DatabaseConnection>,
    tag: TagState,
}

/// Tag-aware SELECT.
pub type TaggedSelect<'c> = TaggedStatement<'c, SelectStatement>;
/// Tag-aware INSERT.
pub type TaggedInsert<'c> = TaggedStatement<'c, InsertStatement>;
/// Tag-aware UPDATE.
pub type TaggedUpdate<'c> = TaggedStatement<'c, UpdateStatement>;
/// Tag-aware DELETE.
pub type TaggedDelete<'c> = TaggedStatement<'c, DeleteStatement>;

impl<'c, S: TaggableStatement> TaggedStatement<'c, S> {
    /// Wrap `statement` without a driver and without a pending tag.
    pub fn new(statement: S) -> Self {
        Self {
            statement,
            driver: None,
            tag: TagState::new(),
        }
    }

    pub(crate) fn from_parts(
        statement: S,
        driver: &'c DatabaseConnection,
        tag: TagState,
    ) -> Self {
        Self {
            statement,
            driver: Some(driver),
            tag,
        }
    }

    /// Associate the connection used to compile and run the statement.
    pub fn with_driver(mut self, driver: &'c DatabaseConnection) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Replace the clock used to timestamp the comment.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.tag.set_clock(clock);
        self
    }

    /// Kind of the wrapped statement.
    pub fn kind(&self) -> QueryKind {
        S::KIND
    }

    /// Connection used to compile and run the statement, if any.
    pub fn driver(&self) -> Option<&'c DatabaseConnection> {
        self.driver
    }

    /// The wrapped statement.
    pub fn statement(&self) -> &S {
        &self.statement
    }

    /// Mutable access to the wrapped statement.
    pub fn statement_mut(&mut self) -> &mut S {
        &mut self.statement
    }

    /// Drop the wrapper and return the plain statement. Any pending tag is lost.
    pub fn into_statement(self) -> S {
        self.statement
    }

    /// Whether a tag is waiting for the next build or run.
    pub fn has_pending_tag(&self) -> bool {
        self.tag.is_pending()
    }

    /// Compile the statement for the driver's backend, prefixed with the
    /// pending tag comment.
    ///
    /// The pending tag is consumed. Fails with [`TaggerError::MissingDriver`]
    /// when no driver is associated, in which case the tag stays pending.
    pub fn build(&mut self) -> TaggerResult<Statement> {
        self.prepare().map(|(_, statement)| statement)
    }

    /// SQL text of [`build`](Self::build), without executing anything.
    pub fn sql_statement(&mut self) -> TaggerResult<String> {
        Ok(self.build()?.sql)
    }

    fn prepare(&mut self) -> TaggerResult<(&'c DatabaseConnection, Statement)> {
        let driver = self.driver.ok_or(TaggerError::MissingDriver)?;
        let mut statement = self.statement.build(&driver.get_database_backend());

        let comment = self.tag.format_comment();
        if !comment.is_empty() {
            tracing::trace!(db.operation = S::KIND.as_str(), "Prepending SQL tag comment");
            statement.sql.insert_str(0, &comment);
        }

        Ok((driver, statement))
    }
}

impl<S> Taggable for TaggedStatement<'_, S> {
    fn tag_state_mut(&mut self) -> &mut TagState {
        &mut self.tag
    }
}

impl<S> Deref for TaggedStatement<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.statement
    }
}

impl<S> DerefMut for TaggedStatement<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.statement
    }
}

impl TaggedSelect<'_> {
    /// Run the query and return every row.
    pub async fn run(&mut self) -> TaggerResult<Vec<QueryResult>> {
        let (driver, statement) = self.prepare()?;
        Ok(driver.query_all(statement).await?)
    }

    /// Run the query and return the first row.
    pub async fn one(&mut self) -> TaggerResult<Option<QueryResult>> {
        let (driver, statement) = self.prepare()?;
        Ok(driver.query_one(statement).await?)
    }
}

/// Result of running a [`TaggedInsert`].
#[derive(Debug)]
pub enum InsertOutcome {
    /// Last insert id, on backends without `RETURNING` support.
    Key(u64),
    /// Row of returned columns, on backends supporting `RETURNING`.
    /// `None` when the statement has no `RETURNING` clause.
    Returned(Option<QueryResult>),
}

impl InsertOutcome {
    /// The generated key when the backend reported one.
    pub fn key(&self) -> Option<u64> {
        match self {
            InsertOutcome::Key(key) => Some(*key),
            InsertOutcome::Returned(_) => None,
        }
    }
}

impl TaggedInsert<'_> {
    /// Run the insert.
    ///
    /// Returns the row produced by the `RETURNING` clause when the backend
    /// supports it, and the last insert id otherwise.
    pub async fn run(&mut self) -> TaggerResult<InsertOutcome> {
        let (driver, statement) = self.prepare()?;

        if driver.support_returning() {
            Ok(InsertOutcome::Returned(driver.query_one(statement).await?))
        } else {
            let result = driver.execute(statement).await?;
            Ok(InsertOutcome::Key(result.last_insert_id()))
        }
    }
}

impl TaggedUpdate<'_> {
    /// Run the update and return the number of affected rows.
    pub async fn run(&mut self) -> TaggerResult<u64> {
        let (driver, statement) = self.prepare()?;
        Ok(driver.execute(statement).await?.rows_affected())
    }
}

impl TaggedDelete<'_> {
    /// Run the delete and return the number of affected rows.
    pub async fn run(&mut self) -> TaggerResult<u64> {
        let (driver, statement) = self.prepare()?;
        Ok(driver.execute(statement).await?.rows_affected())
    }
}

/// A tag-aware statement of any of the four supported kinds.
#[derive(Debug, Clone)]
pub enum TaggedQuery<'c> {
    Select(TaggedSelect<'c>),
    Insert(TaggedInsert<'c>),
    Update(TaggedUpdate<'c>),
    Delete(TaggedDelete<'c>),
}

impl<'c> TaggedQuery<'c> {
    /// Wrap a statement whose concrete type is only known at runtime.
    ///
    /// Fails with [`TaggerError::UnsupportedQueryType`], naming the type, for
    /// anything other than the four SeaQuery DML statements.
    pub fn from_any<Q: Any>(query: Q) -> TaggerResult<Self> {
        let query: Box<dyn Any> = Box::new(query);

        let query = match query.downcast::<SelectStatement>() {
            Ok(select) => return Ok(TaggedQuery::Select(TaggedStatement::new(*select))),
            Err(query) => query,
        };
        let query = match query.downcast::<InsertStatement>() {
            Ok(insert) => return Ok(TaggedQuery::Insert(TaggedStatement::new(*insert))),
            Err(query) => query,
        };
        let query = match query.downcast::<UpdateStatement>() {
            Ok(update) => return Ok(TaggedQuery::Update(TaggedStatement::new(*update))),
            Err(query) => query,
        };
        match query.downcast::<DeleteStatement>() {
            Ok(delete) => Ok(TaggedQuery::Delete(TaggedStatement::new(*delete))),
            Err(_) => Err(TaggerError::UnsupportedQueryType(type_name::<Q>())),
        }
    }

    /// Kind of the wrapped statement.
    pub fn kind(&self) -> QueryKind {
        match self {
            TaggedQuery::Select(_) => QueryKind::Select,
            TaggedQuery::Insert(_) => QueryKind::Insert,
            TaggedQuery::Update(_) => QueryKind::Update,
            TaggedQuery::Delete(_) => QueryKind::Delete,
        }
    }

    /// Associate the connection used to compile and run the statement.
    pub fn with_driver(self, driver: &'c DatabaseConnection) -> Self {
        match self {
            TaggedQuery::Select(q) => TaggedQuery::Select(q.with_driver(driver)),
            TaggedQuery::Insert(q) => TaggedQuery::Insert(q.with_driver(driver)),
            TaggedQuery::Update(q) => TaggedQuery::Update(q.with_driver(driver)),
            TaggedQuery::Delete(q) => TaggedQuery::Delete(q.with_driver(driver)),
        }
    }

    /// Whether a tag is waiting for the next build or run.
    pub fn has_pending_tag(&self) -> bool {
        match self {
            TaggedQuery::Select(q) => q.has_pending_tag(),
            TaggedQuery::Insert(q) => q.has_pending_tag(),
            TaggedQuery::Update(q) => q.has_pending_tag(),
            TaggedQuery::Delete(q) => q.has_pending_tag(),
        }
    }

    /// See [`TaggedStatement::build`].
    pub fn build(&mut self) -> TaggerResult<Statement> {
        match self {
            TaggedQuery::Select(q) => q.build(),
            TaggedQuery::Insert(q) => q.build(),
            TaggedQuery::Update(q) => q.build(),
            TaggedQuery::Delete(q) => q.build(),
        }
    }

    /// See [`TaggedStatement::sql_statement`].
    pub fn sql_statement(&mut self) -> TaggerResult<String> {
        Ok(self.build()?.sql)
    }
}

impl Taggable for TaggedQuery<'_> {
    fn tag_state_mut(&mut self) -> &mut TagState {
        match self {
            TaggedQuery::Select(q) => q.tag_state_mut(),
            TaggedQuery::Insert(q) => q.tag_state_mut(),
            TaggedQuery::Update(q) => q.tag_state_mut(),
            TaggedQuery::Delete(q) => q.tag_state_mut(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::tests::{fixed_clock, FIXED_TS};
    use sea_orm::sea_query::{Alias, Expr, Query, Table, Values};
    use sea_orm::{DbBackend, MockDatabase, MockExecResult, Transaction, Value};
    use std::collections::BTreeMap;

    fn users_select() -> SelectStatement {
        Query::select()
            .column(Alias::new("id"))
            .from(Alias::new("users"))
            .to_owned()
    }

    #[test]
    fn test_missing_driver() {
        let mut select = TaggedSelect::new(users_select());
        select.tag_with_comment("kept");

        let err = select.sql_statement().unwrap_err();
        assert!(matches!(err, TaggerError::MissingDriver));
        assert!(select.has_pending_tag());
    }

    #[test]
    fn test_untagged_select_is_unchanged() {
        let db = MockDatabase::new(DbBackend::Postgres).into_connection();
        let mut select = TaggedSelect::new(users_select()).with_driver(&db);

        assert_eq!(select.sql_statement().unwrap(), r#"SELECT "id" FROM "users""#);
    }

    #[test]
    fn test_tagged_select_prefix() {
        let db = MockDatabase::new(DbBackend::Postgres).into_connection();
        let mut select = TaggedSelect::new(users_select())
            .with_driver(&db)
            .with_clock(fixed_clock);
        select.tag_with_comment("Report X");

        assert_eq!(
            select.sql_statement().unwrap(),
            format!("/* {}: Report X */\nSELECT \"id\" FROM \"users\"", FIXED_TS)
        );
    }

    #[test]
    fn test_tag_consumed_by_first_build() {
        let db = MockDatabase::new(DbBackend::Postgres).into_connection();
        let mut select = TaggedSelect::new(users_select()).with_driver(&db);
        select.tag_with_comment(["one", "two"]);

        assert!(select.sql_statement().unwrap().starts_with("/*\nDate: "));
        assert_eq!(select.sql_statement().unwrap(), r#"SELECT "id" FROM "users""#);
    }

    #[test]
    fn test_build_keeps_bound_values() {
        let db = MockDatabase::new(DbBackend::Postgres).into_connection();
        let mut delete = TaggedDelete::new(
            Query::delete()
                .from_table(Alias::new("users"))
                .and_where(Expr::col(Alias::new("id")).eq(7))
                .to_owned(),
        )
        .with_driver(&db)
        .with_clock(fixed_clock);
        delete.tag_with_comment("cleanup");

        let statement = delete.build().unwrap();
        assert_eq!(
            statement.sql,
            format!("/* {}: cleanup */\nDELETE FROM \"users\" WHERE \"id\" = $1", FIXED_TS)
        );
        assert_eq!(statement.values, Some(Values(vec![Value::Int(Some(7))])));
    }

    #[test]
    fn test_deref_builder_access() {
        let db = MockDatabase::new(DbBackend::MySql).into_connection();
        let mut update = TaggedUpdate::new(Query::update()).with_driver(&db);
        update
            .table(Alias::new("users"))
            .value(Alias::new("name"), "bob")
            .and_where(Expr::col(Alias::new("id")).eq(1));

        assert_eq!(update.kind(), QueryKind::Update);
        assert_eq!(
            update.sql_statement().unwrap(),
            "UPDATE `users` SET `name` = ? WHERE `id` = ?"
        );
    }

    #[test]
    fn test_from_any_accepts_dml() {
        let query = TaggedQuery::from_any(users_select()).unwrap();
        assert_eq!(query.kind(), QueryKind::Select);

        let query = TaggedQuery::from_any(Query::insert()).unwrap();
        assert_eq!(query.kind(), QueryKind::Insert);

        let query = TaggedQuery::from_any(Query::update()).unwrap();
        assert_eq!(query.kind(), QueryKind::Update);

        let query = TaggedQuery::from_any(Query::delete()).unwrap();
        assert_eq!(query.kind(), QueryKind::Delete);
    }

    #[test]
    fn test_from_any_rejects_other_types() {
        let create = Table::create().table(Alias::new("users")).to_owned();
        let err = TaggedQuery::from_any(create).unwrap_err();

        match err {
            TaggerError::UnsupportedQueryType(name) => {
                assert!(name.ends_with("TableCreateStatement"), "{}", name)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_select_run_cannot_leak_tag() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([
                vec![BTreeMap::from([("id".to_owned(), Value::Int(Some(1)))])],
                vec![BTreeMap::from([("id".to_owned(), Value::Int(Some(1)))])],
            ])
            .into_connection();

        {
            let mut select = TaggedSelect::new(users_select())
                .with_driver(&db)
                .with_clock(fixed_clock);
            select.tag_with_comment("first run only");

            assert_eq!(select.run().await.unwrap().len(), 1);
            assert!(!select.has_pending_tag());
            assert_eq!(select.run().await.unwrap().len(), 1);
        }

        assert_eq!(
            db.into_transaction_log(),
            [
                Transaction::from_sql_and_values(
                    DbBackend::Postgres,
                    format!("/* {}: first run only */\nSELECT \"id\" FROM \"users\"", FIXED_TS),
                    [],
                ),
                Transaction::from_sql_and_values(
                    DbBackend::Postgres,
                    r#"SELECT "id" FROM "users""#,
                    [],
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_insert_run_returns_key_without_returning_support() {
        let db = MockDatabase::new(DbBackend::MySql)
            .append_exec_results([MockExecResult {
                last_insert_id: 15,
                rows_affected: 1,
            }])
            .into_connection();

        let outcome = {
            let mut insert = TaggedInsert::new(
                Query::insert()
                    .into_table(Alias::new("users"))
                    .columns([Alias::new("name")])
                    .values_panic(["alice".into()])
                    .to_owned(),
            )
            .with_driver(&db)
            .with_clock(fixed_clock);
            insert.tag_with_comment("signup");
            insert.run().await.unwrap()
        };

        assert_eq!(outcome.key(), Some(15));
        assert_eq!(
            db.into_transaction_log(),
            [Transaction::from_sql_and_values(
                DbBackend::MySql,
                format!("/* {}: signup */\nINSERT INTO `users` (`name`) VALUES (?)", FIXED_TS),
                ["alice".into()],
            )]
        );
    }

    #[tokio::test]
    async fn test_insert_run_returns_row_with_returning_support() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![BTreeMap::from([(
                "id".to_owned(),
                Value::Int(Some(3)),
            )])]])
            .into_connection();

        let mut insert = TaggedInsert::new(
            Query::insert()
                .into_table(Alias::new("users"))
                .columns([Alias::new("name")])
                .values_panic(["carol".into()])
                .returning_col(Alias::new("id"))
                .to_owned(),
        )
        .with_driver(&db);

        match insert.run().await.unwrap() {
            InsertOutcome::Returned(Some(row)) => {
                assert_eq!(row.try_get::<i32>("", "id").unwrap(), 3);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_and_delete_return_row_counts() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 2,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 5,
                },
            ])
            .into_connection();

        let mut update = TaggedUpdate::new(
            Query::update()
                .table(Alias::new("users"))
                .value(Alias::new("active"), false)
                .to_owned(),
        )
        .with_driver(&db);
        update.tag_with_comment("deactivate");
        assert_eq!(update.run().await.unwrap(), 2);
        assert!(!update.has_pending_tag());

        let mut delete = TaggedDelete::new(
            Query::delete().from_table(Alias::new("users")).to_owned(),
        )
        .with_driver(&db);
        assert_eq!(delete.run().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_failed_run_still_consumes_tag() {
        let db = MockDatabase::new(DbBackend::Postgres).into_connection();
        let mut delete = TaggedDelete::new(
            Query::delete().from_table(Alias::new("users")).to_owned(),
        )
        .with_driver(&db);
        delete.tag_with_comment("doomed");

        assert!(matches!(delete.run().await, Err(TaggerError::Database(_))));
        assert!(!delete.has_pending_tag());
    }
}
