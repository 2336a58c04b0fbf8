//! Table-scoped query helpers on a tagging connection.

use sea_orm::sea_query::{Alias, Asterisk, Expr, Query, SimpleExpr};
use sea_orm::{QueryResult, Value};

use crate::connection::TaggedConnection;
use crate::error::TaggerResult;
use crate::query::{InsertOutcome, TaggedDelete, TaggedInsert, TaggedSelect, TaggedUpdate};
use crate::tag::IntoCommentLines;

/// Queries pre-populated with one table of a [`TaggedConnection`].
///
/// Tags are stored on the connection, so a tag set here is picked up by the
/// next statement created or executed through the connection.
#[derive(Debug, Clone)]
pub struct TaggedTable<'a> {
    database: &'a TaggedConnection,
    name: String,
}

impl<'a> TaggedTable<'a> {
    pub(crate) fn new(database: &'a TaggedConnection, name: impl Into<String>) -> Self {
        Self {
            database,
            name: name.into(),
        }
    }

    /// Tag the next statement of the underlying connection.
    pub fn tag_with_comment(&self, comment: impl IntoCommentLines) -> &Self {
        self.database.tag_with_comment(comment);
        self
    }

    /// The connection this table belongs to.
    pub fn database(&self) -> &'a TaggedConnection {
        self.database
    }

    /// Table name without prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table name including the connection prefix.
    pub fn full_name(&self) -> String {
        self.database.full_table_name(&self.name)
    }

    /// `SELECT * FROM <table>`.
    pub fn select(&self) -> TaggedSelect<'a> {
        let mut select = self.database.select();
        select.column(Asterisk).from(Alias::new(self.full_name()));
        select
    }

    /// INSERT into the table.
    pub fn insert(&self) -> TaggedInsert<'a> {
        self.database.insert(&self.name)
    }

    /// UPDATE rows of the table.
    pub fn update(&self) -> TaggedUpdate<'a> {
        self.database.update(&self.name)
    }

    /// Delete rows of the table. This never drops the table itself.
    pub fn delete(&self) -> TaggedDelete<'a> {
        self.database.delete(&self.name)
    }

    /// Insert one row given as column/value pairs.
    ///
    /// ```rust,ignore
    /// users.insert_one([("name", "Wolfy-J".into()), ("balance", 10.into())]).await?;
    /// ```
    pub async fn insert_one<I, C>(&self, row: I) -> TaggerResult<InsertOutcome>
    where
        I: IntoIterator<Item = (C, Value)>,
        C: Into<String>,
    {
        let (columns, values): (Vec<Alias>, Vec<SimpleExpr>) = row
            .into_iter()
            .map(|(column, value)| (Alias::new(column), SimpleExpr::from(value)))
            .unzip();

        let mut statement = Query::insert();
        statement
            .into_table(Alias::new(self.full_name()))
            .columns(columns)
            .values(values)?;

        self.database.attach(statement).run().await
    }

    /// Insert several rows, each with one value per entry of `columns`.
    ///
    /// Fails before anything is sent, and without consuming the pending tag,
    /// when a row does not match the column count. With no rows nothing is sent
    /// and the tag stays pending.
    pub async fn insert_multiple<I, R>(&self, columns: &[&str], rows: I) -> TaggerResult<()>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = Value>,
    {
        let mut statement = Query::insert();
        statement
            .into_table(Alias::new(self.full_name()))
            .columns(columns.iter().map(|column| Alias::new(*column)));

        let mut empty = true;
        for row in rows {
            statement.values(row.into_iter().map(SimpleExpr::from))?;
            empty = false;
        }
        if empty {
            return Ok(());
        }

        self.database.attach(statement).run().await?;
        Ok(())
    }

    /// Number of rows in the table.
    pub async fn count(&self) -> TaggerResult<i64> {
        let mut select = self.database.select();
        select
            .expr_as(Expr::cust("COUNT(*)"), Alias::new("count"))
            .from(Alias::new(self.full_name()));

        match select.one().await? {
            Some(row) => Ok(row.try_get::<i64>("", "count")?),
            None => Ok(0),
        }
    }

    /// Every row of the table.
    pub async fn fetch_all(&self) -> TaggerResult<Vec<QueryResult>> {
        self.select().run().await
    }
}
