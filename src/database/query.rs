use derive_new::new;
use serde::de::DeserializeOwned;
use serde::Serialize;
use snafu::{Location, ResultExt as _, Snafu};
use surrealdb::engine::any::Any;
use surrealdb::opt::QueryResult;

use super::{Record, Table};

type SurrealQuery<'a> = surrealdb::method::Query<'a, Any>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DatabaseQueryError {
    #[snafu(display("failed to execute the query at {location}: {source}"))]
    MalformedQuery {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to deserialize the query response at {location}: {source}"))]
    Deserialize {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("transaction with {statements} statement(s) was rolled back at {location}: {source}"))]
    TransactionFailed {
        statements: usize,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Pending SurrealQL statements with their parameters. Parameters can be bound using the [Bindings::bind] method which takes any serializable data structure.
///
/// # Example
/// ```rust,ignore
/// let videos: Vec<Video> = database.sql("SELECT * FROM videos WHERE course = $course")
///     .bind(("course", &course_id))
///     .fetch_first()
///     .await?;
/// ```
#[derive(Debug, new)]
pub struct Bindings<'a> {
    query: SurrealQuery<'a>,
}

impl Bindings<'_> {
    pub fn bind(mut self, params: impl Serialize) -> Self {
        let query = self.query;
        self.query = query.bind(params);
        self
    }

    /// Execute the query and return a [surrealdb::Response] which is SurrealDB's way to represent a list of statements returned from the database.
    ///
    /// Statement errors are surfaced here rather than when the results are taken.
    pub async fn execute(self) -> Result<surrealdb::Response, DatabaseQueryError> {
        let response = self
            .query
            .await
            .context(MalformedQuerySnafu)?
            .check()
            .context(MalformedQuerySnafu)?;
        tracing::trace!(?response, "executed query");
        Ok(response)
    }

    /// Execute the query and return the first result as a deserialized value.
    pub async fn fetch_first<T: DeserializeOwned>(self) -> Result<T, DatabaseQueryError>
    where
        usize: QueryResult<T>,
    {
        let mut statements = self.execute().await?;
        let result = statements.take::<T>(0).context(DeserializeSnafu)?;
        Ok(result)
    }
}

/// A batch of writes that either all land or none do.
///
/// Every write gets its own numbered parameters so records of the same table can be written in one batch.
#[derive(Debug)]
pub struct Transaction<'a> {
    query: SurrealQuery<'a>,
    statements: usize,
}

impl<'a> Transaction<'a> {
    pub(super) fn begin(query: SurrealQuery<'a>) -> Self {
        Self {
            query,
            statements: 0,
        }
    }

    /// Creates the record, failing the whole transaction if it already exists.
    pub fn create<T: Table + Serialize>(self, record: &T) -> Self {
        self.write("CREATE", record)
    }

    /// Replaces the record's content.
    pub fn update<T: Table + Serialize>(self, record: &T) -> Self {
        self.write("UPDATE", record)
    }

    pub fn delete<T>(mut self, id: &Record<T>) -> Self {
        let param = format!("w{}_id", self.statements);
        self.statements += 1;

        self.query = self
            .query
            .query(format!("DELETE ${param}"))
            .bind((param, id));
        self
    }

    /// Appends a raw statement. Its parameters must not collide with the numbered `$wN_*` ones.
    pub fn statement(mut self, sql: &str, params: impl Serialize) -> Self {
        self.statements += 1;
        self.query = self.query.query(sql).bind(params);
        self
    }

    fn write<T: Table + Serialize>(mut self, verb: &str, record: &T) -> Self {
        let id = format!("w{}_id", self.statements);
        let content = format!("w{}_content", self.statements);
        self.statements += 1;

        self.query = self
            .query
            .query(format!("{verb} ${id} CONTENT ${content}"))
            .bind((id, record.id()))
            .bind((content, record));
        self
    }

    pub async fn commit(self) -> Result<(), DatabaseQueryError> {
        let statements = self.statements;
        let response = self
            .query
            .query("COMMIT TRANSACTION")
            .await
            .context(MalformedQuerySnafu)?;

        response
            .check()
            .context(TransactionFailedSnafu { statements })?;

        tracing::debug!(statements, "committed transaction");
        Ok(())
    }
}
