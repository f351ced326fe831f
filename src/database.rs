use std::ops::Deref;

use serde::{Deserialize, Serialize};
use snafu::{Location, ResultExt as _, Snafu};
use surrealdb::{engine::any::Any, opt::auth, Surreal};
use url::Url;

/// Helper trait for executing arbitrary SurrealQL queries.
pub mod query;

/// Macros for defining table methods.
pub mod macros;

/// Typed record ids.
pub mod record;

pub use query::{Bindings, DatabaseQueryError, Transaction};
pub use record::Record;
pub use surrealdb::sql::Thing;

const SCHEMA: &str = include_str!("../schema.surrealql");
const MEMORY_ENDPOINT: &str = "mem://";

pub type Result<T, E = DatabaseError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DatabaseError {
    #[snafu(display("cannot connect to the database `{url}` at {location}: {source}"))]
    DatabaseConnection {
        url: Url,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("`{endpoint}` is not a valid database endpoint at {location}: {source}"))]
    InvalidEndpoint {
        endpoint: String,
        source: url::ParseError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cannot sign in to the database `{url}` as `{username}` at {location}: {source}"))]
    SignIn {
        url: Url,
        username: String,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cannot select namespace `{namespace}` and database `{database}` at {location}: {source}"))]
    SelectDatabase {
        namespace: String,
        database: String,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to apply the schema at {location}: {source}"))]
    ApplySchema {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Represents a record that is stored in its own table.
pub trait Table {
    /// Returns the ID of the record.
    fn id(&self) -> &Thing;

    /// Returns the name of the table associated with the record.
    fn table() -> &'static str;
}

#[derive(Debug, Deserialize, Clone)]
pub struct SurrealConfig {
    #[serde(rename = "surreal_endpoint")]
    pub endpoint: Url,
    #[serde(rename = "surreal_namespace")]
    pub namespace: String,
    #[serde(rename = "surreal_database")]
    pub database: String,
    #[serde(rename = "surreal_username", default)]
    pub username: Option<String>,
    #[serde(rename = "surreal_password", default)]
    pub password: Option<String>,
}

/// A cloneable handle to the document store.
#[derive(Debug, Clone)]
pub struct Database {
    database: Surreal<Any>,
}

impl Database {
    /// Connects to the configured endpoint, signs in when credentials are present and applies the schema.
    ///
    /// Any endpoint supported by [surrealdb::engine::any] works, including `mem://` for a throwaway store.
    pub async fn connect(config: &SurrealConfig) -> Result<Self> {
        let url = &config.endpoint;
        let database = surrealdb::engine::any::connect(url.as_str())
            .await
            .context(DatabaseConnectionSnafu { url: url.clone() })?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            database
                .signin(auth::Database {
                    namespace: &config.namespace,
                    database: &config.database,
                    username,
                    password,
                })
                .await
                .context(SignInSnafu {
                    url: url.clone(),
                    username: username.clone(),
                })?;
        }

        database
            .use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .context(SelectDatabaseSnafu {
                namespace: config.namespace.clone(),
                database: config.database.clone(),
            })?;

        database.query(SCHEMA).await.context(ApplySchemaSnafu)?;

        tracing::info!(endpoint = %url, namespace = %config.namespace, database = %config.database, "connected to the database");

        Ok(Self { database })
    }

    /// Opens an empty in-memory store with the schema applied.
    pub async fn in_memory() -> Result<Self> {
        let config = SurrealConfig {
            endpoint: Url::parse(MEMORY_ENDPOINT).context(InvalidEndpointSnafu {
                endpoint: MEMORY_ENDPOINT,
            })?,
            namespace: "cloudversity".into(),
            database: "cloudversity".into(),
            username: None,
            password: None,
        };

        Self::connect(&config).await
    }

    /// Create a builder to execute arbitrary SQL code on the database.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let courses: Vec<Course> = db.sql("SELECT * FROM courses WHERE category = $category")
    ///     .bind(("category", "programming"))
    ///     .fetch_first()
    ///     .await?;
    /// ```
    pub fn sql(&self, query: &str) -> Bindings<'_> {
        Bindings::new(self.database.query(query))
    }

    /// Starts a transaction. Statements are only sent once [Transaction::commit] is awaited.
    pub fn transaction(&self) -> Transaction<'_> {
        Transaction::begin(self.database.query("BEGIN TRANSACTION"))
    }

    /// Selects a single record by its id.
    pub async fn fetch<T>(&self, id: &Record<T>) -> Result<Option<T>, DatabaseQueryError>
    where
        T: Table + serde::de::DeserializeOwned,
    {
        self.sql("SELECT * FROM $id").bind(("id", id)).fetch_first().await
    }

    /// Selects every record of the given ids, in no particular order. Unknown ids are skipped.
    pub async fn fetch_many<T>(&self, ids: &[Record<T>]) -> Result<Vec<T>, DatabaseQueryError>
    where
        T: Table + serde::de::DeserializeOwned,
    {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.sql("SELECT * FROM type::table($table) WHERE id INSIDE $ids")
            .bind(("table", T::table()))
            .bind(("ids", ids))
            .fetch_first()
            .await
    }

    /// Writes the whole record, creating it if it doesn't exist yet.
    pub async fn save<T>(&self, record: &T) -> Result<(), DatabaseQueryError>
    where
        T: Table + Serialize,
    {
        self.sql("UPDATE $id CONTENT $content")
            .bind(("id", record.id()))
            .bind(("content", record))
            .execute()
            .await
            .map(|_| ())
    }
}

impl Deref for Database {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.database
    }
}
