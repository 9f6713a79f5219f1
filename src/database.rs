use std::collections::HashMap;
use std::time::Duration;

use derive_new::new;
use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};
use surrealdb::{
    engine::any::Any,
    opt::{
        auth::{self, Credentials, Jwt, Signin},
        IntoQuery, QueryResult,
    },
    Surreal,
};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use url::Url;

use crate::Located;

const SCHEMA: &str = include_str!("../schema.surrealql");

const MEMORY_ENDPOINT: &str = "mem://";

pub type Result<T, E = DatabaseError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DatabaseError {
    #[snafu(display("failed to query the database at {location}: {source}"))]
    DatabaseQuery {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to deserialize the database response at {location}: {source}"))]
    DatabaseDeserialize {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to apply the database schema at {location}: {source}"))]
    DatabaseSchema {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cannot connect to the database `{endpoint}` at {location}: {source}"))]
    DatabaseConnection {
        endpoint: String,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("url `{endpoint}` is missing a namespace parameter (ns) at {location}"))]
    NoNamespace {
        endpoint: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("url `{endpoint}` is missing a database parameter (db) at {location}"))]
    NoDatabase {
        endpoint: String,
        #[snafu(implicit)]
        location: Location,
    },
}

impl Located for DatabaseError {
    fn location(&self) -> Location {
        match self {
            DatabaseError::DatabaseQuery { location, .. }
            | DatabaseError::DatabaseDeserialize { location, .. }
            | DatabaseError::DatabaseSchema { location, .. }
            | DatabaseError::DatabaseConnection { location, .. }
            | DatabaseError::NoNamespace { location, .. }
            | DatabaseError::NoDatabase { location, .. } => *location,
        }
    }
}

/// Represents a type that can be used to establish a connection to a database.
pub trait Connection {
    /// The type of the connected database.
    type Database;

    /// Establishes a connection to the database.
    fn connect(&self) -> impl std::future::Future<Output = Result<Self::Database>> + Send;
}

impl Connection for Url {
    type Database = Surreal<Any>;

    /// Connects to the database using the URL. The URL must contain the namespace and database via the `ns` and `db` query parameters.
    /// Credentials are taken from the userinfo part of the URL, if there is one.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use url::Url;
    ///
    /// let url = Url::parse("ws://root:root@localhost:8000?ns=clickmap&db=clickmap").unwrap();
    /// let db = url.connect().await.unwrap();
    /// ```
    async fn connect(&self) -> Result<Self::Database> {
        let auth = self.as_credentials()?;
        let endpoint = endpoint(self);

        let db = surrealdb::engine::any::connect(endpoint.as_str())
            .await
            .context(DatabaseConnectionSnafu {
                endpoint: endpoint.as_str(),
            })?;

        if let Some(credentials) = auth.to_raw() {
            db.signin(credentials)
                .await
                .context(DatabaseConnectionSnafu {
                    endpoint: endpoint.as_str(),
                })?;
        }

        db.use_ns(&auth.namespace)
            .use_db(&auth.database)
            .await
            .context(DatabaseConnectionSnafu {
                endpoint: endpoint.as_str(),
            })?;

        Ok(db)
    }
}

/// The address the client actually dials: the URL without its credentials and query parameters.
fn endpoint(url: &Url) -> Url {
    let mut endpoint = url.clone();
    // URLs without a host (`mem://`) cannot carry credentials in the first place.
    let _ = endpoint.set_username("");
    let _ = endpoint.set_password(None);
    endpoint.set_query(None);
    endpoint
}

/// A trait for converting a type into credentials.
pub trait AsCredentials {
    /// The associated type for the credentials.
    type Credentials;

    /// Converts the type into credentials.
    ///
    /// # Returns
    ///
    /// Returns a `Result` containing the converted credentials or an error if the conversion fails.
    fn as_credentials(&self) -> Result<Self::Credentials>;
}

impl AsCredentials for Url {
    type Credentials = Auth;

    fn as_credentials(&self) -> Result<Self::Credentials> {
        let username = self.username().to_owned();
        let password = self.password().unwrap_or("").to_owned();

        let mut query: HashMap<String, String> = self
            .query_pairs()
            .map(|(key, val)| (key.to_string(), val.to_string()))
            .collect();

        let namespace = query.remove("ns").context(NoNamespaceSnafu {
            endpoint: endpoint(self).as_str(),
        })?;

        let database = query.remove("db").context(NoDatabaseSnafu {
            endpoint: endpoint(self).as_str(),
        })?;

        Ok(Auth {
            username,
            password,
            namespace,
            database,
        })
    }
}

/// Represents authentication information for a database connection.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Auth {
    pub username: String,
    pub password: String,
    pub namespace: String,
    pub database: String,
}

impl Auth {
    /// Database-user credentials, or `None` when the URL names no user.
    pub fn to_raw(&self) -> Option<impl Credentials<Signin, Jwt> + '_> {
        if self.username.is_empty() {
            return None;
        }

        Some(auth::Database {
            username: &self.username,
            password: &self.password,
            namespace: &self.namespace,
            database: &self.database,
        })
    }
}

/// Connection attempts made at startup, the first one included.
const CONNECT_ATTEMPTS: usize = 5;

/// Delays between startup connection attempts. The first attempt happens right away.
fn connect_backoff() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(100)
        .max_delay(Duration::from_secs(5))
        .map(jitter)
        .take(CONNECT_ATTEMPTS - 1)
}

/// Represents a database wrapper.
///
/// This struct owns the connected client and guarantees the `clicks` schema has been applied.
#[derive(Debug, Clone, new)]
pub struct Database {
    database: Surreal<Any>,
}

impl Database {
    /// Connects to the database at `url` and applies the schema.
    pub async fn connect(url: &Url) -> Result<Self> {
        let database = Database::new(url.connect().await?);
        database.setup().await?;
        Ok(database)
    }

    /// Connects to the database at `url`, retrying with exponential backoff while it is unreachable.
    pub async fn connect_with_retry(url: &Url) -> Result<Self> {
        Retry::start(connect_backoff(), move || async move {
            Database::connect(url).await.inspect_err(|error| {
                tracing::warn!(%error, "could not connect to the database, retrying");
            })
        })
        .await
    }

    /// Opens a fresh in-process database with the schema applied.
    pub async fn memory() -> Result<Self> {
        let db = surrealdb::engine::any::connect(MEMORY_ENDPOINT)
            .await
            .context(DatabaseConnectionSnafu {
                endpoint: MEMORY_ENDPOINT,
            })?;

        db.use_ns("clickmap")
            .use_db("clickmap")
            .await
            .context(DatabaseConnectionSnafu {
                endpoint: MEMORY_ENDPOINT,
            })?;

        let database = Database::new(db);
        database.setup().await?;
        Ok(database)
    }

    async fn setup(&self) -> Result<()> {
        self.database
            .query(SCHEMA)
            .await
            .context(DatabaseSchemaSnafu)?
            .check()
            .context(DatabaseSchemaSnafu)?;

        tracing::debug!("applied database schema");
        Ok(())
    }

    /// Create a builder to execute arbitrary SQL code on the database.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let counters: Vec<CountryCounter> = db.sql("SELECT * FROM clicks WHERE click_count > $min")
    ///                 .bind(("min", 10))
    ///                 .fetch().await?;
    /// ```
    ///
    /// The `fetch` method can deserialize the result into either a single value (`Option<T>`) or a collection of values (`Vec<T>`).
    pub fn sql(&self, query: impl IntoQuery) -> Query<'_> {
        let query = self.database.query(query);
        Query { query }
    }
}

impl std::ops::Deref for Database {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.database
    }
}

#[derive(Debug)]
pub struct Query<'a> {
    query: surrealdb::method::Query<'a, Any>,
}

impl Query<'_> {
    pub fn bind(mut self, params: impl serde::Serialize) -> Self {
        let query = self.query;
        self.query = query.bind(params);
        self
    }

    /// Execute the query and deserialize the result of its first statement.
    pub async fn fetch<T: serde::de::DeserializeOwned>(self) -> Result<T>
    where
        usize: QueryResult<T>,
    {
        let mut statements = self
            .query
            .await
            .context(DatabaseQuerySnafu)?
            .check()
            .context(DatabaseQuerySnafu)?;

        let result = statements.take::<T>(0).context(DatabaseDeserializeSnafu)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_from_url() {
        let url = Url::parse("ws://root:secret@localhost:8000?ns=clickmap&db=production").unwrap();
        let auth = url.as_credentials().unwrap();

        assert_eq!(
            auth,
            Auth::new(
                "root".into(),
                "secret".into(),
                "clickmap".into(),
                "production".into()
            )
        );
        assert!(auth.to_raw().is_some());
    }

    #[test]
    fn anonymous_url_has_no_signin() {
        let url = Url::parse("mem://?ns=clickmap&db=clickmap").unwrap();
        let auth = url.as_credentials().unwrap();

        assert!(auth.to_raw().is_none(), "no user means no signin");
    }

    #[test]
    fn missing_namespace_or_database() {
        let url = Url::parse("ws://localhost:8000?db=clickmap").unwrap();
        assert!(matches!(
            url.as_credentials(),
            Err(DatabaseError::NoNamespace { .. })
        ));

        let url = Url::parse("ws://localhost:8000?ns=clickmap").unwrap();
        assert!(matches!(
            url.as_credentials(),
            Err(DatabaseError::NoDatabase { .. })
        ));
    }

    #[test]
    fn endpoint_drops_credentials_and_parameters() {
        let url = Url::parse("ws://root:secret@localhost:8000?ns=clickmap&db=clickmap").unwrap();
        assert_eq!(endpoint(&url).as_str(), "ws://localhost:8000/");

        let url = Url::parse("mem://?ns=clickmap&db=clickmap").unwrap();
        assert_eq!(endpoint(&url).as_str(), "mem://");
    }

    #[test]
    fn startup_connect_is_bounded() {
        let delays: Vec<Duration> = connect_backoff().collect();

        assert_eq!(delays.len() + 1, CONNECT_ATTEMPTS);
        assert!(delays.iter().all(|delay| *delay <= Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn memory_database_applies_schema() {
        let db = Database::memory().await.unwrap();

        let result = db
            .sql("CREATE clicks:AB SET country_code = 'ABC', country_name = 'Nowhere', click_count = 1")
            .fetch::<Option<serde_json::Value>>()
            .await;
        assert!(result.is_err(), "schemafull table should reject a 3 letter code");

        let result = db
            .sql("CREATE clicks:AB SET country_code = 'AB', country_name = 'Nowhere', click_count = -1")
            .fetch::<Option<serde_json::Value>>()
            .await;
        assert!(result.is_err(), "click counts cannot be negative");
    }

    #[tokio::test]
    async fn connect_through_memory_url() {
        let url = Url::parse("mem://?ns=clickmap&db=clickmap").unwrap();
        let db = Database::connect(&url).await.unwrap();

        let rows: Vec<serde_json::Value> = db.sql("SELECT * FROM clicks").fetch().await.unwrap();
        assert!(rows.is_empty());
    }
}
