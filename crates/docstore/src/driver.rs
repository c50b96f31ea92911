//! Driver selection and dialing
//!
//! A [`Driver`] turns a [`Config`] into a live [`Connection`]. Backends are
//! selected by their database type tag; only MongoDB is implemented.

use crate::connection::Connection;
use crate::{Config, DocStoreError, Result};
use async_trait::async_trait;
use mongodb::{
    bson::doc,
    options::{ClientOptions, Credential, ServerAddress},
    Client,
};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Database type tags understood by the factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseType {
    /// MongoDB
    MongoDb,
    /// MySQL (recognised, not implemented)
    MySql,
    /// SQLite (recognised, not implemented)
    Sqlite,
}

impl DatabaseType {
    /// Tag string for this type
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::MongoDb => "mongodb",
            DatabaseType::MySql => "mysql",
            DatabaseType::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseType {
    type Err = DocStoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongodb" => Ok(DatabaseType::MongoDb),
            "mysql" => Ok(DatabaseType::MySql),
            "sqlite" => Ok(DatabaseType::Sqlite),
            _ => Err(DocStoreError::invalid_database_type(s)),
        }
    }
}

/// A backend able to dial a connection
#[async_trait]
pub trait Driver: Send + Sync {
    /// The database type this driver serves
    fn database_type(&self) -> DatabaseType;

    /// Dial the database described by `config`
    async fn connect(&self, config: &Config) -> Result<Connection>;
}

/// Select a driver by its tag
///
/// Unknown tags, and tags whose backend is not implemented, fail with
/// [`DocStoreError::InvalidDriver`].
pub fn init(driver: &str) -> Result<Box<dyn Driver>> {
    match driver.parse::<DatabaseType>() {
        Ok(DatabaseType::MongoDb) => Ok(Box::new(MongoDriver)),
        _ => Err(DocStoreError::invalid_driver(driver)),
    }
}

/// Select the driver named by `config.db_type` and dial it
///
/// Unknown tags fail with [`DocStoreError::InvalidDatabaseType`]; recognised
/// tags without a backend fail with [`DocStoreError::InvalidDriver`].
pub async fn connect(config: &Config) -> Result<Connection> {
    config.db_type.parse::<DatabaseType>()?;
    init(&config.db_type)?.connect(config).await
}

/// MongoDB driver
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoDriver;

impl MongoDriver {
    /// Build client options from a config, without touching the network
    ///
    /// A connection string is used as-is when present; otherwise the hosts,
    /// credentials and auth database become a structured descriptor. The
    /// dial timeout fills in any timeout the connection string left unset.
    pub async fn client_options(config: &Config) -> Result<ClientOptions> {
        let timeout = config.dial_timeout();

        let mut options = match config.uri.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(uri) => ClientOptions::parse(uri)
                .await
                .map_err(DocStoreError::Connection)?,
            None => Self::structured_options(config)?,
        };

        options.connect_timeout.get_or_insert(timeout);
        options.server_selection_timeout.get_or_insert(timeout);
        if options.default_database.is_none() {
            options.default_database = Some(config.database.clone());
        }
        if options.app_name.is_none() {
            options.app_name = config.app_name.clone();
        }

        Ok(options)
    }

    fn structured_options(config: &Config) -> Result<ClientOptions> {
        let hosts = config
            .host_list()
            .iter()
            .map(|host| {
                ServerAddress::parse(host)
                    .map_err(|e| DocStoreError::config(format!("Invalid host '{}': {}", host, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut options = ClientOptions::default();
        options.hosts = hosts;

        if !config.username.is_empty() {
            let mut credential = Credential::default();
            credential.username = Some(config.username.clone());
            credential.password = Some(config.password.clone());
            credential.source = Some(config.auth_source().to_string());
            options.credential = Some(credential);
        }

        Ok(options)
    }
}

#[async_trait]
impl Driver for MongoDriver {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MongoDb
    }

    async fn connect(&self, config: &Config) -> Result<Connection> {
        if config.db_type.parse::<DatabaseType>()? != DatabaseType::MongoDb {
            return Err(DocStoreError::invalid_database_type(&config.db_type));
        }
        config.validate()?;

        info!("Connecting to MongoDB database: {}", config.database);

        let options = Self::client_options(config).await?;
        let client = Client::with_options(options).map_err(DocStoreError::Connection)?;

        // Ping so dial and auth failures surface here rather than on first use
        client
            .database(&config.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(DocStoreError::Connection)?;

        debug!("Ping to {} succeeded", config.database);
        info!("Successfully connected to MongoDB");

        Ok(Connection::new(client, &config.database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_database_type_tags() {
        assert_eq!("mongodb".parse::<DatabaseType>().unwrap(), DatabaseType::MongoDb);
        assert_eq!("MySQL".parse::<DatabaseType>().unwrap(), DatabaseType::MySql);
        assert_eq!(DatabaseType::Sqlite.to_string(), "sqlite");

        let err = "oracle".parse::<DatabaseType>().unwrap_err();
        assert!(matches!(err, DocStoreError::InvalidDatabaseType(_)));
    }

    #[test]
    fn test_init_selects_mongo() {
        let driver = init("mongodb").unwrap();
        assert_eq!(driver.database_type(), DatabaseType::MongoDb);
    }

    #[test]
    fn test_init_rejects_unimplemented_and_unknown() {
        assert!(matches!(init("mysql"), Err(DocStoreError::InvalidDriver(_))));
        assert!(matches!(init("sqlite"), Err(DocStoreError::InvalidDriver(_))));
        assert!(matches!(init("cassandra"), Err(DocStoreError::InvalidDriver(_))));
    }

    #[tokio::test]
    async fn test_connect_unknown_tag_is_invalid_database_type() {
        let config = Config::mongodb("localhost:27017", "db").with_db_type("oracle");
        let err = connect(&config).await.unwrap_err();
        assert!(matches!(err, DocStoreError::InvalidDatabaseType(_)));

        let config = Config::mongodb("localhost:27017", "db").with_db_type("sqlite");
        let err = connect(&config).await.unwrap_err();
        assert!(matches!(err, DocStoreError::InvalidDriver(_)));
    }

    #[tokio::test]
    async fn test_connect_rejects_wrong_database_type() {
        let config = Config::mongodb("localhost:27017", "db").with_db_type("mysql");
        let err = MongoDriver.connect(&config).await.unwrap_err();
        assert!(matches!(err, DocStoreError::InvalidDatabaseType(_)));

        let config = Config::mongodb("localhost:27017", "db").with_db_type("nope");
        let err = MongoDriver.connect(&config).await.unwrap_err();
        assert!(matches!(err, DocStoreError::InvalidDatabaseType(_)));
    }

    #[tokio::test]
    async fn test_structured_options() {
        let config = Config::mongodb("db1:27017,db2:27018", "app")
            .with_credentials("user", "pass")
            .with_auth_database("admin")
            .with_dial_timeout(Duration::from_millis(1500));

        let options = MongoDriver::client_options(&config).await.unwrap();
        assert_eq!(options.hosts.len(), 2);
        assert_eq!(options.connect_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(options.server_selection_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(options.default_database.as_deref(), Some("app"));

        let credential = options.credential.unwrap();
        assert_eq!(credential.username.as_deref(), Some("user"));
        assert_eq!(credential.source.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_structured_options_without_credentials() {
        let config = Config::mongodb("localhost:27017", "app");
        let options = MongoDriver::client_options(&config).await.unwrap();
        assert!(options.credential.is_none());
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_uri_options_keep_explicit_timeouts() {
        let config = Config::mongodb_uri(
            "mongodb://localhost:27017/?connectTimeoutMS=2000",
            "app",
        );
        let options = MongoDriver::client_options(&config).await.unwrap();
        assert_eq!(options.connect_timeout, Some(Duration::from_millis(2000)));
        assert_eq!(options.server_selection_timeout, Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_dial_failure_surfaces_connection_error() {
        let config =
            Config::mongodb("127.0.0.1:1", "app").with_dial_timeout(Duration::from_millis(500));
        let err = connect(&config).await.unwrap_err();
        assert!(matches!(err, DocStoreError::Connection(_)));
    }
}
