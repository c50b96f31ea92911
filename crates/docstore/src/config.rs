//! Connection configuration

use crate::driver::DatabaseType;
use crate::{DocStoreError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default dial timeout in milliseconds
pub const DEFAULT_DIAL_TIMEOUT_MS: u64 = 60_000;

fn default_dial_timeout_ms() -> u64 {
    DEFAULT_DIAL_TIMEOUT_MS
}

/// Connection parameters consumed once by a [`Driver`](crate::Driver)
///
/// When `uri` is set it wins over the structured fields; otherwise the
/// hosts, credentials and auth database are assembled into a dial descriptor.
///
/// # Example
///
/// ```
/// use docstore::Config;
///
/// let config = Config::mongodb("localhost:27017", "app")
///     .with_credentials("app_user", "secret")
///     .with_auth_database("admin");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Database type tag, e.g. `"mongodb"`
    pub db_type: String,
    /// Comma separated `host:port` list
    #[serde(default)]
    pub hosts: String,
    /// Target database name
    pub database: String,
    /// Database holding the user's credentials; empty means `database`
    #[serde(default)]
    pub auth_database: String,
    /// Username, empty for unauthenticated access
    #[serde(default)]
    pub username: String,
    /// Password
    #[serde(default)]
    pub password: String,
    /// Full connection string, used instead of the structured fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Dial timeout in milliseconds
    #[serde(default = "default_dial_timeout_ms")]
    pub dial_timeout_ms: u64,
    /// Application name reported to the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
}

impl Config {
    /// Structured MongoDB configuration for `hosts` and `database`
    pub fn mongodb(hosts: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            db_type: DatabaseType::MongoDb.to_string(),
            hosts: hosts.into(),
            database: database.into(),
            auth_database: String::new(),
            username: String::new(),
            password: String::new(),
            uri: None,
            dial_timeout_ms: DEFAULT_DIAL_TIMEOUT_MS,
            app_name: None,
        }
    }

    /// MongoDB configuration dialed from a connection string
    pub fn mongodb_uri(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Self::mongodb("", database)
        }
    }

    /// Set username and password
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the authentication database
    pub fn with_auth_database(mut self, auth_database: impl Into<String>) -> Self {
        self.auth_database = auth_database.into();
        self
    }

    /// Override the dial timeout, kept to millisecond precision
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the application name
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    /// Override the database type tag
    pub fn with_db_type(mut self, db_type: impl Into<String>) -> Self {
        self.db_type = db_type.into();
        self
    }

    /// Dial timeout as a duration
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    /// Hosts split on commas, trimmed, empties dropped
    pub fn host_list(&self) -> Vec<String> {
        self.hosts
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Database used to authenticate the credentials
    pub fn auth_source(&self) -> &str {
        if self.auth_database.is_empty() {
            &self.database
        } else {
            &self.auth_database
        }
    }

    /// Check the configuration is dialable
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(DocStoreError::config("database name is required"));
        }

        let has_uri = self.uri.as_deref().is_some_and(|u| !u.trim().is_empty());
        if !has_uri && self.host_list().is_empty() {
            return Err(DocStoreError::config(
                "either a connection uri or at least one host is required",
            ));
        }

        if self.username.is_empty() && !self.password.is_empty() {
            return Err(DocStoreError::config("password given without a username"));
        }

        if self.dial_timeout_ms == 0 {
            return Err(DocStoreError::config("dial timeout must be positive"));
        }

        Ok(())
    }
}
