//! SurrealDB connection management.

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::schema::{SchemaVersion, run_migrations};

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket URL (e.g., `127.0.0.1:8000`).
    pub url: String,
    /// SurrealDB namespace.
    pub namespace: String,
    /// SurrealDB database name.
    pub database: String,
    /// Root username for authentication.
    pub username: String,
    /// Root password for authentication.
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "montage".into(),
            database: "portal".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl DbConfig {
    /// Reject settings that would only fail once connected.
    pub fn validate(&self) -> Result<(), DbError> {
        let required = [
            ("url", &self.url),
            ("namespace", &self.namespace),
            ("database", &self.database),
            ("username", &self.username),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DbError::Config(format!("{field} must not be empty")));
            }
        }
        if self.url.contains("://") {
            return Err(DbError::Config(format!(
                "url {} must be host:port without a scheme",
                self.url
            )));
        }
        Ok(())
    }
}

/// Manages a connection to SurrealDB.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Open the portal database as root.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        config.validate()?;

        let db = Surreal::new::<Ws>(&config.url).await?;
        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Portal database connected"
        );
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> Result<SchemaVersion, DbError> {
        run_migrations(&self.db).await
    }
}
