//! MySQL access for the letter status table.

use std::fmt;

use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};

pub mod repositories;

pub type DbPool = sqlx::MySqlPool;

/// Default MySQL port.
pub const DEFAULT_PORT: u16 = 3306;

/// Connections kept by the worker's pool. Jobs run one at a time, so a
/// small pool suffices.
const MAX_CONNECTIONS: u32 = 2;

/// Connection settings for the status database.
#[derive(Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl DbConfig {
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
    }
}

/// Create a connection pool for the status database.
pub async fn create_pool(config: &DbConfig) -> Result<DbPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(config.connect_options())
        .await
}

/// Verify the pool can reach the database.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
