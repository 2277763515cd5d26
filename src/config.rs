//! Process configuration.
//!
//! Read from environment variables (a `.env` file is loaded by the binary
//! first):
//!
//!   DATABASE_URL        # full url; overrides the DB_* parts below
//!   DB_USER             # required without DATABASE_URL
//!   DB_PASSWORD         # required without DATABASE_URL
//!   DB_NAME             # required without DATABASE_URL
//!   DB_HOST             # default: localhost
//!   DB_PORT             # default: 5432
//!   DB_MAX_CONNECTIONS  # default: 5
//!   JWT_SIGNING_KEY     # required, consumed by the auth layer
//!   SERVER_ADDRESS      # default: localhost:8080, consumed by the HTTP layer

use crate::error::Error;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_SERVER_ADDRESS: &str = "localhost:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database: DatabaseConfig,
    pub jwt_signing_key: String,
    pub server_address: String,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source. Empty values count as
    /// missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or_else(|| Error::Config(name.to_string()));

        let url = match get("DATABASE_URL") {
            Some(url) => url,
            None => format!(
                "postgres://{}:{}@{}:{}/{}?sslmode=disable",
                require("DB_USER")?,
                require("DB_PASSWORD")?,
                get("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
                get("DB_PORT").unwrap_or_else(|| "5432".to_string()),
                require("DB_NAME")?,
            ),
        };

        let max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| Error::Config("DB_MAX_CONNECTIONS".to_string()))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database: DatabaseConfig {
                url,
                max_connections,
            },
            jwt_signing_key: require("JWT_SIGNING_KEY")?,
            server_address: get("SERVER_ADDRESS")
                .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string()),
        })
    }
}
