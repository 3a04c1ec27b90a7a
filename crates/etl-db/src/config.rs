//! Database connection settings.

use etl_core::defaults;

use crate::pool::PoolConfig;

/// Where and how to connect to PostgreSQL.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Full connection URL.
    pub url: String,
    pub max_connections: u32,
    /// Apply bundled migrations at startup.
    pub run_migrations: bool,
}

impl DatabaseConfig {
    /// Load configuration from environment variables.
    ///
    /// `DATABASE_URL` wins when set; otherwise the URL is assembled from
    /// `POSTGRES_HOST`, `POSTGRES_PORT`, `POSTGRES_DB`, `POSTGRES_USER` and
    /// `POSTGRES_PASSWORD`. Pool size comes from `DB_MAX_CONNECTIONS` and
    /// migrations run when `ETL_RUN_MIGRATIONS=true`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| {
                let host = lookup("POSTGRES_HOST").unwrap_or_else(|| defaults::POSTGRES_HOST.into());
                let port = lookup("POSTGRES_PORT")
                    .and_then(|v| v.parse::<u16>().ok())
                    .unwrap_or(defaults::POSTGRES_PORT);
                let db = lookup("POSTGRES_DB").unwrap_or_else(|| defaults::POSTGRES_DB.into());
                let user = lookup("POSTGRES_USER").unwrap_or_else(|| defaults::POSTGRES_USER.into());
                let password = lookup("POSTGRES_PASSWORD")
                    .unwrap_or_else(|| defaults::POSTGRES_PASSWORD.into());
                format!("postgres://{}:{}@{}:{}/{}", user, password, host, port, db)
            });

        let max_connections = lookup("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults::DB_MAX_CONNECTIONS)
            .max(1);

        let run_migrations = lookup("ETL_RUN_MIGRATIONS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Self {
            url,
            max_connections,
            run_migrations,
        }
    }

    /// Pool settings derived from this configuration.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::default().with_max_connections(self.max_connections)
    }

    /// Connection URL with the password masked, for logging.
    pub fn redacted_url(&self) -> String {
        match (self.url.find("://"), self.url.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                let credentials = &self.url[scheme_end + 3..at];
                match credentials.split_once(':') {
                    Some((user, _)) => format!(
                        "{}{}:***{}",
                        &self.url[..scheme_end + 3],
                        user,
                        &self.url[at..]
                    ),
                    None => self.url.clone(),
                }
            }
            _ => self.url.clone(),
        }
    }
}
