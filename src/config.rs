//! Application configuration, read once from the environment at startup.

use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseProvider {
    Sqlite,
    Postgresql,
}

impl DatabaseProvider {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "sqlite" => Some(DatabaseProvider::Sqlite),
            "postgresql" | "postgres" => Some(DatabaseProvider::Postgresql),
            _ => None,
        }
    }

    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("sqlite:") {
            Some(DatabaseProvider::Sqlite)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(DatabaseProvider::Postgresql)
        } else {
            None
        }
    }
}

/// Which store implementation the server runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSelection {
    Memory,
    Sql {
        url: String,
        provider: DatabaseProvider,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("DATABASE_URL must be set in production or MOCK_PRISMA enabled")]
    MissingDatabaseUrl,
    #[error("unsupported DATABASE_PROVIDER '{0}' (expected sqlite or postgresql)")]
    UnknownProvider(String),
    #[error("cannot determine database provider from DATABASE_URL")]
    UnknownUrlScheme,
    #[error("DATABASE_PROVIDER {provider:?} does not match DATABASE_URL scheme")]
    ProviderMismatch { provider: DatabaseProvider },
    #[error("invalid PORT '{0}'")]
    InvalidPort(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub frontend_origins: Vec<String>,
    pub enable_cors: bool,
    pub store: StoreSelection,
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup, so tests don't touch process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .map(|v| Environment::parse(&v))
            .unwrap_or(Environment::Development);
        let is_production = environment == Environment::Production;

        let port = match lookup("PORT") {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            _ => 4000,
        };

        let frontend_origins = lookup("FRONTEND_ORIGIN")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                    "http://localhost:5173".to_string(),
                    "http://127.0.0.1:5173".to_string(),
                ]
            });

        let enable_cors = lookup("ENABLE_CORS")
            .map(|v| is_truthy(&v))
            .unwrap_or(!is_production);

        let mock = lookup("MOCK_PRISMA").map(|v| is_truthy(&v)).unwrap_or(false);
        let database_url = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty());

        let store = match (mock, database_url) {
            (true, _) => StoreSelection::Memory,
            (false, Some(url)) => {
                let from_url = DatabaseProvider::from_url(&url);
                let provider = match lookup("DATABASE_PROVIDER").filter(|p| !p.trim().is_empty()) {
                    Some(raw) => {
                        let provider = DatabaseProvider::parse(&raw)
                            .ok_or(ConfigError::UnknownProvider(raw))?;
                        if from_url.is_some_and(|p| p != provider) {
                            return Err(ConfigError::ProviderMismatch { provider });
                        }
                        provider
                    }
                    None => from_url.ok_or(ConfigError::UnknownUrlScheme)?,
                };
                StoreSelection::Sql { url, provider }
            }
            (false, None) if is_production => return Err(ConfigError::MissingDatabaseUrl),
            (false, None) => StoreSelection::Memory,
        };

        Ok(Self {
            environment,
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            frontend_origins,
            enable_cors,
            store,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
