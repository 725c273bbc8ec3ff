use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub trust_mode: TrustMode,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Some(Environment::Development),
            "staging" | "stage" => Some(Environment::Staging),
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }

    /// Unset or unrecognized `APP_ENV` selects production, so development
    /// trust is only ever opted into.
    fn from_app_env(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or(Environment::Production)
    }
}

/// How far the service trusts a request that carries no identity header.
///
/// Decided once at startup. `Development` substitutes the fixed development
/// identity for anonymous requests and lets authorization pass when the
/// user-role tables are missing. Nothing about the request itself can turn
/// it on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustMode {
    Strict,
    Development,
}

impl TrustMode {
    pub fn is_development(self) -> bool {
        matches!(self, TrustMode::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(TrustMode::Development),
            "strict" | "production" | "prod" => Some(TrustMode::Strict),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub enable_query_logging: bool,
    /// Run multi-statement writes (user + group memberships) in one transaction.
    pub atomic_writes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub expose_error_details: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub identity_header: String,
    pub dev_identity: DevIdentity,
}

/// Identity used for anonymous requests in development trust mode.
/// Documented and not a secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevIdentity {
    pub email: String,
    pub external_id: String,
}

impl Default for DevIdentity {
    fn default() -> Self {
        Self {
            email: "dev@localhost".to_string(),
            external_id: "dev-user".to_string(),
        }
    }
}

pub const DEFAULT_IDENTITY_HEADER: &str = "x-ms-client-principal";

impl AppConfig {
    pub fn from_env() -> Self {
        let app_env = env::var("APP_ENV").ok();
        let environment = Environment::from_app_env(app_env.as_deref());
        if let Some(v) = app_env.as_deref() {
            if Environment::parse(v).is_none() {
                tracing::warn!("Unknown APP_ENV '{}', using production defaults", v);
            }
        }

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("TRUST_MODE") {
            match TrustMode::parse(&v) {
                Some(mode) => self.trust_mode = mode,
                None => tracing::warn!("Ignoring unknown TRUST_MODE '{}'", v),
            }
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }
        if let Ok(v) = env::var("DATABASE_ATOMIC_WRITES") {
            self.database.atomic_writes = v.parse().unwrap_or(self.database.atomic_writes);
        }

        // API overrides
        if let Some(port) = env::var("API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.api.port = port;
        }
        if let Ok(v) = env::var("API_EXPOSE_ERROR_DETAILS") {
            self.api.expose_error_details = v.parse().unwrap_or(self.api.expose_error_details);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_IDENTITY_HEADER") {
            if !v.trim().is_empty() {
                self.security.identity_header = v.trim().to_ascii_lowercase();
            }
        }
        if let Ok(v) = env::var("DEV_IDENTITY_EMAIL") {
            self.security.dev_identity.email = v;
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            trust_mode: TrustMode::Development,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                enable_query_logging: true,
                atomic_writes: false,
            },
            api: ApiConfig {
                port: 7071,
                expose_error_details: true,
            },
            security: SecurityConfig {
                identity_header: DEFAULT_IDENTITY_HEADER.to_string(),
                dev_identity: DevIdentity::default(),
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            trust_mode: TrustMode::Strict,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                enable_query_logging: true,
                atomic_writes: false,
            },
            api: ApiConfig {
                port: 7071,
                expose_error_details: false,
            },
            security: SecurityConfig {
                identity_header: DEFAULT_IDENTITY_HEADER.to_string(),
                dev_identity: DevIdentity::default(),
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            trust_mode: TrustMode::Strict,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                enable_query_logging: false,
                atomic_writes: false,
            },
            api: ApiConfig {
                port: 7071,
                expose_error_details: false,
            },
            security: SecurityConfig {
                identity_header: DEFAULT_IDENTITY_HEADER.to_string(),
                dev_identity: DevIdentity::default(),
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
