use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

use crate::filter::FilterOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub filter: FilterConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Mount point for every route, always starting with `/`.
    pub base: String,
    pub read_only: bool,
    /// Installs a permissive CORS layer.
    pub disable_cors: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    /// Database name swapped into the path of `url`.
    pub name: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub allow_raw: bool,
    pub max_limit: Option<usize>,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_key: Option<String>,
    pub auth_token: Option<String>,
    /// Space-separated substrings; a request whose path and query contains one skips the gate.
    pub exclude: Vec<String>,
    pub session_expiry_secs: u64,
    pub recovery_expiry_secs: u64,
    pub google_client_id: Option<String>,
    pub activation_code_digits: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub relay_url: Option<String>,
    pub from: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("BASE") {
            self.server.base = normalize_base(&v);
        }
        if let Ok(v) = env::var("READ_ONLY") {
            self.server.read_only = read_only_flag(&v);
        }
        if let Ok(v) = env::var("DISABLE_CORS") {
            self.server.disable_cors = v == "true";
        }

        // Database overrides
        if let Ok(v) = env::var("STORE") {
            self.database.backend = v.parse().unwrap_or(self.database.backend);
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = non_empty(v);
        }
        if let Ok(v) = env::var("DB") {
            self.database.name = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }

        // Filter overrides
        if let Ok(v) = env::var("FILTER_ALLOW_RAW") {
            self.filter.allow_raw = v.parse().unwrap_or(self.filter.allow_raw);
        }
        if let Ok(v) = env::var("FILTER_MAX_LIMIT") {
            self.filter.max_limit = v.parse().ok();
        }
        if let Ok(v) = env::var("FILTER_DEBUG_LOGGING") {
            self.filter.debug_logging = v.parse().unwrap_or(self.filter.debug_logging);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_KEY") {
            self.security.jwt_key = non_empty(v);
        }
        if let Ok(v) = env::var("AUTH_TOKEN") {
            self.security.auth_token = non_empty(v);
        }
        if let Ok(v) = env::var("EXCLUDE") {
            self.security.exclude = v.split(' ').filter(|s| !s.is_empty()).map(str::to_string).collect();
        }
        if let Ok(v) = env::var("SESSION_EXPIRY_SECS") {
            self.security.session_expiry_secs = v.parse().unwrap_or(self.security.session_expiry_secs);
        }
        if let Ok(v) = env::var("RECOVERY_EXPIRY_SECS") {
            self.security.recovery_expiry_secs = v.parse().unwrap_or(self.security.recovery_expiry_secs);
        }
        if let Ok(v) = env::var("GOOGLE_CLIENT_ID") {
            self.security.google_client_id = non_empty(v);
        }
        if let Ok(v) = env::var("ACTIVATION_CODE_DIGITS") {
            self.security.activation_code_digits = v.parse().unwrap_or(self.security.activation_code_digits);
        }

        // Mail overrides
        if let Ok(v) = env::var("MAIL_RELAY_URL") {
            self.mail.relay_url = non_empty(v);
        }
        if let Ok(v) = env::var("SMTP_FROM") {
            self.mail.from = v;
        }

        self
    }

    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            max_limit: self.filter.max_limit,
            allow_raw: self.filter.allow_raw,
            debug_logging: self.filter.debug_logging,
        }
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 8000,
                base: "/".to_string(),
                read_only: false,
                disable_cors: false,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Memory,
                url: None,
                name: "test".to_string(),
                max_connections: 10,
            },
            filter: FilterConfig {
                allow_raw: true,
                max_limit: Some(1000),
                debug_logging: true,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                jwt_key: None,
                auth_token: None,
                exclude: vec![],
                session_expiry_secs: 60 * 60 * 4,
                recovery_expiry_secs: 60 * 4,
                google_client_id: None,
                activation_code_digits: 6,
            },
            mail: MailConfig {
                relay_url: None,
                from: "no-reply@localhost".to_string(),
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database.backend = StoreBackend::Postgres;
        config.database.max_connections = 20;
        config.filter = FilterConfig {
            allow_raw: true,
            max_limit: Some(500),
            debug_logging: false,
        };
        config.api.max_request_size_bytes = 5 * 1024 * 1024; // 5MB
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.database.backend = StoreBackend::Postgres;
        config.database.max_connections = 50;
        config.filter = FilterConfig {
            allow_raw: false,
            max_limit: Some(100),
            debug_logging: false,
        };
        config.api = ApiConfig {
            enable_request_logging: false,
            max_request_size_bytes: 2 * 1024 * 1024, // 2MB
        };
        config
    }
}

fn non_empty(v: String) -> Option<String> {
    if v.trim().is_empty() {
        None
    } else {
        Some(v)
    }
}

/// `api/` and `/api/` both become `/api`; empty becomes `/`.
pub fn normalize_base(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Anything but `no` (in any case) mounts the read-only routes.
fn read_only_flag(value: &str) -> bool {
    !value.trim().eq_ignore_ascii_case("no")
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.base, "/");
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert_eq!(config.security.session_expiry_secs, 14_400);
        assert_eq!(config.security.recovery_expiry_secs, 240);
        assert!(config.filter.allow_raw);
    }

    #[test]
    fn test_read_only_flag_ignores_case() {
        assert!(!read_only_flag("no"));
        assert!(!read_only_flag("NO"));
        assert!(!read_only_flag("No"));
        assert!(read_only_flag("yes"));
        assert!(read_only_flag(""));
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.filter.allow_raw);
        assert_eq!(config.filter.max_limit, Some(100));
        assert_eq!(config.database.backend, StoreBackend::Postgres);
    }

    #[test]
    fn normalizes_base_paths() {
        assert_eq!(normalize_base(""), "/");
        assert_eq!(normalize_base("/"), "/");
        assert_eq!(normalize_base("api/"), "/api");
        assert_eq!(normalize_base("/v1/data"), "/v1/data");
    }

    #[test]
    fn parses_store_backends() {
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("Postgres".parse::<StoreBackend>(), Ok(StoreBackend::Postgres));
        assert!("mongo".parse::<StoreBackend>().is_err());
    }
}
