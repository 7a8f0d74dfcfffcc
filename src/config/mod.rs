use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub features: FeaturesConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Defaults and bounds for list requests (page, limit, sort, fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    pub default_page: u64,
    pub default_limit: u64,
    pub max_limit: u64,
    pub default_sort: String,
    pub hidden_fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres URL; the in-memory store is used when unset
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    /// JSON array of documents loaded into the in-memory store at startup
    pub seed_file: Option<String>,
    pub enable_slow_query_warning: bool,
    pub slow_query_threshold_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
    pub sanitize_mode: SanitizeMode,
}

/// How string values in JSON request bodies are sanitized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SanitizeMode {
    /// HTML-escape markup characters
    Escape,
    /// Remove tags entirely
    Strip,
    Off,
}

impl SanitizeMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "escape" => Some(SanitizeMode::Escape),
            "strip" => Some(SanitizeMode::Strip),
            "off" | "none" | "false" => Some(SanitizeMode::Off),
            _ => None,
        }
    }
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
        if let Ok(v) = env::var("HOST") {
            self.server.host = v;
        }
        if let Some(port) = env::var("MOVIES_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }

        // Features overrides
        if let Ok(v) = env::var("FEATURES_DEFAULT_LIMIT") {
            self.features.default_limit = v.parse().unwrap_or(self.features.default_limit);
        }
        if let Ok(v) = env::var("FEATURES_MAX_LIMIT") {
            self.features.max_limit = v.parse().unwrap_or(self.features.max_limit);
        }
        if let Ok(v) = env::var("FEATURES_DEFAULT_SORT") {
            if !v.trim().is_empty() {
                self.features.default_sort = v;
            }
        }
        if let Ok(v) = env::var("FEATURES_HIDDEN_FIELDS") {
            self.features.hidden_fields = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v).filter(|s| !s.trim().is_empty());
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_SEED_FILE") {
            self.database.seed_file = Some(v).filter(|s| !s.trim().is_empty());
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_SLOW_QUERY_WARNING") {
            self.database.enable_slow_query_warning = v.parse().unwrap_or(self.database.enable_slow_query_warning);
        }
        if let Ok(v) = env::var("DATABASE_SLOW_QUERY_THRESHOLD_MS") {
            self.database.slow_query_threshold_ms = v.parse().unwrap_or(self.database.slow_query_threshold_ms);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }
        if let Ok(v) = env::var("API_SANITIZE_MODE") {
            self.api.sanitize_mode = SanitizeMode::parse(&v).unwrap_or(self.api.sanitize_mode);
        }

        self
    }

    fn features(max_limit: u64) -> FeaturesConfig {
        FeaturesConfig {
            default_page: 1,
            default_limit: 100,
            max_limit,
            default_sort: "-createdAt".to_string(),
            hidden_fields: vec!["__v".to_string()],
        }
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { host: "0.0.0.0".to_string(), port: 3000 },
            features: Self::features(1000),
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                seed_file: None,
                enable_slow_query_warning: true,
                slow_query_threshold_ms: 100,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
                sanitize_mode: SanitizeMode::Escape,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig { host: "0.0.0.0".to_string(), port: 3000 },
            features: Self::features(500),
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                seed_file: None,
                enable_slow_query_warning: true,
                slow_query_threshold_ms: 500,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
                sanitize_mode: SanitizeMode::Escape,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { host: "0.0.0.0".to_string(), port: 3000 },
            features: Self::features(100),
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                seed_file: None,
                enable_slow_query_warning: true,
                slow_query_threshold_ms: 1000,
            },
            api: ApiConfig {
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
                sanitize_mode: SanitizeMode::Escape,
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
