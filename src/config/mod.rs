use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::IpAddr;
use std::path::Path;

use crate::audit::{AuditConfig, AuditLevel};
use crate::rate_limit::RateLimitSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub rate_limits: RateLimitSettings,
    pub security: SecurityConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_rate_limiting: bool,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    /// Explicit allow-list; there is no wildcard
    pub cors_origins: Vec<String>,
    pub require_https: bool,
    pub csrf_enabled: bool,
    /// Paths that may be reached without a bearer token when their policy names no role,
    /// permission or predicate
    pub anonymous_paths: Vec<String>,
    pub content_security_policy: String,
    /// Peers whose `X-Forwarded-For` / `X-Real-IP` headers are believed. Empty means the
    /// socket address is always the client address.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

const DEFAULT_CSP: &str = "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; \
img-src 'self' data: https:; font-src 'self' data:; connect-src 'self'; frame-ancestors 'none'; \
base-uri 'self'; form-action 'self'";

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Profile defaults, then the optional YAML file, then specific env vars
        let profile = Self::for_environment(environment);
        let profile = match env::var("AGENCY_CONFIG_FILE") {
            Ok(path) => match profile.clone().with_yaml_file(Path::new(&path)) {
                Ok(merged) => merged,
                Err(e) => {
                    tracing::warn!("ignoring config file {}: {}", path, e);
                    profile
                }
            },
            Err(_) => profile,
        };
        profile.with_env_overrides()
    }

    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    pub fn with_yaml_file(self, path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        self.with_yaml_overlay(&text)
    }

    /// Deep-merge a partial YAML document over this config. Keys absent from
    /// the overlay keep their current values.
    pub fn with_yaml_overlay(self, yaml: &str) -> anyhow::Result<Self> {
        let overlay: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let mut base = serde_yaml::to_value(&self)?;
        merge_yaml(&mut base, overlay);
        Ok(serde_yaml::from_value(base)?)
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }
        if let Ok(v) = env::var("SECURITY_REQUIRE_HTTPS") {
            self.security.require_https = v.parse().unwrap_or(self.security.require_https);
        }
        if let Ok(v) = env::var("SECURITY_CSRF_ENABLED") {
            self.security.csrf_enabled = v.parse().unwrap_or(self.security.csrf_enabled);
        }
        if let Ok(v) = env::var("SECURITY_ANONYMOUS_PATHS") {
            self.security.anonymous_paths = split_list(&v);
        }
        if let Ok(v) = env::var("SECURITY_TRUSTED_PROXIES") {
            self.security.trusted_proxies = split_list(&v)
                .iter()
                .filter_map(|ip| match ip.parse() {
                    Ok(addr) => Some(addr),
                    Err(_) => {
                        tracing::warn!("ignoring trusted proxy '{}': not an IP address", ip);
                        None
                    }
                })
                .collect();
        }

        // Audit overrides
        if let Ok(v) = env::var("AUDIT_ENABLED") {
            self.audit.enabled = v.parse().unwrap_or(self.audit.enabled);
        }
        if let Ok(v) = env::var("AUDIT_LEVEL") {
            match v.to_ascii_lowercase().as_str() {
                "minimal" => self.audit.level = AuditLevel::Minimal,
                "standard" => self.audit.level = AuditLevel::Standard,
                "verbose" => self.audit.level = AuditLevel::Verbose,
                other => tracing::warn!("unknown AUDIT_LEVEL '{}', keeping {:?}", other, self.audit.level),
            }
        }
        if let Ok(v) = env::var("AUDIT_MAX_QUERY_RESULTS") {
            self.audit.max_query_results = v.parse().unwrap_or(self.audit.max_query_results);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
                enable_query_logging: true,
            },
            api: ApiConfig {
                enable_rate_limiting: false,
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            rate_limits: RateLimitSettings::default(),
            security: SecurityConfig {
                jwt_secret: "development-only-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                require_https: false,
                csrf_enabled: true,
                anonymous_paths: vec!["/api/inquiries".to_string()],
                content_security_policy: DEFAULT_CSP.to_string(),
                trusted_proxies: Vec::new(),
            },
            audit: AuditConfig {
                level: AuditLevel::Verbose,
                ..AuditConfig::default()
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                enable_query_logging: true,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            rate_limits: RateLimitSettings::default(),
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                cors_origins: vec!["https://staging.example.com".to_string()],
                require_https: true,
                csrf_enabled: true,
                anonymous_paths: vec!["/api/inquiries".to_string()],
                content_security_policy: DEFAULT_CSP.to_string(),
                trusted_proxies: Vec::new(),
            },
            audit: AuditConfig::default(),
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                enable_query_logging: false,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            rate_limits: RateLimitSettings::default(),
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 8,
                cors_origins: vec!["https://app.example.com".to_string()],
                require_https: true,
                csrf_enabled: true,
                anonymous_paths: vec!["/api/inquiries".to_string()],
                content_security_policy: DEFAULT_CSP.to_string(),
                trusted_proxies: Vec::new(),
            },
            audit: AuditConfig::default(),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn merge_yaml(base: &mut serde_yaml::Value, overlay: serde_yaml::Value) {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(base_map), serde_yaml::Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
