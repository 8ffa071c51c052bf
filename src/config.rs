//! Console configuration.
//!
//! The registry server injects a configuration payload (title, hostname,
//! feature flags, OAuth endpoints, branding) into every page it serves.
//! Here that payload is loaded once at startup into [`ConsoleConfig`] and
//! passed by reference to whatever needs it.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default interval between notification refreshes (five minutes).
pub const DEFAULT_NOTIFICATION_INTERVAL_SECS: u64 = 300;

/// Default interval between build status refreshes.
pub const DEFAULT_BUILD_POLL_INTERVAL_SECS: u64 = 5;

/// Environment variable overriding `console.api_url`.
pub const ENV_API_URL: &str = "REGISTRY_CONSOLE_API_URL";

/// Environment variable overriding `console.token`.
pub const ENV_TOKEN: &str = "REGISTRY_CONSOLE_TOKEN";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Server-injected registry description.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Feature flags, keyed by the server's flag names (e.g. `BUILD_SUPPORT`).
    #[serde(default)]
    pub features: Features,

    /// Client-side settings that the server does not provide.
    #[serde(default)]
    pub console: ClientSettings,
}

/// Registry description as injected by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub registry_title: String,
    pub registry_title_short: String,
    pub server_hostname: Option<String>,
    pub preferred_url_scheme: String,

    /// OAuth login services, keyed by service id (e.g. `github`).
    pub oauth: HashMap<String, OAuthEndpoint>,

    pub branding: Branding,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registry_title: "Project Quay".to_string(),
            registry_title_short: "Quay".to_string(),
            server_hostname: None,
            preferred_url_scheme: "https".to_string(),
            oauth: HashMap::new(),
            branding: Branding::default(),
        }
    }
}

/// One external OAuth login service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthEndpoint {
    pub authorize_endpoint: String,
    pub client_id: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Branding overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Branding {
    pub logo: Option<String>,
    pub footer_img: Option<String>,
    pub footer_url: Option<String>,
}

/// Feature flag set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Features(HashMap<String, bool>);

impl Features {
    /// Unknown flags are disabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(false)
    }

    pub fn set(&mut self, name: impl Into<String>, enabled: bool) {
        self.0.insert(name.into(), enabled);
    }
}

/// Client-side settings. Missing keys take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Registry base URL; derived from the server hostname when absent.
    pub api_url: Option<String>,

    /// Bearer token (OAuth access token or app-specific token).
    pub token: Option<String>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Notification refresh interval in seconds.
    pub notification_interval_secs: u64,

    /// Build status refresh interval in seconds.
    pub build_poll_interval_secs: u64,

    /// Local store location; `None` keeps the default under the data dir.
    pub database_path: Option<PathBuf>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: None,
            token: None,
            timeout_secs: 30,
            notification_interval_secs: DEFAULT_NOTIFICATION_INTERVAL_SECS,
            build_poll_interval_secs: DEFAULT_BUILD_POLL_INTERVAL_SECS,
            database_path: None,
        }
    }
}

impl ConsoleConfig {
    /// Parse a configuration document.
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        serde_json::from_str(json)
            .map_err(|e| AppError::configuration(format!("Invalid configuration: {}", e)))
    }

    /// Load a configuration file and apply process environment overrides.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_json(&raw)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;

        log::info!(
            "[config] Loaded configuration for '{}' from {}",
            config.registry.registry_title,
            path.display()
        );

        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.console.api_url = Some(url);
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.is_empty()) {
            self.console.token = Some(token);
        }
    }

    /// Check the settings that have no usable default.
    pub fn validate(&self) -> Result<(), AppError> {
        self.api_base_url()?;

        if self.console.notification_interval_secs == 0 || self.console.build_poll_interval_secs == 0 {
            return Err(AppError::configuration("Poll intervals must be at least one second"));
        }

        Ok(())
    }

    /// Base URL of the registry, without a trailing slash.
    pub fn api_base_url(&self) -> Result<String, AppError> {
        if let Some(url) = &self.console.api_url {
            return Ok(url.trim_end_matches('/').to_string());
        }

        match &self.registry.server_hostname {
            Some(host) if !host.is_empty() => Ok(format!(
                "{}://{}",
                self.registry.preferred_url_scheme,
                host.trim_end_matches('/')
            )),
            _ => Err(AppError::configuration(
                "Either console.api_url or registry.server_hostname must be set",
            )),
        }
    }

    /// Logo to display, falling back to `default` when unbranded.
    pub fn enterprise_logo<'a>(&'a self, default: &'a str) -> &'a str {
        self.registry.branding.logo.as_deref().unwrap_or(default)
    }

    pub fn notification_interval(&self) -> Duration {
        Duration::from_secs(self.console.notification_interval_secs)
    }

    pub fn build_poll_interval(&self) -> Duration {
        Duration::from_secs(self.console.build_poll_interval_secs)
    }

    /// Database path, defaulting to `data_dir/registry-console.db`.
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        self.console
            .database_path
            .clone()
            .unwrap_or_else(|| crate::db::get_db_path(data_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_PAYLOAD: &str = r#"{
        "registry": {
            "registry_title": "Acme Registry",
            "registry_title_short": "Acme",
            "server_hostname": "registry.acme.test/",
            "preferred_url_scheme": "https",
            "oauth": {
                "github": {
                    "authorize_endpoint": "https://github.com/login/oauth/authorize",
                    "client_id": "abc"
                }
            },
            "branding": { "logo": "/static/img/acme.svg" }
        },
        "features": { "BUILD_SUPPORT": true, "BILLING": false }
    }"#;

    #[test]
    fn test_default_settings() {
        let config = ConsoleConfig::default();
        assert_eq!(config.console.notification_interval_secs, 300);
        assert_eq!(config.console.timeout_secs, 30);
        assert!(config.api_base_url().is_err());
    }

    #[test]
    fn test_parse_page_payload() {
        let config = ConsoleConfig::from_json(PAGE_PAYLOAD).unwrap();
        assert_eq!(config.registry.registry_title, "Acme Registry");
        assert!(config.features.is_enabled("BUILD_SUPPORT"));
        assert!(!config.features.is_enabled("BILLING"));
        assert!(!config.features.is_enabled("UNKNOWN_FLAG"));
        assert_eq!(config.registry.oauth["github"].client_id, "abc");
        assert_eq!(config.api_base_url().unwrap(), "https://registry.acme.test");
        assert_eq!(config.enterprise_logo("/static/img/quay.png"), "/static/img/acme.svg");
    }

    #[test]
    fn test_env_overrides_take_precedence() {
        let mut config = ConsoleConfig::from_json(PAGE_PAYLOAD).unwrap();
        config.apply_env(|key| match key {
            ENV_API_URL => Some("http://localhost:8080/".to_string()),
            ENV_TOKEN => Some("secret".to_string()),
            _ => None,
        });

        assert_eq!(config.api_base_url().unwrap(), "http://localhost:8080");
        assert_eq!(config.console.token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_empty_env_values_ignored() {
        let mut config = ConsoleConfig::from_json(PAGE_PAYLOAD).unwrap();
        config.apply_env(|_| Some(String::new()));
        assert!(config.console.api_url.is_none());
        assert!(config.console.token.is_none());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config = ConsoleConfig::from_json(
            r#"{
                "registry": { "registry_title": "Acme Registry" },
                "console": { "api_url": "http://localhost:8080", "token": "t" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.registry.registry_title, "Acme Registry");
        assert_eq!(config.registry.registry_title_short, "Quay");
        assert_eq!(config.registry.preferred_url_scheme, "https");
        assert_eq!(config.console.token.as_deref(), Some("t"));
        assert_eq!(config.console.timeout_secs, 30);
        assert_eq!(config.notification_interval(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = ConsoleConfig::from_json(PAGE_PAYLOAD).unwrap();
        config.console.notification_interval_secs = 0;
        assert!(matches!(config.validate(), Err(AppError::Configuration { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, PAGE_PAYLOAD).unwrap();

        let config = ConsoleConfig::load(&path).unwrap();
        assert_eq!(config.registry.registry_title_short, "Acme");
        assert_eq!(
            config.database_path(dir.path()),
            dir.path().join("registry-console.db")
        );
    }
}
