//! Settings structures for storefront configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main settings structure matching settings.yml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub outgoing: OutgoingSettings,
    pub backend: BackendSettings,
    pub catalog: CatalogSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Merge with environment variables (STOREFRONT_* prefix)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("STOREFRONT_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("STOREFRONT_BIND_ADDRESS") {
            self.server.bind_address = val;
        }
        if let Ok(val) = std::env::var("STOREFRONT_BACKEND") {
            match val.as_str() {
                "memory" => self.backend.kind = BackendKind::Memory,
                "firebase" => self.backend.kind = BackendKind::Firebase,
                other => tracing::warn!("Ignoring unknown STOREFRONT_BACKEND value: {}", other),
            }
        }
        if let Ok(val) = std::env::var("STOREFRONT_PROJECT_ID") {
            self.backend.project_id = val;
        }
        if let Ok(val) = std::env::var("STOREFRONT_API_KEY") {
            self.backend.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("STOREFRONT_ACCESS_TOKEN") {
            self.backend.access_token = Some(val);
        }
        if let Ok(val) = std::env::var("STOREFRONT_FIRESTORE_URL") {
            self.backend.firestore_url = val;
        }
        if let Ok(val) = std::env::var("STOREFRONT_IDENTITY_URL") {
            self.backend.identity_url = val;
        }
        if let Ok(val) = std::env::var("STOREFRONT_SEED_FILE") {
            self.backend.seed_file = Some(PathBuf::from(val));
        }
    }
}

/// Inbound server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server port
    pub port: u16,
    /// Bind address
    pub bind_address: String,
    /// Upper bound on handling a single request, in seconds
    pub request_timeout: f64,
    /// Allow any origin (the storefront frontend is usually served elsewhere)
    pub permissive_cors: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "127.0.0.1".to_string(),
            request_timeout: 15.0,
            permissive_cors: true,
        }
    }
}

/// Outgoing request settings shared by the store and identity clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Default request timeout in seconds
    pub request_timeout: f64,
    /// Max idle connections kept per host
    pub pool_maxsize: usize,
    /// Proxy for all outgoing traffic
    pub proxy: Option<String>,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: crate::DEFAULT_TIMEOUT as f64,
            pool_maxsize: 20,
            proxy: None,
        }
    }
}

/// Which backend implementation to wire in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-process store and account provider, optionally seeded from a file
    #[default]
    Memory,
    /// Firestore REST + Identity Toolkit REST
    Firebase,
}

/// Document store and identity provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub kind: BackendKind,
    /// Cloud project that owns the database and the user pool
    pub project_id: String,
    /// Database name within the project
    pub database: String,
    /// Web API key, sent as `?key=`
    pub api_key: Option<String>,
    /// OAuth access token for the store, sent as a bearer header
    pub access_token: Option<String>,
    /// Firestore REST base, override to point at an emulator
    pub firestore_url: String,
    /// Identity Toolkit REST base
    pub identity_url: String,
    /// JSON seed for the memory backend
    pub seed_file: Option<PathBuf>,
    /// Fixed bearer tokens accepted by the memory backend (token -> uid)
    pub static_tokens: HashMap<String, String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: BackendKind::Memory,
            project_id: String::new(),
            database: "(default)".to_string(),
            api_key: None,
            access_token: None,
            firestore_url: "https://firestore.googleapis.com/v1".to_string(),
            identity_url: "https://identitytoolkit.googleapis.com/v1".to_string(),
            seed_file: None,
            static_tokens: HashMap::new(),
        }
    }
}

/// Product catalog behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub products_collection: String,
    pub categories_collection: String,
    /// Page size when the request does not give one
    pub default_page_size: u32,
    /// Requests asking for more are clamped to this
    pub max_page_size: u32,
    /// Highest page number accepted
    pub max_page: u32,
    /// Fuzzy title match threshold, 0.0 = exact, 1.0 = anything
    pub search_threshold: f64,
    /// Characters into a title at which a match costs as much as a full miss
    pub search_distance: usize,
    /// Numeric product ids shorter than this are zero padded (0 disables)
    pub id_pad_width: usize,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            products_collection: "products".to_string(),
            categories_collection: "categories".to_string(),
            default_page_size: 20,
            max_page_size: 100,
            max_page: 1000,
            search_threshold: 0.4,
            search_distance: 100,
            id_pad_width: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.backend.kind, BackendKind::Memory);
        assert_eq!(settings.catalog.default_page_size, 20);
        assert_eq!(settings.catalog.search_threshold, 0.4);
        assert_eq!(settings.catalog.search_distance, 100);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
backend:
  kind: firebase
  project_id: shop-123
catalog:
  max_page_size: 50
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.backend.kind, BackendKind::Firebase);
        assert_eq!(settings.backend.project_id, "shop-123");
        assert_eq!(settings.backend.database, "(default)");
        assert_eq!(settings.catalog.max_page_size, 50);
        assert_eq!(settings.catalog.default_page_size, 20);
        assert_eq!(settings.server.port, 3000);
    }

    #[test]
    fn test_static_tokens_yaml() {
        let yaml = r#"
backend:
  static_tokens:
    dev-token: user-1
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            settings.backend.static_tokens.get("dev-token").map(String::as_str),
            Some("user-1")
        );
    }
}
