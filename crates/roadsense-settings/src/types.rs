//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` to match the JSON
//! settings file, and `#[serde(default)]` so partial files deep-merge over
//! compiled defaults.

use serde::{Deserialize, Serialize};

/// Root settings for the Roadsense relay.
///
/// Loaded from `~/.roadsense/settings.json` (or `--config`) with defaults
/// applied for missing fields; `ROADSENSE_*` environment variables override
/// individual values last.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoadsenseSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Listener network settings.
    pub server: ServerSettings,
    /// Storage collaborator settings (road rows, measurement rows).
    pub storage: StorageSettings,
    /// Routing-proxy upstream settings.
    pub routing: RoutingSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for RoadsenseSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "roadsense".to_string(),
            server: ServerSettings::default(),
            storage: StorageSettings::default(),
            routing: RoutingSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// HTTP/WebSocket listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (HTTP and WebSocket share it).
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Storage collaborator settings (PostgREST-style row API).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Base URL of the row API (no trailing slash).
    pub url: String,
    /// API key sent as `apikey` and bearer token; empty means unauthenticated.
    pub api_key: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            // Local development stack default.
            url: "http://127.0.0.1:54321".to_string(),
            api_key: String::new(),
        }
    }
}

/// Routing-proxy settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoutingSettings {
    /// Ordered upstream fallback list; the first success short-circuits.
    pub upstreams: Vec<String>,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            upstreams: vec![
                "https://routing.openstreetmap.de/routed-car".to_string(),
                "https://router.project-osrm.org".to_string(),
                "https://routing.openstreetmap.de/routed-bike".to_string(),
            ],
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = RoadsenseSettings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.routing.upstreams.len(), 3);
        assert!(settings.storage.api_key.is_empty());
    }

    #[test]
    fn partial_json_gets_defaults() {
        let settings: RoadsenseSettings =
            serde_json::from_str(r#"{"server":{"port":9090}}"#).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn camel_case_round_trip() {
        let settings = RoadsenseSettings::default();
        let json = serde_json::to_value(&settings).unwrap();
        assert!(json["storage"].get("apiKey").is_some());
        let back: RoadsenseSettings = serde_json::from_value(json).unwrap();
        assert_eq!(back.storage.url, settings.storage.url);
    }
}
