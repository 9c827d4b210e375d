// User settings stored as JSON under the config directory

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_SETTINGS_PATH: &str = "~/.config/arcprobe/settings.json";

/// Filled into an empty `Web_Map_as_JSON` parameter of print tasks.
pub const DEFAULT_WEB_MAP_AS_JSON: &str = r#"{"operationalLayers":[],"baseMap":{"baseMapLayers":[{"id":"defaultBasemap","opacity":1,"visibility":true,"url":"http://services.arcgisonline.com/ArcGIS/rest/services/World_Topo_Map/MapServer"}],"title":"Topographic"},"exportOptions":{"dpi":300,"outputSize":[1280,1024]}}"#;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Cannot access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed settings file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Settings file {0} already exists (use --force to overwrite)")]
    AlreadyExists(PathBuf),
}

/// Which probes run automatically. Keys keep the names used by the
/// browser extension's storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub auto_metadata: bool,
    pub auto_feature_counts: bool,
    pub auto_field_counts: bool,
    pub auto_domain_counts: bool,
    pub default_where_clause: String,
    #[serde(rename = "defaultWebMapAsJSON")]
    pub default_web_map_as_json: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_metadata: true,
            auto_feature_counts: true,
            auto_field_counts: true,
            auto_domain_counts: true,
            default_where_clause: String::new(),
            default_web_map_as_json: DEFAULT_WEB_MAP_AS_JSON.to_string(),
        }
    }
}

impl Settings {
    /// Feature counts ride on the metadata request.
    pub fn feature_counts_enabled(&self) -> bool {
        self.auto_metadata && self.auto_feature_counts
    }

    /// Read settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Settings, SettingsError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No settings at {}, using defaults", path.display());
                return Ok(Settings::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&text).map_err(|source| SettingsError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write settings to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path, force: bool) -> Result<(), SettingsError> {
        if path.exists() && !force {
            return Err(SettingsError::AlreadyExists(path.to_path_buf()));
        }
        let io_err = |source: io::Error| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json + "\n").map_err(io_err)?;

        info!("Settings written to {}", path.display());
        Ok(())
    }
}

/// Expand `~` and environment variables in a user supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_all_on() {
        let settings = Settings::default();
        assert!(settings.auto_metadata);
        assert!(settings.auto_field_counts);
        assert!(settings.feature_counts_enabled());
        assert!(settings.default_where_clause.is_empty());
        assert!(settings.default_web_map_as_json.contains("operationalLayers"));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"autoMetadata": false, "defaultWhereClause": "1=1"}"#)
                .unwrap();
        assert!(!settings.auto_metadata);
        assert!(settings.auto_domain_counts);
        assert!(!settings.feature_counts_enabled());
        assert_eq!(settings.default_where_clause, "1=1");
        assert_eq!(settings.default_web_map_as_json, DEFAULT_WEB_MAP_AS_JSON);
    }

    #[test]
    fn test_web_map_key_keeps_storage_name() {
        let settings: Settings =
            serde_json::from_str(r#"{"defaultWebMapAsJSON": "{}"}"#).unwrap();
        assert_eq!(settings.default_web_map_as_json, "{}");
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["defaultWebMapAsJSON"], "{}");
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/x.json");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert_eq!(expand_path("/tmp/a.json"), PathBuf::from("/tmp/a.json"));
    }
}
