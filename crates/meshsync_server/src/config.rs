//! Session settings
//!
//! Loaded from a TOML file when one is found, then overridden by
//! `MESHSYNC_*` environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use meshsync_scene::UNBOUNDED_SPLIT_UNIT;

use crate::error::ConfigError;

/// Files searched by [`ServerSettings::load`], in order
const CONFIG_PATHS: &[&str] = &["meshsync.toml", "/etc/meshsync/meshsync.toml"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Queue capacity; enqueues beyond it are rejected
    pub max_queue: usize,
    /// Concurrent connection workers
    pub max_threads: usize,
    pub port: u16,
    pub bind_address: String,
    /// Max vertices per mesh split
    pub mesh_split_unit: u32,
    /// Reported to ClientName queries
    pub client_name: String,
    /// Where raw-file textures are written; see [`Server::set_file_root_path`]
    ///
    /// [`Server::set_file_root_path`]: crate::Server::set_file_root_path
    pub file_root_path: Option<PathBuf>,
    /// Image returned for Screenshot requests; see [`Server::set_screenshot_path`]
    ///
    /// [`Server::set_screenshot_path`]: crate::Server::set_screenshot_path
    pub screenshot_path: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            max_queue: 512,
            max_threads: 8,
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            mesh_split_unit: UNBOUNDED_SPLIT_UNIT,
            client_name: "meshsync".to_string(),
            file_root_path: None,
            screenshot_path: None,
        }
    }
}

impl ServerSettings {
    /// Load from the first config file found, then the environment
    pub fn load() -> Self {
        let mut settings = Self::default();

        for path in CONFIG_PATHS {
            match Self::load_from_file(path) {
                Ok(loaded) => {
                    settings = loaded;
                    log::info!("Loaded settings from {}", path);
                    break;
                }
                Err(ConfigError::Io(_)) => continue,
                Err(e) => {
                    log::warn!("Ignoring {}: {}", path, e);
                }
            }
        }

        settings.apply_overrides(|key| std::env::var(key).ok());
        settings
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `MESHSYNC_*` overrides; unparsable values are logged and skipped
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parse<T: std::str::FromStr>(key: &str, value: Option<String>, target: &mut T) {
            if let Some(value) = value {
                match value.parse() {
                    Ok(v) => {
                        *target = v;
                        log::info!("{} from env: {}", key, value);
                    }
                    Err(_) => log::warn!("Invalid {}: {}", key, value),
                }
            }
        }

        parse("MESHSYNC_PORT", lookup("MESHSYNC_PORT"), &mut self.port);
        parse("MESHSYNC_MAX_QUEUE", lookup("MESHSYNC_MAX_QUEUE"), &mut self.max_queue);
        parse("MESHSYNC_MAX_THREADS", lookup("MESHSYNC_MAX_THREADS"), &mut self.max_threads);
        parse("MESHSYNC_SPLIT_UNIT", lookup("MESHSYNC_SPLIT_UNIT"), &mut self.mesh_split_unit);

        if let Some(name) = lookup("MESHSYNC_CLIENT_NAME").filter(|v| !v.is_empty()) {
            self.client_name = name;
        }
        if let Some(root) = lookup("MESHSYNC_FILE_ROOT").filter(|v| !v.is_empty()) {
            self.file_root_path = Some(PathBuf::from(root));
        }
    }

    /// "address:port" string for binding
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
