//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: `courier.toml` and `config.toml`
//! - `yaml-config`: `courier.yaml`, `courier.yml`, `config.yaml`, `config.yml`
//!
//! # Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific file (`courier.{profile}.toml`)
//! 3. Main file (`courier.toml`)
//! 4. Environment variables (`COURIER_*`, `__` separates sections)
//! 5. Programmatic overrides via [`ConfigLoader::merge`]
//!
//! `COURIER_DISPATCHER__WORKERS=8` sets `dispatcher.workers = 8`;
//! `COURIER_LOGGING__LEVEL=debug` sets `logging.level = "debug"`.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new().profile("production").load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::CourierConfig;

const ENV_PREFIX: &str = "COURIER_";
const PROFILE_VAR: &str = "COURIER_PROFILE";

#[cfg(feature = "toml-config")]
const TOML_NAMES: &[&str] = &["courier.toml", "config.toml"];
#[cfg(feature = "yaml-config")]
const YAML_NAMES: &[&str] = &["courier.yaml", "courier.yml", "config.yaml", "config.yml"];

/// Deployment profile, selecting `courier.{profile}.*` overlay files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Reads `COURIER_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|name| Self::from(name.as_str()))
            .unwrap_or_default()
    }
}

impl From<&str> for Profile {
    fn from(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layered configuration loader.
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    config_file: Option<PathBuf>,
    load_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            config_file: None,
            load_env: true,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::from(profile.as_ref());
        self
    }

    /// Adds a directory to search for config files.
    ///
    /// Without any, the current directory and the user config directory
    /// (`~/.config/courier` on Linux) are searched.
    pub fn search_path(mut self, path: impl AsRef<Path>) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Skips `COURIER_*` environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges programmatic overrides on top of every other source.
    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Loads the configuration. Validation is a separate step, see
    /// [`validate_config`](super::validate_config).
    pub fn load(self) -> ConfigResult<CourierConfig> {
        let profile = self.profile.clone();
        let config: CourierConfig = self.build_figment()?.extract()?;

        debug!(
            profile = %profile,
            workers = config.dispatcher.workers,
            no_updates = config.dispatcher.no_updates,
            logging_level = %config.logging.level,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(CourierConfig::default()));

        match self.config_file.take() {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading configuration file");
                figment = merge_file(figment, &path)?;
            }
            Some(path) => return Err(ConfigError::FileNotFound(path)),
            None => figment = self.merge_search_results(figment),
        }

        if self.load_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).split("__"));
        }

        Ok(figment.merge(self.overrides))
    }

    fn directories(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("courier")))
            .collect()
    }

    /// Merges the first main file found in each enabled format, preceded by
    /// its profile overlay.
    fn merge_search_results(&self, figment: Figment) -> Figment {
        #[allow(unused_mut)]
        let mut figment = figment;
        #[allow(unused_mut)]
        let mut found = false;
        let directories = self.directories();

        #[cfg(feature = "toml-config")]
        if let Some((overlay, main)) = self.locate(&directories, TOML_NAMES) {
            if let Some(overlay) = overlay {
                figment = figment.merge(Toml::file(overlay));
            }
            figment = figment.merge(Toml::file(main));
            found = true;
        }

        #[cfg(feature = "yaml-config")]
        if let Some((overlay, main)) = self.locate(&directories, YAML_NAMES) {
            if let Some(overlay) = overlay {
                figment = figment.merge(Yaml::file(overlay));
            }
            figment = figment.merge(Yaml::file(main));
            found = true;
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }

    /// Finds the first existing main file and its optional profile overlay.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn locate(
        &self,
        directories: &[PathBuf],
        names: &[&str],
    ) -> Option<(Option<PathBuf>, PathBuf)> {
        for directory in directories {
            for name in names {
                let main = directory.join(name);
                if !main.exists() {
                    continue;
                }
                info!(path = %main.display(), "Loading configuration file");

                let overlay = name.rsplit_once('.').map(|(stem, ext)| {
                    directory.join(format!("{stem}.{}.{ext}", self.profile.as_str()))
                });
                let overlay = overlay.filter(|path| path.exists());
                if let Some(path) = &overlay {
                    debug!(path = %path.display(), "Loading profile overlay");
                }
                return Some((overlay, main));
            }
        }
        None
    }
}

/// Merges one file, picking the provider from its extension.
fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<CourierConfig> {
    ConfigLoader::new().load()
}
