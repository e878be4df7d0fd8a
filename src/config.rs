use std::path::{Path, PathBuf};

use scene_common::DocumentFormat;
use serde::{Deserialize, Serialize};

/// Settings threaded through a [`crate::scene::Scene`] instead of process-wide state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SceneConfig {
    pub verbose: bool,
    /// Directory below the scene root that holds the model cache files.
    pub cache_dir_name: String,
    /// Encoding used when a new model cache file is written.
    pub cache_format: DocumentFormat,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            cache_dir_name: "cache".to_string(),
            cache_format: DocumentFormat::Binary,
        }
    }
}

impl SceneConfig {
    pub fn from_str(value: &str) -> serde_json::Result<Self> {
        serde_json::from_str(value)
    }

    pub fn cache_dir(&self, root_dir: &Path) -> PathBuf {
        root_dir.join(&self.cache_dir_name)
    }

    pub fn cache_path(&self, root_dir: &Path, key: u64, format: DocumentFormat) -> PathBuf {
        let mut path = self.cache_dir(root_dir);
        path.push(format!("{}.{}", key, format.extension()));
        path
    }

    /// The `env_logger` filter a host binary should default to.
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "warn"
        }
    }
}

pub struct ConfigFileLoader {
    pub path: PathBuf,
    config: Option<SceneConfig>,
}

impl ConfigFileLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: None,
        }
    }

    /// Reads the config file, writing the defaults first if there is none.
    pub fn load_config(&mut self) -> anyhow::Result<&mut SceneConfig> {
        let config = match std::fs::read_to_string(&self.path) {
            Ok(content) => SceneConfig::from_str(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {:?}, writing defaults", self.path);
                self.config = Some(SceneConfig::default());
                self.save_config()?;
                SceneConfig::default()
            }
            Err(err) => return Err(err.into()),
        };
        Ok(self.config.insert(config))
    }

    pub fn get_or_load_config(&mut self) -> anyhow::Result<&mut SceneConfig> {
        if self.config.is_none() {
            self.load_config()?;
        }
        match self.config.as_mut() {
            Some(config) => Ok(config),
            None => anyhow::bail!("config {:?} was not loaded", self.path),
        }
    }

    pub fn save_config(&self) -> anyhow::Result<()> {
        if let Some(config) = &self.config {
            let content = serde_json::to_string_pretty(config)?;
            std::fs::write(&self.path, content)?;
        }
        Ok(())
    }
}
