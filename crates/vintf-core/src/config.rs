use crate::compat::CheckOptions;
use crate::fs::RootedFileSystem;
use crate::object::VintfObject;
use crate::properties::StaticProperties;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vintf_schema::{get_preset, list_presets, SerializeFlags};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid vintf config: {0}")]
    Parse(String),
    #[error("cannot serialize vintf config: {0}")]
    Serialize(String),
    #[error("unknown serialization preset '{name}', expected one of: {known}")]
    UnknownPreset { name: String, known: String },
}

fn default_preset() -> String {
    "everything".to_owned()
}

/// Where a device image lives on the host and how to inspect it.
///
/// ```toml
/// root = "/tmp/device"
/// serialize_preset = "hals-only"
///
/// [check]
/// include_optional = true
///
/// [properties]
/// "ro.product.first_api_level" = "28"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VintfConfig {
    /// Host directory that device paths resolve under.
    pub root: PathBuf,
    #[serde(default = "default_preset")]
    pub serialize_preset: String,
    #[serde(default)]
    pub check: CheckOptions,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl VintfConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            serialize_preset: default_preset(),
            check: CheckOptions::default(),
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.serialize_flags()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_str(&content)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn serialize_flags(&self) -> Result<SerializeFlags, ConfigError> {
        get_preset(&self.serialize_preset)
            .map(|preset| preset.flags)
            .ok_or_else(|| ConfigError::UnknownPreset {
                name: self.serialize_preset.clone(),
                known: list_presets()
                    .iter()
                    .map(|p| p.name)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// A `VintfObject` reading the device tree under `root` with the
    /// configured properties.
    pub fn build_object(&self) -> VintfObject {
        VintfObject::new(
            RootedFileSystem::new(&self.root),
            StaticProperties::new(self.properties.clone()),
        )
    }
}
