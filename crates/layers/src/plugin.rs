//! The plugin contract.

use common::{EditorError, EditorResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::data::LayerData;
use crate::panel::OptionsPanel;
use crate::render::Renderer;

/// Plugin `config.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Semantic version of the plugin.
    pub version: String,
    /// Type identity; equals the type tag of every record the plugin creates.
    pub pid: String,
}

impl PluginConfig {
    pub fn new(pid: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            pid: pid.into(),
        }
    }

    /// Parse and validate a `config.json` document.
    pub fn from_json(text: &str) -> EditorResult<Self> {
        let config: PluginConfig =
            serde_json::from_str(text).map_err(|err| EditorError::config(format!("plugin config: {}", err)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EditorResult<()> {
        if self.pid.is_empty() || self.pid.chars().any(char::is_whitespace) {
            return Err(EditorError::config(format!("invalid pid '{}'", self.pid)));
        }
        self.semver().map(|_| ())
    }

    pub fn semver(&self) -> EditorResult<semver::Version> {
        semver::Version::parse(&self.version)
            .map_err(|err| EditorError::config(format!("plugin '{}' version '{}': {}", self.pid, self.version, err)))
    }
}

/// Display metadata for menus and the layer list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMeta {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl PluginMeta {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            icon: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// One layer variant contributed to the editor.
pub trait Plugin: Send + Sync {
    fn config(&self) -> &PluginConfig;

    fn meta(&self) -> PluginMeta;

    /// Build a fully defaulted record from partial overrides.
    ///
    /// A fresh identity is generated unless `overrides` carries an `id`.
    fn create(&self, overrides: &Value) -> LayerData;

    fn renderer(&self) -> Arc<dyn Renderer>;

    fn options_panel(&self) -> Arc<dyn OptionsPanel>;

    /// Type identity.
    fn pid(&self) -> &str {
        &self.config().pid
    }
}
