//! Editor configuration.

use common::{Color, EditorError, EditorResult};
use layers::{InsertPolicy, RenderEnv, StoreOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Session configuration, loadable from JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    /// Canvas width.
    pub canvas_width: f32,
    /// Canvas height.
    pub canvas_height: f32,
    /// Canvas background.
    pub background: Color,
    /// Preview or interactive editing.
    pub env: RenderEnv,
    /// Quiet period before derived content is recomputed.
    pub debounce_ms: u64,
    /// Undo entries kept.
    pub history_capacity: usize,
    /// Where new layers go.
    pub insert_policy: InsertPolicy,
}

impl EditorConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a read-only preview configuration.
    pub fn preview() -> Self {
        Self {
            env: RenderEnv::Preview,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(text: &str) -> EditorResult<Self> {
        let config: EditorConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> EditorResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Set canvas size.
    pub fn with_canvas(mut self, width: f32, height: f32) -> Self {
        self.canvas_width = width;
        self.canvas_height = height;
        self
    }

    /// Set environment.
    pub fn with_env(mut self, env: RenderEnv) -> Self {
        self.env = env;
        self
    }

    /// Set debounce quiet period.
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set history capacity.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Set insertion policy.
    pub fn with_insert_policy(mut self, policy: InsertPolicy) -> Self {
        self.insert_policy = policy;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            history_capacity: self.history_capacity,
            debounce: self.debounce(),
            insert_policy: self.insert_policy,
        }
    }

    pub fn validate(&self) -> EditorResult<()> {
        let canvas_ok = [self.canvas_width, self.canvas_height]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0);
        if !canvas_ok {
            return Err(EditorError::config(format!(
                "canvas size {}x{} must be positive",
                self.canvas_width, self.canvas_height
            )));
        }
        if self.history_capacity == 0 {
            return Err(EditorError::config("history capacity must be at least 1"));
        }
        Ok(())
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1280.0,
            canvas_height: 720.0,
            background: Color::WHITE,
            env: RenderEnv::Editor,
            debounce_ms: 500,
            history_capacity: 100,
            insert_policy: InsertPolicy::Front,
        }
    }
}
