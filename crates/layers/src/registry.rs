//! Type registry: type identity to plugin.

use common::{EditorError, EditorResult};
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::data::{LayerData, BASE_FIELDS, CHILDREN_KEY, TYPE_KEY};
use crate::plugin::Plugin;

/// Registered plugins in registration order.
#[derive(Default)]
pub struct TypeRegistry {
    plugins: IndexMap<String, Arc<dyn Plugin>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every plugin in order, failing on the first bad one.
    pub fn from_plugins(plugins: impl IntoIterator<Item = Arc<dyn Plugin>>) -> EditorResult<Self> {
        let mut registry = Self::new();
        for plugin in plugins {
            registry.register(plugin)?;
        }
        Ok(registry)
    }

    /// Register one plugin.
    ///
    /// A type identity that is already taken, an invalid config, or a
    /// factory whose records do not carry the plugin's own type tag are all
    /// configuration errors.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> EditorResult<()> {
        let config = plugin.config();
        config.validate()?;
        let pid = config.pid.clone();

        if self.plugins.contains_key(&pid) {
            return Err(EditorError::duplicate_type(pid));
        }

        let probe = plugin.create(&json!({}));
        if probe.type_tag() != pid {
            return Err(EditorError::config(format!(
                "plugin '{}' creates records tagged '{}'",
                pid,
                probe.type_tag()
            )));
        }
        if let Some(clash) = probe
            .variant_fields()
            .keys()
            .find(|key| BASE_FIELDS.contains(&key.as_str()))
        {
            return Err(EditorError::config(format!(
                "plugin '{}' redefines shared field '{}'",
                pid, clash
            )));
        }

        tracing::info!(pid = %pid, version = %config.version, "plugin registered");
        self.plugins.insert(pid, plugin);
        Ok(())
    }

    /// The plugin for `type_id`, if registered.
    pub fn lookup(&self, type_id: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(type_id).cloned()
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.plugins.contains_key(type_id)
    }

    /// Registered type identities in registration order.
    pub fn type_ids(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins.values()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Create a record of `type_id` from partial overrides.
    pub fn create(&self, type_id: &str, overrides: &Value) -> EditorResult<LayerData> {
        let plugin = self
            .lookup(type_id)
            .ok_or_else(|| EditorError::unknown_type(type_id))?;
        Ok(plugin.create(overrides))
    }

    /// Rebuild a record, children included, from its plain value.
    ///
    /// Children of unknown type are dropped with a warning.
    pub fn instantiate(&self, record: &Value) -> EditorResult<LayerData> {
        let type_id = record
            .get(TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| EditorError::invalid_field(TYPE_KEY, "missing type tag"))?;

        let mut layer = self.create(type_id, record)?;

        let child_records = record.get(CHILDREN_KEY).and_then(Value::as_array);
        if let (Some(records), Some(children)) = (child_records, layer.children_mut()) {
            children.clear();
            for child in records {
                match self.instantiate(child) {
                    Ok(child) => children.push(child),
                    Err(err) => tracing::warn!(error = %err, "dropping unreadable child layer"),
                }
            }
        }
        Ok(layer)
    }
}
