//! Group layers: composition of child layers.
//!
//! A group's node is a container; child nodes attach under it, so moving the
//! group moves its children. Children are edited structurally through the
//! store, never as a field.

use common::EditorResult;
use layers::data::{FieldMap, LayerVariant, CHILDREN_KEY};
use layers::factory::{identity_from, merge_onto, overrides_of};
use layers::{BaseProps, LayerData, OptionsPanel, PanelControl, Plugin, PluginConfig, PluginMeta, Renderer};
use scene::NodeKind;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

pub const PID: &str = "group";

const CONFIG: &str = include_str!("../config/group.json");

/// Variant part of a group: its owned children, head on top.
#[derive(Clone, Debug, Default)]
pub struct GroupProps {
    pub children: Vec<LayerData>,
}

impl LayerVariant for GroupProps {
    fn to_value(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert(
            CHILDREN_KEY.to_string(),
            Value::Array(self.children.iter().map(LayerData::to_value).collect()),
        );
        fields
    }

    fn set_field(&mut self, _field: &str, _value: Value) -> EditorResult<bool> {
        Ok(false)
    }

    fn clone_variant(&self) -> Box<dyn LayerVariant> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn children(&self) -> Option<&[LayerData]> {
        Some(&self.children)
    }

    fn children_mut(&mut self) -> Option<&mut Vec<LayerData>> {
        Some(&mut self.children)
    }
}

pub struct GroupPlugin {
    config: PluginConfig,
}

impl GroupPlugin {
    pub fn new() -> EditorResult<Self> {
        Ok(Self {
            config: PluginConfig::from_json(CONFIG)?,
        })
    }
}

impl Plugin for GroupPlugin {
    fn config(&self) -> &PluginConfig {
        &self.config
    }

    fn meta(&self) -> PluginMeta {
        PluginMeta::new("Group", "Moves and hides several layers together").with_icon("folder")
    }

    /// Children in `overrides` are ignored; the registry rebuilds them.
    fn create(&self, overrides: &Value) -> LayerData {
        let overrides = overrides_of(overrides);
        let base = merge_onto(
            BaseProps {
                name: "Group".to_string(),
                ..BaseProps::default()
            },
            &overrides,
        );
        LayerData::new(identity_from(&overrides), PID, base, GroupProps::default())
    }

    fn renderer(&self) -> Arc<dyn Renderer> {
        Arc::new(GroupRenderer)
    }

    fn options_panel(&self) -> Arc<dyn OptionsPanel> {
        Arc::new(GroupPanel)
    }
}

/// Build a group owning `children`.
pub fn group_of(plugin: &GroupPlugin, children: Vec<LayerData>, overrides: &Value) -> LayerData {
    let mut group = plugin.create(overrides);
    if let Some(slot) = group.children_mut() {
        *slot = children;
    }
    group
}

pub struct GroupRenderer;

impl Renderer for GroupRenderer {
    fn node_kind(&self) -> NodeKind {
        NodeKind::Group
    }
}

pub struct GroupPanel;

impl OptionsPanel for GroupPanel {
    fn title(&self) -> String {
        "Group".to_string()
    }

    fn controls(&self, _layer: &LayerData) -> Vec<PanelControl> {
        Vec::new()
    }
}
