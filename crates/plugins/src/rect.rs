//! Rectangle layers.

use common::{Color, CornerRadii, EditorError, EditorResult, Size};
use layers::factory::build_layer;
use layers::style::finite_or;
use layers::{
    layer_variant, BaseProps, ControlKind, LayerData, OptionsPanel, PanelControl, PanelEdit, Plugin, PluginConfig,
    PluginMeta, Renderer,
};
use scene::NodeProps;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::apply_flip;

pub const PID: &str = "rect";

const CONFIG: &str = include_str!("../config/rect.json");

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RectProps {
    pub width: f32,
    pub height: f32,
    pub fill: Color,
    pub corner_radius: CornerRadii,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl Default for RectProps {
    fn default() -> Self {
        Self {
            width: 200.0,
            height: 120.0,
            fill: Color::rgb(0x4a, 0x90, 0xe2),
            corner_radius: CornerRadii::ZERO,
            flip_x: false,
            flip_y: false,
        }
    }
}

layer_variant!(RectProps);

pub struct RectPlugin {
    config: PluginConfig,
}

impl RectPlugin {
    pub fn new() -> EditorResult<Self> {
        Ok(Self {
            config: PluginConfig::from_json(CONFIG)?,
        })
    }
}

impl Plugin for RectPlugin {
    fn config(&self) -> &PluginConfig {
        &self.config
    }

    fn meta(&self) -> PluginMeta {
        PluginMeta::new("Rectangle", "Filled rectangle with rounded corners").with_icon("square")
    }

    fn create(&self, overrides: &Value) -> LayerData {
        let base = BaseProps {
            name: "Rectangle".to_string(),
            ..BaseProps::default()
        };
        build_layer(PID, overrides, base, RectProps::default())
    }

    fn renderer(&self) -> Arc<dyn Renderer> {
        Arc::new(RectRenderer)
    }

    fn options_panel(&self) -> Arc<dyn OptionsPanel> {
        Arc::new(RectPanel)
    }
}

/// Everything a rectangle shows is cheap to apply.
pub struct RectRenderer;

impl Renderer for RectRenderer {
    fn watched_fields(&self) -> &'static [&'static str] {
        &["width", "height", "fill", "cornerRadius", "flipX", "flipY"]
    }

    fn apply(&self, props: &mut NodeProps, layer: &LayerData) {
        let Some(rect) = layer.variant::<RectProps>() else {
            tracing::warn!(layer = %layer.id(), "rect renderer given a foreign record");
            return;
        };
        let defaults = RectProps::default();
        let size = Size::new(
            finite_or(rect.width, defaults.width).max(1.0),
            finite_or(rect.height, defaults.height).max(1.0),
        );
        props.size = size;
        props.fill = Some(rect.fill);
        props.corner_radius = rect.corner_radius.clamped(size.width.min(size.height) / 2.0);
        apply_flip(props, size, rect.flip_x, rect.flip_y);
    }
}

pub struct RectPanel;

impl OptionsPanel for RectPanel {
    fn title(&self) -> String {
        "Rectangle".to_string()
    }

    fn controls(&self, _layer: &LayerData) -> Vec<PanelControl> {
        vec![
            PanelControl::new("width", "Width", ControlKind::Number),
            PanelControl::new("height", "Height", ControlKind::Number),
            PanelControl::new("fill", "Fill", ControlKind::Color),
            PanelControl::new("cornerRadius", "Corners", ControlKind::Corners),
            PanelControl::new("flipX", "Flip horizontal", ControlKind::Toggle),
            PanelControl::new("flipY", "Flip vertical", ControlKind::Toggle),
        ]
    }

    fn validate(&self, _layer: &LayerData, edit: &PanelEdit) -> EditorResult<()> {
        if matches!(edit.field.as_str(), "width" | "height") {
            let positive = edit.value.as_f64().is_some_and(|v| v.is_finite() && v > 0.0);
            if !positive {
                return Err(EditorError::invalid_field(&edit.field, "must be a positive number"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_clamps_corners() {
        let plugin = RectPlugin::new().unwrap();
        let layer = plugin.create(&json!({
            "width": 40.0,
            "height": 20.0,
            "cornerRadius": {"topLeft": 50.0, "topRight": 5.0, "bottomRight": -1.0, "bottomLeft": 0.0}
        }));
        let mut props = NodeProps::default();
        plugin.renderer().apply(&mut props, &layer);

        assert_eq!(props.size, Size::new(40.0, 20.0));
        assert_eq!(props.corner_radius.to_array(), [10.0, 5.0, 0.0, 0.0]);
        assert_eq!(props.fill, Some(Color::rgb(0x4a, 0x90, 0xe2)));
    }

    #[test]
    fn test_has_no_derived_work() {
        let plugin = RectPlugin::new().unwrap();
        let layer = plugin.create(&json!({}));
        assert!(plugin.renderer().derive(&layer).is_none());
        assert!(plugin.renderer().derived_fields().is_empty());
    }

    #[test]
    fn test_validate_size() {
        let layer = RectPlugin::new().unwrap().create(&json!({}));
        assert!(RectPanel.validate(&layer, &PanelEdit::commit("width", json!(10))).is_ok());
        assert!(RectPanel.validate(&layer, &PanelEdit::commit("width", json!(0))).is_err());
        assert!(RectPanel.validate(&layer, &PanelEdit::commit("height", json!("tall"))).is_err());
    }
}
