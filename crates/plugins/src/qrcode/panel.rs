use common::{EditorError, EditorResult};
use layers::{ControlKind, LayerData, OptionsPanel, PanelControl, PanelEdit};

use super::{check_capacity, ErrorLevel, QrCodeProps};

/// Property editor for QR code layers.
pub struct QrCodePanel;

impl OptionsPanel for QrCodePanel {
    fn title(&self) -> String {
        "QR Code".to_string()
    }

    fn controls(&self, _layer: &LayerData) -> Vec<PanelControl> {
        let levels = ErrorLevel::ALL.iter().map(|level| level.as_str().to_string()).collect();
        vec![
            PanelControl::new("content", "Content", ControlKind::TextArea),
            PanelControl::new("level", "Error correction", ControlKind::Select { options: levels }),
            PanelControl::new("color", "Foreground", ControlKind::Color),
            PanelControl::new("background", "Background", ControlKind::Color),
            PanelControl::new("width", "Width", ControlKind::Number),
            PanelControl::new("height", "Height", ControlKind::Number),
            PanelControl::new("flipX", "Flip horizontal", ControlKind::Toggle),
            PanelControl::new("flipY", "Flip vertical", ControlKind::Toggle),
        ]
    }

    fn validate(&self, layer: &LayerData, edit: &PanelEdit) -> EditorResult<()> {
        let Some(qr) = layer.variant::<QrCodeProps>() else {
            return Ok(());
        };
        match edit.field.as_str() {
            "content" => {
                let content = edit
                    .value
                    .as_str()
                    .ok_or_else(|| EditorError::invalid_field("content", "expected text"))?;
                check_capacity(content, qr.level).map_err(|reason| EditorError::invalid_field("content", reason))
            }
            "level" => {
                let level: ErrorLevel = serde_json::from_value(edit.value.clone())
                    .map_err(|err| EditorError::invalid_field("level", err.to_string()))?;
                check_capacity(&qr.content, level).map_err(|reason| EditorError::invalid_field("level", reason))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qrcode::{QrCodePlugin, DEFAULT_CONTENT};
    use layers::Plugin;
    use serde_json::json;

    #[test]
    fn test_controls_cover_variant_fields() {
        let plugin = QrCodePlugin::new().unwrap();
        let layer = plugin.create(&json!({}));
        let view = layers::build_view(&QrCodePanel, &layer);
        assert_eq!(view.title, "QR Code");
        assert_eq!(view.control("content").unwrap().value, json!(DEFAULT_CONTENT));
        assert_eq!(view.control("level").unwrap().value, json!("M"));
    }

    #[test]
    fn test_validate_content() {
        let plugin = QrCodePlugin::new().unwrap();
        let layer = plugin.create(&json!({"level": "H"}));
        let panel = QrCodePanel;

        assert!(panel.validate(&layer, &PanelEdit::input("content", json!("ok"))).is_ok());
        assert!(panel.validate(&layer, &PanelEdit::input("content", json!(""))).is_err());
        assert!(panel.validate(&layer, &PanelEdit::input("content", json!(7))).is_err());
        let long = "x".repeat(1500);
        assert!(panel.validate(&layer, &PanelEdit::commit("content", json!(long))).is_err());
        assert!(panel.validate(&layer, &PanelEdit::commit("level", json!("X"))).is_err());
        assert!(panel.validate(&layer, &PanelEdit::commit("level", json!("L"))).is_ok());
    }
}
