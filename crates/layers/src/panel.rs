//! Options panels: per-type property editors for the selected layer.
//!
//! Panels only describe controls. The widgets themselves belong to the host
//! UI, which reports edits back through [`apply_edit`].

use common::{EditorError, EditorResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::LayerData;
use crate::id::LayerId;
use crate::store::EditorStore;

/// Widget requested for one field.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ControlKind {
    Number,
    Slider { min: f32, max: f32, step: f32 },
    Text,
    TextArea,
    Color,
    Toggle,
    Select { options: Vec<String> },
    Shadow,
    Border,
    /// Four corner radii.
    Corners,
}

/// One editor row bound to one record field.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PanelControl {
    pub field: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: ControlKind,
    /// Current value, filled by [`build_view`].
    pub value: Value,
}

impl PanelControl {
    pub fn new(field: impl Into<String>, label: impl Into<String>, kind: ControlKind) -> Self {
        Self {
            field: field.into(),
            label: label.into(),
            kind,
            value: Value::Null,
        }
    }
}

/// Everything a host needs to draw the panel for the selection.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelView {
    pub layer_id: LayerId,
    pub type_tag: String,
    pub title: String,
    pub shared: Vec<PanelControl>,
    pub variant: Vec<PanelControl>,
}

impl PanelView {
    pub fn control(&self, field: &str) -> Option<&PanelControl> {
        self.shared
            .iter()
            .chain(&self.variant)
            .find(|control| control.field == field)
    }
}

/// Whether an edit is a transient intermediate value or a committed one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditPhase {
    /// Mid-drag or mid-typing.
    Input,
    /// Released, blurred, or confirmed.
    Commit,
}

/// One edit reported by a widget.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PanelEdit {
    pub field: String,
    pub value: Value,
    pub phase: EditPhase,
}

impl PanelEdit {
    pub fn input(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            value,
            phase: EditPhase::Input,
        }
    }

    pub fn commit(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            value,
            phase: EditPhase::Commit,
        }
    }
}

/// Variant-specific half of a property editor.
pub trait OptionsPanel: Send + Sync {
    fn title(&self) -> String;

    /// Controls for the variant fields.
    fn controls(&self, layer: &LayerData) -> Vec<PanelControl>;

    /// Reject an edit before it reaches the record.
    fn validate(&self, _layer: &LayerData, _edit: &PanelEdit) -> EditorResult<()> {
        Ok(())
    }
}

/// Controls every panel shows for the shared fields.
pub fn shared_controls() -> Vec<PanelControl> {
    let blend_modes = ["normal", "multiply", "screen", "overlay", "darken", "lighten"]
        .iter()
        .map(|mode| mode.to_string())
        .collect();
    vec![
        PanelControl::new("name", "Name", ControlKind::Text),
        PanelControl::new("x", "X", ControlKind::Number),
        PanelControl::new("y", "Y", ControlKind::Number),
        PanelControl::new("rotation", "Rotation", ControlKind::Number),
        PanelControl::new(
            "opacity",
            "Opacity",
            ControlKind::Slider {
                min: 0.0,
                max: 1.0,
                step: 0.01,
            },
        ),
        PanelControl::new("blendMode", "Blend", ControlKind::Select { options: blend_modes }),
        PanelControl::new("shadow", "Shadow", ControlKind::Shadow),
        PanelControl::new("border", "Border", ControlKind::Border),
        PanelControl::new(
            "blur",
            "Blur",
            ControlKind::Slider {
                min: 0.0,
                max: 50.0,
                step: 1.0,
            },
        ),
        PanelControl::new("lock", "Lock", ControlKind::Toggle),
        PanelControl::new("hide", "Hide", ControlKind::Toggle),
    ]
}

/// Build the panel view for `layer`, filling in current values.
pub fn build_view(panel: &dyn OptionsPanel, layer: &LayerData) -> PanelView {
    let fields = layer.to_field_map();
    let fill = |mut control: PanelControl| {
        control.value = fields.get(&control.field).cloned().unwrap_or(Value::Null);
        control
    };
    PanelView {
        layer_id: layer.id().clone(),
        type_tag: layer.type_tag().to_string(),
        title: panel.title(),
        shared: shared_controls().into_iter().map(fill).collect(),
        variant: panel.controls(layer).into_iter().map(fill).collect(),
    }
}

/// Apply a widget edit to the selected layer.
///
/// Every edit mutates the record and requests a redraw; only committed edits
/// are recorded in history. Returns the history entry id, if one was recorded.
pub fn apply_edit(store: &EditorStore, panel: &dyn OptionsPanel, edit: &PanelEdit) -> EditorResult<Option<u64>> {
    let layer = store
        .selected_data()
        .ok_or_else(|| EditorError::not_found("selection"))?;
    panel.validate(&layer, edit)?;

    let id = layer.id();
    store.mutate(id, |target| target.set_field(&edit.field, edit.value.clone()))??;

    let recorded = match edit.phase {
        EditPhase::Input => None,
        EditPhase::Commit => store.record_change(id, format!("Change {} of {}", edit.field, panel.title()))?,
    };
    store.request_redraw();
    Ok(recorded)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::tests::box_layer;
    use crate::store::InsertTarget;
    use serde_json::json;

    /// Panel with no variant controls.
    pub struct NoControls;

    impl OptionsPanel for NoControls {
        fn title(&self) -> String {
            "Box".into()
        }

        fn controls(&self, _layer: &LayerData) -> Vec<PanelControl> {
            Vec::new()
        }

        fn validate(&self, _layer: &LayerData, edit: &PanelEdit) -> EditorResult<()> {
            if edit.field == "label" && edit.value.as_str().is_some_and(str::is_empty) {
                return Err(EditorError::invalid_field("label", "must not be empty"));
            }
            Ok(())
        }
    }

    fn selected_store() -> (EditorStore, LayerId) {
        let store = EditorStore::default();
        let id = LayerId::from("a");
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();
        store.set_selection(vec![id.clone()]);
        (store, id)
    }

    #[test]
    fn test_build_view_fills_values() {
        let mut layer = box_layer("a");
        layer.base.opacity = 0.5;
        let view = build_view(&NoControls, &layer);
        assert_eq!(view.title, "Box");
        assert_eq!(view.control("opacity").unwrap().value, json!(0.5));
        assert_eq!(view.control("hide").unwrap().value, json!(false));
        assert!(view.control("width").is_none());
    }

    #[test]
    fn test_inputs_are_not_recorded() {
        let (store, id) = selected_store();
        for x in [1.0, 2.0, 3.0] {
            let recorded = apply_edit(&store, &NoControls, &PanelEdit::input("x", json!(x))).unwrap();
            assert!(recorded.is_none());
        }
        assert!(store.history_entries().is_empty());

        let recorded = apply_edit(&store, &NoControls, &PanelEdit::commit("x", json!(4.0))).unwrap();
        assert!(recorded.is_some());
        let entries = store.history_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].before.as_ref().unwrap()["x"], 0.0);
        assert_eq!(store.layer(&id).unwrap().base.x, 4.0);
    }

    #[test]
    fn test_invalid_edit_leaves_record() {
        let (store, id) = selected_store();
        let result = apply_edit(&store, &NoControls, &PanelEdit::commit("opacity", json!("lots")));
        assert!(result.is_err());
        let rejected = apply_edit(&store, &NoControls, &PanelEdit::commit("label", json!("")));
        assert!(rejected.is_err());
        assert_eq!(store.layer(&id).unwrap(), box_layer("a"));
        assert!(store.history_entries().is_empty());
    }

    #[test]
    fn test_edit_without_selection() {
        let store = EditorStore::default();
        let result = apply_edit(&store, &NoControls, &PanelEdit::commit("x", json!(1.0)));
        assert!(matches!(result, Err(EditorError::LayerNotFound(_))));
    }
}
