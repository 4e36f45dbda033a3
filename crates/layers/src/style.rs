//! Shared style synchronization, applied by every render binding.

use common::Point;
use scene::{NodeFlags, NodeProps, Shadow, Stroke};

use crate::data::LayerData;
use crate::render::RenderProps;

/// Record fields handled here. A change to any of them re-runs [`sync_style`].
pub const STYLE_FIELDS: &[&str] = &[
    "x",
    "y",
    "rotation",
    "opacity",
    "blendMode",
    "shadow",
    "border",
    "blur",
    "lock",
    "hide",
    "dirty",
];

/// Map the shared record fields onto node properties.
///
/// Idempotent: the result depends only on `layer` and `render`. Non-finite
/// numbers from a corrupted record fall back to defaults.
pub fn sync_style(props: &mut NodeProps, layer: &LayerData, render: &RenderProps) {
    let base = &layer.base;

    props.flags.set(NodeFlags::VISIBLE, !render.hide);
    let interactive = render.interactive();
    props.flags.set(NodeFlags::LISTENING, interactive);
    props.flags.set(NodeFlags::DRAGGABLE, interactive);

    props.position = Point::new(finite_or(base.x, 0.0), finite_or(base.y, 0.0));
    props.rotation = finite_or(base.rotation, 0.0);
    props.opacity = finite_or(base.opacity, 1.0).clamp(0.0, 1.0);
    props.blend_mode = base.blend_mode;
    props.blur = finite_or(base.blur, 0.0).max(0.0);
    props.z_index = render.z_index;

    props.shadow = base.shadow.enabled.then(|| Shadow {
        offset: Point::new(finite_or(base.shadow.offset_x, 0.0), finite_or(base.shadow.offset_y, 0.0)),
        blur: finite_or(base.shadow.blur, 0.0).max(0.0),
        color: base.shadow.color,
    });

    let stroke_width = finite_or(base.border.stroke_width, 0.0).max(0.0);
    props.stroke = (base.border.enabled && stroke_width > 0.0).then(|| Stroke {
        color: base.border.stroke,
        width: stroke_width,
        dash: base
            .border
            .dash
            .iter()
            .copied()
            .filter(|d| d.is_finite() && *d >= 0.0)
            .collect(),
        dash_offset: finite_or(base.border.dash_offset, 0.0),
    });
}

/// `value` if finite, else `fallback`.
pub fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        tracing::debug!(value, fallback, "non-finite layer value replaced");
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::box_layer;
    use crate::render::RenderEnv;
    use common::Color;
    use scene::NodeId;

    fn render_props(layer: &LayerData) -> RenderProps {
        RenderProps::for_layer(layer, 3, NodeId::default(), false, RenderEnv::Editor)
    }

    #[test]
    fn test_sync_basic_fields() {
        let mut layer = box_layer("a");
        layer.base.x = 10.0;
        layer.base.y = 20.0;
        layer.base.rotation = 30.0;
        layer.base.opacity = 0.25;
        let mut props = NodeProps::default();

        sync_style(&mut props, &layer, &render_props(&layer));

        assert_eq!(props.position, Point::new(10.0, 20.0));
        assert_eq!(props.rotation, 30.0);
        assert_eq!(props.opacity, 0.25);
        assert_eq!(props.z_index, 3);
        assert!(props.is_visible());
        assert!(props.flags.contains(NodeFlags::DRAGGABLE));
    }

    #[test]
    fn test_hide_and_lock() {
        let mut layer = box_layer("a");
        layer.base.hide = true;
        layer.base.lock = true;
        let mut props = NodeProps::default();

        sync_style(&mut props, &layer, &render_props(&layer));

        assert!(!props.is_visible());
        assert!(!props.is_listening());
        assert!(!props.flags.contains(NodeFlags::DRAGGABLE));
    }

    #[test]
    fn test_shadow_and_border() {
        let mut layer = box_layer("a");
        layer.base.shadow.enabled = true;
        layer.base.shadow.blur = 4.0;
        layer.base.border.enabled = true;
        layer.base.border.stroke = Color::RED;
        layer.base.border.stroke_width = 2.0;
        layer.base.border.dash = vec![4.0, f32::NAN, 2.0];
        let mut props = NodeProps::default();

        sync_style(&mut props, &layer, &render_props(&layer));

        assert_eq!(props.shadow.as_ref().unwrap().blur, 4.0);
        let stroke = props.stroke.as_ref().unwrap();
        assert_eq!(stroke.color, Color::RED);
        assert_eq!(stroke.dash, vec![4.0, 2.0]);

        layer.base.border.stroke_width = 0.0;
        sync_style(&mut props, &layer, &render_props(&layer));
        assert!(props.stroke.is_none());
    }

    #[test]
    fn test_malformed_numbers_fall_back() {
        let mut layer = box_layer("a");
        layer.base.x = f32::NAN;
        layer.base.opacity = f32::INFINITY;
        layer.base.blur = -3.0;
        let mut props = NodeProps::default();

        sync_style(&mut props, &layer, &render_props(&layer));

        assert_eq!(props.position.x, 0.0);
        assert_eq!(props.opacity, 1.0);
        assert_eq!(props.blur, 0.0);
    }

    #[test]
    fn test_idempotent() {
        let mut layer = box_layer("a");
        layer.base.shadow.enabled = true;
        let render = render_props(&layer);
        let mut props = NodeProps::default();
        sync_style(&mut props, &layer, &render);
        let first = props.clone();
        sync_style(&mut props, &layer, &render);
        assert_eq!(props, first);
    }
}
