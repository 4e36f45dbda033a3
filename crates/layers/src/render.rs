//! The renderer contract plugins implement.

use common::{EditorResult, Point, Size};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use scene::{NodeId, NodeKind, NodeProps};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;

use crate::data::LayerData;

/// Where the scene is shown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderEnv {
    /// Read-only preview; nothing is interactive.
    Preview,
    /// Interactive editing canvas.
    #[default]
    Editor,
}

/// Parameters the host supplies to every render binding.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderProps {
    pub hide: bool,
    pub lock: bool,
    pub z_index: i32,
    pub is_child: bool,
    pub dirty: bool,
    /// Container the scene node is attached to.
    pub parent: NodeId,
    pub env: RenderEnv,
}

impl RenderProps {
    pub fn for_layer(layer: &LayerData, z_index: i32, parent: NodeId, is_child: bool, env: RenderEnv) -> Self {
        Self {
            hide: layer.base.hide,
            lock: layer.base.lock,
            z_index,
            is_child,
            dirty: layer.base.dirty,
            parent,
            env,
        }
    }

    /// Whether the node should react to pointer input.
    pub fn interactive(&self) -> bool {
        self.env == RenderEnv::Editor && !self.lock
    }
}

/// On-canvas manipulation state reported by the interaction layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformEvent {
    pub position: Point,
    /// Rotation in degrees.
    pub rotation: f32,
    /// Scale applied by resize handles since the gesture started.
    pub scale: Point,
}

impl TransformEvent {
    /// A pure move.
    pub fn moved_to(x: f32, y: f32, layer: &LayerData) -> Self {
        Self {
            position: Point::new(x, y),
            rotation: layer.base.rotation,
            scale: Point::new(1.0, 1.0),
        }
    }
}

/// Deferred write onto a scene node.
pub type NodePatch = Box<dyn FnOnce(&mut NodeProps) + Send>;

/// Expensive derived computation resolving to a node patch.
pub type DerivedFuture = BoxFuture<'static, EditorResult<NodePatch>>;

/// Per-identity manipulation callback.
pub type ControllerFn = Arc<dyn Fn(&mut LayerData, &TransformEvent) + Send + Sync>;

/// Manipulation callbacks a binding registers for the canvas interaction layer.
#[derive(Clone)]
pub struct Controllers {
    /// Called for every frame of a continuous manipulation.
    pub on_transform: ControllerFn,
    /// Called once when the manipulation is released.
    pub on_transform_end: ControllerFn,
}

impl fmt::Debug for Controllers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controllers").finish_non_exhaustive()
    }
}

/// Type-specific rendering for one layer variant.
///
/// The binding framework applies shared style first, then
/// [`apply`](Renderer::apply) for cheap variant state, and schedules
/// [`derive`](Renderer::derive) through the debouncer when a field in
/// [`derived_fields`](Renderer::derived_fields) changes.
pub trait Renderer: Send + Sync {
    fn node_kind(&self) -> NodeKind {
        NodeKind::Shape
    }

    /// Variant fields that require [`apply`](Renderer::apply).
    fn watched_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Apply cheap variant state synchronously.
    fn apply(&self, _props: &mut NodeProps, _layer: &LayerData) {}

    /// Variant fields that require the expensive derived computation.
    fn derived_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Start the expensive computation from a snapshot of `layer`.
    fn derive(&self, _layer: &LayerData) -> Option<DerivedFuture> {
        None
    }

    /// Live manipulation frame. `origin` is the size at gesture start.
    fn on_transform(&self, layer: &mut LayerData, event: &TransformEvent, origin: Option<Size>) {
        apply_transform(layer, event, origin);
    }

    /// Manipulation released.
    fn on_transform_end(&self, layer: &mut LayerData, event: &TransformEvent, origin: Option<Size>) {
        self.on_transform(layer, event, origin);
    }
}

/// Size a layer had when the current manipulation started.
///
/// Captured on the first frame and released with the gesture, so every frame
/// scales from the same origin.
#[derive(Debug, Default)]
pub struct Gesture {
    origin: Mutex<Option<Option<Size>>>,
}

impl Gesture {
    /// Origin of the running gesture, starting one if needed.
    pub fn origin(&self, layer: &LayerData) -> Option<Size> {
        *self.origin.lock().get_or_insert_with(|| layer.size())
    }

    /// Origin of the running gesture, ending it.
    pub fn finish(&self, layer: &LayerData) -> Option<Size> {
        self.origin.lock().take().unwrap_or_else(|| layer.size())
    }

    pub fn is_active(&self) -> bool {
        self.origin.lock().is_some()
    }
}

/// Default manipulation handling: move, rotate, and resize sized variants.
///
/// `event.scale` is relative to `origin`, the size at gesture start (the
/// current size when `None`). Unless the record allows free ratio changes,
/// the new height follows the new width through the `ratio` hint (or the
/// origin aspect ratio).
pub fn apply_transform(layer: &mut LayerData, event: &TransformEvent, origin: Option<Size>) {
    if event.position.is_finite() {
        layer.base.x = event.position.x;
        layer.base.y = event.position.y;
    }
    if event.rotation.is_finite() {
        layer.base.rotation = event.rotation;
    }

    let Some(size) = origin.or_else(|| layer.size()) else {
        return;
    };
    let (sx, sy) = (event.scale.x.abs(), event.scale.y.abs());
    if !sx.is_finite() || !sy.is_finite() {
        return;
    }

    let (width, height) = if sx == 1.0 && sy == 1.0 {
        (size.width, size.height)
    } else {
        let width = (size.width * sx).max(1.0);
        let height = if layer.base.unkeep_ratio {
            (size.height * sy).max(1.0)
        } else {
            let ratio = layer
                .base
                .ratio
                .filter(|r| r.is_finite() && *r > 0.0)
                .or_else(|| size.aspect_ratio())
                .unwrap_or(1.0);
            (width / ratio).max(1.0)
        };
        (width, height)
    };

    for (field, value) in [("width", width), ("height", height)] {
        if let Err(err) = layer.set_field(field, json!(value)) {
            tracing::warn!(layer = %layer.id(), error = %err, "resize rejected");
        }
    }
}
