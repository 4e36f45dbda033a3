//! Retained scene graph driven by layer render bindings.
//!
//! The graph is deliberately passive: nodes carry the visual properties a
//! backend needs (position, rotation, opacity, shadow, stroke, content) and a
//! dirty flag. A node's `name` is the identity of the layer record it renders.

pub mod node;
pub mod scene;

pub use node::{BlendMode, NodeFlags, NodeId, NodeKind, NodeProps, NodeTree, SceneNode, Shadow, Stroke};
pub use scene::Scene;
