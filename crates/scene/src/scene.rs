//! Scene graph root for one canvas.

use crate::node::{NodeId, NodeKind, NodeProps, NodeTree, SceneNode};
use common::{Color, Point, Rect, Size};
use std::fmt::Write as _;

/// Name of the root container node.
pub const ROOT_NAME: &str = "__root__";

/// A canvas scene.
pub struct Scene {
    /// Node tree.
    tree: NodeTree,
    /// Scene bounds.
    bounds: Rect,
    /// Background color.
    background: Color,
    /// Nodes currently showing manipulation handles.
    handles: Vec<NodeId>,
}

impl Scene {
    pub fn new(width: f32, height: f32) -> Self {
        let mut tree = NodeTree::new();
        let root = tree.create_node(ROOT_NAME, NodeKind::Group);
        tree.set_root(root);
        tree.update(root, |props| props.size = Size::new(width, height));

        Self {
            tree,
            bounds: Rect::new(0.0, 0.0, width, height),
            background: Color::WHITE,
            handles: Vec::new(),
        }
    }

    /// Get the node tree.
    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    /// Get mutable node tree.
    pub fn tree_mut(&mut self) -> &mut NodeTree {
        &mut self.tree
    }

    /// Get the root container.
    pub fn root(&self) -> NodeId {
        // The root is created in `new` and never removed through `Scene`.
        self.tree.root().unwrap_or_default()
    }

    /// Get a node.
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.tree.get(id)
    }

    /// Get a node by the layer identity it renders.
    pub fn node_named(&self, name: &str) -> Option<&SceneNode> {
        self.tree.find(name).and_then(|id| self.tree.get(id))
    }

    /// Get a node's properties by the layer identity it renders.
    pub fn props_of(&self, name: &str) -> Option<&NodeProps> {
        self.node_named(name).map(|node| &node.props)
    }

    /// Number of nodes besides the root.
    pub fn content_len(&self) -> usize {
        self.tree.len().saturating_sub(1)
    }

    /// Remove a node unless it is the root.
    pub fn remove_node(&mut self, id: NodeId) {
        if Some(id) == self.tree.root() {
            tracing::warn!("refusing to remove the scene root");
            return;
        }
        self.handles.retain(|h| *h != id);
        self.tree.remove(id);
        let tree = &self.tree;
        self.handles.retain(|h| tree.get(*h).is_some());
    }

    /// Resize the scene.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.bounds.width = width;
        self.bounds.height = height;
        let root = self.root();
        self.tree
            .update(root, |props| props.size = Size::new(width, height));
    }

    /// Get scene bounds.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Set background color.
    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    /// Get background color.
    pub fn background(&self) -> Color {
        self.background
    }

    /// Replace the set of nodes showing manipulation handles.
    pub fn set_handles(&mut self, nodes: Vec<NodeId>) {
        let tree = &self.tree;
        self.handles = nodes.into_iter().filter(|id| tree.get(*id).is_some()).collect();
    }

    /// Nodes currently showing manipulation handles.
    pub fn handles(&self) -> &[NodeId] {
        &self.handles
    }

    /// Hit test to find the topmost listening leaf at a point.
    pub fn hit_test(&self, point: Point) -> Option<NodeId> {
        let paint_order = self.tree.paint_order();

        for node_id in paint_order.into_iter().rev() {
            let Some(node) = self.tree.get(node_id) else {
                continue;
            };
            if node.kind == NodeKind::Group || !node.props.is_listening() {
                continue;
            }
            let Some(inverse) = node.world_transform(&self.tree).inverse() else {
                continue;
            };
            let local = inverse.transform_point(point);
            let size = node.props.size;
            if Rect::new(0.0, 0.0, size.width, size.height).contains_point(local) {
                return Some(node_id);
            }
        }

        None
    }

    /// Render the tree as indented text, one node per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.tree.root() {
            self.dump_node(root, 0, &mut out);
        }
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let Some(node) = self.tree.get(id) else {
            return;
        };
        let props = &node.props;
        let _ = writeln!(
            out,
            "{:indent$}{} {:?} z={} pos=({:.1}, {:.1}) size={:.1}x{:.1}{}{}",
            "",
            node.name,
            node.kind,
            props.z_index,
            props.position.x,
            props.position.y,
            props.size.width,
            props.size.height,
            if props.is_visible() { "" } else { " hidden" },
            if props.is_listening() { "" } else { " locked" },
            indent = depth * 2,
        );
        for child in self.tree.sorted_children(id) {
            self.dump_node(child, depth + 1, out);
        }
    }
}
