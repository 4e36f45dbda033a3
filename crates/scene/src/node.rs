//! Scene nodes and the node tree.

use bitflags::bitflags;
use common::{Color, CornerRadii, Point, Size, Transform};
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::collections::HashMap;

new_key_type! {
    /// Unique identifier for a scene node.
    pub struct NodeId;
}

bitflags! {
    /// Interaction and visibility state of a node.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// The node is painted.
        const VISIBLE = 1 << 0;
        /// The node receives pointer events.
        const LISTENING = 1 << 1;
        /// The node can be dragged on the canvas.
        const DRAGGABLE = 1 << 2;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        NodeFlags::VISIBLE | NodeFlags::LISTENING
    }
}

/// What a node paints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Container for other nodes.
    Group,
    /// Vector shape filled with a color.
    Shape,
    /// Raster or encoded image content.
    Image,
}

/// Compositing blend mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    #[serde(alias = "source-over")]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

/// Drop shadow effect.
#[derive(Clone, Debug, PartialEq)]
pub struct Shadow {
    pub offset: Point,
    pub blur: f32,
    pub color: Color,
}

/// Outline stroke.
#[derive(Clone, Debug, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width: f32,
    pub dash: Vec<f32>,
    pub dash_offset: f32,
}

/// Visual properties of a node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeProps {
    pub position: Point,
    /// Rotation in degrees.
    pub rotation: f32,
    pub size: Size,
    /// Scale; negative components flip the node.
    pub scale: Point,
    /// Local origin offset, used to keep flipped nodes in place.
    pub offset: Point,
    /// Opacity (0.0 - 1.0).
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub flags: NodeFlags,
    /// Stacking order among siblings; higher paints later.
    pub z_index: i32,
    pub shadow: Option<Shadow>,
    pub stroke: Option<Stroke>,
    pub blur: f32,
    pub corner_radius: CornerRadii,
    pub fill: Option<Color>,
    /// Encoded image content (data URL or similar).
    pub image: Option<String>,
}

impl Default for NodeProps {
    fn default() -> Self {
        Self {
            position: Point::ZERO,
            rotation: 0.0,
            size: Size::ZERO,
            scale: Point::new(1.0, 1.0),
            offset: Point::ZERO,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            flags: NodeFlags::default(),
            z_index: 0,
            shadow: None,
            stroke: None,
            blur: 0.0,
            corner_radius: CornerRadii::ZERO,
            fill: None,
            image: None,
        }
    }
}

impl NodeProps {
    /// Local transform: offset, scale, rotation, then translation.
    pub fn local_transform(&self) -> Transform {
        Transform::translation(-self.offset.x, -self.offset.y)
            .then(&Transform::scale(self.scale.x, self.scale.y))
            .then(&Transform::rotation_degrees(self.rotation))
            .then(&Transform::translation(self.position.x, self.position.y))
    }

    pub fn is_visible(&self) -> bool {
        self.flags.contains(NodeFlags::VISIBLE)
    }

    pub fn is_listening(&self) -> bool {
        self.flags.contains(NodeFlags::LISTENING)
    }
}

/// A retained scene node.
#[derive(Clone, Debug)]
pub struct SceneNode {
    /// Node ID.
    pub id: NodeId,
    /// Identity of the layer record this node renders.
    pub name: String,
    pub kind: NodeKind,
    /// Parent node.
    pub parent: Option<NodeId>,
    /// Child nodes.
    pub children: SmallVec<[NodeId; 4]>,
    pub props: NodeProps,
    /// Whether the node needs repainting.
    pub dirty: bool,
}

impl SceneNode {
    pub fn new(id: NodeId, name: String, kind: NodeKind) -> Self {
        Self {
            id,
            name,
            kind,
            parent: None,
            children: SmallVec::new(),
            props: NodeProps::default(),
            dirty: true,
        }
    }

    /// Get the accumulated transform.
    pub fn world_transform(&self, tree: &NodeTree) -> Transform {
        let local = self.props.local_transform();
        match self.parent.and_then(|parent_id| tree.get(parent_id)) {
            Some(parent) => local.then(&parent.world_transform(tree)),
            None => local,
        }
    }

    /// Whether this node and all its ancestors are visible.
    pub fn effective_visible(&self, tree: &NodeTree) -> bool {
        if !self.props.is_visible() {
            return false;
        }
        match self.parent.and_then(|parent_id| tree.get(parent_id)) {
            Some(parent) => parent.effective_visible(tree),
            None => true,
        }
    }
}

/// Node tree.
pub struct NodeTree {
    nodes: SlotMap<NodeId, SceneNode>,
    names: HashMap<String, NodeId>,
    root: Option<NodeId>,
    /// Bumped on every observable change.
    revision: u64,
}

impl NodeTree {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            names: HashMap::new(),
            root: None,
            revision: 0,
        }
    }

    /// Create a detached node.
    pub fn create_node(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let name = name.into();
        let id = self
            .nodes
            .insert_with_key(|id| SceneNode::new(id, name.clone(), kind));
        if self.names.insert(name.clone(), id).is_some() {
            tracing::warn!(name = %name, "scene node name reused");
        }
        self.revision += 1;
        id
    }

    /// Get the root node.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Set the root node.
    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Get a node by ID.
    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Look up a node by name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied().filter(|id| self.nodes.contains_key(*id))
    }

    /// Count nodes carrying `name`.
    pub fn count_named(&self, name: &str) -> usize {
        self.nodes.values().filter(|n| n.name == name).count()
    }

    /// Update a node's properties; returns whether anything changed.
    ///
    /// Unchanged updates leave the dirty flag and the revision untouched.
    pub fn update<F>(&mut self, id: NodeId, f: F) -> bool
    where
        F: FnOnce(&mut NodeProps),
    {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        let mut props = node.props.clone();
        f(&mut props);
        if props == node.props {
            return false;
        }
        node.props = props;
        node.dirty = true;
        self.revision += 1;
        true
    }

    /// Append a child node, detaching it from any previous parent.
    pub fn append_child(&mut self, parent_id: NodeId, child_id: NodeId) {
        if parent_id == child_id || !self.nodes.contains_key(parent_id) {
            return;
        }
        if let Some(old_parent) = self.nodes.get(child_id).and_then(|c| c.parent) {
            if old_parent == parent_id {
                return;
            }
            if let Some(old) = self.nodes.get_mut(old_parent) {
                old.children.retain(|id| *id != child_id);
            }
        }
        if let Some(child) = self.nodes.get_mut(child_id) {
            child.parent = Some(parent_id);
        } else {
            return;
        }
        if let Some(parent) = self.nodes.get_mut(parent_id) {
            parent.children.push(child_id);
            parent.dirty = true;
        }
        self.revision += 1;
    }

    /// Remove a node and its subtree.
    pub fn remove(&mut self, node_id: NodeId) {
        if let Some(parent_id) = self.nodes.get(node_id).and_then(|n| n.parent) {
            if let Some(parent) = self.nodes.get_mut(parent_id) {
                parent.children.retain(|id| *id != node_id);
                parent.dirty = true;
            }
        }

        let mut to_remove = vec![node_id];
        let mut i = 0;
        while i < to_remove.len() {
            if let Some(node) = self.nodes.get(to_remove[i]) {
                to_remove.extend(node.children.iter().copied());
            }
            i += 1;
        }

        for id in to_remove {
            if let Some(node) = self.nodes.remove(id) {
                if self.names.get(&node.name) == Some(&id) {
                    self.names.remove(&node.name);
                }
                self.revision += 1;
            }
        }

        if self.root == Some(node_id) {
            self.root = None;
        }
    }

    /// Children of `id` in paint order (ascending z, stable).
    pub fn sorted_children(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };
        let mut children: Vec<NodeId> = node.children.to_vec();
        children.sort_by_key(|child| self.nodes.get(*child).map(|c| c.props.z_index).unwrap_or(0));
        children
    }

    /// Visible nodes in paint order (back to front).
    pub fn paint_order(&self) -> Vec<NodeId> {
        let mut result = Vec::new();
        if let Some(root_id) = self.root {
            self.collect_paint_order(root_id, &mut result);
        }
        result
    }

    fn collect_paint_order(&self, node_id: NodeId, result: &mut Vec<NodeId>) {
        let Some(node) = self.nodes.get(node_id) else {
            return;
        };
        if !node.props.is_visible() {
            return;
        }
        result.push(node_id);
        for child_id in self.sorted_children(node_id) {
            self.collect_paint_order(child_id, result);
        }
    }

    /// Clear every dirty flag, returning the nodes that were dirty.
    pub fn take_dirty(&mut self) -> Vec<NodeId> {
        let mut dirty = Vec::new();
        for (id, node) in self.nodes.iter_mut() {
            if node.dirty {
                node.dirty = false;
                dirty.push(id);
            }
        }
        dirty
    }

    /// Iterate over all nodes.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Get number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}
