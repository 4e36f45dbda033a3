//! Per-instance render bindings.

use common::{EditorError, EditorResult};
use scene::NodeId;
use std::sync::Arc;
use std::time::Duration;

use crate::data::LayerData;
use crate::field::FieldSet;
use crate::id::LayerId;
use crate::render::{ControllerFn, Controllers, Gesture, RenderProps, Renderer};
use crate::stage::SceneHandle;
use crate::store::EditorStore;
use crate::style::{sync_style, STYLE_FIELDS};

/// Lifecycle of one binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingState {
    Uninitialized,
    Mounted,
    Unmounted,
}

/// Live link between one layer record and one scene node.
pub struct RenderBinding {
    layer_id: LayerId,
    type_tag: String,
    renderer: Arc<dyn Renderer>,
    state: BindingState,
    node: Option<NodeId>,
    props: Option<RenderProps>,
    updates: u64,
}

impl RenderBinding {
    pub fn new(layer_id: LayerId, type_tag: impl Into<String>, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            layer_id,
            type_tag: type_tag.into(),
            renderer,
            state: BindingState::Uninitialized,
            node: None,
            props: None,
            updates: 0,
        }
    }

    pub fn layer_id(&self) -> &LayerId {
        &self.layer_id
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn state(&self) -> BindingState {
        self.state
    }

    pub fn is_mounted(&self) -> bool {
        self.state == BindingState::Mounted
    }

    /// Scene node owned by this binding while mounted.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Host parameters of the last mount or update.
    pub fn props(&self) -> Option<&RenderProps> {
        self.props.as_ref()
    }

    /// Updates applied since mount.
    pub fn update_count(&self) -> u64 {
        self.updates
    }

    /// Record fields this binding depends on.
    pub fn subscribed_fields(&self) -> Vec<&'static str> {
        let mut fields: Vec<&'static str> = STYLE_FIELDS.to_vec();
        for field in self
            .renderer
            .watched_fields()
            .iter()
            .chain(self.renderer.derived_fields())
        {
            if !fields.contains(field) {
                fields.push(field);
            }
        }
        fields
    }

    /// Create the scene node, style it, then attach it under `props.parent`.
    pub fn mount(
        &mut self,
        scene: &SceneHandle,
        layer: &LayerData,
        props: RenderProps,
        store: &EditorStore,
    ) -> EditorResult<NodeId> {
        if self.state != BindingState::Uninitialized {
            return Err(EditorError::AlreadyMounted(self.layer_id.to_string()));
        }
        if layer.id() != &self.layer_id {
            return Err(EditorError::invalid_field(
                "id",
                format!("binding for {} given record {}", self.layer_id, layer.id()),
            ));
        }

        let node = {
            let mut scene = scene.write();
            if scene.node(props.parent).is_none() {
                return Err(EditorError::NotMounted(format!("parent of {}", self.layer_id)));
            }
            if scene.tree().find(self.layer_id.as_str()).is_some() {
                return Err(EditorError::AlreadyMounted(self.layer_id.to_string()));
            }
            let tree = scene.tree_mut();
            let node = tree.create_node(self.layer_id.as_str(), self.renderer.node_kind());
            let renderer = &self.renderer;
            tree.update(node, |node_props| {
                sync_style(node_props, layer, &props);
                renderer.apply(node_props, layer);
            });
            tree.append_child(props.parent, node);
            node
        };

        store.subscribe(&self.layer_id, self.subscribed_fields());
        self.sync_controllers(&props, store);
        self.node = Some(node);
        self.props = Some(props);
        self.state = BindingState::Mounted;
        self.schedule_derive(scene, layer, store, Duration::ZERO);

        tracing::debug!(layer = %self.layer_id, kind = %self.type_tag, "binding mounted");
        Ok(node)
    }

    /// Re-apply whatever `changed` touches. Returns whether any work ran.
    ///
    /// Host parameter changes (z-order, hide, lock) re-run shared style.
    /// Derived content is debounced through the store's debouncer.
    pub fn update(
        &mut self,
        scene: &SceneHandle,
        layer: &LayerData,
        props: RenderProps,
        changed: &FieldSet,
        store: &EditorStore,
    ) -> EditorResult<bool> {
        let node = match (self.state, self.node) {
            (BindingState::Mounted, Some(node)) => node,
            _ => return Err(EditorError::NotMounted(self.layer_id.to_string())),
        };

        let props_changed = self.props.as_ref() != Some(&props);
        let style = props_changed || changed.intersects(STYLE_FIELDS);
        let watched = changed.intersects(self.renderer.watched_fields());
        let derived = changed.intersects(self.renderer.derived_fields());

        if style || watched {
            let mut scene = scene.write();
            let renderer = &self.renderer;
            scene.tree_mut().update(node, |node_props| {
                if style {
                    sync_style(node_props, layer, &props);
                }
                if watched {
                    renderer.apply(node_props, layer);
                }
            });
        }
        if props_changed {
            self.sync_controllers(&props, store);
        }
        if derived {
            self.schedule_derive(scene, layer, store, store.debounce_period());
        }

        self.props = Some(props);
        let ran = style || watched || derived;
        if ran {
            self.updates += 1;
        }
        Ok(ran)
    }

    /// Remove the node and every side-table entry for this identity.
    ///
    /// Returns `false` when the binding was not mounted.
    pub fn unmount(&mut self, scene: &SceneHandle, store: &EditorStore) -> bool {
        if self.state != BindingState::Mounted {
            return false;
        }
        store.debouncer().cancel(&self.layer_id);
        store.release(&self.layer_id);
        if let Some(node) = self.node.take() {
            scene.write().remove_node(node);
        }
        self.state = BindingState::Unmounted;
        tracing::debug!(layer = %self.layer_id, "binding unmounted");
        true
    }

    fn sync_controllers(&self, props: &RenderProps, store: &EditorStore) {
        if props.interactive() {
            store.register_controllers(&self.layer_id, self.controllers());
        } else {
            store.unregister_controllers(&self.layer_id);
        }
    }

    fn controllers(&self) -> Controllers {
        let gesture = Arc::new(Gesture::default());

        let renderer = Arc::clone(&self.renderer);
        let frames = Arc::clone(&gesture);
        let on_transform: ControllerFn = Arc::new(move |layer, event| {
            let origin = frames.origin(layer);
            renderer.on_transform(layer, event, origin);
        });
        let renderer = Arc::clone(&self.renderer);
        let on_transform_end: ControllerFn = Arc::new(move |layer, event| {
            let origin = gesture.finish(layer);
            renderer.on_transform_end(layer, event, origin);
        });
        Controllers {
            on_transform,
            on_transform_end,
        }
    }

    fn schedule_derive(&self, scene: &SceneHandle, layer: &LayerData, store: &EditorStore, delay: Duration) {
        if let Some(job) = self.renderer.derive(layer) {
            store
                .debouncer()
                .schedule(self.layer_id.clone(), delay, Arc::clone(scene), job);
        }
    }
}

impl std::fmt::Debug for RenderBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderBinding")
            .field("layer_id", &self.layer_id)
            .field("type_tag", &self.type_tag)
            .field("state", &self.state)
            .field("node", &self.node)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::tests::{box_layer, BoxProps};
    use crate::render::{DerivedFuture, NodePatch, RenderEnv};
    use crate::store::InsertTarget;
    use common::Size;
    use futures::FutureExt;
    use parking_lot::RwLock;
    use scene::Scene;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Box renderer: size is cheap, the label is "expensive".
    #[derive(Default)]
    pub struct BoxRenderer {
        pub derive_runs: Arc<AtomicUsize>,
    }

    impl Renderer for BoxRenderer {
        fn watched_fields(&self) -> &'static [&'static str] {
            &["width", "height"]
        }

        fn apply(&self, props: &mut scene::NodeProps, layer: &LayerData) {
            if let Some(size) = layer.size() {
                props.size = size;
            }
        }

        fn derived_fields(&self) -> &'static [&'static str] {
            &["label"]
        }

        fn derive(&self, layer: &LayerData) -> Option<DerivedFuture> {
            let label = layer.variant::<BoxProps>()?.label.clone();
            let runs = Arc::clone(&self.derive_runs);
            Some(
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    let patch: NodePatch = Box::new(move |props| props.image = Some(label));
                    Ok(patch)
                }
                .boxed(),
            )
        }
    }

    fn setup() -> (SceneHandle, EditorStore, LayerData) {
        let scene = Arc::new(RwLock::new(Scene::new(800.0, 600.0)));
        let store = EditorStore::default();
        let layer = box_layer("a");
        store.insert_layer(layer.clone(), InsertTarget::current()).unwrap();
        (scene, store, layer)
    }

    fn props_for(scene: &SceneHandle, layer: &LayerData, z: i32) -> RenderProps {
        let root = scene.read().root();
        RenderProps::for_layer(layer, z, root, false, RenderEnv::Editor)
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_creates_one_named_node() {
        let (scene, store, layer) = setup();
        let renderer = Arc::new(BoxRenderer::default());
        let mut binding = RenderBinding::new(layer.id().clone(), "box", renderer.clone());

        let node = binding
            .mount(&scene, &layer, props_for(&scene, &layer, 4), &store)
            .unwrap();

        {
            let scene = scene.read();
            assert_eq!(scene.tree().count_named("a"), 1);
            let mounted = scene.node(node).unwrap();
            assert_eq!(mounted.parent, Some(scene.root()));
            assert_eq!(mounted.props.z_index, 4);
            assert_eq!(mounted.props.size, Size::new(10.0, 20.0));
        }
        assert!(store.controllers(layer.id()).is_some());
        assert!(store.subscribed_fields(layer.id()).unwrap().contains(&"label"));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(renderer.derive_runs.load(Ordering::SeqCst), 1);
        assert_eq!(scene.read().props_of("a").unwrap().image.as_deref(), Some("hello"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_mount_rejected() {
        let (scene, store, layer) = setup();
        let mut binding = RenderBinding::new(layer.id().clone(), "box", Arc::new(BoxRenderer::default()));
        binding.mount(&scene, &layer, props_for(&scene, &layer, 0), &store).unwrap();

        let err = binding
            .mount(&scene, &layer, props_for(&scene, &layer, 0), &store)
            .unwrap_err();
        assert!(matches!(err, EditorError::AlreadyMounted(_)));

        let mut other = RenderBinding::new(layer.id().clone(), "box", Arc::new(BoxRenderer::default()));
        assert!(other.mount(&scene, &layer, props_for(&scene, &layer, 0), &store).is_err());
        assert_eq!(scene.read().tree().count_named("a"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_cheap_and_style() {
        let (scene, store, mut layer) = setup();
        let mut binding = RenderBinding::new(layer.id().clone(), "box", Arc::new(BoxRenderer::default()));
        binding.mount(&scene, &layer, props_for(&scene, &layer, 0), &store).unwrap();

        layer.variant_mut::<BoxProps>().unwrap().width = 50.0;
        layer.base.x = 7.0;
        let changed: FieldSet = ["width", "x"].into_iter().collect();
        assert!(binding
            .update(&scene, &layer, props_for(&scene, &layer, 0), &changed, &store)
            .unwrap());

        let scene_ref = scene.read();
        let props = scene_ref.props_of("a").unwrap();
        assert_eq!(props.size.width, 50.0);
        assert_eq!(props.position.x, 7.0);
        drop(scene_ref);

        let unrelated: FieldSet = ["name"].into_iter().collect();
        assert!(!binding
            .update(&scene, &layer, props_for(&scene, &layer, 0), &unrelated, &store)
            .unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_drops_controllers() {
        let (scene, store, mut layer) = setup();
        let mut binding = RenderBinding::new(layer.id().clone(), "box", Arc::new(BoxRenderer::default()));
        binding.mount(&scene, &layer, props_for(&scene, &layer, 0), &store).unwrap();

        layer.base.lock = true;
        let changed: FieldSet = ["lock"].into_iter().collect();
        binding
            .update(&scene, &layer, props_for(&scene, &layer, 0), &changed, &store)
            .unwrap();
        assert!(store.controllers(layer.id()).is_none());
        assert!(!scene.read().props_of("a").unwrap().is_listening());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_leaves_nothing() {
        let (scene, store, mut layer) = setup();
        let renderer = Arc::new(BoxRenderer::default());
        let mut binding = RenderBinding::new(layer.id().clone(), "box", renderer.clone());
        binding.mount(&scene, &layer, props_for(&scene, &layer, 0), &store).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        layer.variant_mut::<BoxProps>().unwrap().label = "pending".into();
        let changed: FieldSet = ["label"].into_iter().collect();
        binding
            .update(&scene, &layer, props_for(&scene, &layer, 0), &changed, &store)
            .unwrap();
        assert!(store.debouncer().is_pending(layer.id()));

        assert!(binding.unmount(&scene, &store));
        assert!(!binding.unmount(&scene, &store));
        assert_eq!(binding.state(), BindingState::Unmounted);
        assert_eq!(scene.read().content_len(), 0);
        assert_eq!(store.side_table_entries(layer.id()), 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(renderer.derive_runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_preview_registers_no_controllers() {
        let (scene, store, layer) = setup();
        let mut binding = RenderBinding::new(layer.id().clone(), "box", Arc::new(BoxRenderer::default()));
        let root = scene.read().root();
        let props = RenderProps::for_layer(&layer, 0, root, false, RenderEnv::Preview);
        binding.mount(&scene, &layer, props, &store).unwrap();

        assert!(store.controllers(layer.id()).is_none());
        assert!(!scene.read().props_of("a").unwrap().is_listening());
    }
}
