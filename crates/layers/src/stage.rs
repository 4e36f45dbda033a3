//! The stage: reconciles store records with mounted bindings.
//!
//! All binding work happens in [`Stage::flush`]. Mutations only mark state
//! dirty and request a redraw, so any number of edits between two flushes
//! cost one pass.

use indexmap::IndexMap;
use parking_lot::RwLock;
use scene::{NodeId, Scene};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::binding::RenderBinding;
use crate::data::LayerData;
use crate::field::FieldSet;
use crate::id::LayerId;
use crate::registry::TypeRegistry;
use crate::render::{RenderEnv, RenderProps};
use crate::store::{EditorStore, NoticeLevel};

/// Shared handle to the scene graph.
pub type SceneHandle = Arc<RwLock<Scene>>;

/// Work done by one flush.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub mounted: usize,
    pub unmounted: usize,
    pub updated: usize,
    /// Records left unrendered (unknown type, missing parent).
    pub skipped: usize,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One record as the current page wants it rendered.
struct Desired {
    layer: LayerData,
    parent: Option<LayerId>,
    z_index: i32,
}

/// Owner of the scene and the bindings rendering the current page.
pub struct Stage {
    scene: SceneHandle,
    registry: Arc<TypeRegistry>,
    env: RenderEnv,
    /// Bindings in mount order.
    bindings: IndexMap<LayerId, RenderBinding>,
    /// Enclosing group of each mounted record.
    parents: HashMap<LayerId, Option<LayerId>>,
    flushes: u64,
}

impl Stage {
    pub fn new(registry: Arc<TypeRegistry>, scene: Scene, env: RenderEnv) -> Self {
        Self {
            scene: Arc::new(RwLock::new(scene)),
            registry,
            env,
            bindings: IndexMap::new(),
            parents: HashMap::new(),
            flushes: 0,
        }
    }

    pub fn scene(&self) -> &SceneHandle {
        &self.scene
    }

    pub fn env(&self) -> RenderEnv {
        self.env
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn binding(&self, id: &LayerId) -> Option<&RenderBinding> {
        self.bindings.get(id)
    }

    pub fn is_mounted(&self, id: &LayerId) -> bool {
        self.bindings.get(id).is_some_and(RenderBinding::is_mounted)
    }

    /// Scene node rendering `id`.
    pub fn node_of(&self, id: &LayerId) -> Option<NodeId> {
        self.bindings.get(id).and_then(RenderBinding::node)
    }

    pub fn mounted_count(&self) -> usize {
        self.bindings.len()
    }

    /// Flushes that did work.
    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    /// Apply everything marked dirty since the last flush.
    ///
    /// Does nothing unless a redraw was requested.
    pub fn flush(&mut self, store: &EditorStore) -> FlushReport {
        let mut report = FlushReport::default();
        if !store.take_redraw_request() {
            return report;
        }
        self.flushes += 1;

        let mut fresh = HashSet::new();
        if store.take_structure_dirty() {
            self.reconcile(store, &mut report, &mut fresh);
        }

        for (id, changed) in store.take_dirty() {
            if fresh.contains(&id) {
                continue;
            }
            let Some(layer) = store.layer(&id) else {
                continue;
            };
            let Some(binding) = self.bindings.get_mut(&id) else {
                continue;
            };
            let Some(previous) = binding.props().cloned() else {
                continue;
            };
            let props = RenderProps {
                hide: layer.base.hide,
                lock: layer.base.lock,
                dirty: layer.base.dirty,
                ..previous
            };
            match binding.update(&self.scene, &layer, props, &changed, store) {
                Ok(true) => report.updated += 1,
                Ok(false) => {}
                Err(err) => tracing::warn!(layer = %id, error = %err, "binding update failed"),
            }
        }

        store.take_selection_dirty();
        self.sync_handles(store);

        if !report.is_empty() {
            tracing::debug!(?report, "flush");
        }
        report
    }

    /// Unmount every binding, children first.
    pub fn teardown(&mut self, store: &EditorStore) -> usize {
        let ids: Vec<LayerId> = self.bindings.keys().rev().cloned().collect();
        for id in &ids {
            self.unmount(id, store);
        }
        self.scene.write().set_handles(Vec::new());
        ids.len()
    }

    fn reconcile(&mut self, store: &EditorStore, report: &mut FlushReport, fresh: &mut HashSet<LayerId>) {
        let page = store.current_page();
        let desired = store
            .with_page(page, |page| {
                let mut out = Vec::new();
                collect_desired(&page.layers, None, &mut out);
                out
            })
            .unwrap_or_default();

        let wanted: HashMap<&LayerId, &Option<LayerId>> =
            desired.iter().map(|d| (d.layer.id(), &d.parent)).collect();

        // Stale or reparented bindings go, along with everything mounted under them.
        let mut doomed: HashSet<LayerId> = self
            .bindings
            .keys()
            .filter(|id| match wanted.get(id) {
                None => true,
                Some(parent) => self.parents.get(*id) != Some(*parent),
            })
            .cloned()
            .collect();
        loop {
            let before = doomed.len();
            for (id, parent) in &self.parents {
                if parent.as_ref().is_some_and(|p| doomed.contains(p)) {
                    doomed.insert(id.clone());
                }
            }
            if doomed.len() == before {
                break;
            }
        }
        let order: Vec<LayerId> = self
            .bindings
            .keys()
            .rev()
            .filter(|id| doomed.contains(*id))
            .cloned()
            .collect();
        for id in order {
            if self.unmount(&id, store) {
                report.unmounted += 1;
            }
        }

        for entry in desired {
            let id = entry.layer.id().clone();
            let parent_node = match &entry.parent {
                None => Some(self.scene.read().root()),
                Some(group) => self.node_of(group),
            };
            let Some(parent_node) = parent_node else {
                tracing::debug!(layer = %id, "enclosing group not rendered; skipping");
                report.skipped += 1;
                continue;
            };
            let props = RenderProps::for_layer(&entry.layer, entry.z_index, parent_node, entry.parent.is_some(), self.env);

            if let Some(binding) = self.bindings.get_mut(&id) {
                if binding.props() != Some(&props) {
                    match binding.update(&self.scene, &entry.layer, props, &FieldSet::new(), store) {
                        Ok(true) => report.updated += 1,
                        Ok(false) => {}
                        Err(err) => tracing::warn!(layer = %id, error = %err, "binding update failed"),
                    }
                }
                continue;
            }

            let Some(plugin) = self.registry.lookup(entry.layer.type_tag()) else {
                store.notify(
                    NoticeLevel::Warning,
                    format!("Layer {} has unknown type '{}' and was not rendered", id, entry.layer.type_tag()),
                );
                report.skipped += 1;
                continue;
            };

            let mut binding = RenderBinding::new(id.clone(), entry.layer.type_tag(), plugin.renderer());
            match binding.mount(&self.scene, &entry.layer, props, store) {
                Ok(_) => {
                    self.bindings.insert(id.clone(), binding);
                    self.parents.insert(id.clone(), entry.parent);
                    fresh.insert(id);
                    report.mounted += 1;
                }
                Err(err) => {
                    tracing::warn!(layer = %id, error = %err, "mount failed");
                    report.skipped += 1;
                }
            }
        }
    }

    fn unmount(&mut self, id: &LayerId, store: &EditorStore) -> bool {
        self.parents.remove(id);
        match self.bindings.shift_remove(id) {
            Some(mut binding) => binding.unmount(&self.scene, store),
            None => false,
        }
    }

    /// Show handles on selected, unlocked, rendered records (editor only).
    fn sync_handles(&self, store: &EditorStore) {
        let handles = match self.env {
            RenderEnv::Preview => Vec::new(),
            RenderEnv::Editor => store
                .selection()
                .iter()
                .filter(|id| store.with_layer(id, |layer| !layer.base.lock).unwrap_or(false))
                .filter_map(|id| self.node_of(id))
                .collect(),
        };
        let mut scene = self.scene.write();
        if scene.handles() != handles.as_slice() {
            scene.set_handles(handles);
        }
    }
}

/// Pre-order walk; the head of each list gets the highest z-order.
fn collect_desired(layers: &[LayerData], parent: Option<&LayerId>, out: &mut Vec<Desired>) {
    let len = layers.len();
    for (index, layer) in layers.iter().enumerate() {
        out.push(Desired {
            layer: layer.clone(),
            parent: parent.cloned(),
            z_index: (len - 1 - index) as i32,
        });
        if layer.is_group() {
            collect_desired(layer.children(), Some(layer.id()), out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::tests::BoxRenderer;
    use crate::data::tests::{box_layer, BoxProps};
    use crate::panel::tests::NoControls;
    use crate::plugin::{Plugin, PluginConfig, PluginMeta};
    use crate::render::Renderer;
    use crate::panel::OptionsPanel;
    use crate::store::InsertTarget;
    use serde_json::Value;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    struct BoxPlugin {
        config: PluginConfig,
        renderer: Arc<BoxRenderer>,
    }

    impl Plugin for BoxPlugin {
        fn config(&self) -> &PluginConfig {
            &self.config
        }

        fn meta(&self) -> PluginMeta {
            PluginMeta::new("Box", "Test box")
        }

        fn create(&self, _overrides: &Value) -> LayerData {
            box_layer(LayerId::generate().as_str())
        }

        fn renderer(&self) -> Arc<dyn Renderer> {
            self.renderer.clone()
        }

        fn options_panel(&self) -> Arc<dyn OptionsPanel> {
            Arc::new(NoControls)
        }
    }

    fn setup(env: RenderEnv) -> (Stage, EditorStore, Arc<BoxRenderer>) {
        let renderer = Arc::new(BoxRenderer::default());
        let plugin = BoxPlugin {
            config: PluginConfig::new("box", "1.0.0"),
            renderer: renderer.clone(),
        };
        let mut registry = TypeRegistry::new();
        registry.register(Arc::new(plugin)).unwrap();
        let stage = Stage::new(Arc::new(registry), Scene::new(800.0, 600.0), env);
        (stage, EditorStore::default(), renderer)
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_mounts_with_head_on_top() {
        let (mut stage, store, _) = setup(RenderEnv::Editor);
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();
        store.insert_layer(box_layer("b"), InsertTarget::current()).unwrap();

        let report = stage.flush(&store);
        assert_eq!(report.mounted, 2);

        let scene = stage.scene().read();
        assert_eq!(scene.props_of("b").unwrap().z_index, 1);
        assert_eq!(scene.props_of("a").unwrap().z_index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_without_request_is_noop() {
        let (mut stage, store, _) = setup(RenderEnv::Editor);
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();
        stage.flush(&store);

        assert!(stage.flush(&store).is_empty());
        assert_eq!(stage.flush_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_coalesce_into_one_update() {
        let (mut stage, store, _) = setup(RenderEnv::Editor);
        let id = LayerId::from("a");
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();
        stage.flush(&store);

        for x in 1..=10 {
            store.mutate(&id, |layer| layer.base.x = x as f32).unwrap();
            store.request_redraw();
        }
        let report = stage.flush(&store);

        assert_eq!(report.updated, 1);
        assert_eq!(stage.binding(&id).unwrap().update_count(), 1);
        assert_eq!(stage.scene().read().props_of("a").unwrap().position.x, 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_derived_debounced_across_flushes() {
        let (mut stage, store, renderer) = setup(RenderEnv::Editor);
        let id = LayerId::from("a");
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();
        stage.flush(&store);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(renderer.derive_runs.load(Ordering::SeqCst), 1);

        for label in ["one", "two"] {
            store
                .mutate(&id, |layer| layer.variant_mut::<BoxProps>().unwrap().label = label.into())
                .unwrap();
            stage.flush(&store);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(renderer.derive_runs.load(Ordering::SeqCst), 2);
        assert_eq!(stage.scene().read().props_of("a").unwrap().image.as_deref(), Some("two"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_removal_unmounts() {
        let (mut stage, store, _) = setup(RenderEnv::Editor);
        let id = LayerId::from("a");
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();
        stage.flush(&store);

        store.remove_layer(&id).unwrap();
        let report = stage.flush(&store);

        assert_eq!(report.unmounted, 1);
        assert!(!stage.is_mounted(&id));
        assert_eq!(stage.scene().read().content_len(), 0);
        assert_eq!(store.side_table_entries(&id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reorder_updates_z() {
        let (mut stage, store, _) = setup(RenderEnv::Editor);
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();
        store.insert_layer(box_layer("b"), InsertTarget::current()).unwrap();
        stage.flush(&store);

        store.bring_forward(&LayerId::from("a")).unwrap();
        let report = stage.flush(&store);

        assert_eq!(report.updated, 2);
        assert_eq!(stage.scene().read().props_of("a").unwrap().z_index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handles_follow_selection() {
        let (mut stage, store, _) = setup(RenderEnv::Editor);
        let id = LayerId::from("a");
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();
        stage.flush(&store);

        store.set_selection(vec![id.clone()]);
        stage.flush(&store);
        assert_eq!(stage.scene().read().handles(), &[stage.node_of(&id).unwrap()]);

        store.mutate(&id, |layer| layer.base.lock = true).unwrap();
        stage.flush(&store);
        assert!(stage.scene().read().handles().is_empty());
    }

    #[test]
    fn test_preview_shows_no_handles() {
        let (mut stage, store, _) = setup(RenderEnv::Preview);
        let id = LayerId::from("a");
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();
        store.set_selection(vec![id.clone()]);
        stage.flush(&store);

        assert!(stage.is_mounted(&id));
        assert!(stage.scene().read().handles().is_empty());
        assert!(store.controllers(&id).is_none());
    }

    #[test]
    fn test_unknown_type_skipped() {
        let (mut stage, store, _) = setup(RenderEnv::Preview);
        let stray = LayerData::new(LayerId::from("x"), "mystery", Default::default(), BoxProps::default());
        store.insert_layer(stray, InsertTarget::current()).unwrap();
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();

        let report = stage.flush(&store);

        assert_eq!(report.skipped, 1);
        assert_eq!(report.mounted, 1);
        assert_eq!(store.notices().len(), 1);
    }
}
