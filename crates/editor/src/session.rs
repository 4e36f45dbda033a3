//! Editing session - ties the registry, store and stage together.

use common::{EditorError, EditorResult};
use layers::panel::apply_edit;
use layers::{
    build_view, ChangeKind, EditorStore, FlushReport, HistoryEntry, InsertTarget, LayerData, LayerId,
    NoticeLevel, PanelEdit, PanelView, Plugin, SceneHandle, Stage, TransformEvent, TypeRegistry,
};
use scene::Scene;
use serde_json::Value;
use std::sync::Arc;

use crate::config::EditorConfig;

/// One editing session over one project.
pub struct EditorSession {
    config: EditorConfig,
    registry: Arc<TypeRegistry>,
    store: Arc<EditorStore>,
    stage: Stage,
}

impl EditorSession {
    /// Create a session with the built-in plugins.
    pub fn new(config: EditorConfig) -> EditorResult<Self> {
        Self::with_plugins(config, plugins::default_plugins()?)
    }

    /// Create a session with an explicit plugin list.
    ///
    /// Registration problems (duplicate type identity, bad plugin config)
    /// fail here rather than at first use.
    pub fn with_plugins(config: EditorConfig, plugins: Vec<Arc<dyn Plugin>>) -> EditorResult<Self> {
        config.validate()?;
        let registry = Arc::new(TypeRegistry::from_plugins(plugins)?);
        let store = Arc::new(EditorStore::new(config.store_options()));

        let mut scene = Scene::new(config.canvas_width, config.canvas_height);
        scene.set_background(config.background);
        let stage = Stage::new(Arc::clone(&registry), scene, config.env);

        tracing::info!(
            plugins = registry.len(),
            env = ?config.env,
            "editor session started"
        );
        Ok(Self {
            config,
            registry,
            store,
            stage,
        })
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<EditorStore> {
        &self.store
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn scene(&self) -> &SceneHandle {
        self.stage.scene()
    }

    /// Create a layer of `type_id` on the current page.
    ///
    /// An unknown type only produces a notice.
    pub fn create_layer(&self, type_id: &str, overrides: &Value) -> Option<LayerId> {
        let Some(plugin) = self.registry.lookup(type_id) else {
            self.store
                .notify(NoticeLevel::Info, format!("No plugin provides layer type '{}'", type_id));
            return None;
        };

        match self.add_layer(plugin.create(overrides), InsertTarget::current()) {
            Ok(id) => Some(id),
            Err(err) => {
                self.store.notify(NoticeLevel::Warning, format!("Could not add layer: {}", err));
                None
            }
        }
    }

    /// Insert an existing record and record an `Add` entry.
    pub fn add_layer(&self, layer: LayerData, target: InsertTarget) -> EditorResult<LayerId> {
        let id = layer.id().clone();
        let after = layer.to_value();
        let description = format!("Add {}", layer.type_tag());
        let location = self.store.insert_layer(layer, target)?;
        self.store.record(
            HistoryEntry::new(ChangeKind::Add, description, id.clone())
                .at(location)
                .with_after(after),
        );
        Ok(id)
    }

    /// Remove a layer and record a `Remove` entry.
    pub fn remove_layer(&self, id: &LayerId) -> EditorResult<()> {
        let (removed, location) = self.store.remove_layer(id)?;
        self.store.record(
            HistoryEntry::new(ChangeKind::Remove, format!("Remove {}", removed.type_tag()), id.clone())
                .at(location)
                .with_before(removed.to_value()),
        );
        Ok(())
    }

    pub fn select(&self, ids: &[LayerId]) {
        self.store.set_selection(ids.to_vec());
    }

    /// Panel view for the selected layer.
    pub fn panel_view(&self) -> Option<PanelView> {
        let layer = self.store.selected_data()?;
        let plugin = self.registry.lookup(layer.type_tag())?;
        Some(build_view(plugin.options_panel().as_ref(), &layer))
    }

    /// Route a widget edit through the selected layer's options panel.
    pub fn edit(&self, edit: PanelEdit) -> EditorResult<Option<u64>> {
        let layer = self
            .store
            .selected_data()
            .ok_or_else(|| EditorError::not_found("selection"))?;
        let plugin = self
            .registry
            .lookup(layer.type_tag())
            .ok_or_else(|| EditorError::unknown_type(layer.type_tag()))?;
        apply_edit(&self.store, plugin.options_panel().as_ref(), &edit)
    }

    /// One frame of an on-canvas manipulation.
    ///
    /// Returns `false` when the layer has no controllers (locked, preview,
    /// or not rendered).
    pub fn transform(&self, id: &LayerId, event: &TransformEvent) -> EditorResult<bool> {
        let Some(controllers) = self.store.controllers(id) else {
            return Ok(false);
        };
        self.store.mutate(id, |layer| (controllers.on_transform)(layer, event))?;
        Ok(true)
    }

    /// Manipulation released: apply the final state and record one entry.
    pub fn transform_end(&self, id: &LayerId, event: &TransformEvent) -> EditorResult<Option<u64>> {
        let Some(controllers) = self.store.controllers(id) else {
            return Ok(None);
        };
        self.store.mutate(id, |layer| (controllers.on_transform_end)(layer, event))?;
        self.store.record_change(id, "Transform")
    }

    /// Revert the latest entry. Returns `false` when there was nothing to undo.
    pub fn undo(&self) -> EditorResult<bool> {
        let Some(entry) = self.store.undo_entry() else {
            return Ok(false);
        };
        tracing::debug!(description = %entry.description, "undo");
        match entry.kind {
            ChangeKind::Add => {
                self.store.remove_layer(&entry.layer_id)?;
            }
            ChangeKind::Remove => self.restore(&entry, entry.before.as_ref())?,
            ChangeKind::Modify => self.reassign(&entry, entry.before.as_ref())?,
        }
        Ok(true)
    }

    /// Re-apply the latest undone entry.
    pub fn redo(&self) -> EditorResult<bool> {
        let Some(entry) = self.store.redo_entry() else {
            return Ok(false);
        };
        tracing::debug!(description = %entry.description, "redo");
        match entry.kind {
            ChangeKind::Add => self.restore(&entry, entry.after.as_ref())?,
            ChangeKind::Remove => {
                self.store.remove_layer(&entry.layer_id)?;
            }
            ChangeKind::Modify => self.reassign(&entry, entry.after.as_ref())?,
        }
        Ok(true)
    }

    /// Apply pending work to the scene.
    pub fn flush(&mut self) -> FlushReport {
        self.stage.flush(&self.store)
    }

    /// Text rendering of the scene tree.
    pub fn dump_scene(&self) -> String {
        self.scene().read().dump()
    }

    /// Unmount everything.
    pub fn shutdown(&mut self) {
        let unmounted = self.stage.teardown(&self.store);
        tracing::info!(unmounted, "editor session closed");
    }

    fn restore(&self, entry: &HistoryEntry, record: Option<&Value>) -> EditorResult<()> {
        let record = record.ok_or_else(|| EditorError::invalid_field("history", "entry has no record"))?;
        let layer = self.registry.instantiate(record)?;
        let target = entry.location.as_ref().map(InsertTarget::from).unwrap_or_default();
        self.store.insert_layer(layer, target)?;
        Ok(())
    }

    fn reassign(&self, entry: &HistoryEntry, record: Option<&Value>) -> EditorResult<()> {
        let record = record.ok_or_else(|| EditorError::invalid_field("history", "entry has no record"))?;
        self.store.replace_record(&entry.layer_id, record)?;
        self.store.commit_snapshot(&entry.layer_id);
        self.store.request_redraw();
        Ok(())
    }
}
