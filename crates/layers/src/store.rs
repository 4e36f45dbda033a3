//! The editor store: project state plus the mutation surface bindings and
//! panels depend on.
//!
//! One store exists per editing session and is passed explicitly to whatever
//! needs it. Every field sits behind its own lock. [`EditorStore::mutate`]
//! runs its closure under the page write lock, so that closure must not call
//! back into the store.

use common::{EditorError, EditorResult, Point};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::data::{diff_fields, LayerData};
use crate::debounce::Debouncer;
use crate::field::FieldSet;
use crate::history::{ChangeKind, History, HistoryEntry};
use crate::id::LayerId;
use crate::render::Controllers;

pub use crate::history::LayerLocation;

/// Where new layers go when no index is given.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertPolicy {
    /// Prepend, so the new layer renders above its siblings.
    #[default]
    Front,
    /// Append, below existing siblings.
    Back,
}

/// Store tuning.
#[derive(Clone, Debug)]
pub struct StoreOptions {
    pub history_capacity: usize,
    /// Quiet period for debounced derived computations.
    pub debounce: Duration,
    pub insert_policy: InsertPolicy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            debounce: Duration::from_millis(500),
            insert_policy: InsertPolicy::Front,
        }
    }
}

/// A page and its ordered layer list (head renders on top).
#[derive(Clone, Debug)]
pub struct Page {
    pub id: String,
    pub name: String,
    pub layers: Vec<LayerData>,
}

impl Page {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            layers: Vec::new(),
        }
    }
}

/// Destination for an inserted layer.
#[derive(Clone, Debug, Default)]
pub struct InsertTarget {
    /// Page index; the current page when `None`.
    pub page: Option<usize>,
    /// Enclosing group; the page's own list when `None`.
    pub group: Option<LayerId>,
    /// Position in the list; the insert policy decides when `None`.
    pub index: Option<usize>,
}

impl InsertTarget {
    pub fn current() -> Self {
        Self::default()
    }

    pub fn into_group(group: LayerId) -> Self {
        Self {
            group: Some(group),
            ..Self::default()
        }
    }

    pub fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn on_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }
}

impl From<&LayerLocation> for InsertTarget {
    fn from(location: &LayerLocation) -> Self {
        Self {
            page: Some(location.page),
            group: location.group.clone(),
            index: Some(location.index),
        }
    }
}

/// Severity of a user-facing notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Non-fatal message for the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Shared mutable session state.
pub struct EditorStore {
    options: StoreOptions,
    pages: RwLock<Vec<Page>>,
    current_page: RwLock<usize>,
    selection: RwLock<Vec<LayerId>>,
    history: RwLock<History>,
    /// Last committed plain record per identity.
    committed: RwLock<HashMap<LayerId, Value>>,
    /// Fields each mounted binding depends on.
    subscriptions: RwLock<HashMap<LayerId, Vec<&'static str>>>,
    controllers: RwLock<HashMap<LayerId, Controllers>>,
    debouncer: Arc<Debouncer>,
    pending: Mutex<IndexMap<LayerId, FieldSet>>,
    structure_dirty: AtomicBool,
    selection_dirty: AtomicBool,
    redraw_requested: AtomicBool,
    redraw_requests: AtomicU64,
    notices: RwLock<Vec<Notice>>,
}

impl EditorStore {
    pub fn new(options: StoreOptions) -> Self {
        let history = History::new(options.history_capacity);
        Self {
            options,
            pages: RwLock::new(vec![Page::new("page-1", "Page 1")]),
            current_page: RwLock::new(0),
            selection: RwLock::new(Vec::new()),
            history: RwLock::new(history),
            committed: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
            controllers: RwLock::new(HashMap::new()),
            debouncer: Arc::new(Debouncer::new()),
            pending: Mutex::new(IndexMap::new()),
            structure_dirty: AtomicBool::new(false),
            selection_dirty: AtomicBool::new(false),
            redraw_requested: AtomicBool::new(false),
            redraw_requests: AtomicU64::new(0),
            notices: RwLock::new(Vec::new()),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Quiet period for debounced derived computations.
    pub fn debounce_period(&self) -> Duration {
        self.options.debounce
    }

    pub fn debouncer(&self) -> &Arc<Debouncer> {
        &self.debouncer
    }

    // ---- pages ----

    pub fn add_page(&self, name: impl Into<String>) -> usize {
        let mut pages = self.pages.write();
        let index = pages.len();
        pages.push(Page::new(format!("page-{}", index + 1), name));
        index
    }

    pub fn page_count(&self) -> usize {
        self.pages.read().len()
    }

    pub fn current_page(&self) -> usize {
        *self.current_page.read()
    }

    /// Switch the page the stage renders.
    pub fn set_current_page(&self, index: usize) -> EditorResult<()> {
        if index >= self.page_count() {
            return Err(EditorError::not_found(format!("page {}", index)));
        }
        *self.current_page.write() = index;
        self.set_selection(Vec::new());
        self.structure_dirty.store(true, Ordering::Release);
        self.request_redraw();
        Ok(())
    }

    pub fn with_page<R>(&self, index: usize, f: impl FnOnce(&Page) -> R) -> Option<R> {
        self.pages.read().get(index).map(f)
    }

    /// Plain records of a page's top-level layers, head first.
    pub fn page_records(&self, index: usize) -> Vec<Value> {
        self.with_page(index, |page| page.layers.iter().map(LayerData::to_value).collect())
            .unwrap_or_default()
    }

    // ---- layer queries ----

    pub fn contains(&self, id: &LayerId) -> bool {
        self.with_layer(id, |_| ()).is_some()
    }

    pub fn with_layer<R>(&self, id: &LayerId, f: impl FnOnce(&LayerData) -> R) -> Option<R> {
        let pages = self.pages.read();
        pages.iter().find_map(|page| find(&page.layers, id)).map(f)
    }

    /// Snapshot of one record.
    pub fn layer(&self, id: &LayerId) -> Option<LayerData> {
        self.with_layer(id, LayerData::clone)
    }

    pub fn locate(&self, id: &LayerId) -> Option<LayerLocation> {
        let pages = self.pages.read();
        pages.iter().enumerate().find_map(|(page, p)| {
            locate(&p.layers, id, None).map(|(group, index)| LayerLocation { page, group, index })
        })
    }

    /// Group enclosing `id`, if any.
    pub fn enclosing_group(&self, id: &LayerId) -> Option<LayerId> {
        self.with_layer(id, |layer| layer.group().cloned()).flatten()
    }

    /// Position in page coordinates, summing enclosing group offsets.
    pub fn absolute_position(&self, id: &LayerId) -> Option<Point> {
        let pages = self.pages.read();
        let lookup = |id: &LayerId| pages.iter().find_map(|page| find(&page.layers, id));

        let layer = lookup(id)?;
        let mut position = layer.position();
        let mut group = layer.group().cloned();
        while let Some(group_id) = group {
            let Some(parent) = lookup(&group_id) else {
                break;
            };
            position = position + parent.position();
            group = parent.group().cloned();
        }
        Some(position)
    }

    // ---- structure ----

    /// Insert a record (and its children) into one owning collection.
    pub fn insert_layer(&self, mut layer: LayerData, target: InsertTarget) -> EditorResult<LayerLocation> {
        let page_index = target.page.unwrap_or_else(|| self.current_page());
        let ids = layer.descendant_ids();

        layer.set_group(target.group.clone());
        layer.fix_back_references();
        let mut snapshots = Vec::new();
        collect_snapshots(&layer, &mut snapshots);

        let index = {
            let mut pages = self.pages.write();
            if page_index >= pages.len() {
                return Err(EditorError::not_found(format!("page {}", page_index)));
            }
            let mut seen = HashSet::with_capacity(ids.len());
            if let Some(repeated) = ids.iter().find(|id| !seen.insert(*id)) {
                return Err(EditorError::DuplicateLayer(repeated.to_string()));
            }
            if let Some(existing) = ids
                .iter()
                .find(|id| pages.iter().any(|page| find(&page.layers, id).is_some()))
            {
                return Err(EditorError::DuplicateLayer(existing.to_string()));
            }

            let collection = collection_mut(&mut pages[page_index].layers, target.group.as_ref())
                .ok_or_else(|| match &target.group {
                    Some(group) => EditorError::not_found(format!("group {}", group)),
                    None => EditorError::not_found("layer list"),
                })?;
            let index = target
                .index
                .unwrap_or(match self.options.insert_policy {
                    InsertPolicy::Front => 0,
                    InsertPolicy::Back => collection.len(),
                })
                .min(collection.len());
            collection.insert(index, layer);
            index
        };

        self.committed.write().extend(snapshots);
        self.structure_dirty.store(true, Ordering::Release);
        self.request_redraw();

        let location = LayerLocation {
            page: page_index,
            group: target.group,
            index,
        };
        tracing::debug!(layer = %ids[0], ?location, "layer inserted");
        Ok(location)
    }

    /// Excise a record (and its children) from its owning collection.
    pub fn remove_layer(&self, id: &LayerId) -> EditorResult<(LayerData, LayerLocation)> {
        let location = self.locate(id).ok_or_else(|| EditorError::not_found(id.to_string()))?;

        let removed = {
            let mut pages = self.pages.write();
            let collection = pages
                .get_mut(location.page)
                .and_then(|page| collection_mut(&mut page.layers, location.group.as_ref()))
                .ok_or_else(|| EditorError::not_found(id.to_string()))?;
            if collection.get(location.index).map(LayerData::id) != Some(id) {
                return Err(EditorError::not_found(id.to_string()));
            }
            collection.remove(location.index)
        };

        let ids = removed.descendant_ids();
        {
            let mut committed = self.committed.write();
            for removed_id in &ids {
                committed.remove(removed_id);
            }
        }
        {
            let mut pending = self.pending.lock();
            for removed_id in &ids {
                pending.shift_remove(removed_id);
            }
        }
        let selection: Vec<LayerId> = self
            .selection()
            .into_iter()
            .filter(|selected| !ids.contains(selected))
            .collect();
        self.set_selection(selection);

        self.structure_dirty.store(true, Ordering::Release);
        self.request_redraw();
        tracing::debug!(layer = %id, "layer removed");
        Ok((removed, location))
    }

    /// Move a record to `index` within its own collection.
    pub fn move_layer(&self, id: &LayerId, index: usize) -> EditorResult<LayerLocation> {
        let location = self.locate(id).ok_or_else(|| EditorError::not_found(id.to_string()))?;
        let new_index = {
            let mut pages = self.pages.write();
            let collection = pages
                .get_mut(location.page)
                .and_then(|page| collection_mut(&mut page.layers, location.group.as_ref()))
                .ok_or_else(|| EditorError::not_found(id.to_string()))?;
            let layer = collection.remove(location.index);
            let new_index = index.min(collection.len());
            collection.insert(new_index, layer);
            new_index
        };

        if new_index != location.index {
            self.structure_dirty.store(true, Ordering::Release);
            self.request_redraw();
        }
        Ok(LayerLocation {
            index: new_index,
            ..location
        })
    }

    /// Move one step toward the head (rendered higher).
    pub fn bring_forward(&self, id: &LayerId) -> EditorResult<LayerLocation> {
        let location = self.locate(id).ok_or_else(|| EditorError::not_found(id.to_string()))?;
        self.move_layer(id, location.index.saturating_sub(1))
    }

    /// Move one step toward the tail (rendered lower).
    pub fn send_backward(&self, id: &LayerId) -> EditorResult<LayerLocation> {
        let location = self.locate(id).ok_or_else(|| EditorError::not_found(id.to_string()))?;
        self.move_layer(id, location.index + 1)
    }

    // ---- mutation ----

    /// Mutate one record in place and notify subscribed bindings.
    ///
    /// The record is locked for the whole closure, so observers never see a
    /// partial update. Changed fields are found by diffing the flat record.
    pub fn mutate<R>(&self, id: &LayerId, f: impl FnOnce(&mut LayerData) -> R) -> EditorResult<R> {
        let (result, changed) = {
            let mut pages = self.pages.write();
            let layer = pages
                .iter_mut()
                .find_map(|page| find_mut(&mut page.layers, id))
                .ok_or_else(|| EditorError::not_found(id.to_string()))?;
            let before = layer.to_field_map();
            let result = f(layer);
            layer.fix_back_references();
            let after = layer.to_field_map();
            (result, diff_fields(&before, &after))
        };

        if !changed.is_empty() {
            tracing::trace!(layer = %id, fields = ?changed, "layer mutated");
            self.mark_changed(id, changed.into_iter().collect());
        }
        Ok(result)
    }

    /// Assign every field of a plain record onto an existing layer.
    pub fn replace_record(&self, id: &LayerId, record: &Value) -> EditorResult<()> {
        self.mutate(id, |layer| layer.assign(record))?
    }

    /// Force a full resync of one binding.
    pub fn mark_dirty(&self, id: &LayerId) {
        self.pending.lock().insert(id.clone(), FieldSet::all());
        self.request_redraw();
    }

    fn mark_changed(&self, id: &LayerId, fields: FieldSet) {
        if fields.contains("children") {
            self.structure_dirty.store(true, Ordering::Release);
        }

        let relevant = if fields.contains("dirty") {
            Some(FieldSet::all())
        } else {
            self.subscriptions
                .read()
                .get(id)
                .map(|watched| fields.restricted_to(watched))
        };

        if let Some(relevant) = relevant.filter(|set| !set.is_empty()) {
            self.pending
                .lock()
                .entry(id.clone())
                .or_default()
                .merge(relevant);
        }
        self.request_redraw();
    }

    // ---- redraw scheduling ----

    /// Ask for a flush. Any number of calls before the next flush coalesce.
    pub fn request_redraw(&self) {
        self.redraw_requested.store(true, Ordering::Release);
        self.redraw_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Consume the pending redraw request.
    pub fn take_redraw_request(&self) -> bool {
        self.redraw_requested.swap(false, Ordering::AcqRel)
    }

    /// Total redraw requests, including coalesced ones.
    pub fn redraw_requests(&self) -> u64 {
        self.redraw_requests.load(Ordering::Relaxed)
    }

    /// Drain dirty bindings with the fields that changed for each.
    pub fn take_dirty(&self) -> Vec<(LayerId, FieldSet)> {
        self.pending.lock().drain(..).collect()
    }

    pub fn take_structure_dirty(&self) -> bool {
        self.structure_dirty.swap(false, Ordering::AcqRel)
    }

    pub fn take_selection_dirty(&self) -> bool {
        self.selection_dirty.swap(false, Ordering::AcqRel)
    }

    // ---- per-identity side tables ----

    pub fn subscribe(&self, id: &LayerId, fields: Vec<&'static str>) {
        self.subscriptions.write().insert(id.clone(), fields);
    }

    pub fn unsubscribe(&self, id: &LayerId) -> bool {
        self.subscriptions.write().remove(id).is_some()
    }

    pub fn subscribed_fields(&self, id: &LayerId) -> Option<Vec<&'static str>> {
        self.subscriptions.read().get(id).cloned()
    }

    pub fn register_controllers(&self, id: &LayerId, controllers: Controllers) {
        self.controllers.write().insert(id.clone(), controllers);
    }

    pub fn unregister_controllers(&self, id: &LayerId) -> bool {
        self.controllers.write().remove(id).is_some()
    }

    pub fn controllers(&self, id: &LayerId) -> Option<Controllers> {
        self.controllers.read().get(id).cloned()
    }

    /// Drop every binding-owned entry keyed by `id`.
    pub fn release(&self, id: &LayerId) {
        self.unsubscribe(id);
        self.unregister_controllers(id);
        self.debouncer.cancel(id);
        self.pending.lock().shift_remove(id);
    }

    /// Number of binding-owned side-table entries keyed by `id`.
    pub fn side_table_entries(&self, id: &LayerId) -> usize {
        usize::from(self.subscriptions.read().contains_key(id))
            + usize::from(self.controllers.read().contains_key(id))
            + usize::from(self.debouncer.is_pending(id))
            + usize::from(self.pending.lock().contains_key(id))
    }

    // ---- selection ----

    /// Select the given identities; unknown ones are ignored.
    pub fn set_selection(&self, ids: Vec<LayerId>) {
        let mut next: Vec<LayerId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !next.contains(&id) && self.contains(&id) {
                next.push(id);
            }
        }

        let mut selection = self.selection.write();
        if *selection != next {
            *selection = next;
            drop(selection);
            self.selection_dirty.store(true, Ordering::Release);
            self.request_redraw();
        }
    }

    pub fn selection(&self) -> Vec<LayerId> {
        self.selection.read().clone()
    }

    /// The primary selected record.
    pub fn selected_data(&self) -> Option<LayerData> {
        let first = self.selection.read().first().cloned()?;
        self.layer(&first)
    }

    // ---- history ----

    /// Append an undoable entry.
    pub fn record(&self, entry: HistoryEntry) -> u64 {
        if entry.kind != ChangeKind::Remove {
            if let Some(after) = &entry.after {
                self.committed.write().insert(entry.layer_id.clone(), after.clone());
            }
        }
        tracing::debug!(kind = ?entry.kind, description = %entry.description, "history recorded");
        self.history.write().push(entry)
    }

    /// Record a `Modify` entry spanning everything since the last commit.
    ///
    /// Returns `None` when nothing changed since then.
    pub fn record_change(&self, id: &LayerId, description: impl Into<String>) -> EditorResult<Option<u64>> {
        let current = self
            .with_layer(id, LayerData::to_value)
            .ok_or_else(|| EditorError::not_found(id.to_string()))?;
        let before = self
            .committed
            .read()
            .get(id)
            .cloned()
            .unwrap_or_else(|| current.clone());
        if before == current {
            return Ok(None);
        }

        let mut entry = HistoryEntry::new(ChangeKind::Modify, description, id.clone())
            .with_before(before)
            .with_after(current);
        if let Some(location) = self.locate(id) {
            entry = entry.at(location);
        }
        Ok(Some(self.record(entry)))
    }

    /// Treat the current state of `id` as committed.
    pub fn commit_snapshot(&self, id: &LayerId) {
        if let Some(current) = self.with_layer(id, LayerData::to_value) {
            self.committed.write().insert(id.clone(), current);
        }
    }

    pub fn undo_entry(&self) -> Option<HistoryEntry> {
        self.history.write().undo()
    }

    pub fn redo_entry(&self) -> Option<HistoryEntry> {
        self.history.write().redo()
    }

    pub fn can_undo(&self) -> bool {
        self.history.read().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.read().can_redo()
    }

    /// Applied history entries, oldest first.
    pub fn history_entries(&self) -> Vec<HistoryEntry> {
        self.history.read().entries().to_vec()
    }

    // ---- notices ----

    pub fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NoticeLevel::Info => tracing::info!(%message, "notice"),
            NoticeLevel::Warning => tracing::warn!(%message, "notice"),
        }
        self.notices.write().push(Notice { level, message });
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.read().clone()
    }

    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.write())
    }
}

impl Default for EditorStore {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

fn find<'a>(layers: &'a [LayerData], id: &LayerId) -> Option<&'a LayerData> {
    for layer in layers {
        if layer.id() == id {
            return Some(layer);
        }
        if let Some(found) = find(layer.children(), id) {
            return Some(found);
        }
    }
    None
}

fn find_mut<'a>(layers: &'a mut [LayerData], id: &LayerId) -> Option<&'a mut LayerData> {
    for layer in layers.iter_mut() {
        if layer.id() == id {
            return Some(layer);
        }
        if let Some(children) = layer.children_mut() {
            if let Some(found) = find_mut(children, id) {
                return Some(found);
            }
        }
    }
    None
}

/// Enclosing group and index of `id`.
fn locate(layers: &[LayerData], id: &LayerId, group: Option<&LayerId>) -> Option<(Option<LayerId>, usize)> {
    for (index, layer) in layers.iter().enumerate() {
        if layer.id() == id {
            return Some((group.cloned(), index));
        }
        if layer.is_group() {
            if let Some(found) = locate(layer.children(), id, Some(layer.id())) {
                return Some(found);
            }
        }
    }
    None
}

fn collection_mut<'a>(layers: &'a mut Vec<LayerData>, group: Option<&LayerId>) -> Option<&'a mut Vec<LayerData>> {
    match group {
        None => Some(layers),
        Some(group) => find_mut(layers, group)?.children_mut(),
    }
}

fn collect_snapshots(layer: &LayerData, out: &mut Vec<(LayerId, Value)>) {
    out.push((layer.id().clone(), layer.to_value()));
    for child in layer.children() {
        collect_snapshots(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::{box_layer, folder_layer, BoxProps};
    use serde_json::json;

    #[test]
    fn test_insert_prepends_by_default() {
        let store = EditorStore::default();
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();
        store.insert_layer(box_layer("b"), InsertTarget::current()).unwrap();

        let ids: Vec<_> = store.page_records(0).iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("b"), json!("a")]);
        assert!(store.take_structure_dirty());
        assert!(store.take_redraw_request());
    }

    #[test]
    fn test_insert_back_policy() {
        let store = EditorStore::new(StoreOptions {
            insert_policy: InsertPolicy::Back,
            ..StoreOptions::default()
        });
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();
        store.insert_layer(box_layer("b"), InsertTarget::current()).unwrap();
        assert_eq!(store.locate(&LayerId::from("b")).unwrap().index, 1);
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let store = EditorStore::default();
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();
        let err = store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap_err();
        assert!(matches!(err, EditorError::DuplicateLayer(_)));
    }

    #[test]
    fn test_repeated_identity_in_subtree_rejected() {
        let store = EditorStore::default();
        let twins = folder_layer("g", vec![box_layer("dup"), box_layer("dup")]);
        let err = store.insert_layer(twins, InsertTarget::current()).unwrap_err();
        assert!(matches!(err, EditorError::DuplicateLayer(ref id) if id == "dup"));

        let self_nested = folder_layer("g", vec![box_layer("g")]);
        assert!(store.insert_layer(self_nested, InsertTarget::current()).is_err());

        assert!(store.page_records(0).is_empty());
        assert!(!store.take_structure_dirty());
    }

    #[test]
    fn test_layer_owned_by_one_collection() {
        let store = EditorStore::default();
        store
            .insert_layer(folder_layer("g", vec![box_layer("a")]), InsertTarget::current())
            .unwrap();
        store.insert_layer(folder_layer("h", Vec::new()), InsertTarget::current()).unwrap();

        let err = store
            .insert_layer(box_layer("a"), InsertTarget::into_group(LayerId::from("h")))
            .unwrap_err();
        assert!(matches!(err, EditorError::DuplicateLayer(_)));
        assert!(store.insert_layer(box_layer("a"), InsertTarget::current()).is_err());

        assert_eq!(store.enclosing_group(&LayerId::from("a")).unwrap().as_str(), "g");
        assert!(store.with_layer(&LayerId::from("h"), |h| h.children().is_empty()).unwrap());
    }

    #[test]
    fn test_insert_into_missing_group_fails() {
        let store = EditorStore::default();
        let err = store
            .insert_layer(box_layer("a"), InsertTarget::into_group(LayerId::from("nope")))
            .unwrap_err();
        assert!(matches!(err, EditorError::LayerNotFound(_)));
        assert!(!store.contains(&LayerId::from("a")));
    }

    #[test]
    fn test_mutate_marks_only_subscribed_fields() {
        let store = EditorStore::default();
        let id = LayerId::from("a");
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();
        store.subscribe(&id, vec!["x", "width"]);

        store.mutate(&id, |layer| layer.base.name = "renamed".into()).unwrap();
        assert!(store.take_dirty().is_empty());

        store.mutate(&id, |layer| layer.base.x = 3.0).unwrap();
        store
            .mutate(&id, |layer| layer.variant_mut::<BoxProps>().unwrap().width = 1.0)
            .unwrap();
        let dirty = store.take_dirty();
        assert_eq!(dirty.len(), 1);
        let (dirty_id, fields) = &dirty[0];
        assert_eq!(dirty_id, &id);
        assert_eq!(fields.iter().collect::<Vec<_>>(), vec!["width", "x"]);
    }

    #[test]
    fn test_dirty_marker_forces_full_sync() {
        let store = EditorStore::default();
        let id = LayerId::from("a");
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();
        store.subscribe(&id, vec!["x"]);

        store.mutate(&id, |layer| layer.base.dirty = true).unwrap();
        let dirty = store.take_dirty();
        assert!(dirty[0].1.is_forced());
    }

    #[test]
    fn test_mutate_unknown_layer() {
        let store = EditorStore::default();
        let result = store.mutate(&LayerId::from("ghost"), |_| ());
        assert!(matches!(result, Err(EditorError::LayerNotFound(_))));
    }

    #[test]
    fn test_redraw_requests_coalesce() {
        let store = EditorStore::default();
        for _ in 0..5 {
            store.request_redraw();
        }
        assert_eq!(store.redraw_requests(), 5);
        assert!(store.take_redraw_request());
        assert!(!store.take_redraw_request());
    }

    #[test]
    fn test_remove_purges_selection_and_snapshots() {
        let store = EditorStore::default();
        let id = LayerId::from("a");
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();
        store.set_selection(vec![id.clone()]);
        store.mark_dirty(&id);

        let (removed, location) = store.remove_layer(&id).unwrap();
        assert_eq!(removed.id(), &id);
        assert_eq!(location.index, 0);
        assert!(store.selection().is_empty());
        assert!(store.take_dirty().is_empty());
        assert!(!store.contains(&id));
    }

    #[test]
    fn test_selection_ignores_unknown() {
        let store = EditorStore::default();
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();
        store.set_selection(vec![LayerId::from("a"), LayerId::from("ghost"), LayerId::from("a")]);
        assert_eq!(store.selection(), vec![LayerId::from("a")]);
        assert_eq!(store.selected_data().unwrap().id().as_str(), "a");
        assert!(store.take_selection_dirty());
    }

    #[test]
    fn test_record_change_spans_uncommitted_edits() {
        let store = EditorStore::default();
        let id = LayerId::from("a");
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();

        store.mutate(&id, |layer| layer.base.x = 1.0).unwrap();
        store.mutate(&id, |layer| layer.base.x = 2.0).unwrap();
        store.record_change(&id, "move").unwrap().unwrap();

        let entries = store.history_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].before.as_ref().unwrap()["x"], 0.0);
        assert_eq!(entries[0].after.as_ref().unwrap()["x"], 2.0);

        assert!(store.record_change(&id, "noop").unwrap().is_none());
        assert_eq!(store.history_entries().len(), 1);
    }

    #[test]
    fn test_move_and_reorder() {
        let store = EditorStore::default();
        for id in ["a", "b", "c"] {
            store.insert_layer(box_layer(id), InsertTarget::current()).unwrap();
        }
        // c, b, a
        store.take_structure_dirty();
        store.send_backward(&LayerId::from("c")).unwrap();
        assert_eq!(store.locate(&LayerId::from("c")).unwrap().index, 1);
        assert!(store.take_structure_dirty());

        store.bring_forward(&LayerId::from("a")).unwrap();
        let ids: Vec<_> = store.page_records(0).iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("b"), json!("a"), json!("c")]);
    }

    #[test]
    fn test_release_clears_side_tables() {
        let store = EditorStore::default();
        let id = LayerId::from("a");
        store.insert_layer(box_layer("a"), InsertTarget::current()).unwrap();
        store.subscribe(&id, vec!["x"]);
        store.mark_dirty(&id);
        assert_eq!(store.side_table_entries(&id), 2);

        store.release(&id);
        assert_eq!(store.side_table_entries(&id), 0);
    }

    #[test]
    fn test_pages() {
        let store = EditorStore::default();
        let second = store.add_page("Second");
        store
            .insert_layer(box_layer("a"), InsertTarget::current().on_page(second))
            .unwrap();
        assert_eq!(store.page_records(0).len(), 0);
        assert_eq!(store.page_records(second).len(), 1);
        store.set_current_page(second).unwrap();
        assert_eq!(store.current_page(), second);
        assert!(store.set_current_page(7).is_err());
    }
}
