//! Layer lifecycle and data/render synchronization.
//!
//! Plugins contribute layer variants through the [`Plugin`] contract. The
//! [`TypeRegistry`] maps type identities to plugins, the [`EditorStore`] owns
//! layer records and the mutation surface, and the [`Stage`] keeps one
//! [`RenderBinding`] per mounted record in sync with the scene graph:
//!
//! - edits go through [`EditorStore::mutate`], which diffs the record and
//!   marks subscribed bindings dirty;
//! - [`EditorStore::request_redraw`] coalesces; [`Stage::flush`] applies all
//!   pending work in one pass;
//! - expensive derived content is debounced per identity by the
//!   [`Debouncer`] and cancelled on unmount.

pub mod binding;
pub mod data;
pub mod debounce;
pub mod factory;
pub mod field;
pub mod history;
pub mod id;
pub mod panel;
pub mod plugin;
pub mod registry;
pub mod render;
pub mod stage;
pub mod store;
pub mod style;

pub use common::{EditorError, EditorResult};

pub use binding::{BindingState, RenderBinding};
pub use data::{BaseProps, BorderSpec, LayerData, LayerVariant, ShadowSpec};
pub use debounce::Debouncer;
pub use field::FieldSet;
pub use history::{ChangeKind, History, HistoryEntry};
pub use id::LayerId;
pub use panel::{apply_edit, build_view, ControlKind, EditPhase, OptionsPanel, PanelControl, PanelEdit, PanelView};
pub use plugin::{Plugin, PluginConfig, PluginMeta};
pub use registry::TypeRegistry;
pub use render::{Controllers, DerivedFuture, Gesture, NodePatch, RenderEnv, RenderProps, Renderer, TransformEvent};
pub use stage::{FlushReport, SceneHandle, Stage};
pub use store::{EditorStore, InsertPolicy, InsertTarget, LayerLocation, Notice, NoticeLevel, Page, StoreOptions};

// Used by `layer_variant!` expansions in plugin crates.
#[doc(hidden)]
pub use serde_json;
