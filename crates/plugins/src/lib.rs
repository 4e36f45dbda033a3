//! Built-in layer plugins.
//!
//! - [`qrcode`]: encoded QR imagery, re-encoded through the debouncer
//! - [`rect`]: rounded rectangles with only cheap state
//! - [`group`]: composition of child layers

pub mod group;
pub mod qrcode;
pub mod rect;

use common::{EditorResult, Size};
use layers::{Plugin, TypeRegistry};
use scene::NodeProps;
use std::sync::Arc;

pub use group::GroupPlugin;
pub use qrcode::QrCodePlugin;
pub use rect::RectPlugin;

/// Plugins in menu order.
pub fn default_plugins() -> EditorResult<Vec<Arc<dyn Plugin>>> {
    Ok(vec![
        Arc::new(QrCodePlugin::new()?),
        Arc::new(RectPlugin::new()?),
        Arc::new(GroupPlugin::new()?),
    ])
}

/// A registry holding [`default_plugins`].
pub fn default_registry() -> EditorResult<TypeRegistry> {
    TypeRegistry::from_plugins(default_plugins()?)
}

/// Mirror a node in place.
///
/// A negative scale alone would mirror around the node origin, so the local
/// origin is shifted by the full extent on each flipped axis.
pub fn apply_flip(props: &mut NodeProps, size: Size, flip_x: bool, flip_y: bool) {
    props.scale.x = if flip_x { -1.0 } else { 1.0 };
    props.scale.y = if flip_y { -1.0 } else { 1.0 };
    props.offset.x = if flip_x { size.width } else { 0.0 };
    props.offset.y = if flip_y { size.height } else { 0.0 };
}
