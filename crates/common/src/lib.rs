//! Common types shared by the layer editor crates.

pub mod color;
pub mod error;
pub mod geometry;

pub use color::Color;
pub use error::{EditorError, EditorResult};
pub use geometry::{CornerRadii, Point, Rect, Size, Transform};
