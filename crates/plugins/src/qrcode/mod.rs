//! QR code layers.
//!
//! Size and flips apply synchronously. Re-encoding the symbol is the
//! expensive part: it runs through the stage debouncer whenever content,
//! error level or colors change.

mod encoder;
mod panel;

pub use encoder::{check_capacity, DigestEncoder, EncodeRequest, QrEncoder};
pub use panel::QrCodePanel;

use common::{Color, EditorResult, Size};
use futures::FutureExt;
use layers::factory::build_layer;
use layers::style::finite_or;
use layers::{
    layer_variant, BaseProps, DerivedFuture, LayerData, NodePatch, OptionsPanel, Plugin, PluginConfig, PluginMeta,
    Renderer,
};
use scene::{NodeKind, NodeProps};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::apply_flip;

pub const PID: &str = "qrcode";

const CONFIG: &str = include_str!("../../config/qrcode.json");

pub const DEFAULT_SIZE: f32 = 500.0;
pub const DEFAULT_CONTENT: &str = "https://example.com";

/// Error correction level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorLevel {
    L,
    #[default]
    M,
    Q,
    H,
}

impl ErrorLevel {
    pub const ALL: [ErrorLevel; 4] = [ErrorLevel::L, ErrorLevel::M, ErrorLevel::Q, ErrorLevel::H];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorLevel::L => "L",
            ErrorLevel::M => "M",
            ErrorLevel::Q => "Q",
            ErrorLevel::H => "H",
        }
    }

    /// Byte-mode capacity of the largest symbol.
    pub fn capacity(&self) -> usize {
        match self {
            ErrorLevel::L => 2953,
            ErrorLevel::M => 2331,
            ErrorLevel::Q => 1663,
            ErrorLevel::H => 1273,
        }
    }
}

/// Variant fields of a QR code layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QrCodeProps {
    pub width: f32,
    pub height: f32,
    pub content: String,
    pub color: Color,
    pub background: Color,
    pub level: ErrorLevel,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl Default for QrCodeProps {
    fn default() -> Self {
        Self {
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
            content: DEFAULT_CONTENT.to_string(),
            color: Color::BLACK,
            background: Color::WHITE,
            level: ErrorLevel::M,
            flip_x: false,
            flip_y: false,
        }
    }
}

layer_variant!(QrCodeProps);

pub struct QrCodePlugin {
    config: PluginConfig,
    encoder: Arc<dyn QrEncoder>,
}

impl QrCodePlugin {
    pub fn new() -> EditorResult<Self> {
        Self::with_encoder(Arc::new(DigestEncoder))
    }

    /// Use a specific encoding backend.
    pub fn with_encoder(encoder: Arc<dyn QrEncoder>) -> EditorResult<Self> {
        Ok(Self {
            config: PluginConfig::from_json(CONFIG)?,
            encoder,
        })
    }

    fn base_defaults() -> BaseProps {
        BaseProps {
            name: "QR Code".to_string(),
            ratio: Some(1.0),
            ..BaseProps::default()
        }
    }
}

impl Plugin for QrCodePlugin {
    fn config(&self) -> &PluginConfig {
        &self.config
    }

    fn meta(&self) -> PluginMeta {
        PluginMeta::new("QR Code", "Scannable code generated from text or a link").with_icon("qrcode")
    }

    fn create(&self, overrides: &Value) -> LayerData {
        build_layer(PID, overrides, Self::base_defaults(), QrCodeProps::default())
    }

    fn renderer(&self) -> Arc<dyn Renderer> {
        Arc::new(QrCodeRenderer {
            encoder: Arc::clone(&self.encoder),
        })
    }

    fn options_panel(&self) -> Arc<dyn OptionsPanel> {
        Arc::new(QrCodePanel)
    }
}

pub struct QrCodeRenderer {
    encoder: Arc<dyn QrEncoder>,
}

impl Renderer for QrCodeRenderer {
    fn node_kind(&self) -> NodeKind {
        NodeKind::Image
    }

    fn watched_fields(&self) -> &'static [&'static str] {
        &["width", "height", "flipX", "flipY"]
    }

    fn apply(&self, props: &mut NodeProps, layer: &LayerData) {
        let Some(qr) = layer.variant::<QrCodeProps>() else {
            tracing::warn!(layer = %layer.id(), "qrcode renderer given a foreign record");
            return;
        };
        let size = Size::new(
            finite_or(qr.width, DEFAULT_SIZE).max(1.0),
            finite_or(qr.height, DEFAULT_SIZE).max(1.0),
        );
        props.size = size;
        apply_flip(props, size, qr.flip_x, qr.flip_y);
    }

    fn derived_fields(&self) -> &'static [&'static str] {
        &["content", "level", "color", "background"]
    }

    fn derive(&self, layer: &LayerData) -> Option<DerivedFuture> {
        let request = EncodeRequest::from(layer.variant::<QrCodeProps>()?);
        let encoder = Arc::clone(&self.encoder);
        Some(
            async move {
                let image = encoder.encode(request).await?;
                let patch: NodePatch = Box::new(move |props| props.image = Some(image));
                Ok(patch)
            }
            .boxed(),
        )
    }
}
