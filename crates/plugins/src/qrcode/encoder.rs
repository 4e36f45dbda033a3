//! QR encoding backends.

use async_trait::async_trait;
use common::{Color, EditorError, EditorResult};
use sha2::{Digest, Sha256};

use super::{ErrorLevel, QrCodeProps};

/// Everything that determines the encoded image.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodeRequest {
    pub content: String,
    pub level: ErrorLevel,
    pub color: Color,
    pub background: Color,
}

impl From<&QrCodeProps> for EncodeRequest {
    fn from(props: &QrCodeProps) -> Self {
        Self {
            content: props.content.clone(),
            level: props.level,
            color: props.color,
            background: props.background,
        }
    }
}

/// Turns structured content into image data for a node.
#[async_trait]
pub trait QrEncoder: Send + Sync {
    async fn encode(&self, request: EncodeRequest) -> EditorResult<String>;
}

/// Encoder that names the symbol by a digest of its inputs.
///
/// Output is `qr:<level>:<sha256 hex>`, stable for equal requests.
#[derive(Clone, Copy, Debug, Default)]
pub struct DigestEncoder;

#[async_trait]
impl QrEncoder for DigestEncoder {
    async fn encode(&self, request: EncodeRequest) -> EditorResult<String> {
        check_capacity(&request.content, request.level).map_err(EditorError::derived)?;

        let mut hasher = Sha256::new();
        hasher.update(request.level.as_str().as_bytes());
        hasher.update(request.color.to_hex().as_bytes());
        hasher.update(request.background.to_hex().as_bytes());
        hasher.update(request.content.as_bytes());
        let digest = hasher.finalize();

        let hex: String = digest.iter().map(|byte| format!("{:02x}", byte)).collect();
        Ok(format!("qr:{}:{}", request.level.as_str(), hex))
    }
}

/// Whether `content` fits a version 40 symbol at `level`.
pub fn check_capacity(content: &str, level: ErrorLevel) -> Result<(), String> {
    if content.is_empty() {
        return Err("nothing to encode".to_string());
    }
    if content.len() > level.capacity() {
        return Err(format!(
            "{} bytes exceed the {}-byte capacity at level {}",
            content.len(),
            level.capacity(),
            level.as_str()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(content: &str) -> EncodeRequest {
        EncodeRequest {
            content: content.into(),
            level: ErrorLevel::M,
            color: Color::BLACK,
            background: Color::WHITE,
        }
    }

    #[tokio::test]
    async fn test_digest_is_stable() {
        let first = DigestEncoder.encode(request("hello")).await.unwrap();
        let again = DigestEncoder.encode(request("hello")).await.unwrap();
        let other = DigestEncoder.encode(request("world")).await.unwrap();
        assert_eq!(first, again);
        assert_ne!(first, other);
        assert!(first.starts_with("qr:M:"));
    }

    #[tokio::test]
    async fn test_rejects_empty_and_oversized() {
        assert!(DigestEncoder.encode(request("")).await.is_err());

        let mut oversized = request(&"x".repeat(2000));
        assert!(DigestEncoder.encode(oversized.clone()).await.is_ok());
        oversized.level = ErrorLevel::H;
        let err = DigestEncoder.encode(oversized).await.unwrap_err();
        assert!(matches!(err, EditorError::Derived(_)));
    }
}
