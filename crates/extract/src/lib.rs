//! Attachment extraction strategies for Talkback.
//!
//! Each strategy implements `talkback_core::Extractable` for one
//! [`MediaKind`]. [`default_registry`] wires them into the lookup table, and
//! [`AttachmentGateway`] adds the size and enable checks from config.

pub mod ocr;
pub mod pdf;
mod process;
pub mod video;

use async_trait::async_trait;
use talkback_config::ExtractionConfig;
use talkback_core::attachment::{Artifact, ExtractionGateway, ExtractionResult, ExtractorRegistry};
use talkback_core::error::ExtractionError;
use tracing::info;

pub use ocr::TesseractOcr;
pub use pdf::PdfTextExtractor;
pub use video::FfprobeMetadata;

// Re-exported so callers can name the kind without depending on core directly
pub use talkback_core::attachment::MediaKind;

/// Create a registry with every built-in strategy.
pub fn default_registry(config: &ExtractionConfig) -> ExtractorRegistry {
    let mut registry = ExtractorRegistry::new();
    registry.register(Box::new(TesseractOcr::new(
        &config.tesseract_bin,
        &config.ocr_language,
    )));
    registry.register(Box::new(PdfTextExtractor));
    registry.register(Box::new(FfprobeMetadata::new(&config.ffprobe_bin)));
    registry
}

/// The configured extraction boundary.
pub struct AttachmentGateway {
    registry: ExtractorRegistry,
    enabled: bool,
    max_bytes: u64,
}

impl AttachmentGateway {
    pub fn new(registry: ExtractorRegistry, config: &ExtractionConfig) -> Self {
        Self {
            registry,
            enabled: config.enabled,
            max_bytes: config.max_attachment_bytes,
        }
    }

    /// Gateway over [`default_registry`].
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(default_registry(config), config)
    }
}

#[async_trait]
impl ExtractionGateway for AttachmentGateway {
    async fn extract(&self, artifact: &Artifact) -> ExtractionResult {
        if !self.enabled {
            return ExtractionResult::Failure(ExtractionError::UnsupportedKind(
                artifact.mime_type.clone(),
            ));
        }

        if artifact.data.len() as u64 > self.max_bytes {
            return ExtractionResult::Failure(ExtractionError::BackendError {
                backend: "gateway".into(),
                reason: format!(
                    "{} is {} bytes, limit is {}",
                    artifact.name,
                    artifact.data.len(),
                    self.max_bytes
                ),
            });
        }

        let result = self.registry.extract(artifact).await;
        if let ExtractionResult::Text(text) = &result {
            info!(artifact = %artifact.name, characters = text.len(), "Attachment extracted");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_covers_every_kind() {
        let registry = default_registry(&ExtractionConfig::default());
        let mut kinds = registry.kinds();
        kinds.sort_by_key(|k| k.as_str());
        assert_eq!(kinds, vec![MediaKind::Image, MediaKind::Pdf, MediaKind::Video]);
        assert_eq!(registry.get(MediaKind::Image).unwrap().name(), "tesseract");
    }

    #[tokio::test]
    async fn text_files_are_unsupported() {
        let gateway = AttachmentGateway::from_config(&ExtractionConfig::default());
        let result = gateway
            .extract(&Artifact::new("notes.txt", "text/plain", b"plain".to_vec()))
            .await;
        assert_eq!(
            result,
            ExtractionResult::Failure(ExtractionError::UnsupportedKind("text/plain".into()))
        );
    }

    #[tokio::test]
    async fn oversized_attachments_are_rejected() {
        let config = ExtractionConfig {
            max_attachment_bytes: 4,
            ..ExtractionConfig::default()
        };
        let gateway = AttachmentGateway::from_config(&config);
        let result = gateway
            .extract(&Artifact::new("big.pdf", "application/pdf", vec![0; 5]))
            .await;
        assert!(matches!(
            result,
            ExtractionResult::Failure(ExtractionError::BackendError { ref backend, .. }) if backend == "gateway"
        ));
    }

    #[tokio::test]
    async fn disabled_gateway_supports_nothing() {
        let config = ExtractionConfig {
            enabled: false,
            ..ExtractionConfig::default()
        };
        let gateway = AttachmentGateway::from_config(&config);
        let result = gateway
            .extract(&Artifact::new("doc.pdf", "application/pdf", vec![]))
            .await;
        assert!(matches!(
            result,
            ExtractionResult::Failure(ExtractionError::UnsupportedKind(_))
        ));
    }
}
