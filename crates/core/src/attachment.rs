//! Attachments and the extraction seam.
//!
//! An [`Artifact`] is an uploaded file with a *declared* MIME type. Dispatch
//! goes through the closed [`MediaKind`] enum and a lookup table of
//! [`Extractable`] strategies; content is never sniffed. The
//! [`ExtractionGateway`] boundary never fails: every outcome, including an
//! unsupported kind, is folded into an [`ExtractionResult`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use crate::error::ExtractionError;

/// The artifact kinds Talkback can turn into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Pdf,
    Video,
}

impl MediaKind {
    /// Classify a declared MIME type. Unknown types return `None`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        let essence = mime.split(';').next().unwrap_or("").trim();
        if essence == "application/pdf" {
            Some(Self::Pdf)
        } else if essence.starts_with("image/") {
            Some(Self::Image)
        } else if essence.starts_with("video/") {
            Some(Self::Video)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The MIME type an upload widget would declare for a file extension.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "txt" => "text/plain",
        "md" => "text/markdown",
        _ => "application/octet-stream",
    }
}

/// An uploaded file.
#[derive(Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Original file name (for display only)
    pub name: String,

    /// The declared MIME type
    pub mime_type: String,

    /// Raw bytes
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Build an artifact from a path, declaring its MIME type by extension.
    pub fn from_path_and_bytes(path: &Path, data: Vec<u8>) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime = path
            .extension()
            .map(|e| mime_for_extension(&e.to_string_lossy()))
            .unwrap_or("application/octet-stream");
        Self::new(name, mime, data)
    }

    /// The declared kind, if supported.
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_mime(&self.mime_type)
    }
}

impl std::fmt::Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifact")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Outcome of one extraction. Produced once per artifact and consumed once.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    /// Extracted text; may legitimately be empty (e.g. a blank scan)
    Text(String),
    /// Extraction did not happen
    Failure(ExtractionError),
}

impl ExtractionResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

/// A strategy that turns one kind of artifact into text.
#[async_trait]
pub trait Extractable: Send + Sync {
    /// Backend name used in logs and error messages (e.g., "tesseract").
    fn name(&self) -> &str;

    /// The kind this strategy handles.
    fn kind(&self) -> MediaKind;

    /// Extract text from the artifact.
    async fn extract(&self, artifact: &Artifact) -> std::result::Result<String, ExtractionError>;
}

/// The boundary the orchestrator talks to.
#[async_trait]
pub trait ExtractionGateway: Send + Sync {
    /// Convert an artifact into text. Never fails past this boundary.
    async fn extract(&self, artifact: &Artifact) -> ExtractionResult;
}

/// A lookup table from media kind to extraction strategy.
pub struct ExtractorRegistry {
    extractors: HashMap<MediaKind, Box<dyn Extractable>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Register a strategy. Replaces any existing strategy for the same kind.
    pub fn register(&mut self, extractor: Box<dyn Extractable>) {
        self.extractors.insert(extractor.kind(), extractor);
    }

    /// Get the strategy for a kind.
    pub fn get(&self, kind: MediaKind) -> Option<&dyn Extractable> {
        self.extractors.get(&kind).map(|e| e.as_ref())
    }

    /// All kinds with a registered strategy.
    pub fn kinds(&self) -> Vec<MediaKind> {
        self.extractors.keys().copied().collect()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionGateway for ExtractorRegistry {
    async fn extract(&self, artifact: &Artifact) -> ExtractionResult {
        let Some(extractor) = artifact.kind().and_then(|kind| self.get(kind)) else {
            tracing::debug!(
                artifact = %artifact.name,
                mime = %artifact.mime_type,
                "No extractor for declared type"
            );
            return ExtractionResult::Failure(ExtractionError::UnsupportedKind(
                artifact.mime_type.clone(),
            ));
        };

        match extractor.extract(artifact).await {
            Ok(text) => ExtractionResult::Text(text),
            Err(e) => {
                tracing::warn!(
                    artifact = %artifact.name,
                    backend = extractor.name(),
                    error = %e,
                    "Extraction failed"
                );
                ExtractionResult::Failure(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedText(&'static str);

    #[async_trait]
    impl Extractable for FixedText {
        fn name(&self) -> &str { "fixed" }
        fn kind(&self) -> MediaKind { MediaKind::Image }
        async fn extract(&self, _artifact: &Artifact) -> std::result::Result<String, ExtractionError> {
            Ok(self.0.to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl Extractable for Broken {
        fn name(&self) -> &str { "broken" }
        fn kind(&self) -> MediaKind { MediaKind::Pdf }
        async fn extract(&self, _artifact: &Artifact) -> std::result::Result<String, ExtractionError> {
            Err(ExtractionError::BackendError {
                backend: "broken".into(),
                reason: "corrupt file".into(),
            })
        }
    }

    #[test]
    fn media_kind_from_declared_mime() {
        assert_eq!(MediaKind::from_mime("image/png"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_mime("IMAGE/JPEG"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_mime("application/pdf"), Some(MediaKind::Pdf));
        assert_eq!(MediaKind::from_mime("video/mp4; codecs=avc1"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_mime("text/plain"), None);
        assert_eq!(MediaKind::from_mime(""), None);
    }

    #[test]
    fn artifact_declares_mime_by_extension() {
        let art = Artifact::from_path_and_bytes(Path::new("/tmp/notes.txt"), b"hi".to_vec());
        assert_eq!(art.name, "notes.txt");
        assert_eq!(art.mime_type, "text/plain");
        assert_eq!(art.kind(), None);

        let scan = Artifact::from_path_and_bytes(Path::new("scan.PNG"), vec![]);
        assert_eq!(scan.kind(), Some(MediaKind::Image));

        let blob = Artifact::from_path_and_bytes(Path::new("README"), vec![]);
        assert_eq!(blob.mime_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn registry_dispatches_by_kind() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Box::new(FixedText("hello from ocr")));

        let art = Artifact::new("scan.png", "image/png", vec![1, 2, 3]);
        assert_eq!(
            registry.extract(&art).await,
            ExtractionResult::Text("hello from ocr".into())
        );
    }

    #[tokio::test]
    async fn empty_text_is_not_a_failure() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Box::new(FixedText("")));

        let result = registry.extract(&Artifact::new("blank.png", "image/png", vec![])).await;
        assert_eq!(result, ExtractionResult::Text(String::new()));
        assert!(!result.is_failure());
    }

    #[tokio::test]
    async fn unknown_kind_is_unsupported() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Box::new(FixedText("x")));

        let result = registry.extract(&Artifact::new("notes.txt", "text/plain", vec![])).await;
        assert_eq!(
            result,
            ExtractionResult::Failure(ExtractionError::UnsupportedKind("text/plain".into()))
        );
    }

    #[tokio::test]
    async fn known_kind_without_strategy_is_unsupported() {
        let registry = ExtractorRegistry::new();
        let result = registry.extract(&Artifact::new("clip.mp4", "video/mp4", vec![])).await;
        assert!(matches!(
            result,
            ExtractionResult::Failure(ExtractionError::UnsupportedKind(_))
        ));
    }

    #[tokio::test]
    async fn backend_errors_are_folded_into_result() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Box::new(Broken));

        let result = registry.extract(&Artifact::new("doc.pdf", "application/pdf", vec![])).await;
        assert!(matches!(
            result,
            ExtractionResult::Failure(ExtractionError::BackendError { .. })
        ));
    }
}
