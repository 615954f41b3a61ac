//! Image OCR through the `tesseract` binary.

use async_trait::async_trait;
use talkback_core::attachment::{Artifact, Extractable, MediaKind};
use talkback_core::error::ExtractionError;

use crate::process::run_with_input;

/// Extracts text from images with tesseract (`tesseract stdin stdout -l <lang>`).
pub struct TesseractOcr {
    bin: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(bin: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            language: language.into(),
        }
    }

    fn args(&self) -> Vec<String> {
        vec![
            "stdin".into(),
            "stdout".into(),
            "-l".into(),
            self.language.clone(),
        ]
    }
}

#[async_trait]
impl Extractable for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Image
    }

    async fn extract(&self, artifact: &Artifact) -> Result<String, ExtractionError> {
        let stdout = run_with_input(self.name(), &self.bin, &self.args(), artifact.data.clone()).await?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }
}
