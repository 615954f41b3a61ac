//! PDF text extraction with `lopdf`.

use async_trait::async_trait;
use talkback_core::attachment::{Artifact, Extractable, MediaKind};
use talkback_core::error::ExtractionError;
use tracing::debug;

/// Concatenates the text of every page, in page order.
///
/// A page whose text cannot be extracted (scanned image, unsupported font
/// encoding) contributes an empty string; only an unreadable document fails.
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    fn extract_pages(bytes: &[u8]) -> Result<String, ExtractionError> {
        let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractionError::BackendError {
            backend: "lopdf".into(),
            reason: e.to_string(),
        })?;

        let mut text = String::new();
        for page_number in doc.get_pages().into_keys() {
            match doc.extract_text(&[page_number]) {
                Ok(page_text) => text.push_str(&page_text),
                Err(e) => debug!(page = page_number, error = %e, "No text on page"),
            }
        }

        Ok(text)
    }
}

#[async_trait]
impl Extractable for PdfTextExtractor {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Pdf
    }

    async fn extract(&self, artifact: &Artifact) -> Result<String, ExtractionError> {
        let bytes = artifact.data.clone();
        tokio::task::spawn_blocking(move || Self::extract_pages(&bytes))
            .await
            .map_err(|e| ExtractionError::BackendError {
                backend: "lopdf".into(),
                reason: format!("extraction task failed: {e}"),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Build a PDF whose first page says `text` and whose second page is blank.
    fn two_page_pdf(text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 48.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let first_page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let blank_page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![first_page.into(), blank_page.into()],
            "Count" => 2,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[tokio::test]
    async fn extracts_text_and_tolerates_blank_pages() {
        let artifact = Artifact::new("doc.pdf", "application/pdf", two_page_pdf("Hello World!"));
        let text = PdfTextExtractor.extract(&artifact).await.unwrap();
        assert!(text.contains("Hello World!"), "got: {text:?}");
    }

    #[tokio::test]
    async fn garbage_bytes_are_backend_error() {
        let artifact = Artifact::new("doc.pdf", "application/pdf", b"not a pdf".to_vec());
        let err = PdfTextExtractor.extract(&artifact).await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::BackendError { ref backend, .. } if backend == "lopdf"
        ));
    }
}
