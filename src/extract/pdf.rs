use std::path::Path;

use lopdf::Document;
use tracing::warn;
use uuid::Uuid;

use crate::error::ExtractError;

/// Extract the text of a PDF, page by page.
///
/// The bytes are staged in a collision-free temporary file which is removed
/// on every exit path. A page that fails to decode is skipped; a document
/// that fails to load is an error for the caller. `Ok(None)` means every
/// page was empty.
pub fn extract_text(bytes: &[u8]) -> Result<Option<String>, ExtractError> {
    let temp_path = std::env::temp_dir().join(format!("pdf_{}.pdf", Uuid::new_v4()));
    extract_text_at(bytes, &temp_path)
}

fn extract_text_at(bytes: &[u8], temp_path: &Path) -> Result<Option<String>, ExtractError> {
    std::fs::write(temp_path, bytes)?;
    let result = extract_from_file(temp_path);
    if let Err(e) = std::fs::remove_file(temp_path) {
        warn!("failed to remove temp file {:?}: {}", temp_path, e);
    }
    result
}

fn extract_from_file(path: &Path) -> Result<Option<String>, ExtractError> {
    let doc = Document::load(path).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let mut pages = Vec::new();
    for (number, _) in doc.get_pages() {
        match doc.extract_text(&[number]) {
            Ok(text) => {
                let text = text.trim().to_string();
                if !text.is_empty() {
                    pages.push(text);
                }
            }
            Err(e) => {
                // A single unreadable page does not abort the document.
                warn!("failed to extract text from page {}: {}", number, e);
            }
        }
    }

    if pages.is_empty() {
        Ok(None)
    } else {
        Ok(Some(pages.join("\n")))
    }
}

/// Build a minimal single-page PDF containing `text` (empty string for a
/// blank page) and return its bytes.
#[cfg(test)]
pub(crate) fn sample_pdf(text: &str) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let operations = if text.is_empty() {
        vec![]
    } else {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![100.into(), 600.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    };
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_page_is_extracted() {
        let result = extract_text(&sample_pdf("attention is all you need")).unwrap();
        assert!(result.unwrap().contains("attention is all you need"));
    }

    #[test]
    fn all_empty_pages_yield_none() {
        assert_eq!(extract_text(&sample_pdf("")).unwrap(), None);
    }

    #[test]
    fn garbage_bytes_are_an_error() {
        assert!(extract_text(b"this is not a pdf").is_err());
    }

    #[test]
    fn staging_file_is_removed_on_every_outcome() {
        // Extracted text, all-empty pages, and a load failure alike must
        // leave nothing behind in the temp directory.
        let cases: [Vec<u8>; 3] = [
            sample_pdf("attention is all you need"),
            sample_pdf(""),
            b"this is not a pdf".to_vec(),
        ];
        for bytes in &cases {
            let temp_path = std::env::temp_dir().join(format!("pdf_{}.pdf", Uuid::new_v4()));
            let _ = extract_text_at(bytes, &temp_path);
            assert!(!temp_path.exists());
        }
    }
}
