//! PDF text extraction.

use lopdf::Document;

use crate::core::errors::ExtractionError;

/// Text used for a page whose content stream cannot be decoded.
pub const UNREADABLE_PAGE: &str = "[unreadable page]";

/// Extract the text of the first `max_pages` pages, each headed `Page N:`.
///
/// Documents with more pages get a trailing notice naming the total.
///
/// # Errors
/// Returns an error if the bytes are not a parseable PDF.
pub fn extract_pdf_text(bytes: &[u8], max_pages: u32) -> Result<String, ExtractionError> {
    let document = Document::load_mem(bytes)?;
    let pages = document.get_pages();
    let total = pages.len();

    let mut sections = Vec::with_capacity(total.min(max_pages as usize));
    for &number in pages.keys().take(max_pages as usize) {
        let text = match document.extract_text(&[number]) {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                tracing::debug!("Failed to extract text from PDF page {number}: {err}");
                UNREADABLE_PAGE.to_string()
            }
        };
        sections.push(format!("Page {number}:\n{text}"));
    }

    let mut out = sections.join("\n\n");
    if total > max_pages as usize {
        out.push_str(&format!(
            "\n\n[Document has {total} pages; only the first {max_pages} were extracted.]"
        ));
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    /// Build a minimal PDF with `count` pages of one text line each.
    pub(crate) fn sample_pdf(count: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for i in 1..=count {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(format!("Text of page {i}"))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => i64::from(count),
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_only_first_pages_are_extracted() {
        let text = extract_pdf_text(&sample_pdf(22), 20).unwrap();
        assert!(text.starts_with("Page 1:"));
        assert!(text.contains("Page 20:"));
        assert!(!text.contains("Page 21:"));
        assert!(text.ends_with("[Document has 22 pages; only the first 20 were extracted.]"));
    }

    #[test]
    fn test_short_document_has_no_notice() {
        let text = extract_pdf_text(&sample_pdf(2), 20).unwrap();
        assert!(text.contains("Page 2:"));
        assert!(!text.contains("only the first"));
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(extract_pdf_text(b"not a pdf", 20).is_err());
    }
}
