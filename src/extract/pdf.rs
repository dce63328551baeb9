//! PDF text extraction on top of `lopdf`

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Encoding, Object, ObjectId};
use tracing::{debug, error};

use super::ExtractionError;

pub(crate) const PDF_FAILURE: &str = "Failed to extract text from the PDF.";

/// Kerning in a `TJ` array below this (thousandths of an em) reads as a gap
const TJ_WORD_GAP: i64 = -100;

/// Extract the text of every page, in page order.
///
/// Every text-showing operator (`Tj`, `TJ`, `'`, `"`) is one item. Items
/// within a page are joined with a single space; pages are concatenated with
/// no separator; the final result is trimmed.
pub fn extract_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let document = Document::load_mem(bytes).map_err(|e| {
        error!(error = %e, "PDF could not be loaded");
        ExtractionError::new(PDF_FAILURE)
    })?;

    // get_pages is keyed by page number, so iteration is ascending
    let pages = document.get_pages();
    debug!(pages = pages.len(), "Extracting PDF text");

    let mut page_items = Vec::with_capacity(pages.len());
    for (&page_number, &page_id) in &pages {
        let items = page_text_items(&document, page_id).map_err(|e| {
            error!(page = page_number, error = %e, "PDF page text extraction failed");
            ExtractionError::new(PDF_FAILURE)
        })?;
        page_items.push(items);
    }

    Ok(join_pages(&page_items))
}

/// Decode one page's content stream into its text items, in stream order.
fn page_text_items(document: &Document, page_id: ObjectId) -> lopdf::Result<Vec<String>> {
    let encodings: BTreeMap<Vec<u8>, Encoding> = document
        .get_page_fonts(page_id)?
        .into_iter()
        .filter_map(|(name, font)| font.get_font_encoding(document).ok().map(|enc| (name, enc)))
        .collect();

    let content = Content::decode(&document.get_page_content(page_id)?)?;

    let mut items = Vec::new();
    let mut encoding = None;
    for operation in &content.operations {
        match operation.operator.as_str() {
            "Tf" => {
                encoding = operation
                    .operands
                    .first()
                    .and_then(|font| font.as_name().ok())
                    .and_then(|name| encodings.get(name));
            }
            "Tj" | "TJ" | "'" | "\"" => {
                let item = show_text(operation, encoding)?;
                if !item.is_empty() {
                    items.push(item);
                }
            }
            _ => {}
        }
    }

    Ok(items)
}

/// The text painted by a single text-showing operation.
fn show_text(operation: &Operation, encoding: Option<&Encoding>) -> lopdf::Result<String> {
    let mut text = String::new();
    for operand in &operation.operands {
        match operand {
            Object::String(bytes, _) => text.push_str(&decode(encoding, bytes)?),
            Object::Array(parts) => {
                for part in parts {
                    match part {
                        Object::String(bytes, _) => text.push_str(&decode(encoding, bytes)?),
                        Object::Integer(gap) if *gap < TJ_WORD_GAP => text.push(' '),
                        Object::Real(gap) if (*gap as i64) < TJ_WORD_GAP => text.push(' '),
                        _ => {}
                    }
                }
            }
            // Spacing operands of `"`
            _ => {}
        }
    }
    Ok(text)
}

fn decode(encoding: Option<&Encoding>, bytes: &[u8]) -> lopdf::Result<String> {
    match encoding {
        Some(encoding) => Document::decode_text(encoding, bytes),
        // No usable font selected
        None => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn join_pages(pages: &[Vec<String>]) -> String {
    pages
        .iter()
        .map(|items| items.join(" "))
        .collect::<String>()
        .trim()
        .to_string()
}
