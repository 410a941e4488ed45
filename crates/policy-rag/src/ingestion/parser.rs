//! PDF parser producing page-level text

use sha2::{Digest, Sha256};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// How long pdf-extract may run before it is abandoned
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// Parsed PDF with page-level content
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// SHA-256 of the file bytes
    pub content_hash: String,
    /// Pages in the file (including pages without text)
    pub total_pages: u32,
    /// Pages that produced text, in page order
    pub pages: Vec<PageContent>,
}

impl ParsedDocument {
    /// Total characters across pages
    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.content.chars().count()).sum()
    }
}

/// Content from a single page
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Text content of the page
    pub content: String,
}

/// PDF text extraction
///
/// Text is read page by page with lopdf. When that yields nothing
/// (unsupported encodings, broken xref tables) the whole document goes
/// through pdf-extract instead and is reported as a single page.
pub struct PdfParser;

impl PdfParser {
    /// Parse a PDF held in memory
    pub fn parse(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let content_hash = hash_bytes(data);

        let (total_pages, mut pages) = match lopdf::Document::load_mem(data) {
            Ok(doc) => {
                let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
                let pages = page_numbers
                    .iter()
                    .filter_map(|&page_number| match doc.extract_text(&[page_number]) {
                        Ok(text) => Some(PageContent {
                            page_number,
                            content: cleanup_text(&text),
                        }),
                        Err(e) => {
                            tracing::debug!("{}: no text on page {}: {}", filename, page_number, e);
                            None
                        }
                    })
                    .filter(|p| !p.content.is_empty())
                    .collect::<Vec<_>>();
                (page_numbers.len() as u32, pages)
            }
            Err(e) => {
                tracing::warn!("{}: lopdf could not load document: {}", filename, e);
                (0, Vec::new())
            }
        };

        if pages.is_empty() {
            tracing::debug!("{}: falling back to pdf-extract", filename);
            let text = cleanup_text(&extract_with_timeout(filename, data)?);
            if !text.is_empty() {
                pages.push(PageContent {
                    page_number: 1,
                    content: text,
                });
            }
        }

        if pages.is_empty() {
            return Err(Error::file_parse(
                filename,
                "No text content could be extracted; the PDF may be image-based or encrypted",
            ));
        }

        Ok(ParsedDocument {
            content_hash,
            total_pages: total_pages.max(1),
            pages,
        })
    }
}

/// Run pdf-extract on a separate thread so a pathological font cannot
/// stall ingestion indefinitely
fn extract_with_timeout(filename: &str, data: &[u8]) -> Result<String> {
    let data = data.to_vec();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(pdf_extract::extract_text_from_mem(&data));
    });

    match rx.recv_timeout(EXTRACT_TIMEOUT) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(Error::file_parse(filename, e.to_string())),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::file_parse(
            filename,
            format!("text extraction timed out after {:?}", EXTRACT_TIMEOUT),
        )),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(Error::file_parse(filename, "text extraction thread crashed"))
        }
    }
}

/// Normalise extracted text
///
/// Replaces ligatures and typographic punctuation, trims each line and
/// collapses runs of blank lines into one so paragraph breaks survive.
pub fn cleanup_text(text: &str) -> String {
    let text: String = text
        .chars()
        .filter(|c| *c != '\0')
        .map(|c| match c {
            '\u{2010}' | '\u{2011}' | '\u{2013}' => '-',
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{00A0}' | '\u{2002}' | '\u{2003}' | '\u{2009}' => ' ',
            other => other,
        })
        .collect();

    let text = text
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace('\u{2026}', "...");

    let mut out = String::with_capacity(text.len());
    let mut blank_run = false;
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            blank_run = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run { "\n\n" } else { "\n" });
        }
        out.push_str(line);
        blank_run = false;
    }
    out
}

/// Hex SHA-256 of `data`
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Build a small text PDF with one page per entry
#[cfg(test)]
pub(crate) fn test_pdf(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let kids: Vec<Object> = pages
        .iter()
        .map(|text| {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            })
            .into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
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
