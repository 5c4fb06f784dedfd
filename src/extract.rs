//! Plain-text extraction for uploaded documents.
//!
//! The file type is chosen by the extension of the uploaded file name:
//!
//! | Extension | Handling |
//! |-----------|----------|
//! | `pdf` | `pdf-extract`, trimmed |
//! | `docx`, `doc` | OOXML: `word/document.xml`, one line per `w:p` paragraph |
//! | `txt`, `md` | strict UTF-8 |
//!
//! Legacy binary `.doc` files are not OOXML and fail with
//! [`ExtractError::Docx`]. Extraction never panics; every failure is an
//! [`ExtractError`], which the API reports as a 400.

use std::io::Read;

use adaptive_rag_core::CoreError;

/// Extensions accepted by [`extract_text`].
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "doc", "txt", "md"];

/// Maximum decompressed bytes read from `word/document.xml` (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug)]
pub enum ExtractError {
    UnsupportedFileType(String),
    Pdf(String),
    Docx(String),
    Encoding(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedFileType(ext) => write!(
                f,
                "File type '{}' not supported. Allowed: {}",
                ext,
                SUPPORTED_EXTENSIONS.join(", ")
            ),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Docx(e) => write!(f, "Word extraction failed: {}", e),
            ExtractError::Encoding(e) => write!(f, "text file is not valid UTF-8: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

impl From<ExtractError> for CoreError {
    fn from(e: ExtractError) -> Self {
        CoreError::InvalidInput(e.to_string())
    }
}

/// Lower-cased extension after the last `.`, or the whole name if there is none.
pub fn file_extension(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .unwrap_or(filename)
        .to_ascii_lowercase()
}

/// Check the extension without reading any bytes.
pub fn check_supported(filename: &str) -> Result<(), ExtractError> {
    let ext = file_extension(filename);
    if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(ExtractError::UnsupportedFileType(ext))
    }
}

/// Extract UTF-8 text from `bytes`, dispatching on `filename`'s extension.
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<String, ExtractError> {
    match file_extension(filename).as_str() {
        "pdf" => extract_pdf(bytes),
        "docx" | "doc" => extract_docx(bytes),
        "txt" | "md" => std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| ExtractError::Encoding(e.to_string())),
        other => Err(ExtractError::UnsupportedFileType(other.to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map(|text| text.trim().to_string())
        .map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    paragraphs_text(&xml)
}

/// Concatenate `w:t` runs, one output line per `w:p` paragraph.
fn paragraphs_text(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| ExtractError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs.join("\n").trim().to_string())
}
