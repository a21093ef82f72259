//! Document loading and plain-text extraction.
//!
//! A document reference is either an `http(s)://` URL or a local path. Its
//! format is taken from the file extension; the query string and fragment of
//! a URL are ignored.

use policyqa_core::{AppError, AppResult};
use scraper::Html;
use std::io::{Cursor, Read};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Html,
    Txt,
    Docx,
}

impl DocumentFormat {
    /// Format of the document named by `reference`.
    pub fn from_reference(reference: &str) -> AppResult<Self> {
        let without_query = reference
            .split(['?', '#'])
            .next()
            .unwrap_or(reference);
        let file_name = without_query
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(without_query);

        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "html" | "htm" => Ok(DocumentFormat::Html),
            "txt" => Ok(DocumentFormat::Txt),
            "docx" => Ok(DocumentFormat::Docx),
            "" => Err(AppError::UnsupportedFormat(format!(
                "no file extension in '{}'",
                reference
            ))),
            other => Err(AppError::UnsupportedFormat(format!(".{}", other))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Html => "html",
            DocumentFormat::Txt => "txt",
            DocumentFormat::Docx => "docx",
        }
    }
}

/// Turns raw document bytes into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], format: DocumentFormat) -> AppResult<String>;
}

/// Extractor for PDF, HTML, TXT and DOCX.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExtractor;

impl TextExtractor for DefaultExtractor {
    fn extract(&self, bytes: &[u8], format: DocumentFormat) -> AppResult<String> {
        let text = match format {
            DocumentFormat::Pdf => extract_pdf(bytes)?,
            DocumentFormat::Html => extract_html(&String::from_utf8_lossy(bytes)),
            DocumentFormat::Txt => String::from_utf8_lossy(bytes).into_owned(),
            DocumentFormat::Docx => extract_docx(bytes)?,
        };
        Ok(text.trim().to_string())
    }
}

fn extract_pdf(bytes: &[u8]) -> AppResult<String> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| AppError::Extraction(format!("Failed to load PDF: {}", e)))?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut text = String::new();
    for page_num in pages.keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to extract text from page, skipping");
            }
        }
    }

    Ok(text)
}

fn extract_html(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut lines = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| matches!(el.name(), "script" | "style" | "noscript"))
                .unwrap_or(false)
        });

        let trimmed = text.trim();
        if !hidden && !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }

    lines.join("\n")
}

fn extract_docx(bytes: &[u8]) -> AppResult<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| AppError::Extraction(format!("Failed to open DOCX archive: {}", e)))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| AppError::Extraction(format!("DOCX has no word/document.xml: {}", e)))?
        .read_to_string(&mut xml)
        .map_err(|e| AppError::Extraction(format!("Failed to read word/document.xml: {}", e)))?;

    Ok(docx_xml_to_text(&xml))
}

/// Text runs of a WordprocessingML body, one line per paragraph.
fn docx_xml_to_text(xml: &str) -> String {
    let mut out = String::new();
    let mut in_text = false;
    let mut in_run = false;
    let mut rest = xml;

    while let Some(open) = rest.find('<') {
        if in_text {
            out.push_str(&unescape_xml(&rest[..open]));
        }

        let Some(close) = rest[open..].find('>') else {
            break;
        };
        let tag = &rest[open + 1..open + close];
        let name = tag
            .trim_end_matches('/')
            .split_whitespace()
            .next()
            .unwrap_or("");

        // Tab stops and breaks outside a run are layout definitions, not text
        match name {
            "w:r" => in_run = !tag.ends_with('/'),
            "/w:r" => in_run = false,
            "w:t" => in_text = !tag.ends_with('/'),
            "/w:t" => in_text = false,
            "/w:p" => out.push('\n'),
            "w:tab" if in_run => out.push('\t'),
            "w:br" | "w:cr" if in_run => out.push('\n'),
            _ => {}
        }

        rest = &rest[open + close + 1..];
    }

    out
}

/// Decode the predefined XML entities and numeric character references.
///
/// Unknown or malformed references are kept verbatim.
fn unescape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let decoded = tail.find(';').and_then(|semi| {
            let ch = match &tail[1..semi] {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "amp" => Some('&'),
                entity => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            ch.map(|c| (c, semi))
        });

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Resolves document references to extracted text.
pub struct DocumentLoader {
    client: reqwest::Client,
    extractor: Box<dyn TextExtractor>,
}

impl DocumentLoader {
    pub fn new(fetch_timeout: Duration) -> AppResult<Self> {
        Self::with_extractor(fetch_timeout, Box::new(DefaultExtractor))
    }

    pub fn with_extractor(
        fetch_timeout: Duration,
        extractor: Box<dyn TextExtractor>,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, extractor })
    }

    /// Fetch `reference` and extract its text.
    ///
    /// The format is checked before any bytes are fetched.
    #[instrument(skip(self))]
    pub async fn load(&self, reference: &str) -> AppResult<String> {
        let format = DocumentFormat::from_reference(reference)?;
        let bytes = self.fetch(reference).await?;

        debug!(bytes = bytes.len(), format = format.as_str(), "Fetched document");

        let text = self.extractor.extract(&bytes, format)?;
        debug!(chars = text.chars().count(), "Extracted document text");
        Ok(text)
    }

    async fn fetch(&self, reference: &str) -> AppResult<Vec<u8>> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            let response = self
                .client
                .get(reference)
                .send()
                .await
                .map_err(|e| AppError::Extraction(format!("Failed to fetch {}: {}", reference, e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(AppError::Extraction(format!(
                    "HTTP {} for {}",
                    status, reference
                )));
            }

            let bytes = response.bytes().await.map_err(|e| {
                AppError::Extraction(format!("Failed to read body of {}: {}", reference, e))
            })?;
            Ok(bytes.to_vec())
        } else {
            tokio::fs::read(Path::new(reference)).await.map_err(|e| {
                AppError::Extraction(format!("Failed to read {}: {}", reference, e))
            })
        }
    }
}

impl std::fmt::Debug for DocumentLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentLoader").finish_non_exhaustive()
    }
}
