//! Text extraction keyed by file extension.
//!
//! [`FileKind::from_name`] is the single lookup table from extension to
//! extraction strategy; adding a format means adding a variant and an arm in
//! [`extract_documents`]. Extraction works on in-memory bytes and returns
//! one or more [`Document`]s tagged with the source filename.
//!
//! | Extension | Strategy | Metadata |
//! |-----------|----------|----------|
//! | `.pdf` | `pdf-extract`, one document per page when page breaks are present | `page` |
//! | `.md`, `.markdown` | `pulldown-cmark` text events | `title` (first H1) |
//! | `.txt` | strict UTF-8 | |
//! | `.json` | strict UTF-8, must parse as JSON; raw text is kept | |
//! | `.html`, `.htm` | `scraper`, body text without script/style | `title` |

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use scraper::{ElementRef, Html, Selector};

use crate::error::ExtractError;
use crate::models::Document;

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Markdown,
    Text,
    Json,
    Html,
}

impl FileKind {
    /// Resolve a filename's extension (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self, ExtractError> {
        let ext = std::path::Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Ok(FileKind::Pdf),
            "md" | "markdown" => Ok(FileKind::Markdown),
            "txt" => Ok(FileKind::Text),
            "json" => Ok(FileKind::Json),
            "html" | "htm" => Ok(FileKind::Html),
            _ => Err(ExtractError::UnsupportedExtension(ext)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Markdown => "markdown",
            FileKind::Text => "text",
            FileKind::Json => "json",
            FileKind::Html => "html",
        }
    }
}

/// Extract the documents contained in one uploaded file.
pub fn extract_documents(name: &str, bytes: &[u8]) -> Result<Vec<Document>, ExtractError> {
    let kind = FileKind::from_name(name)?;

    let docs = match kind {
        FileKind::Pdf => extract_pdf(name, bytes)?,
        FileKind::Markdown => vec![extract_markdown(name, utf8(bytes)?)],
        FileKind::Text => vec![Document::new(name, utf8(bytes)?)],
        FileKind::Json => {
            let text = utf8(bytes)?;
            serde_json::from_str::<serde_json::Value>(text)?;
            vec![Document::new(name, text)]
        }
        FileKind::Html => vec![extract_html(name, utf8(bytes)?)?],
    };

    Ok(docs
        .into_iter()
        .map(|d| d.with_meta("format", kind.as_str()))
        .collect())
}

fn utf8(bytes: &[u8]) -> Result<&str, ExtractError> {
    Ok(std::str::from_utf8(bytes)?)
}

fn extract_pdf(name: &str, bytes: &[u8]) -> Result<Vec<Document>, ExtractError> {
    // pdf-extract panics on some malformed inputs instead of returning an error.
    let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| ExtractError::Pdf("parser panicked on malformed input".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    // pdf-extract separates pages with form feeds when it can.
    let pages: Vec<&str> = text.split('\u{c}').collect();
    if pages.len() == 1 {
        return Ok(vec![Document::new(name, text)]);
    }

    Ok(pages
        .into_iter()
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| Document::new(name, page).with_meta("page", i + 1))
        .collect())
}

fn extract_markdown(name: &str, markdown: &str) -> Document {
    let mut text = String::new();
    let mut title: Option<String> = None;
    let mut heading: Option<(HeadingLevel, String)> = None;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                heading = Some((level, String::new()));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, current)) = heading.take() {
                    let current = current.trim().to_string();
                    if level == HeadingLevel::H1 && title.is_none() {
                        title = Some(current.clone());
                    }
                    if !text.is_empty() && !text.ends_with('\n') {
                        text.push('\n');
                    }
                    text.push_str(&current);
                    text.push('\n');
                }
            }
            Event::Text(t) | Event::Code(t) => match heading.as_mut() {
                Some((_, current)) => current.push_str(&t),
                None => text.push_str(&t),
            },
            Event::SoftBreak | Event::HardBreak => match heading.as_mut() {
                Some((_, current)) => current.push(' '),
                None => text.push('\n'),
            },
            Event::Start(Tag::Item) => {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str("- ");
            }
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::Item) => {
                if !text.ends_with('\n') {
                    text.push('\n');
                }
            }
            Event::End(TagEnd::CodeBlock) => text.push('\n'),
            _ => {}
        }
    }

    let doc = Document::new(name, text.trim());
    match title {
        Some(t) => doc.with_meta("title", t),
        None => doc,
    }
}

fn extract_html(name: &str, html: &str) -> Result<Document, ExtractError> {
    let document = Html::parse_document(html);
    let body = Selector::parse("body").map_err(|e| ExtractError::Html(format!("{e:?}")))?;
    let title_sel = Selector::parse("title").map_err(|e| ExtractError::Html(format!("{e:?}")))?;

    let mut text = String::new();
    match document.select(&body).next() {
        Some(body) => collect_text(&body, &mut text),
        None => collect_text(&document.root_element(), &mut text),
    }

    let normalized = text
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let doc = Document::new(name, normalized);
    let title = document
        .select(&title_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    Ok(match title {
        Some(t) => doc.with_meta("title", t),
        None => doc,
    })
}

fn collect_text(element: &ElementRef, out: &mut String) {
    for node in element.children() {
        if let Some(el) = ElementRef::wrap(node) {
            let tag = el.value().name();
            if matches!(tag, "script" | "style" | "noscript" | "head" | "template") {
                continue;
            }
            let block = matches!(
                tag,
                "p" | "div"
                    | "section"
                    | "h1"
                    | "h2"
                    | "h3"
                    | "h4"
                    | "h5"
                    | "h6"
                    | "br"
                    | "li"
                    | "tr"
                    | "label"
                    | "button"
                    | "form"
            );
            if block && !out.ends_with('\n') {
                out.push('\n');
            }
            collect_text(&el, out);
            if block && !out.ends_with('\n') {
                out.push('\n');
            }
        } else if let Some(text) = node.value().as_text() {
            out.push_str(text);
        }
    }
}
