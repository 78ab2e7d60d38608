//! Source document parsing and text extraction.

use std::path::Path;
use teller_core::{AppError, AppResult};

/// File extensions accepted into the knowledge base.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "html", "htm", "pdf"];

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    Html,
    Pdf,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from a file name or path.
    pub fn from_name(name: &str) -> Self {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            Some("pdf") => Self::Pdf,
            Some("txt") => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Pdf => "pdf",
            Self::PlainText => "text",
            Self::Unknown => "unknown",
        }
    }
}

/// Whether `name` has one of the [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(name: &str) -> bool {
    ContentType::from_name(name) != ContentType::Unknown
}

/// Extract clean text from raw document bytes.
pub fn parse_bytes(name: &str, bytes: &[u8]) -> AppResult<String> {
    let cleaned = match ContentType::from_name(name) {
        ContentType::Pdf => extract_pdf(name, bytes)?,
        ContentType::Markdown => clean_markdown(&decode_text(name, bytes)?),
        ContentType::Html => clean_html(&decode_text(name, bytes)?),
        ContentType::PlainText | ContentType::Unknown => {
            decode_text(name, bytes)?.trim().to_string()
        }
    };

    Ok(cleaned)
}

/// Decode UTF-8 text, rejecting binary content.
fn decode_text(name: &str, bytes: &[u8]) -> AppResult<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let text = std::str::from_utf8(bytes).map_err(|_| {
        AppError::Knowledge(format!("{} is not valid UTF-8 text", name))
    })?;

    if !is_likely_text(text) {
        tracing::warn!("Skipping likely binary file: {}", name);
        return Err(AppError::Knowledge(format!(
            "{}: binary file not supported",
            name
        )));
    }

    Ok(text.to_string())
}

fn extract_pdf(name: &str, bytes: &[u8]) -> AppResult<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| AppError::Knowledge(format!("Failed to extract text from {}: {}", name, e)))?;

    // PDF extraction leaves ragged line breaks; keep paragraphs, drop blank runs.
    let cleaned = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(cleaned)
}

/// Clean markdown by removing excess formatting.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        // Remove markdown headers
        let trimmed = line.trim_start_matches('#').trim();

        // Skip horizontal rules and code fences
        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        // Keep content
        if !trimmed.is_empty() {
            result.push_str(trimmed);
            result.push('\n');
        }
    }

    result.trim().to_string()
}

/// Clean HTML by stripping tags (simple approach).
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;

    for (i, ch) in text.char_indices() {
        if ch == '<' {
            in_tag = true;

            // Check for script/style tags
            let rest = &text[i..];
            if starts_with_ignore_case(rest, "<script") {
                in_script = true;
            } else if starts_with_ignore_case(rest, "</script") {
                in_script = false;
            } else if starts_with_ignore_case(rest, "<style") {
                in_style = true;
            } else if starts_with_ignore_case(rest, "</style") {
                in_style = false;
            }
        } else if ch == '>' {
            if in_tag {
                result.push(' ');
            }
            in_tag = false;
        } else if !in_tag && !in_script && !in_style {
            result.push(ch);
        }
    }

    // Collapse whitespace
    let collapsed = result.split_whitespace().collect::<Vec<_>>().join(" ");
    decode_entities(&collapsed)
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Decode the handful of entities common in exported documents.
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Check if text is likely UTF-8 text (not binary).
fn is_likely_text(data: &str) -> bool {
    // Simple heuristic: check for null bytes
    !data.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_detection() {
        assert_eq!(ContentType::from_name("file.md"), ContentType::Markdown);
        assert_eq!(ContentType::from_name("FEES.HTM"), ContentType::Html);
        assert_eq!(ContentType::from_name("rates.pdf"), ContentType::Pdf);
        assert_eq!(ContentType::from_name("file.txt"), ContentType::PlainText);
        assert_eq!(ContentType::from_name("index.sqlite"), ContentType::Unknown);
    }

    #[test]
    fn test_is_supported() {
        for ext in SUPPORTED_EXTENSIONS {
            assert!(is_supported(&format!("doc.{}", ext)));
        }
        assert!(!is_supported("doc.docx"));
        assert!(!is_supported("README"));
    }

    #[test]
    fn test_clean_markdown() {
        let input = "# Header\n\nSome text\n\n```rust\ncode\n```\n\nMore text";
        let output = clean_markdown(input);
        assert!(output.contains("Header"));
        assert!(output.contains("Some text"));
        assert!(output.contains("More text"));
        assert!(!output.contains("```"));
    }

    #[test]
    fn test_clean_html() {
        let input = "<html><body><p>Hello <b>world</b></p></body></html>";
        let output = clean_html(input);
        assert_eq!(output, "Hello world");
    }

    #[test]
    fn test_clean_html_drops_scripts_and_handles_unicode() {
        let input = "<p>存款利率 &amp; fees</p><SCRIPT>alert('x')</SCRIPT><style>p{}</style><p>é</p>";
        let output = clean_html(input);
        assert_eq!(output, "存款利率 & fees é");
    }

    #[test]
    fn test_parse_bytes_plain_text() {
        let text = parse_bytes("notes.txt", "  Opening hours: 9-17  \n".as_bytes()).unwrap();
        assert_eq!(text, "Opening hours: 9-17");
    }

    #[test]
    fn test_parse_bytes_strips_bom() {
        let text = parse_bytes("notes.txt", b"\xEF\xBB\xBFhello").unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_parse_bytes_rejects_invalid_utf8() {
        let result = parse_bytes("notes.txt", &[0xff, 0xfe, 0x00, 0x41]);
        assert!(matches!(result, Err(AppError::Knowledge(_))));
    }

    #[test]
    fn test_parse_bytes_rejects_binary() {
        let result = parse_bytes("blob.txt", b"abc\0def");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_bytes_rejects_broken_pdf() {
        let result = parse_bytes("statement.pdf", b"not really a pdf");
        assert!(result.is_err());
    }
}
