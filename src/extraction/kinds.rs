//! Content classification by MIME type and file extension.

/// Marker that opens every image placeholder.
pub const IMAGE_MARKER: &str = "[Image:";

/// How a piece of content is turned into text.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentKind {
    /// Decoded as UTF-8 verbatim.
    Text,
    /// HTML markup; verbatim for files, reduced to readable text for pages.
    Html,
    /// Per-page text extraction.
    Pdf,
    /// Placeholder only.
    Image,
    /// No preview available.
    Unsupported,
}

const TEXT_MIME_TYPES: &[&str] = &[
    "application/json",
    "application/ld+json",
    "application/xml",
    "application/javascript",
    "application/x-javascript",
    "application/typescript",
    "application/x-yaml",
    "application/yaml",
    "application/toml",
    "application/x-sh",
    "application/sql",
    "application/x-httpd-php",
    "application/rtf",
];

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "csv", "tsv", "json", "jsonl", "xml", "yaml", "yml", "toml", "ini",
    "cfg", "conf", "log", "rst", "tex", "js", "mjs", "ts", "jsx", "tsx", "py", "rs", "go", "java",
    "kt", "swift", "c", "h", "cpp", "hpp", "cc", "cs", "rb", "php", "pl", "sh", "bash", "zsh",
    "sql", "css", "scss", "less", "vue", "svelte", "r", "lua", "dart", "scala",
];

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "bmp", "tiff", "ico", "heic",
];

/// Classify content from its MIME type, falling back to the file extension.
#[must_use]
pub fn classify(mime_type: &str, name: &str) -> ContentKind {
    let mime = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if mime == "text/html" || mime == "application/xhtml+xml" {
        return ContentKind::Html;
    }
    if mime.starts_with("text/") || TEXT_MIME_TYPES.contains(&mime.as_str()) {
        return ContentKind::Text;
    }
    if mime == "application/pdf" {
        return ContentKind::Pdf;
    }
    if mime.starts_with("image/") {
        return ContentKind::Image;
    }

    match extension(name).as_deref() {
        Some("html" | "htm" | "xhtml") => ContentKind::Html,
        Some("pdf") => ContentKind::Pdf,
        Some(ext) if TEXT_EXTENSIONS.contains(&ext) => ContentKind::Text,
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => ContentKind::Image,
        _ => ContentKind::Unsupported,
    }
}

fn extension(name: &str) -> Option<String> {
    let path = name.split(['?', '#']).next().unwrap_or(name);
    let file = path.rsplit('/').next().unwrap_or(path);
    file.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Placeholder forwarded instead of image pixels.
#[must_use]
pub fn image_placeholder(name: &str) -> String {
    format!(
        "{IMAGE_MARKER} {name}]\nThis file is an image. Its pixels are not read here; \
         ask a specific question about what it shows to get an image analysis."
    )
}

/// Placeholder for content with no preview.
#[must_use]
pub fn unsupported_placeholder(name: &str) -> String {
    format!("{name} (unsupported for preview)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_mime() {
        assert_eq!(classify("text/plain; charset=utf-8", "x"), ContentKind::Text);
        assert_eq!(classify("application/json", "x"), ContentKind::Text);
        assert_eq!(classify("text/html", "x"), ContentKind::Html);
        assert_eq!(classify("application/pdf", "x"), ContentKind::Pdf);
        assert_eq!(classify("image/png", "x"), ContentKind::Image);
    }

    #[test]
    fn test_classify_falls_back_to_extension() {
        assert_eq!(classify("application/octet-stream", "main.RS"), ContentKind::Text);
        assert_eq!(classify("", "report.pdf"), ContentKind::Pdf);
        assert_eq!(classify("", "https://x.io/photo.JPG?size=2"), ContentKind::Image);
        assert_eq!(classify("", "archive.zip"), ContentKind::Unsupported);
        assert_eq!(classify("", "Makefile"), ContentKind::Unsupported);
    }

    #[test]
    fn test_placeholders() {
        assert!(image_placeholder("cat.png").starts_with(IMAGE_MARKER));
        assert_eq!(
            unsupported_placeholder("a.zip"),
            "a.zip (unsupported for preview)"
        );
    }
}
