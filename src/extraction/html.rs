//! Readable text from HTML pages.

use scraper::{ElementRef, Html, Selector};

/// Containers tried in order for the main content of a page.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    ".post-content",
    ".article-content",
    ".entry-content",
    "#content",
    ".content",
];

/// Minimum words for a content container to be preferred over `<body>`.
const MIN_CONTENT_WORDS: usize = 50;

/// Reduce an HTML page to its title and main text.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let title = page_title(&document);
    let body = main_text(&document);

    match (title.is_empty(), body.is_empty()) {
        (true, _) => body,
        (false, true) => title,
        (false, false) => format!("{title}\n\n{body}"),
    }
}

fn page_title(document: &Html) -> String {
    for query in ["meta[property='og:title']", "title", "h1"] {
        let Ok(selector) = Selector::parse(query) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element
                .value()
                .attr("content")
                .map_or_else(|| element.text().collect::<String>(), str::to_string);
            let text = clean_text(&text);
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

fn main_text(document: &Html) -> String {
    for query in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(query) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = visible_text(element);
            if text.split_whitespace().count() > MIN_CONTENT_WORDS {
                return text;
            }
        }
    }

    Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .map(visible_text)
        .unwrap_or_default()
}

/// Text nodes under `root`, skipping scripts and styles.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|el| el.name().to_string()))
            .is_some_and(|name| {
                matches!(name.as_str(), "script" | "style" | "noscript" | "template")
            });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }
    clean_text(&parts.join(" "))
}

/// Collapse whitespace runs to single spaces.
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
