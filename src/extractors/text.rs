// src/extractors/text.rs
use scraper::{ElementRef, Html};

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "tr", "td", "th", "li", "table", "h1", "h2", "h3", "h4", "h5", "h6",
];

const SKIPPED_TAGS: &[&str] = &["script", "style", "head"];

/// Flattens a filing document to plain text with one line per block element.
///
/// Plain-text submissions pass through with only whitespace normalized. Runs
/// of spaces collapse to one and blank lines are dropped.
pub fn document_text(content: &str) -> String {
    if looks_like_html(content) {
        let html = Html::parse_document(content);
        let mut raw = String::with_capacity(content.len() / 2);
        walk(html.root_element(), &mut raw);
        normalize_lines(&raw)
    } else {
        normalize_lines(content)
    }
}

fn looks_like_html(content: &str) -> bool {
    let head: String = content.chars().take(8192).collect::<String>().to_lowercase();
    ["<html", "<body", "<div", "<table", "<p>", "<p ", "<br", "<font"]
        .iter()
        .any(|tag| head.contains(tag))
}

fn walk(element: ElementRef, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_TAGS.contains(&name) {
        return;
    }
    let block = BLOCK_TAGS.contains(&name);
    if block {
        out.push('\n');
    }
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            walk(child_element, out);
        }
    }
    if block {
        out.push('\n');
    }
}

fn normalize_lines(raw: &str) -> String {
    raw.replace('\u{a0}', " ")
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_elements_become_lines() {
        let html = "<html><head><style>p{}</style></head><body>\
            <table><tr><td>(1)</td><td>NAMES OF&nbsp;REPORTING PERSONS</td></tr>\
            <tr><td></td><td>Vanguard   Group</td></tr></table>\
            <p>Row <b>11</b> text</p></body></html>";
        let text = document_text(html);
        assert_eq!(text, "(1)\nNAMES OF REPORTING PERSONS\nVanguard Group\nRow 11 text");
    }

    #[test]
    fn plain_text_passes_through() {
        let text = document_text("  CUSIP No. 76655K103 \n\n\n  (11)  Percent of class   5.4%  ");
        assert_eq!(text, "CUSIP No. 76655K103\n(11) Percent of class 5.4%");
    }
}
