//! Visible-text extraction from HTML.

use scraper::Html;

/// Extract the visible text of an HTML document, newline-separated.
///
/// Script and style contents are dropped; malformed markup degrades to
/// whatever html5ever can recover, never an error.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<String> = Vec::new();
    for text in document.root_element().text() {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.to_string());
        }
    }
    parts.join("\n")
}

/// Extract the document title, falling back to the first `<h1>`.
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    for selector in ["title", "h1"] {
        let sel = scraper::Selector::parse(selector).expect("static selector");
        if let Some(element) = document.select(&sel).next() {
            let text = element.text().collect::<Vec<_>>().join(" ");
            let text = crate::text::collapse_whitespace(&text);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// All `(href, visible text)` anchor pairs of a document.
pub fn extract_anchors(html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let sel = scraper::Selector::parse("a[href]").expect("static selector");
    document
        .select(&sel)
        .filter_map(|a| {
            let href = a.value().attr("href")?.trim();
            if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
                return None;
            }
            let text = crate::text::collapse_whitespace(&a.text().collect::<Vec<_>>().join(" "));
            Some((href.to_string(), text))
        })
        .collect()
}

/// All `iframe` source URLs (gazette issues sometimes embed their PDF).
pub fn extract_iframe_sources(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let sel = scraper::Selector::parse("iframe[src]").expect("static selector");
    document
        .select(&sel)
        .filter_map(|f| f.value().attr("src").map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_extraction_skips_markup() {
        let html = "<html><body><h1>Amtsblatt</h1><p>Ausgabe 3</p></body></html>";
        let text = extract_text(html);
        assert!(text.contains("Amtsblatt"));
        assert!(text.contains("Ausgabe 3"));
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn anchors_with_text() {
        let html = r##"<a href="/bebauungsplan.pdf">B-Plan Nr. 5</a>
                       <a href="#top">up</a>
                       <a href="javascript:void(0)">noop</a>"##;
        let anchors = extract_anchors(html);
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].0, "/bebauungsplan.pdf");
        assert_eq!(anchors[0].1, "B-Plan Nr. 5");
    }

    #[test]
    fn title_falls_back_to_h1() {
        let html = "<html><body><h1>Sitzung des Bauausschusses</h1></body></html>";
        assert_eq!(
            extract_title(html).as_deref(),
            Some("Sitzung des Bauausschusses")
        );
    }

    #[test]
    fn iframe_sources() {
        let html = r#"<iframe src="/amtsblatt/2024-03.pdf"></iframe>"#;
        assert_eq!(extract_iframe_sources(html), vec!["/amtsblatt/2024-03.pdf"]);
    }
}
