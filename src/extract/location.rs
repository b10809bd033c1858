//! Parcel and street location extraction.
//!
//! Gemarkung / Flur / Flurstück is the canonical land-registry hierarchy;
//! the parts found are serialized into one semicolon-joined string.

use std::sync::LazyLock;

use regex::Regex;

static GEMARKUNG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)gemarkung\s*:?\s*([a-zäöüß][a-zäöüß\s-]*)").unwrap());
static FLUR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)flur\s*:?\s*(\d+)").unwrap());
static FLURSTUECK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)flurst(?:ueck|ück)\s*:?\s*(\d+(?:/\d+)?[a-z]?)").unwrap()
});
static STRASSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:strasse|straße|str\.)\s+([a-zäöüß][a-zäöüß\s-]*)").unwrap()
});
static COORDINATES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,3}[.,]\d+)\s*°?\s*[NSEW]?\s*[,/]\s*(\d{1,3}[.,]\d+)\s*°?\s*[NSEW]?")
        .unwrap()
});

/// Extract the location description from free text, serialized as
/// `Gemarkung: …; Flur: …; Flurstück: …; Straße: …; Koordinaten: …`.
pub fn extract_location(text: &str) -> Option<String> {
    let normalized = crate::text::normalize(text);
    let mut parts: Vec<String> = Vec::new();

    if let Some(captures) = GEMARKUNG.captures(&normalized) {
        let name = captures[1].split_whitespace().next().unwrap_or("").trim();
        if !name.is_empty() {
            parts.push(format!("Gemarkung: {name}"));
        }
    }
    if let Some(captures) = FLUR.captures(&normalized) {
        parts.push(format!("Flur: {}", &captures[1]));
    }
    if let Some(captures) = FLURSTUECK.captures(&normalized) {
        parts.push(format!("Flurstück: {}", &captures[1]));
    }
    if let Some(captures) = STRASSE.captures(&normalized) {
        let street = captures[1].split_whitespace().next().unwrap_or("").trim();
        if !street.is_empty() {
            parts.push(format!("Straße: {street}"));
        }
    }
    if let Some(captures) = COORDINATES.captures(&normalized) {
        parts.push(format!("Koordinaten: {}, {}", &captures[1], &captures[2]));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parcel_hierarchy() {
        let location =
            extract_location("Das Vorhaben liegt in der Gemarkung Metzdorf, Flur 3, Flurstück 12/4.")
                .unwrap();
        assert!(location.contains("Gemarkung: metzdorf"));
        assert!(location.contains("Flur: 3"));
        assert!(location.contains("Flurstück: 12/4"));
    }

    #[test]
    fn folded_flurstueck_spelling() {
        let location = extract_location("Flurstueck 8a der Flur 1").unwrap();
        assert!(location.contains("Flurstück: 8a"));
        assert!(location.contains("Flur: 1"));
    }

    #[test]
    fn serialization_is_semicolon_joined() {
        let location = extract_location("Gemarkung Altdorf, Flur 2, Flurstück 7").unwrap();
        assert_eq!(location.matches(';').count(), 2);
    }

    #[test]
    fn coordinates() {
        let location = extract_location("Standort bei 52.345, 13.876").unwrap();
        assert!(location.contains("Koordinaten: 52.345, 13.876"));
    }

    #[test]
    fn no_location() {
        assert!(extract_location("Allgemeine Mitteilungen").is_none());
    }
}
