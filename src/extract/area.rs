//! Area extraction, normalized to hectares.

use std::sync::LazyLock;

use regex::Regex;

static AREA_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(km²|quadratkilometer|qm|m²|quadratmeter|ha|hektar)")
        .unwrap()
});

/// Extract all area mentions as hectares.
pub fn extract_areas(text: &str) -> Vec<f64> {
    AREA_PATTERN
        .captures_iter(text)
        .filter_map(|captures| {
            let value: f64 = captures[1].replace(',', ".").parse().ok()?;
            let factor = match captures[2].to_lowercase().as_str() {
                "km²" | "quadratkilometer" => 100.0,
                "qm" | "m²" | "quadratmeter" => 0.0001,
                _ => 1.0,
            };
            Some(value * factor)
        })
        .collect()
}

/// The largest area mentioned, likely the project area (hectares).
pub fn find_largest_area(text: &str) -> Option<f64> {
    extract_areas(text)
        .into_iter()
        .fold(None, |best, v| Some(best.map_or(v, |b: f64| b.max(v))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hectares_pass_through() {
        assert_eq!(find_largest_area("Plangebiet von 12 ha"), Some(12.0));
        assert_eq!(find_largest_area("ca. 3,5 Hektar"), Some(3.5));
    }

    #[test]
    fn square_meters_convert() {
        assert_eq!(find_largest_area("Fläche: 25000 m²"), Some(2.5));
        assert_eq!(find_largest_area("etwa 25000 qm"), Some(2.5));
    }

    #[test]
    fn square_kilometers_convert() {
        assert_eq!(find_largest_area("0,5 km² Sondergebiet"), Some(50.0));
    }

    #[test]
    fn largest_wins() {
        let text = "Teilfläche A: 2 ha, Gesamtgebiet 60000 m², Randstreifen 500 qm";
        assert_eq!(find_largest_area(text), Some(6.0));
    }

    #[test]
    fn no_area() {
        assert_eq!(find_largest_area("ohne Flächenangabe"), None);
    }
}
