//! URL patterns and path sets for locating RIS, gazette and planning
//! sections of municipal web presences.

use std::sync::LazyLock;

use regex::Regex;

/// Sections of municipal websites worth crawling for procedures.
pub const MUNICIPAL_DISCOVERY_PATHS: &[&str] = &[
    "/bekanntmachungen",
    "/amtliche-bekanntmachungen",
    "/oeffentliche-bekanntmachungen",
    "/aktuelles/bekanntmachungen",
    "/bauleitplanung",
    "/stadtplanung",
    "/bebauungsplaene",
    "/bauleitplaene",
    "/planung-und-bauen",
    "/bauen-und-wohnen",
    "/b-plan",
    "/bebauungsplan",
    "/verfahren",
    "/beteiligung",
];

/// Committee list paths tried on a RIS root.
pub const RIS_COMMITTEE_PATHS: &[&str] = &[
    "/si0100.asp",
    "/si0100.php",
    "/index.php",
    "/sitzungen",
    "/gremien",
    "/tagesordnung",
    "/beschlussvorlagen",
    "/niederschriften",
    "/protokolle",
];

/// Committees that handle planning and permit procedures.
pub const RIS_COMMITTEE_ALLOWLIST: &[&str] = &[
    "bauausschuss",
    "hauptausschuss",
    "gemeindevertretung",
    "stadtverordnetenversammlung",
    "ortsbeirat",
    "bau- und planungsausschuss",
    "planungsausschuss",
    "wirtschaftsausschuss",
    "umweltausschuss",
];

/// Gazette paths tried below a base URL.
pub const GAZETTE_PATHS: &[&str] = &[
    "/amtsblatt",
    "/amtliches-mitteilungsblatt",
    "/bekanntmachungen",
    "/amtliche-bekanntmachungen",
    "/veroeffentlichungen",
];

/// Navigational pages harvested during site-driven discovery.
pub const DISCOVERY_PAGES: &[&str] = &["", "/sitemap.xml", "/impressum", "/kontakt", "/startseite", "/index"];

/// RIS installations commonly live on vendor domains.
pub static RIS_DOMAIN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["allris", "sessionnet", "ratsinfo", r"ris\.", r"\.ris\."]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

pub static RIS_PATH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        "/ris",
        "/ratsinfo",
        "/sessionnet",
        "/si0100",
        "/to0100",
        "/vo0200",
        "/bi/",
        "/gremien",
        "/sitzung",
        "/tagesordnung",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub static GAZETTE_PATH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        "/amtsblatt",
        "/amtliche-bekanntmach",
        "/bekanntmach",
        "/veroeffentlich",
        "/auslegung",
        "/bauleitplanung",
        "/beteiligung",
        "/oeffentliche-auslegung",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static PARENTHETICAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^)]*\)").unwrap());
static NON_URL_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9.-]").unwrap());
static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s_/\\]+").unwrap());
static DASH_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").unwrap());

/// Municipality name as one compact URL token: parenthetical suffix
/// stripped, lower-cased, umlauts folded, separators removed.
pub fn sanitize_name_compact(name: &str) -> String {
    let stripped = PARENTHETICAL.replace_all(name, "");
    let folded = crate::text::fold_umlauts(&stripped.to_lowercase());
    let no_sep = SEPARATORS.replace_all(&folded, "");
    NON_URL_CHARS.replace_all(&no_sep, "").to_string()
}

/// Municipality name as a dash-joined URL token.
pub fn sanitize_name_dashed(name: &str) -> String {
    let stripped = PARENTHETICAL.replace_all(name, "");
    let folded = crate::text::fold_umlauts(&stripped.to_lowercase());
    let dashed = SEPARATORS.replace_all(&folded, "-");
    let cleaned = NON_URL_CHARS.replace_all(&dashed, "");
    DASH_RUNS
        .replace_all(&cleaned, "-")
        .trim_matches(['-', '.'])
        .to_string()
}

/// Candidate RIS URLs for a municipality: vendor-domain guesses, then
/// RIS paths below a known base.
pub fn ris_url_guesses(municipality_name: &str, base_url: Option<&str>) -> Vec<String> {
    let mut urls = Vec::new();
    let token = sanitize_name_compact(municipality_name);

    if !token.is_empty() {
        urls.push(format!("https://{token}.sessionnet.de"));
        urls.push(format!("https://ris.{token}.de"));
        urls.push(format!("https://{token}.allris.de"));
        urls.push(format!("https://allris.{token}.de"));
    }

    if let Some(base) = base_url.filter(|b| b.starts_with("http")) {
        let base = base.trim_end_matches('/');
        for path in ["/sessionnet", "/ris", "/ratsinformationssystem", "/si0100.asp", "/si0100.php"] {
            urls.push(format!("{base}{path}"));
        }
    }

    urls
}

/// Candidate gazette URLs for a municipality.
pub fn gazette_url_guesses(municipality_name: &str, base_url: Option<&str>) -> Vec<String> {
    let mut urls = Vec::new();

    if let Some(base) = base_url.filter(|b| b.starts_with("http")) {
        let base = base.trim_end_matches('/');
        for path in GAZETTE_PATHS {
            urls.push(format!("{base}{path}"));
        }
    }

    let token = sanitize_name_dashed(municipality_name);
    if !token.is_empty() {
        urls.push(format!("https://{token}.de/amtsblatt"));
        urls.push(format!("https://www.{token}.de/amtsblatt"));
    }

    urls
}

/// Homepage guesses used when no official website is on record.
pub fn website_guesses(municipality_name: &str) -> Vec<String> {
    let token = sanitize_name_dashed(municipality_name);
    if token.is_empty() {
        return Vec::new();
    }
    vec![
        format!("https://www.{token}.de"),
        format!("https://{token}.de"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_token_strips_parentheticals_and_umlauts() {
        assert_eq!(sanitize_name_compact("Frankfurt (Oder)"), "frankfurt");
        assert_eq!(sanitize_name_compact("Märkisch Buchholz"), "maerkischbuchholz");
    }

    #[test]
    fn dashed_token() {
        assert_eq!(sanitize_name_dashed("Märkisch Buchholz"), "maerkisch-buchholz");
        assert_eq!(sanitize_name_dashed("Frankfurt (Oder)"), "frankfurt");
    }

    #[test]
    fn ris_guesses_cover_vendor_domains() {
        let urls = ris_url_guesses("Metzdorf", None);
        assert!(urls.contains(&"https://metzdorf.sessionnet.de".to_string()));
        assert!(urls.contains(&"https://allris.metzdorf.de".to_string()));
    }

    #[test]
    fn base_url_paths_are_appended() {
        let urls = ris_url_guesses("Metzdorf", Some("https://www.metzdorf.de/"));
        assert!(urls.contains(&"https://www.metzdorf.de/si0100.asp".to_string()));
        let gazette = gazette_url_guesses("Metzdorf", Some("https://www.metzdorf.de"));
        assert!(gazette.contains(&"https://www.metzdorf.de/amtsblatt".to_string()));
    }
}
