//! Developer company extraction by German corporate suffix.

use std::sync::LazyLock;

use regex::Regex;

// Up to four capitalized tokens followed by a corporate suffix.
static COMPANY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[A-ZÄÖÜ][\w&.-]*\s+){1,4}(?:GmbH & Co\. KG|GmbH|AG|UG|KG)\b").unwrap()
});

/// All company names found, in order of appearance.
pub fn find_companies(text: &str) -> Vec<String> {
    COMPANY_PATTERN
        .find_iter(text)
        .map(|m| crate::text::collapse_whitespace(m.as_str()))
        .collect()
}

/// The developer field: a single name, or up to three joined when the text
/// names several.
pub fn find_developer(text: &str) -> Option<String> {
    let companies = find_companies(text);
    match companies.len() {
        0 => None,
        1 => Some(companies.into_iter().next().unwrap()),
        _ => Some(companies[..companies.len().min(3)].join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_company() {
        let companies = find_companies("Vorhabenträger ist die Energiepark Metzdorf GmbH.");
        assert_eq!(companies, vec!["Energiepark Metzdorf GmbH"]);
    }

    #[test]
    fn gmbh_co_kg_is_one_match() {
        let companies = find_companies("Antrag der Speicher Projekt GmbH & Co. KG aus Potsdam");
        assert_eq!(companies, vec!["Speicher Projekt GmbH & Co. KG"]);
    }

    #[test]
    fn multiple_companies_joined() {
        let text = "Beteiligt sind die Alpha Energie GmbH, die Beta Netz AG und die \
                    Gamma Speicher UG sowie die Delta Wind KG.";
        let developer = find_developer(text).unwrap();
        assert!(developer.contains("Alpha Energie GmbH"));
        // At most three names are kept.
        assert_eq!(developer.matches(',').count(), 2);
    }

    #[test]
    fn no_company() {
        assert!(find_developer("Die Gemeinde plant selbst.").is_none());
    }
}
