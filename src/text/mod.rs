//! Text normalization for German keyword matching.
//!
//! Keyword lexicons are written in folded form (`ae`/`oe`/`ue`/`ss`), so all
//! matching happens against the normalized text. The raw form is kept
//! alongside because some negative-term checks also run against it.

pub mod html;
pub mod pdf;

/// Fold umlauts and sharp s into their digraph spellings.
pub fn fold_umlauts(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            'ä' => out.push_str("ae"),
            'ö' => out.push_str("oe"),
            'ü' => out.push_str("ue"),
            'Ä' => out.push_str("Ae"),
            'Ö' => out.push_str("Oe"),
            'Ü' => out.push_str("Ue"),
            'ß' => out.push_str("ss"),
            'ẞ' => out.push_str("Ss"),
            _ => out.push(ch),
        }
    }
    out
}

/// Normalize for matching: lower-case, fold umlauts, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let folded = fold_umlauts(&lowered);
    collapse_whitespace(&folded)
}

/// Collapse any whitespace run into a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_space && !out.is_empty() {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn umlaut_mapping() {
        assert_eq!(fold_umlauts("äöüß"), "aeoeuess");
        assert_eq!(fold_umlauts("ÄÖÜ"), "AeOeUe");
        assert_eq!(normalize("Öffentliche Auslegung"), "oeffentliche auslegung");
    }

    #[test]
    fn case_folding_is_uniform() {
        assert_eq!(normalize("Batteriespeicher"), normalize("BATTERIESPEICHER"));
    }

    #[test]
    fn whitespace_collapse() {
        assert_eq!(
            normalize("  Bebauungsplan\n\tNr.   5  "),
            "bebauungsplan nr. 5"
        );
    }
}
