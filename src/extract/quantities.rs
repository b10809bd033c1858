//! Power and energy quantity extraction (MW, MWh, kW, kWh).

use std::sync::LazyLock;

use regex::Regex;

static MW_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(?:mwh|megawattstunden|mw|megawatt)").unwrap()
});
static KW_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(?:kwh|kilowattstunden|kw|kilowatt)").unwrap()
});

/// A quantity with its unit, normalized to MW / MWh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quantity {
    Megawatts(f64),
    MegawattHours(f64),
}

/// Extract all power/energy quantities; kW and kWh are converted by 1e-3.
/// German decimal commas are accepted.
pub fn extract(text: &str) -> Vec<Quantity> {
    let mut results = Vec::new();

    for captures in MW_PATTERN.captures_iter(text) {
        let Some(value) = parse_number(&captures[1]) else {
            continue;
        };
        let matched = captures[0].to_lowercase();
        if matched.contains("mwh") || matched.contains("megawattstunden") {
            results.push(Quantity::MegawattHours(value));
        } else {
            results.push(Quantity::Megawatts(value));
        }
    }

    for captures in KW_PATTERN.captures_iter(text) {
        let Some(value) = parse_number(&captures[1]) else {
            continue;
        };
        let matched = captures[0].to_lowercase();
        if matched.contains("kwh") || matched.contains("kilowattstunden") {
            results.push(Quantity::MegawattHours(value / 1000.0));
        } else {
            results.push(Quantity::Megawatts(value / 1000.0));
        }
    }

    results
}

/// The largest MW value, likely the project capacity.
pub fn find_capacity_mw(text: &str) -> Option<f64> {
    extract(text)
        .into_iter()
        .filter_map(|q| match q {
            Quantity::Megawatts(v) => Some(v),
            _ => None,
        })
        .fold(None, |best, v| Some(best.map_or(v, |b: f64| b.max(v))))
}

/// The largest MWh value, likely the storage capacity.
pub fn find_capacity_mwh(text: &str) -> Option<f64> {
    extract(text)
        .into_iter()
        .filter_map(|q| match q {
            Quantity::MegawattHours(v) => Some(v),
            _ => None,
        })
        .fold(None, |best, v| Some(best.map_or(v, |b: f64| b.max(v))))
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_mw_and_mwh() {
        let text = "Die Anlage hat eine Leistung von 50 MW und eine Kapazität von 20 MWh.";
        assert_eq!(find_capacity_mw(text), Some(50.0));
        assert_eq!(find_capacity_mwh(text), Some(20.0));
    }

    #[test]
    fn decimal_comma_is_accepted() {
        assert_eq!(find_capacity_mw("Leistung: 12,5 MW"), Some(12.5));
    }

    #[test]
    fn kilowatts_are_converted() {
        assert_eq!(find_capacity_mw("500 kW Einspeiseleistung"), Some(0.5));
        assert_eq!(find_capacity_mwh("2500 kWh Speicher"), Some(2.5));
    }

    #[test]
    fn largest_value_wins() {
        let text = "Teilanlage 1: 5 MW, Teilanlage 2: 30 MW, Eigenverbrauch 100 kW";
        assert_eq!(find_capacity_mw(text), Some(30.0));
    }

    #[test]
    fn mwh_is_not_double_counted_as_mw() {
        let text = "Speicher mit 20 MWh";
        assert_eq!(find_capacity_mw(text), None);
        assert_eq!(find_capacity_mwh(text), Some(20.0));
    }

    #[test]
    fn no_quantities() {
        assert_eq!(find_capacity_mw("Kein Zahlenwerk"), None);
        assert_eq!(find_capacity_mwh(""), None);
    }
}
