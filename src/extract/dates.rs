//! Decision date extraction.
//!
//! All parseable dates in the 2020–2030 window are enumerated; a date
//! within 200 characters of a decision keyword wins, otherwise the first
//! date found.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static DATE_PATTERNS: LazyLock<Vec<(Regex, bool)>> = LazyLock::new(|| {
    vec![
        // DD.MM.YYYY (tolerating spaces after the dots, common in PDFs)
        (
            Regex::new(r"(\d{1,2})\.\s*(\d{1,2})\.\s*(\d{4})").unwrap(),
            false,
        ),
        // DD/MM/YYYY and DD-MM-YYYY
        (
            Regex::new(r"(\d{1,2})[/-]\s*(\d{1,2})[/-]\s*(\d{4})").unwrap(),
            false,
        ),
        // YYYY-MM-DD
        (
            Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").unwrap(),
            true,
        ),
    ]
});

const DECISION_KEYWORDS: &[&str] = &[
    "aufstellungsbeschluss",
    "satzungsbeschluss",
    "beschlossen am",
    "beschlossen",
    "beschlussfassung am",
    "beschlussfassung",
    "beschluss vom",
    "beschluss",
];

const KEYWORD_WINDOW: usize = 200;

/// All dates in 2020–2030 with their byte position in the text.
pub fn extract_dates(text: &str) -> Vec<(usize, NaiveDate)> {
    let mut results = Vec::new();
    for (pattern, year_first) in DATE_PATTERNS.iter() {
        for captures in pattern.captures_iter(text) {
            let (year, month, day) = if *year_first {
                (&captures[1], &captures[2], &captures[3])
            } else {
                (&captures[3], &captures[2], &captures[1])
            };
            let (Ok(year), Ok(month), Ok(day)) =
                (year.parse::<i32>(), month.parse::<u32>(), day.parse::<u32>())
            else {
                continue;
            };
            if !(2020..=2030).contains(&year) {
                continue;
            }
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                results.push((captures.get(0).unwrap().start(), date));
            }
        }
    }
    results.sort_by_key(|(pos, _)| *pos);
    results
}

/// The decision date: a date near a decision keyword, else the first date.
pub fn find_decision_date(text: &str) -> Option<NaiveDate> {
    let lowered = text.to_lowercase();
    let dates = extract_dates(text);
    if dates.is_empty() {
        return None;
    }

    for keyword in DECISION_KEYWORDS {
        if let Some(keyword_pos) = lowered.find(keyword) {
            for (date_pos, date) in &dates {
                if keyword_pos.abs_diff(*date_pos) < KEYWORD_WINDOW {
                    return Some(*date);
                }
            }
        }
    }

    dates.first().map(|(_, date)| *date)
}
