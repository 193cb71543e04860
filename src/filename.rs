//! Event date and display name recovered from platform export file names,
//! e.g. `runbreakfast-12-de-gener-del-2025-994f68.csv`.

use std::path::Path;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::text;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilenameError {
    #[error("no `<day> de <month> del <year>` pattern in `{0}`")]
    NoDatePattern(String),
    #[error("unrecognised month `{month}` in `{file}`")]
    UnknownMonth { file: String, month: String },
    #[error("{year}-{month:02}-{day:02} is not a calendar date (`{file}`)")]
    InvalidDate {
        file: String,
        year: i32,
        month: u32,
        day: u32,
    },
}

const MONTHS: &[(&str, u32)] = &[
    // Spanish
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("setiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
    // Catalan
    ("gener", 1),
    ("febrer", 2),
    ("marc", 3),
    ("maig", 5),
    ("juny", 6),
    ("juliol", 7),
    ("agost", 8),
    ("setembre", 9),
    ("novembre", 11),
    ("desembre", 12),
];

/// Elided `d'` forms lose their apostrophe in the platform slugs.
const CORRECTIONS: &[(&str, &str)] = &[
    ("dabril", "de abril"),
    ("doctubre", "de octubre"),
    ("dagost", "de agost"),
    ("dmarc", "de marc"),
    ("dmaig", "de maig"),
    ("dfebrer", "de febrer"),
    ("dsetembre", "de setembre"),
];

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})\s+de\s+([a-z]+)\s+(?:del|de)\s+(\d{4})\b").expect("valid date regex")
});

static CONTENT_HASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([0-9a-f]{6,})$").expect("valid hash regex"));

fn month_number(token: &str) -> Option<u32> {
    MONTHS
        .iter()
        .find(|(name, _)| *name == token)
        .map(|(_, number)| *number)
}

fn file_stem(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name)
}

/// Folds, lower-cases, turns separators into spaces and applies the
/// misspelling table token by token.
fn normalize_file_name(file_name: &str) -> String {
    let folded = text::fold_diacritics(file_stem(file_name)).to_lowercase();
    let spaced: String = folded
        .chars()
        .map(|c| if c == '-' || c == '_' || c == '.' { ' ' } else { c })
        .collect();

    spaced
        .split_whitespace()
        .map(|token| {
            CORRECTIONS
                .iter()
                .find(|(wrong, _)| *wrong == token)
                .map(|(_, right)| *right)
                .unwrap_or(token)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drops a trailing export hash. Words like `decade` are hex too, so the
/// token must contain a digit.
fn strip_content_hash(prefix: &str) -> &str {
    match CONTENT_HASH.captures(prefix) {
        Some(captures) if captures[1].bytes().any(|b| b.is_ascii_digit()) => {
            prefix[..captures.get(0).map_or(prefix.len(), |m| m.start())].trim_end()
        }
        _ => prefix,
    }
}

/// Event date and display name parsed from one export file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFileName {
    pub event_name: String,
    pub event_date: NaiveDate,
}

pub fn parse_file_name(file_name: &str) -> Result<ParsedFileName, FilenameError> {
    let normalized = normalize_file_name(file_name);
    let captures = DATE_PATTERN
        .captures(&normalized)
        .ok_or_else(|| FilenameError::NoDatePattern(file_name.to_string()))?;

    let whole = captures.get(0).expect("group 0 always present");
    let day: u32 = captures[1]
        .parse()
        .map_err(|_| FilenameError::NoDatePattern(file_name.to_string()))?;
    let month_token = &captures[2];
    let month = month_number(month_token).ok_or_else(|| FilenameError::UnknownMonth {
        file: file_name.to_string(),
        month: month_token.to_string(),
    })?;
    let year: i32 = captures[3]
        .parse()
        .map_err(|_| FilenameError::NoDatePattern(file_name.to_string()))?;

    let event_date =
        NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| FilenameError::InvalidDate {
            file: file_name.to_string(),
            year,
            month,
            day,
        })?;

    let prefix = strip_content_hash(normalized[..whole.start()].trim());
    let event_name = text::title_case(prefix);

    Ok(ParsedFileName {
        event_name,
        event_date,
    })
}

/// Join key shared by annotations, taxonomy and the canonical dataset.
pub fn event_key(name: &str, date: NaiveDate) -> String {
    format!("{}|{}", text::match_form(name), date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn extract_event_date(file_name: &str) -> Result<NaiveDate, FilenameError> {
        parse_file_name(file_name).map(|parsed| parsed.event_date)
    }

    #[test]
    fn parses_catalan_export_name() {
        let parsed = parse_file_name("runbreakfast-12-de-gener-del-2025-994f68.csv").unwrap();
        assert_eq!(parsed.event_date, date(2025, 1, 12));
        assert_eq!(parsed.event_name, "Runbreakfast");
    }

    #[test]
    fn parses_spanish_month_names() {
        assert_eq!(
            extract_event_date("trail-run-3-de-septiembre-de-2024-ab12cd.csv").unwrap(),
            date(2024, 9, 3)
        );
        assert_eq!(
            extract_event_date("yoga-y-cafe-21-de-diciembre-del-2024.csv").unwrap(),
            date(2024, 12, 21)
        );
    }

    #[test]
    fn corrects_elided_months() {
        assert_eq!(
            extract_event_date("afterwork-run-by-dash-and-stars-17-dabril-del-2025-a1ca86.csv")
                .unwrap(),
            date(2025, 4, 17)
        );
        assert_eq!(
            extract_event_date("los-jueves-con-sh-elche-03-doctubre-del-2024-ae05d9.csv").unwrap(),
            date(2024, 10, 3)
        );
    }

    #[test]
    fn accented_month_is_folded_before_lookup() {
        let parsed = parse_file_name("sisterhood-premium-05-de-març-del-2024-aa11bb.csv").unwrap();
        assert_eq!(parsed.event_date, date(2024, 3, 5));
        assert_eq!(parsed.event_name, "Sisterhood Premium");
    }

    #[test]
    fn unknown_month_is_rejected_not_defaulted() {
        let err = extract_event_date("runbrunch-04-de-brumari-del-2024-123abc.csv").unwrap_err();
        assert_eq!(
            err,
            FilenameError::UnknownMonth {
                file: "runbrunch-04-de-brumari-del-2024-123abc.csv".to_string(),
                month: "brumari".to_string(),
            }
        );
    }

    #[test]
    fn impossible_dates_are_rejected() {
        let err = extract_event_date("run-31-de-febrer-del-2025.csv").unwrap_err();
        assert!(matches!(err, FilenameError::InvalidDate { month: 2, day: 31, .. }));
    }

    #[test]
    fn hex_looking_words_stay_in_the_name() {
        let parsed = parse_file_name("run-the-decade-05-de-maig-del-2024.csv").unwrap();
        assert_eq!(parsed.event_name, "Run The Decade");
        let parsed = parse_file_name("cafe-facade-994f68-05-de-maig-del-2024.csv").unwrap();
        assert_eq!(parsed.event_name, "Cafe Facade");
    }

    #[test]
    fn missing_pattern_is_reported() {
        let err = parse_file_name("export-asistentes.csv").unwrap_err();
        assert!(matches!(err, FilenameError::NoDatePattern(_)));
    }

    #[test]
    fn keys_ignore_case_and_accents() {
        let day = date(2025, 1, 12);
        assert_eq!(event_key("Runbreakfast Élche", day), event_key("runbreakfast  elche", day));
        assert_eq!(event_key("Runbreakfast", day), "runbreakfast|2025-01-12");
    }
}
