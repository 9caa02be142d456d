//! Normalisation helpers shared by the Readm extraction functions
//!
//! - status text to [`MangaStatus`]
//! - chapter label parsing (number, volume, name)
//! - release date parsing, relative ("3 hours ago") and absolute
//! - id extraction from site urls

use crate::models::{MangaStatus, Tag};
use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static PREFIXED_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:chapter|chap\.?|ch\.?|episode|ep\.?)\s*#?\s*(\d+(?:\.\d+)?)")
        .expect("valid chapter regex")
});
static CHAPTER_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:chapter|chap|ch|episode|ep)\b").expect("valid chapter prefix regex")
});
static BARE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("valid number regex"));
static VOLUME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bvol(?:ume)?\.?\s*(\d+(?:\.\d+)?)").expect("valid volume regex"));
static CHAPTER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d(?:\s*:\s*|\s+-\s+)(.+)$").expect("valid name regex"));
static RELATIVE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(an?|\d+)\s*(second|sec|minute|min|hour|hr|day|week|month|year)s?")
        .expect("valid relative date regex")
});
static COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:[.,]\d+)*)(?:\s*([km])\b)?").expect("valid count regex"));
static ALT_TITLE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[,;|/]\s*").expect("valid separator regex"));

const ABSOLUTE_DATE_FORMATS: [&str; 6] = [
    // Mar 03, 2023
    "%b %d, %Y",
    // March 03, 2023
    "%B %d, %Y",
    // 03 Mar 2023
    "%d %b %Y",
    // 2023-03-03
    "%Y-%m-%d",
    // 03/03/2023
    "%m/%d/%Y",
    // 2023.03.03
    "%Y.%m.%d",
];

/// Genre labels that mark a series as adult content
const MATURE_GENRES: [&str; 5] = ["adult", "hentai", "mature", "smut", "ecchi"];

/// Map a status label to [`MangaStatus`], exact match ignoring case
pub fn parse_status(raw: &str) -> MangaStatus {
    match raw.trim().to_lowercase().as_str() {
        "ongoing" => MangaStatus::Ongoing,
        "completed" => MangaStatus::Completed,
        "canceled" | "cancelled" | "abandoned" => MangaStatus::Abandoned,
        "hiatus" | "on hiatus" => MangaStatus::Hiatus,
        _ => MangaStatus::Unknown,
    }
}

/// Chapter number from a label like "Chapter 12.5: Title"
///
/// A number after a known prefix wins; a bare number is accepted when the label has
/// no prefix at all.
pub fn parse_chapter_number(label: &str) -> Option<f64> {
    let without_volume = VOLUME.replace_all(label, "");
    let cap = match PREFIXED_NUMBER.captures(&without_volume) {
        Some(cap) => cap,
        None if CHAPTER_PREFIX.is_match(&without_volume) => return None,
        None => BARE_NUMBER.captures(&without_volume)?,
    };
    cap.get(1).and_then(|m| m.as_str().parse().ok())
}

pub fn parse_volume(label: &str) -> Option<f64> {
    VOLUME
        .captures(label)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Name following the chapter number, "Chapter 3: The Duel" -> "The Duel"
pub fn parse_chapter_name(label: &str) -> Option<String> {
    CHAPTER_NAME
        .captures(label.trim())
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Parse the date labels the site shows next to releases
///
/// Handles relative labels ("2 hours ago", "a day ago", "yesterday", "just now")
/// measured from `now`, and a handful of absolute formats.
pub fn parse_release_date(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = raw.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }

    if text.contains("just now") || text == "now" || text == "today" {
        return Some(now);
    }
    if text.contains("yesterday") {
        return now.checked_sub_signed(Duration::days(1));
    }

    if let Some(cap) = RELATIVE_DATE.captures(&text) {
        let amount: i64 = match &cap[1] {
            "a" | "an" => 1,
            digits => digits.parse().ok()?,
        };
        return match &cap[2] {
            "second" | "sec" => now.checked_sub_signed(Duration::try_seconds(amount)?),
            "minute" | "min" => now.checked_sub_signed(Duration::try_minutes(amount)?),
            "hour" | "hr" => now.checked_sub_signed(Duration::try_hours(amount)?),
            "day" => now.checked_sub_signed(Duration::try_days(amount)?),
            "week" => now.checked_sub_signed(Duration::try_weeks(amount)?),
            "month" => now.checked_sub_months(Months::new(u32::try_from(amount).ok()?)),
            "year" => {
                now.checked_sub_months(Months::new(u32::try_from(amount.checked_mul(12)?).ok()?))
            }
            _ => None,
        };
    }

    let original = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(original) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ABSOLUTE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(original, format) {
            let datetime = NaiveDateTime::new(date, NaiveTime::default());
            return Some(Utc.from_utc_datetime(&datetime));
        }
    }

    None
}

/// Counts like "12,345", "1.2k" or "3M"
pub fn parse_count(raw: &str) -> Option<u64> {
    let cap = COUNT.captures(raw.trim())?;
    let digits = &cap[1];
    let multiplier = match cap.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(suffix) if suffix == "k" => 1_000.0,
        Some(suffix) if suffix == "m" => 1_000_000.0,
        _ => 1.0,
    };
    if multiplier > 1.0 {
        let value: f64 = digits.replace(',', ".").parse().ok()?;
        Some((value * multiplier).round() as u64)
    } else {
        digits.replace([',', '.'], "").parse().ok()
    }
}

pub fn parse_rating(raw: &str) -> Option<f32> {
    BARE_NUMBER
        .captures(raw)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Manga id from a link such as `/manga/one-piece` or `https://readm.org/manga/19309/12/all-pages`
pub fn manga_id_from_href(href: &str) -> Option<String> {
    let path = strip_origin(href);
    let rest = path.trim_start_matches('/').strip_prefix("manga/")?;
    rest.split('/')
        .next()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Chapter id from a chapter link: the last path segment, ignoring a trailing `all-pages`
pub fn chapter_id_from_href(href: &str) -> Option<String> {
    let path = strip_origin(href);
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && *segment != "all-pages")
        .last()
        .map(str::to_string)
}

/// Category id from `/category/action` or `/category/action/watch/2`
pub fn category_id_from_href(href: &str) -> Option<String> {
    let path = strip_origin(href);
    let rest = path.trim_start_matches('/').strip_prefix("category/")?;
    rest.split('/')
        .next()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn strip_origin(href: &str) -> &str {
    let href = href.trim();
    match href.find("://") {
        Some(scheme_end) => {
            let after_scheme = &href[scheme_end + 3..];
            after_scheme
                .find('/')
                .map(|path_start| &after_scheme[path_start..])
                .unwrap_or("/")
        }
        None => href,
    }
}

pub fn split_alt_titles(raw: &str) -> Vec<String> {
    ALT_TITLE_SEPARATOR
        .split(raw.trim())
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn is_mature(tags: &[Tag]) -> bool {
    tags.iter()
        .any(|tag| MATURE_GENRES.contains(&tag.label.trim().to_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("Completed"), MangaStatus::Completed);
        assert_eq!(parse_status("  ONGOING "), MangaStatus::Ongoing);
        assert_eq!(parse_status("Canceled"), MangaStatus::Abandoned);
        assert_eq!(parse_status("Abandoned"), MangaStatus::Abandoned);
        assert_eq!(parse_status("hiatus"), MangaStatus::Hiatus);
        assert_eq!(parse_status("Foobar"), MangaStatus::Unknown);
        // exact match only
        assert_eq!(parse_status("Completed soon"), MangaStatus::Unknown);
    }

    #[test]
    fn test_parse_chapter_number() {
        assert_eq!(parse_chapter_number("Chapter 1089"), Some(1089.0));
        assert_eq!(parse_chapter_number("Ch. 12.5"), Some(12.5));
        assert_eq!(parse_chapter_number("Vol. 3 Chapter 20"), Some(20.0));
        assert_eq!(parse_chapter_number("Episode 7 - Finale"), Some(7.0));
        assert_eq!(parse_chapter_number("42"), Some(42.0));
        assert_eq!(parse_chapter_number("Oneshot"), None);
        // a prefix without its number is not rescued by a later number
        assert_eq!(parse_chapter_number("Chapter : The 100 Days"), None);
        assert_eq!(parse_chapter_number("Ep. Finale 2"), None);
    }

    #[test]
    fn test_parse_volume_and_name() {
        assert_eq!(parse_volume("Vol. 3 Chapter 20"), Some(3.0));
        assert_eq!(parse_volume("Chapter 20"), None);
        assert_eq!(
            parse_chapter_name("Chapter 3: The Duel").as_deref(),
            Some("The Duel")
        );
        assert_eq!(
            parse_chapter_name("Chapter 4 - Homecoming").as_deref(),
            Some("Homecoming")
        );
        assert_eq!(parse_chapter_name("Chapter 5"), None);
    }

    #[test]
    fn test_parse_relative_dates() {
        let now = now();
        assert_eq!(
            parse_release_date("2 hours ago", now),
            Some(now - Duration::hours(2))
        );
        assert_eq!(
            parse_release_date("a day ago", now),
            Some(now - Duration::days(1))
        );
        assert_eq!(
            parse_release_date("15 mins ago", now),
            Some(now - Duration::minutes(15))
        );
        assert_eq!(
            parse_release_date("Yesterday", now),
            Some(now - Duration::days(1))
        );
        assert_eq!(parse_release_date("just now", now), Some(now));
        assert_eq!(
            parse_release_date("3 weeks ago", now),
            Some(now - Duration::weeks(3))
        );
    }

    #[test]
    fn test_out_of_range_relative_dates() {
        let now = now();
        assert_eq!(parse_release_date("999999999999999 days ago", now), None);
        assert_eq!(parse_release_date("999999999999999 weeks ago", now), None);
        assert_eq!(parse_release_date("999999999999999999 years ago", now), None);
        assert_eq!(parse_release_date("99999999999999999999 hours ago", now), None);
    }

    #[test]
    fn test_parse_absolute_dates() {
        let expected = Utc.with_ymd_and_hms(2023, 3, 3, 0, 0, 0).unwrap();
        assert_eq!(parse_release_date("Mar 03, 2023", now()), Some(expected));
        assert_eq!(parse_release_date("2023-03-03", now()), Some(expected));
        assert_eq!(parse_release_date("whenever", now()), None);
        assert_eq!(parse_release_date("", now()), None);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("12,345"), Some(12345));
        assert_eq!(parse_count("1.2k"), Some(1200));
        assert_eq!(parse_count("3M views"), Some(3_000_000));
        assert_eq!(parse_count("1,234 members"), Some(1234));
        assert_eq!(parse_count("none"), None);
    }

    #[test]
    fn test_ids_from_hrefs() {
        assert_eq!(
            manga_id_from_href("/manga/one-piece").as_deref(),
            Some("one-piece")
        );
        assert_eq!(
            manga_id_from_href("https://readm.org/manga/19309/12/all-pages").as_deref(),
            Some("19309")
        );
        assert_eq!(manga_id_from_href("/category/action"), None);
        assert_eq!(
            chapter_id_from_href("/manga/19309/12/all-pages").as_deref(),
            Some("12")
        );
        assert_eq!(
            chapter_id_from_href("https://readm.org/manga/19309/12.5/").as_deref(),
            Some("12.5")
        );
        assert_eq!(
            category_id_from_href("/category/slice-of-life/watch/2").as_deref(),
            Some("slice-of-life")
        );
    }

    #[test]
    fn test_split_alt_titles() {
        assert_eq!(
            split_alt_titles("ワンピース, One Piece; OP"),
            vec!["ワンピース", "One Piece", "OP"]
        );
        assert!(split_alt_titles("   ").is_empty());
    }

    #[test]
    fn test_is_mature() {
        let tags = vec![Tag {
            id: "ecchi".into(),
            label: "Ecchi".into(),
        }];
        assert!(is_mature(&tags));
        assert!(!is_mature(&[]));
    }
}
