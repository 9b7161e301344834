//! Name normalisation and free-text helpers.
//!
//! Storefront URLs carry category and subcategory names in a loose form
//! (`pipes-and-fittings`, `Pipes & Fittings`, ...). These helpers turn such input
//! into the lowercase, space separated form stored in the database and produce
//! the alternative spellings tried during lookups.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Maximum length of generated SEO descriptions before the ellipsis
pub const META_DESCRIPTION_LIMIT: usize = 160;

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"))
}

fn non_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]|_").expect("valid non-word regex"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

/// Collapse runs of whitespace into one space and trim
pub fn collapse_whitespace(input: &str) -> String {
    whitespace_re().replace_all(input.trim(), " ").into_owned()
}

/// Stored form of a category name
pub fn category_name(input: &str) -> String {
    input.trim().to_lowercase()
}

/// Stored form of a subcategory name: lowercase, dashes become spaces
pub fn subcategory_name(input: &str) -> String {
    collapse_whitespace(&input.to_lowercase().replace('-', " "))
}

/// Lookup key derived from a URL segment (`Pumps-And-Valves` -> `pumps and valves`)
pub fn lookup_key(input: &str) -> String {
    subcategory_name(input)
}

/// Lookup key that also spells out ampersands
pub fn lookup_key_with_and(input: &str) -> String {
    collapse_whitespace(&input.to_lowercase().replace('-', " ").replace('&', " and "))
}

/// Spellings of a multi word name with different separators:
/// `a - b`, `a b` and `a-b`
pub fn dash_variants(input: &str) -> Vec<String> {
    let words: Vec<&str> = input
        .split(|c: char| c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect();

    if words.len() < 2 {
        return Vec::new();
    }

    let mut variants = Vec::new();
    for sep in [" - ", " ", "-"] {
        let candidate = words.join(sep);
        if !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// Alternative spellings swapping `and` and `&`
pub fn and_variants(input: &str) -> Vec<String> {
    let normalized = collapse_whitespace(&input.to_lowercase());
    let mut variants = Vec::new();

    let mut push = |candidate: String| {
        let candidate = collapse_whitespace(&candidate);
        if candidate != normalized && !candidate.is_empty() && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    };

    if normalized.contains(" and ") {
        push(normalized.replace(" and ", " & "));
    }
    if normalized.contains('&') {
        push(normalized.replace('&', " and "));
    }

    variants
}

/// Keep only ASCII letters, digits and single spaces
pub fn alphanumeric_only(input: &str) -> String {
    let kept: String = input
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_whitespace(&kept)
}

/// Remove HTML tags and `&nbsp;` entities
pub fn strip_html(input: &str) -> String {
    html_tag_re()
        .replace_all(input, " ")
        .replace("&nbsp;", " ")
}

/// Plain-text SEO description built from rich product text
pub fn meta_description(html: &str) -> String {
    let text = strip_html(html);
    let text = non_word_re().replace_all(&text, " ");
    let text = collapse_whitespace(&text);

    if text.chars().count() > META_DESCRIPTION_LIMIT {
        let truncated: String = text.chars().take(META_DESCRIPTION_LIMIT).collect();
        format!("{}...", truncated.trim_end())
    } else {
        text
    }
}

/// Storefront search input: lowercase, no markup, single spaces
pub fn clean_search_query(input: &str) -> String {
    collapse_whitespace(&strip_html(&input.to_lowercase()))
}

/// Escape `%`, `_` and `\` so user input matches literally inside `ILIKE`
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `%term%` pattern for `ILIKE`
pub fn contains_pattern(input: &str) -> String {
    format!("%{}%", escape_like(input))
}

/// Date label used by the dashboard charts, e.g. `Tue Mar 05 2024`
pub fn date_label(at: &DateTime<Utc>) -> String {
    at.format("%a %b %d %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_subcategory_name() {
        assert_eq!(subcategory_name("  Ball-Valves   Heavy "), "ball valves heavy");
        assert_eq!(category_name("  Pumps "), "pumps");
    }

    #[test]
    fn test_lookup_key_with_and() {
        assert_eq!(lookup_key_with_and("pipes-&-fittings"), "pipes and fittings");
        assert_eq!(lookup_key_with_and("Pipes&Fittings"), "pipes and fittings");
    }

    #[test]
    fn test_dash_variants() {
        assert_eq!(
            dash_variants("gate-valve"),
            vec!["gate - valve".to_string(), "gate valve".to_string(), "gate-valve".to_string()]
        );
        assert!(dash_variants("valve").is_empty());
    }

    #[test]
    fn test_and_variants() {
        assert_eq!(and_variants("pipes and fittings"), vec!["pipes & fittings".to_string()]);
        assert_eq!(and_variants("pipes & fittings"), vec!["pipes and fittings".to_string()]);
        assert!(and_variants("pipes").is_empty());
    }

    #[test]
    fn test_alphanumeric_only() {
        assert_eq!(alphanumeric_only("PVC (Schedule-40)!"), "pvc schedule 40");
    }

    #[test]
    fn test_meta_description_strips_markup() {
        assert_eq!(
            meta_description("<p>Heavy-duty <b>valve</b>&nbsp;for water_lines!</p>"),
            "Heavy duty valve for water lines"
        );
    }

    #[test]
    fn test_meta_description_truncates() {
        let long = "word ".repeat(60);
        let desc = meta_description(&long);
        assert!(desc.ends_with("..."));
        assert!(desc.chars().count() <= META_DESCRIPTION_LIMIT + 3);
    }

    #[test]
    fn test_clean_search_query() {
        assert_eq!(clean_search_query("<b>Ball</b>&nbsp; VALVE "), "ball valve");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_date_label() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap();
        assert_eq!(date_label(&at), "Tue Mar 05 2024");
    }
}
