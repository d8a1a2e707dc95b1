use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").unwrap());
static DMY_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})[./](\d{1,2})[./](\d{4})").unwrap());
static WORD_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})\s+([^\d\s.,]+)\.?,?\s+(\d{4})").unwrap());

const MONTH_PREFIXES: &[(&str, u32)] = &[
    ("jan", 1), ("yan", 1), ("feb", 2), ("fev", 2), ("mar", 3), ("apr", 4), ("may", 5),
    ("jun", 6), ("iyun", 6), ("jul", 7), ("iyul", 7), ("aug", 8), ("avq", 8),
    ("sep", 9), ("sen", 9), ("oct", 10), ("okt", 10), ("nov", 11), ("noy", 11),
    ("dec", 12), ("dek", 12),
];

/// Compiles a constant CSS selector.
pub fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {:?}: {:?}", css, e))
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

pub fn text_of(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Text of the first match under `el`, `None` when missing or blank.
pub fn select_text(el: ElementRef<'_>, selector: &Selector) -> Option<String> {
    el.select(selector).map(text_of).find(|t| !t.is_empty())
}

pub fn select_attr(el: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    el.select(selector)
        .find_map(|e| e.value().attr(attr))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn own_attr(el: ElementRef<'_>, attr: &str) -> Option<String> {
    el.value().attr(attr).map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Resolves `href` against `base`. Absolute links come back unchanged, so applying
/// this twice is the same as applying it once.
pub fn normalize_link(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    if Url::parse(href).is_ok() {
        return href.to_string();
    }
    match Url::parse(base).and_then(|b| b.join(href)) {
        Ok(joined) => joined.to_string(),
        Err(_) => href.to_string(),
    }
}

pub fn parse_deadline(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }

    let number = |s: &str| s.parse::<u32>().ok();
    let year = |s: &str| s.parse::<i32>().ok();

    if let Some(caps) = ISO_DATE.captures(raw) {
        if let Some(date) = NaiveDate::from_ymd_opt(year(&caps[1])?, number(&caps[2])?, number(&caps[3])?) {
            return Some(date);
        }
    }
    if let Some(caps) = DMY_DATE.captures(raw) {
        if let Some(date) = NaiveDate::from_ymd_opt(year(&caps[3])?, number(&caps[2])?, number(&caps[1])?) {
            return Some(date);
        }
    }
    if let Some(caps) = WORD_DATE.captures(raw) {
        // "İyun" lowercases with a combining dot
        let month_word = caps[2].to_lowercase().replace('\u{307}', "");
        let month = MONTH_PREFIXES.iter().find(|(prefix, _)| month_word.starts_with(prefix)).map(|(_, m)| *m)?;
        return NaiveDate::from_ymd_opt(year(&caps[3])?, month, number(&caps[1])?);
    }
    None
}

pub fn clean_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    // Decode common entities if it looks double-escaped
    let decoded = if html.contains("&lt;") || html.contains("&gt;") {
        html.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&nbsp;", " ")
            .replace("&amp;", "&")
    } else {
        html.to_string()
    };

    ammonia::clean(&decoded).trim().to_string()
}

/// Finds a heading whose text contains one of `labels` and returns the sanitized
/// markup of the element that follows it. Detail pages lay out
/// "Responsibilities" / "Requirements" blocks this way.
pub fn section_after_heading(doc: &Html, heading: &Selector, labels: &[&str]) -> Option<String> {
    doc.select(heading)
        .find(|h| {
            let text = text_of(*h).to_lowercase();
            labels.iter().any(|label| text.contains(label))
        })
        .and_then(|h| h.next_siblings().find_map(ElementRef::wrap))
        .map(|block| clean_html(&block.inner_html()))
        .filter(|html| !html.is_empty())
}
