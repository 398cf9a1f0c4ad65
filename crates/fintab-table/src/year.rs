//! Year discovery and normalization.
//!
//! Cells across document cohorts mention the same relative period with
//! different absolute years ("2023年度" vs "2022年度"). Rewriting every
//! in-window year to `largest_year_minus_k` deduplicates feature keys
//! across cohorts. Chinese digit years (二〇二三) are arabicized first.

use once_cell::sync::Lazy;
use regex::Regex;

static YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:19|20|21)\d{2}").expect("valid year regex"));

/// Prefix of every normalized year token.
pub const YEAR_TOKEN_PREFIX: &str = "largest_year_minus_";

fn cn_digit(ch: char) -> Option<char> {
    match ch {
        '〇' | '○' | '零' | 'Ｏ' => Some('0'),
        '一' => Some('1'),
        '二' => Some('2'),
        '三' => Some('3'),
        '四' => Some('4'),
        '五' => Some('5'),
        '六' => Some('6'),
        '七' => Some('7'),
        '八' => Some('8'),
        '九' => Some('9'),
        _ => None,
    }
}

/// Rewrites runs of exactly four Chinese digits into Arabic digits.
///
/// Longer runs are left alone; they are amounts, not years.
#[must_use]
pub fn arabicize_years(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let run_len = chars[i..].iter().take_while(|&&c| cn_digit(c).is_some()).count();
        if run_len == 4 {
            for &c in &chars[i..i + 4] {
                // Run membership guarantees the digit exists.
                out.push(cn_digit(c).unwrap_or(c));
            }
            i += 4;
        } else {
            for &c in &chars[i..i + run_len.max(1)] {
                out.push(c);
            }
            i += run_len.max(1);
        }
    }
    out
}

static PURE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:19|20|21)\d{2}\s*(?:年度?)?$").expect("valid pure year regex"));

/// True when `text` is nothing but one in-window year (optionally suffixed
/// 年/年度). Such cells are period labels, not data values.
#[must_use]
pub fn is_pure_year(text: &str, min: i32, max: i32) -> bool {
    let text = arabicize_years(text.trim());
    PURE_YEAR.is_match(&text)
        && YEAR
            .find(&text)
            .and_then(|m| m.as_str().parse::<i32>().ok())
            .is_some_and(|y| (min..=max).contains(&y))
}

/// Largest four-digit year inside `[min, max]` found in `text`, if any.
#[must_use]
pub fn find_largest_year(text: &str, min: i32, max: i32) -> Option<i32> {
    YEAR.find_iter(&arabicize_years(text))
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .filter(|y| (min..=max).contains(y))
        .max()
}

/// Rewrites every in-window year in `text` to `largest_year_minus_k`.
///
/// Idempotent: normalized tokens contain no four-digit year, so a second
/// pass is the identity.
#[must_use]
pub fn normalize_years(text: &str, largest: i32, min: i32, max: i32) -> String {
    if largest == 0 {
        return text.to_string();
    }
    let text = arabicize_years(text);
    YEAR.replace_all(&text, |caps: &regex::Captures<'_>| {
        let year: i32 = caps[0].parse().unwrap_or(0);
        if (min..=max).contains(&year) && year <= largest {
            format!("{YEAR_TOKEN_PREFIX}{}", largest - year)
        } else {
            caps[0].to_string()
        }
    })
    .into_owned()
}
