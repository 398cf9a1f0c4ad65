//! Tunable constants of the table parser.
//!
//! The grammar fragments here are defaults for Chinese financial documents;
//! every one of them is plain data a caller can replace. The algorithms in
//! [`crate::parsed`] never hard-code a domain regex.

use chrono::Datelike;
use fintab_patterns::Pattern;

/// Lower bound of the accepted four-digit year window.
pub const YEAR_WINDOW_MIN: i32 = 1990;

/// Slack added to the current year for the window's upper bound.
pub const YEAR_WINDOW_SLACK: i32 = 4;

/// Minimum share of data-looking cells for a row to be tagged dataline.
pub const DATALINE_RATIO: f64 = 0.5;

/// Configuration of one [`crate::ParsedTable`] parse.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// When true (default) the table width is the maximum row width;
    /// otherwise the first row's width is used.
    pub width_from_all_rows: bool,
    /// Share of data-looking cells that makes a row a dataline.
    pub dataline_ratio: f64,
    /// Inclusive lower bound for recognized years.
    pub year_min: i32,
    /// Inclusive upper bound for recognized years.
    pub year_max: i32,
    /// Cell texts that look like data values (not labels).
    pub data_patterns: Pattern,
    /// Unit grammar applied to header and data cell text; must expose a
    /// `unit` named group.
    pub unit_patterns: Pattern,
    /// Whitelisted unit grammar for subtitle rows; must expose a `unit`
    /// named group.
    pub subtitle_unit_patterns: Pattern,
    /// Maximum char count for an above-paragraph title candidate.
    pub title_max_chars: usize,
    /// How many paragraphs above the table are scanned for title/unit.
    pub above_paragraph_window: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        let current_year = chrono::Local::now().year();
        Self {
            width_from_all_rows: true,
            dataline_ratio: DATALINE_RATIO,
            year_min: YEAR_WINDOW_MIN,
            year_max: current_year + YEAR_WINDOW_SLACK,
            data_patterns: default_data_patterns(),
            unit_patterns: default_unit_patterns(),
            subtitle_unit_patterns: default_subtitle_unit_patterns(),
            title_max_chars: 40,
            above_paragraph_window: 3,
        }
    }
}

/// Cell texts treated as data values during row tagging.
///
/// Covers bare integers with an optional percent, signed thousands-grouped
/// numbers, the horizontal bar placeholder, and bound phrases
/// (不低于/不高于 + number).
#[must_use]
pub fn default_data_patterns() -> Pattern {
    Pattern::collection([
        r"^\d+%?$",
        r"^[+-]?\d{1,3}(?:,\d{3})*(?:\.\d+)?%?$",
        r"^[—–\-]+$",
        r"^(?:不低于|不高于)\s*[\d,.]+\s*[%万亿元股份]*$",
    ])
    .expect("valid data patterns")
}

/// Unit grammar for header and data cells.
#[must_use]
pub fn default_unit_patterns() -> Pattern {
    Pattern::collection([
        r"(?:单位|币种)[:：]?\s*(?P<unit>人民币[万亿]?元|[万亿]?元|%|万股|股|万份|份)",
        r"[(（](?P<unit>人民币[万亿]?元|[万亿]?元|%|万股|股|万份|份)[)）]",
    ])
    .expect("valid unit patterns")
}

/// Whitelisted unit grammar for subtitle rows.
///
/// Subtitles carry narrative text; only an explicit 单位 marker counts.
#[must_use]
pub fn default_subtitle_unit_patterns() -> Pattern {
    Pattern::collection([r"单位[:：]\s*(?P<unit>人民币[万亿]?元|[万亿]?元|%|万股|股|万份|份)"])
        .expect("valid subtitle unit patterns")
}
