//! Feature keys and trained feature statistics.
//!
//! A cell's feature key is the canonical string both sides of the system
//! speak: training counts the keys of gold-labeled cells, prediction
//! matches candidate cells against those counts. Keys are built from
//! date-normalized header texts so the same table layout produces the
//! same key across document cohorts.

use std::collections::BTreeMap;

use fintab_table::{ParsedTable, TableCell};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{FeatureFrom, RuleConfig};

/// Separator between header texts inside a feature key.
pub const FEATURE_SEP: &str = "|";

/// Token that year tokens collapse to when years are not distinguished.
pub const DATE_TOKEN: &str = "DATE";

/// Marker that flags the sub-parts of a composite regex feature.
pub const REGEX_FEATURE_MARK: &str = "__regex__";

static YEAR_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"largest_year_minus_\d+(?:年度?|年末|年底)?").expect("valid year token regex")
});

/// Rewrites every normalized year token in `key` to [`DATE_TOKEN`].
#[must_use]
pub fn collapse_date_tokens(key: &str) -> String {
    YEAR_TOKEN.replace_all(key, DATE_TOKEN).into_owned()
}

/// Tests a trained feature against a candidate key.
///
/// A literal feature matches when the key contains it, so a feature
/// trained as `收入` still claims the key `收入(万元)|DATE`. A composite
/// feature (`__regex__RE__regex__RE2`) matches when every sub-regex finds
/// a match in the key, each strictly after the previous match's end. A
/// sub-part that fails to compile never matches and logs at DEBUG; model
/// data is not validated at load time the way rule tables are.
#[must_use]
pub fn feature_matches(feature: &str, key: &str) -> bool {
    if !feature.contains(REGEX_FEATURE_MARK) {
        return !feature.is_empty() && key.contains(feature);
    }
    let mut pos = 0usize;
    for part in feature.split(REGEX_FEATURE_MARK).filter(|p| !p.is_empty()) {
        let Ok(regex) = fintab_patterns::cache::compile(part, "") else {
            debug!("uncompilable feature sub-part {part:?}");
            return false;
        };
        match regex.find(&key[pos..]) {
            Some(m) => pos += m.end(),
            None => return false,
        }
    }
    true
}

/// Builds the feature key of `(row, col)` under `rule`.
///
/// Header texts come in column-header-then-row-header order, joined with
/// [`FEATURE_SEP`]; a subtitle prefix and the `DATE` collapse are applied
/// per the rule's knobs. Headers matching `ignore_header_regs` are left
/// out.
#[must_use]
pub fn feature_key(table: &ParsedTable, row: usize, col: usize, rule: &RuleConfig) -> String {
    let mut parts: Vec<String> = Vec::new();
    if rule.include_subtitle {
        if let Some(subtitle) = table.cell(row, col).and_then(|c| c.subtitle.clone()) {
            parts.push(subtitle);
        }
    }
    match rule.feature_from {
        FeatureFrom::Header => {
            for header in table.headers(row, col) {
                if rule
                    .ignore_header_regs
                    .as_ref()
                    .is_some_and(|p| p.is_match(&header.text))
                {
                    continue;
                }
                parts.push(header.normalized_text.trim().to_string());
            }
        }
        FeatureFrom::SelfText => {
            if let Some(cell) = table.anchor_cell(row, col) {
                parts.push(cell.normalized_text.trim().to_string());
            }
        }
        FeatureFrom::LeftCells => {
            parts.extend(side_cell_texts(table, row, 0..col));
        }
        FeatureFrom::RightCells => {
            parts.extend(side_cell_texts(table, row, col + 1..table.width()));
        }
    }
    let key = parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(FEATURE_SEP);
    if rule.distinguish_year {
        key
    } else {
        collapse_date_tokens(&key)
    }
}

fn side_cell_texts(
    table: &ParsedTable,
    row: usize,
    cols: std::ops::Range<usize>,
) -> Vec<String> {
    let mut seen: Vec<(usize, usize)> = Vec::new();
    let mut out = Vec::new();
    for c in cols {
        let Some(anchor) = table.anchor_cell(row, c) else {
            continue;
        };
        let coords = (anchor.rowidx, anchor.colidx);
        if anchor.is_empty() || seen.contains(&coords) {
            continue;
        }
        seen.push(coords);
        out.push(anchor.normalized_text.trim().to_string());
    }
    out
}

/// True when a candidate cell passes the rule's header filters.
#[must_use]
pub fn header_filters_pass(
    table: &ParsedTable,
    row: usize,
    col: usize,
    rule: &RuleConfig,
) -> bool {
    if rule.header_regs.is_none() && rule.neglect_header_regs.is_none() {
        return true;
    }
    let headers: Vec<&TableCell> = table.headers(row, col);
    if let Some(required) = &rule.header_regs {
        if !headers.iter().any(|h| required.is_match(&h.text)) {
            return false;
        }
    }
    if let Some(vetoed) = &rule.neglect_header_regs {
        if headers.iter().any(|h| vetoed.is_match(&h.text)) {
            return false;
        }
    }
    true
}

/// Insertion-ordered feature counter with stable `most_common` semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureCounter {
    entries: Vec<(String, u64)>,
}

impl FeatureCounter {
    /// Counts `key` once.
    pub fn add(&mut self, key: &str) {
        self.add_n(key, 1);
    }

    /// Counts `key` `n` times.
    pub fn add_n(&mut self, key: &str, n: u64) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, count)) => *count += n,
            None => self.entries.push((key.to_string(), n)),
        }
    }

    /// The count of `key`.
    #[must_use]
    pub fn count(&self, key: &str) -> u64 {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map_or(0, |(_, count)| *count)
    }

    /// Removes `key` entirely.
    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    /// Entries ordered by descending count; ties keep insertion order.
    #[must_use]
    pub fn most_common(&self) -> Vec<(&str, u64)> {
        let mut ordered: Vec<(&str, u64)> = self
            .entries
            .iter()
            .map(|(k, count)| (k.as_str(), *count))
            .collect();
        ordered.sort_by(|a, b| b.1.cmp(&a.1));
        ordered
    }

    /// True when nothing was counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Folds another counter into this one.
    pub fn merge(&mut self, other: &Self) {
        for (key, count) in &other.entries {
            self.add_n(key, *count);
        }
    }
}

/// Trained feature counters per schema column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelData {
    /// Counter per schema column.
    pub columns: BTreeMap<String, FeatureCounter>,
}

impl ModelData {
    /// The counter trained for `column`.
    #[must_use]
    pub fn column(&self, column: &str) -> Option<&FeatureCounter> {
        self.columns.get(column)
    }

    /// The counter for `column`, created on first use.
    pub fn column_mut(&mut self, column: &str) -> &mut FeatureCounter {
        self.columns.entry(column.to_string()).or_default()
    }
}

/// Every schema column the rule and model speak about, deterministically
/// ordered.
#[must_use]
pub fn schema_columns(rule: &RuleConfig, model: &ModelData) -> Vec<String> {
    let mut columns: Vec<String> = model.columns.keys().cloned().collect();
    for column in rule.feature_white_list.keys() {
        if !columns.contains(column) {
            columns.push(column.clone());
        }
    }
    columns
}

/// The feature keys that may match for `column`: the whitelist first, then
/// trained features by descending frequency, minus the blacklist.
///
/// An empty return means the column has no usable features; callers yield
/// zero answers for it.
#[must_use]
pub fn candidate_features(rule: &RuleConfig, model: &ModelData, column: &str) -> Vec<String> {
    let mut features: Vec<String> = rule
        .feature_white_list
        .get(column)
        .cloned()
        .unwrap_or_default();
    if let Some(counter) = model.column(column) {
        for (feature, _) in counter.most_common() {
            if rule.is_blacklisted(column, feature) {
                continue;
            }
            if !features.iter().any(|f| f == feature) {
                features.push(feature.to_string());
            }
        }
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_tokens_collapse() {
        assert_eq!(collapse_date_tokens("largest_year_minus_0|资产"), "DATE|资产");
        assert_eq!(
            collapse_date_tokens("largest_year_minus_1年度|收入"),
            "DATE|收入"
        );
        assert_eq!(collapse_date_tokens("项目"), "项目");
    }

    #[test]
    fn literal_features_match_by_containment() {
        assert!(feature_matches("股票简称", "股票简称"));
        assert!(feature_matches("收入", "收入(万元)|DATE"));
        assert!(!feature_matches("股票简称", "股票代码"));
        assert!(!feature_matches("", "anything"), "empty features never match");
    }

    #[test]
    fn composite_regex_features_match_in_order() {
        let feature = "__regex__DATE__regex__资产";
        assert!(feature_matches(feature, "DATE|资产"));
        assert!(
            !feature_matches(feature, "资产|DATE"),
            "sub-parts must match left-to-right"
        );
        assert!(!feature_matches(feature, "DATE|负债"));
    }

    #[test]
    fn uncompilable_feature_never_matches() {
        assert!(!feature_matches("__regex__(unclosed", "anything"));
    }

    #[test]
    fn counter_most_common_is_stable() {
        let mut counter = FeatureCounter::default();
        counter.add("a");
        counter.add("b");
        counter.add("b");
        counter.add("c");
        let ordered = counter.most_common();
        assert_eq!(ordered[0], ("b", 2));
        // a and c tie at 1; insertion order decides.
        assert_eq!(ordered[1], ("a", 1));
        assert_eq!(ordered[2], ("c", 1));
    }

    #[test]
    fn candidate_features_put_whitelist_first_and_honor_blacklist() {
        let mut rule = RuleConfig::named("值");
        rule.feature_white_list
            .insert("值".to_string(), vec!["白名单".to_string()]);
        rule.feature_black_list
            .insert("值".to_string(), vec!["坏特征".to_string()]);
        let mut model = ModelData::default();
        model.column_mut("值").add_n("坏特征", 9);
        model.column_mut("值").add_n("好特征", 1);
        assert_eq!(
            candidate_features(&rule, &model, "值"),
            vec!["白名单".to_string(), "好特征".to_string()]
        );
    }
}
