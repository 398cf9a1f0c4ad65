//! Rule configuration.
//!
//! Rule tables arrive as JSON mappings. Deserialization is permissive —
//! unknown keys are collected and ignored with a DEBUG log — but every
//! regex-valued knob is compiled eagerly, so a broken pattern fails the
//! whole load with [`FintabError::BadPattern`] instead of surfacing as a
//! silent non-match at predict time.

use std::collections::BTreeMap;

use fintab_core::Result;
use fintab_patterns::Pattern;
use fintab_table::ParseOptions;
use log::debug;
use serde::Deserialize;
use serde_json::Value;

/// Which cells contribute a target cell's feature key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFrom {
    /// The cell's column and row headers.
    #[default]
    Header,
    /// The cell's own text.
    #[serde(rename = "self")]
    SelfText,
    /// Non-empty cells left of the target, in the same row.
    LeftCells,
    /// Non-empty cells right of the target, in the same row.
    RightCells,
}

/// Iteration axis for row-shaped predictors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseBy {
    /// One record per data row.
    #[default]
    Row,
    /// One record per data column.
    Col,
}

/// Pairing direction for key-value tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KvDirection {
    /// Keys pair with the cell to their right.
    LeftAndRight,
    /// Keys pair with the cell below them.
    UpAndDown,
}

/// One or more regex sources, as rule tables write them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PatternSpec {
    /// A single pattern string.
    One(String),
    /// An ordered pattern list; first match wins.
    Many(Vec<String>),
}

impl PatternSpec {
    /// Compiles the sources into a collection pattern.
    ///
    /// # Errors
    ///
    /// [`fintab_core::FintabError::BadPattern`] when any source does not
    /// compile.
    pub fn compile(&self) -> Result<Pattern> {
        match self {
            Self::One(source) => Pattern::collection([source.as_str()]),
            Self::Many(sources) => Pattern::collection(sources.iter().map(String::as_str)),
        }
    }
}

/// A declared tuple dimension, uncompiled.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDimension {
    /// Schema column the dimension answers.
    pub column: String,
    /// Header text that carries the dimension value.
    pub pattern: PatternSpec,
    /// When true (default), a candidate without this dimension is dropped.
    #[serde(default = "default_true")]
    pub required: bool,
}

/// A compiled tuple dimension.
#[derive(Debug, Clone)]
pub struct Dimension {
    /// Schema column the dimension answers.
    pub column: String,
    /// Header text that carries the dimension value.
    pub pattern: Pattern,
    /// When true, a candidate without this dimension is dropped.
    pub required: bool,
}

impl RawDimension {
    fn compile(&self) -> Result<Dimension> {
        Ok(Dimension {
            column: self.column.clone(),
            pattern: self.pattern.compile()?,
            required: self.required,
        })
    }
}

fn default_true() -> bool {
    true
}

/// One rule mapping as written in a rule table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRule {
    pub name: String,
    pub multi: bool,
    pub multi_elements: bool,
    pub parse_by: ParseBy,
    pub feature_from: FeatureFrom,
    #[serde(default = "default_true")]
    pub distinguish_year: bool,
    pub include_subtitle: bool,
    pub multi_answer_in_one_cell: bool,
    #[serde(default = "default_true")]
    pub width_from_all_rows: bool,
    #[serde(default = "default_true")]
    pub filter_serial_number: bool,
    pub cell_regs: Option<PatternSpec>,
    pub neglect_patterns: Option<PatternSpec>,
    pub header_regs: Option<PatternSpec>,
    pub neglect_header_regs: Option<PatternSpec>,
    pub ignore_header_regs: Option<PatternSpec>,
    pub from_title: Option<PatternSpec>,
    pub from_header: Option<PatternSpec>,
    pub from_above_row: Option<PatternSpec>,
    pub feature_white_list: BTreeMap<String, Vec<String>>,
    pub feature_black_list: BTreeMap<String, Vec<String>>,
    pub kv_directions: Vec<KvDirection>,
    pub dimensions: Vec<RawDimension>,
    pub find_dimension_from_title: Option<RawDimension>,
    /// Keys this engine does not recognize; kept so loads stay permissive.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A fully compiled rule.
#[derive(Debug, Clone, Default)]
pub struct RuleConfig {
    /// Rule name; doubles as the value column for tuple tables.
    pub name: String,
    /// Allow multiple records per table.
    pub multi: bool,
    /// Accept candidates from more than one element.
    pub multi_elements: bool,
    /// Iteration axis.
    pub parse_by: ParseBy,
    /// Which cells contribute the matching feature.
    pub feature_from: FeatureFrom,
    /// When false, normalized year tokens collapse to `DATE` before
    /// feature comparison.
    pub distinguish_year: bool,
    /// Prefix feature keys with the nearest subtitle text.
    pub include_subtitle: bool,
    /// Pull every `cell_regs` match out of a matched value cell.
    pub multi_answer_in_one_cell: bool,
    /// Table width is the maximum row width (vs. the first row's).
    pub width_from_all_rows: bool,
    /// Skip the serial-number column when matching.
    pub filter_serial_number: bool,
    /// Extract the answer via this pattern's `dst` group.
    pub cell_regs: Option<Pattern>,
    /// Rows containing a match are skipped.
    pub neglect_patterns: Option<Pattern>,
    /// At least one header of a candidate cell must match.
    pub header_regs: Option<Pattern>,
    /// No header of a candidate cell may match.
    pub neglect_header_regs: Option<Pattern>,
    /// Headers matching this are left out of the feature key.
    pub ignore_header_regs: Option<Pattern>,
    /// Pull the answer from the table's title paragraph.
    pub from_title: Option<Pattern>,
    /// Pull the answer from the matched cell's headers.
    pub from_header: Option<Pattern>,
    /// Pull the answer from a row above the matched row.
    pub from_above_row: Option<Pattern>,
    /// Per-column feature keys that always match.
    pub feature_white_list: BTreeMap<String, Vec<String>>,
    /// Per-column feature keys that never match.
    pub feature_black_list: BTreeMap<String, Vec<String>>,
    /// Pairing directions for key-value tables.
    pub kv_directions: Vec<KvDirection>,
    /// Declared tuple dimensions.
    pub dimensions: Vec<Dimension>,
    /// Fallback dimension pulled from the table title.
    pub find_dimension_from_title: Option<Dimension>,
}

impl RuleConfig {
    /// Compiles a raw rule.
    ///
    /// # Errors
    ///
    /// [`fintab_core::FintabError::BadPattern`] when any regex-valued knob
    /// does not compile.
    pub fn from_raw(raw: RawRule) -> Result<Self> {
        if !raw.extra.is_empty() {
            let keys: Vec<&str> = raw.extra.keys().map(String::as_str).collect();
            debug!("rule {:?}: ignoring unknown keys {keys:?}", raw.name);
        }
        let compile_opt = |spec: &Option<PatternSpec>| -> Result<Option<Pattern>> {
            spec.as_ref().map(PatternSpec::compile).transpose()
        };
        Ok(Self {
            name: raw.name.clone(),
            multi: raw.multi,
            multi_elements: raw.multi_elements,
            parse_by: raw.parse_by,
            feature_from: raw.feature_from,
            distinguish_year: raw.distinguish_year,
            include_subtitle: raw.include_subtitle,
            multi_answer_in_one_cell: raw.multi_answer_in_one_cell,
            width_from_all_rows: raw.width_from_all_rows,
            filter_serial_number: raw.filter_serial_number,
            cell_regs: compile_opt(&raw.cell_regs)?,
            neglect_patterns: compile_opt(&raw.neglect_patterns)?,
            header_regs: compile_opt(&raw.header_regs)?,
            neglect_header_regs: compile_opt(&raw.neglect_header_regs)?,
            ignore_header_regs: compile_opt(&raw.ignore_header_regs)?,
            from_title: compile_opt(&raw.from_title)?,
            from_header: compile_opt(&raw.from_header)?,
            from_above_row: compile_opt(&raw.from_above_row)?,
            feature_white_list: raw.feature_white_list,
            feature_black_list: raw.feature_black_list,
            kv_directions: raw.kv_directions,
            dimensions: raw
                .dimensions
                .iter()
                .map(RawDimension::compile)
                .collect::<Result<Vec<_>>>()?,
            find_dimension_from_title: raw
                .find_dimension_from_title
                .as_ref()
                .map(RawDimension::compile)
                .transpose()?,
        })
    }

    /// Parses and compiles one rule from JSON.
    ///
    /// # Errors
    ///
    /// [`fintab_core::FintabError::Json`] for malformed JSON,
    /// [`fintab_core::FintabError::BadPattern`] for an uncompilable knob.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawRule = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Like [`RuleConfig::from_json`], for an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// Same as [`RuleConfig::from_json`].
    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawRule = serde_json::from_value(value)?;
        Self::from_raw(raw)
    }

    /// A bare rule with the given name and serde defaults everywhere else.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            distinguish_year: true,
            width_from_all_rows: true,
            filter_serial_number: true,
            ..Self::default()
        }
    }

    /// Table-parse options implied by this rule.
    #[must_use]
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            width_from_all_rows: self.width_from_all_rows,
            ..ParseOptions::default()
        }
    }

    /// True when `key` is vetoed for `column`.
    #[must_use]
    pub fn is_blacklisted(&self, column: &str, key: &str) -> bool {
        self.feature_black_list
            .get(column)
            .is_some_and(|veto| veto.iter().any(|f| f == key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fintab_core::FintabError;

    #[test]
    fn rule_loads_with_unknown_keys_ignored() {
        let rule = RuleConfig::from_json(
            r#"{
                "name": "公司名称",
                "multi": true,
                "feature_from": "header",
                "feature_white_list": {"公司名称": ["股票简称"]},
                "some_future_knob": 42
            }"#,
        )
        .unwrap();
        assert_eq!(rule.name, "公司名称");
        assert!(rule.multi);
        assert!(rule.distinguish_year, "distinguish_year defaults to true");
        assert_eq!(
            rule.feature_white_list["公司名称"],
            vec!["股票简称".to_string()]
        );
    }

    #[test]
    fn broken_pattern_is_fatal_at_load() {
        let err = RuleConfig::from_json(r#"{"name": "x", "cell_regs": "(unclosed"}"#).unwrap_err();
        assert!(matches!(err, FintabError::BadPattern { .. }), "{err}");
    }

    #[test]
    fn dimensions_compile() {
        let rule = RuleConfig::from_json(
            r#"{
                "name": "值",
                "dimensions": [
                    {"column": "年份", "pattern": "(?:19|20|21)\\d{2}"},
                    {"column": "项目", "pattern": "资产|负债", "required": false}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(rule.dimensions.len(), 2);
        assert!(rule.dimensions[0].required);
        assert!(!rule.dimensions[1].required);
        assert!(rule.dimensions[0].pattern.is_match("2023"));
    }

    #[test]
    fn kv_directions_deserialize() {
        let rule = RuleConfig::from_json(
            r#"{"name": "x", "kv_directions": ["left_and_right", "up_and_down"]}"#,
        )
        .unwrap();
        assert_eq!(
            rule.kv_directions,
            vec![KvDirection::LeftAndRight, KvDirection::UpAndDown]
        );
    }
}
