//! Key-value table predictor.
//!
//! KV tables carry one fact per pair of adjacent cells ("股票简称 | XYZ").
//! The table is flattened into (key, value) cell pairs along the
//! configured directions, and each schema column claims the pairs whose
//! key text matches a trained feature.

use std::collections::BTreeMap;

use fintab_core::{grid_key, PredictorResult, RawCell, RawElement};
use fintab_table::{concat_sticky_tables, ParsedTable, TableCell};
use log::debug;

use crate::config::{KvDirection, RuleConfig};
use crate::extract;
use crate::feature::{candidate_features, collapse_date_tokens, schema_columns, ModelData};
use crate::{AnswerGroup, Predictor};

/// Cell texts that can never serve as a key.
const INVALID_KEY_TEXTS: [&str; 4] = ["序号", ":", "：", "指"];

/// Extracts facts from left/right (and optionally up/down) cell pairs.
#[derive(Debug, Clone)]
pub struct KeyValueTablePredictor {
    rule: RuleConfig,
    model: ModelData,
}

impl KeyValueTablePredictor {
    /// A predictor over one rule and its trained model.
    #[must_use]
    pub fn new(rule: RuleConfig, model: ModelData) -> Self {
        Self { rule, model }
    }
}

impl Predictor for KeyValueTablePredictor {
    fn predict_schema_answer(&self, elements: &[RawElement]) -> Vec<AnswerGroup> {
        predict_kv(
            &self.rule,
            &self.model,
            elements,
            &[KvDirection::LeftAndRight],
        )
    }
}

/// The shared KV engine; `default_directions` applies when the rule does
/// not configure any.
pub(crate) fn predict_kv(
    rule: &RuleConfig,
    model: &ModelData,
    elements: &[RawElement],
    default_directions: &[KvDirection],
) -> Vec<AnswerGroup> {
    let options = rule.parse_options();
    let directions: &[KvDirection] = if rule.kv_directions.is_empty() {
        default_directions
    } else {
        &rule.kv_directions
    };
    let columns_with_features: Vec<(String, Vec<String>)> = {
        let mut model_for_columns = Vec::new();
        for column in schema_columns(rule, model) {
            let features = candidate_features(rule, model, &column);
            if !features.is_empty() {
                model_for_columns.push((column, features));
            }
        }
        model_for_columns
    };
    if columns_with_features.is_empty() {
        return Vec::new();
    }

    let mut groups = Vec::new();
    for element in concat_sticky_tables(elements) {
        if !element.is_table() {
            continue;
        }
        let element = regroup_table_element(&element).unwrap_or(element);
        let Some(table) = ParsedTable::parse_with_context(&element, elements, &options) else {
            continue;
        };
        let pairs = collect_pairs(&table, directions);
        let mut group = AnswerGroup::new();
        for (column, features) in &columns_with_features {
            for (key_cell, value_cell) in &pairs {
                let mut key = key_cell.normalized_text.trim().to_string();
                if !rule.distinguish_year {
                    key = collapse_date_tokens(&key);
                }
                if rule.is_blacklisted(column, &key) {
                    continue;
                }
                if !features.iter().any(|f| crate::feature::feature_matches(f, &key)) {
                    continue;
                }
                let answers = extract::cell_answers(rule, &table, value_cell);
                if answers.is_empty() {
                    continue;
                }
                let slot = group.entry(column.clone()).or_default();
                for er in answers {
                    slot.push(PredictorResult::from_element_result(column.clone(), er));
                }
                if !rule.multi {
                    break;
                }
            }
        }
        if !group.is_empty() {
            groups.push(group);
            if !rule.multi_elements {
                break;
            }
        }
    }
    groups
}

/// Flattens the table into (key, value) anchor-cell pairs.
///
/// Dummies, empty cells and explicitly-invalid key texts are dropped
/// first; the survivors pair up consecutively along each direction.
pub(crate) fn collect_pairs<'t>(
    table: &'t ParsedTable,
    directions: &[KvDirection],
) -> Vec<(&'t TableCell, &'t TableCell)> {
    let mut pairs = Vec::new();
    for direction in directions {
        match direction {
            KvDirection::LeftAndRight => {
                for r in 0..table.height() {
                    let line: Vec<&TableCell> = (0..table.width())
                        .filter_map(|c| table.cell(r, c))
                        .filter(|c| pairable(c))
                        .collect();
                    pairs.extend(line.chunks_exact(2).map(|w| (w[0], w[1])));
                }
            }
            KvDirection::UpAndDown => {
                for c in 0..table.width() {
                    let line: Vec<&TableCell> = (0..table.height())
                        .filter_map(|r| table.cell(r, c))
                        .filter(|c| pairable(c))
                        .collect();
                    pairs.extend(line.chunks_exact(2).map(|w| (w[0], w[1])));
                }
            }
        }
    }
    pairs
}

fn pairable(cell: &TableCell) -> bool {
    !cell.dummy && !cell.is_empty() && !INVALID_KEY_TEXTS.contains(&cell.text.trim())
}

/// Splits a single-column table whose cells each carry exactly one colon
/// into two logical columns, so one-column narratives become KV.
///
/// Returns `None` when the table is not single-column or no cell splits.
pub(crate) fn regroup_table_element(element: &RawElement) -> Option<RawElement> {
    let cells: Vec<&RawCell> = element.cells.values().collect();
    if cells.is_empty() || cells.iter().any(|c| c.col != 0 || c.right > 1) {
        return None;
    }
    let mut regrouped = element.clone();
    regrouped.cells = BTreeMap::new();
    regrouped.merged = Vec::new();
    let mut split_any = false;
    for cell in cells {
        match split_once_at_colon(cell) {
            Some((key, value)) => {
                split_any = true;
                regrouped.cells.insert(grid_key(cell.row, 0), key);
                regrouped.cells.insert(grid_key(cell.row, 1), value);
            }
            None => {
                let mut kept = cell.clone();
                kept.right = 2;
                regrouped
                    .cells
                    .insert(grid_key(cell.row, 0), kept);
            }
        }
    }
    if !split_any {
        return None;
    }
    debug!("regrouped single-column table at element {}", element.index);
    Some(regrouped)
}

/// Splits one raw cell at its colon when the text has exactly one.
fn split_once_at_colon(cell: &RawCell) -> Option<(RawCell, RawCell)> {
    let colons: Vec<(usize, char)> = cell
        .text
        .char_indices()
        .filter(|(_, ch)| matches!(ch, ':' | '：'))
        .collect();
    let [(byte, colon)] = colons.as_slice() else {
        return None;
    };
    let key_text = cell.text[..*byte].trim().to_string();
    let value_text = cell.text[byte + colon.len_utf8()..].trim().to_string();
    if key_text.is_empty() || value_text.is_empty() {
        return None;
    }
    let key_chars = extract::char_index(&cell.text, *byte);
    let mut key = cell.clone();
    key.text = key_text;
    key.chars = cell.chars.get(..key_chars).map_or_else(Vec::new, <[_]>::to_vec);
    key.left = 0;
    key.right = 1;
    let mut value = cell.clone();
    value.text = value_text;
    value.chars = cell
        .chars
        .get(key_chars + 1..)
        .map_or_else(Vec::new, <[_]>::to_vec);
    value.col = 1;
    value.left = 1;
    value.right = 2;
    Some((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::table_element;
    use fintab_core::ElementResult;

    fn trained(rule: &str, pairs: &[(&str, &str)]) -> (RuleConfig, ModelData) {
        let mut model = ModelData::default();
        for (column, feature) in pairs {
            model.column_mut(column).add(feature);
        }
        (RuleConfig::named(rule), model)
    }

    #[test]
    fn four_column_row_pairs_twice() {
        let (rule, model) = trained("公司名称", &[("公司名称", "股票简称")]);
        let predictor = KeyValueTablePredictor::new(rule, model);
        let elements = vec![table_element(
            0,
            &[&["股票简称", "XYZ", "注册地址", "上海市"]],
        )];
        let groups = predictor.predict_schema_answer(&elements);
        assert_eq!(groups.len(), 1);
        let result = &groups[0]["公司名称"][0];
        assert_eq!(result.text, "XYZ");
        match &result.element_results[0] {
            ElementResult::TableCells { cells, .. } => assert_eq!(cells, &vec![(0, 1)]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_key_cells_are_dropped_before_pairing() {
        let (rule, model) = trained("公司名称", &[("公司名称", "股票简称")]);
        let predictor = KeyValueTablePredictor::new(rule, model);
        // The 序号 cell must not shift the pairing.
        let elements = vec![table_element(
            0,
            &[&["序号", "股票简称", "XYZ"]],
        )];
        let groups = predictor.predict_schema_answer(&elements);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["公司名称"][0].text, "XYZ");
    }

    #[test]
    fn single_column_colon_table_is_regrouped() {
        let (rule, model) = trained("公司名称", &[("公司名称", "股票简称")]);
        let predictor = KeyValueTablePredictor::new(rule, model);
        let elements = vec![table_element(
            0,
            &[&["股票简称：XYZ"], &["注册地址：上海市"]],
        )];
        let groups = predictor.predict_schema_answer(&elements);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["公司名称"][0].text, "XYZ");
    }

    #[test]
    fn up_and_down_direction_pairs_columns() {
        let (mut rule, model) = trained("公司名称", &[("公司名称", "股票简称")]);
        rule.kv_directions = vec![KvDirection::UpAndDown];
        let predictor = KeyValueTablePredictor::new(rule, model);
        let elements = vec![table_element(
            0,
            &[&["股票简称", "注册地址"], &["XYZ", "上海市"]],
        )];
        let groups = predictor.predict_schema_answer(&elements);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["公司名称"][0].text, "XYZ");
    }
}
