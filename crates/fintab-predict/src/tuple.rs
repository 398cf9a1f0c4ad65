//! Tuple-table predictor.
//!
//! For tables whose meaning is `(row-header, col-header) → value`: every
//! data cell is a candidate tuple, keyed by the concatenation of all its
//! headers. Declared dimensions ("年份", "项目", …) are answered from the
//! matched cell's headers, so one cell yields one fully-dimensioned
//! record.

use fintab_core::{PredictorResult, RawElement};
use fintab_table::{concat_sticky_tables, year, ParsedTable, TableCell};

use crate::config::{Dimension, RuleConfig};
use crate::extract;
use crate::feature::{
    candidate_features, feature_key, feature_matches, header_filters_pass, ModelData,
};
use crate::{AnswerGroup, Predictor};

/// Extracts `(dimensions…, value)` records from cross tables.
#[derive(Debug, Clone)]
pub struct TupleTablePredictor {
    rule: RuleConfig,
    model: ModelData,
}

impl TupleTablePredictor {
    /// A predictor over one rule and its trained model.
    #[must_use]
    pub fn new(rule: RuleConfig, model: ModelData) -> Self {
        Self { rule, model }
    }

    fn predict_table(&self, table: &ParsedTable, groups: &mut Vec<AnswerGroup>) -> bool {
        let features = candidate_features(&self.rule, &self.model, &self.rule.name);
        if features.is_empty() {
            return true;
        }
        let options = self.rule.parse_options();
        for region in &table.regions {
            for r in table.data_row_indices(region) {
                for c in region.col_header_idx..table.width() {
                    let Some(cell) = table.cell(r, c) else {
                        continue;
                    };
                    if cell.dummy || cell.is_empty() {
                        continue;
                    }
                    let headers = table.headers(r, c);
                    // A tuple needs two axes of context; single-headered
                    // cells belong to the row/col predictors.
                    let non_data = headers
                        .iter()
                        .filter(|h| {
                            let text = h.text.trim();
                            !options.data_patterns.is_match(text)
                                || year::is_pure_year(text, options.year_min, options.year_max)
                        })
                        .count();
                    if non_data < 2 {
                        continue;
                    }
                    if !header_filters_pass(table, r, c, &self.rule) {
                        continue;
                    }
                    let key = feature_key(table, r, c, &self.rule);
                    if self.rule.is_blacklisted(&self.rule.name, &key) {
                        continue;
                    }
                    if !features.iter().any(|f| feature_matches(f, &key)) {
                        continue;
                    }
                    let Some(group) = self.build_record(table, cell, &headers) else {
                        continue;
                    };
                    groups.push(group);
                    if !self.rule.multi {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// One record per matched cell: the value plus every satisfied
    /// dimension. Returns `None` when a required dimension is missing.
    fn build_record(
        &self,
        table: &ParsedTable,
        cell: &TableCell,
        headers: &[&TableCell],
    ) -> Option<AnswerGroup> {
        let mut group = AnswerGroup::new();
        for dim in &self.rule.dimensions {
            match self.dimension_answer(table, headers, dim) {
                Some(result) => {
                    group.insert(
                        dim.column.clone(),
                        vec![PredictorResult::from_element_result(dim.column.clone(), result)],
                    );
                }
                None if dim.required => return None,
                None => {}
            }
        }
        let value = extract::cell_answer(&self.rule, table, cell)?;
        group.insert(
            self.rule.name.clone(),
            vec![PredictorResult::from_element_result(self.rule.name.clone(), value)],
        );
        Some(group)
    }

    fn dimension_answer(
        &self,
        table: &ParsedTable,
        headers: &[&TableCell],
        dim: &Dimension,
    ) -> Option<fintab_core::ElementResult> {
        for header in headers {
            if let Some(m) = dim.pattern.search(&header.text) {
                return Some(extract::cell_match_result(table, header, &m));
            }
        }
        // Title fallback, when configured for this dimension.
        let fallback = self.rule.find_dimension_from_title.as_ref()?;
        if fallback.column != dim.column {
            return None;
        }
        let title = table.title.as_ref()?;
        extract::text_result_match(&fallback.pattern, title)
    }
}

impl Predictor for TupleTablePredictor {
    fn predict_schema_answer(&self, elements: &[RawElement]) -> Vec<AnswerGroup> {
        let options = self.rule.parse_options();
        let mut groups = Vec::new();
        for element in concat_sticky_tables(elements) {
            if !element.is_table() {
                continue;
            }
            let Some(table) = ParsedTable::parse_with_context(&element, elements, &options)
            else {
                continue;
            };
            let before = groups.len();
            if !self.predict_table(&table, &mut groups) {
                break;
            }
            if !self.rule.multi_elements && groups.len() > before {
                break;
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::table_element;

    fn year_item_rule() -> RuleConfig {
        RuleConfig::from_json(
            r#"{
                "name": "值",
                "multi": true,
                "distinguish_year": false,
                "dimensions": [
                    {"column": "年份", "pattern": "(?:19|20|21)\\d{2}"},
                    {"column": "项目", "pattern": "资产|负债"}
                ]
            }"#,
        )
        .unwrap()
    }

    fn asset_model() -> ModelData {
        let mut model = ModelData::default();
        model.column_mut("值").add("DATE|资产");
        model
    }

    #[test]
    fn year_normalized_feature_matches_and_dimensions_fill() {
        let predictor = TupleTablePredictor::new(year_item_rule(), asset_model());
        let elements = vec![table_element(
            0,
            &[
                &["", "2023", "2022"],
                &["资产", "100", "90"],
                &["负债", "40", "35"],
            ],
        )];
        let groups = predictor.predict_schema_answer(&elements);
        assert_eq!(groups.len(), 2, "only the 资产 row matches the feature");
        assert_eq!(groups[0]["年份"][0].text, "2023");
        assert_eq!(groups[0]["项目"][0].text, "资产");
        assert_eq!(groups[0]["值"][0].text, "100");
        assert_eq!(groups[1]["年份"][0].text, "2022");
        assert_eq!(groups[1]["值"][0].text, "90");
    }

    #[test]
    fn missing_required_dimension_drops_the_candidate() {
        let mut rule = year_item_rule();
        rule.dimensions[0].pattern =
            fintab_patterns::Pattern::collection([r"永远不会匹配的维度"]).unwrap();
        let predictor = TupleTablePredictor::new(rule, asset_model());
        let elements = vec![table_element(
            0,
            &[&["", "2023", "2022"], &["资产", "100", "90"]],
        )];
        assert!(predictor.predict_schema_answer(&elements).is_empty());
    }

    #[test]
    fn single_headered_cells_are_demoted() {
        let mut model = ModelData::default();
        model.column_mut("值").add("毛利率");
        let mut rule = RuleConfig::named("值");
        rule.multi = true;
        let predictor = TupleTablePredictor::new(rule, model);
        // One non-data header per value cell; the row predictors own this.
        let elements = vec![table_element(
            0,
            &[&["收入(万元)", "毛利率"], &["1,000", "30%"]],
        )];
        assert!(predictor.predict_schema_answer(&elements).is_empty());
    }

    #[test]
    fn dimension_can_fall_back_to_the_title() {
        let rule = RuleConfig::from_json(
            r#"{
                "name": "值",
                "multi": true,
                "distinguish_year": false,
                "dimensions": [
                    {"column": "年份", "pattern": "(?:19|20|21)\\d{2}"},
                    {"column": "项目", "pattern": "资产|负债"}
                ],
                "find_dimension_from_title": {
                    "column": "年份",
                    "pattern": "(?P<dst>(?:19|20|21)\\d{2})"
                }
            }"#,
        )
        .unwrap();
        let mut model = ModelData::default();
        model.column_mut("值").add("期末|资产");
        let predictor = TupleTablePredictor::new(rule, model);
        let title_para = crate::testutil::paragraph_element(0, "2024年主要财务数据");
        let table = table_element(1, &[&["", "期末", "期初"], &["资产", "100", "90"]]);
        let groups = predictor.predict_schema_answer(&[title_para, table]);
        assert!(!groups.is_empty());
        assert_eq!(groups[0]["年份"][0].text, "2024");
    }
}
