//! Row-oriented table predictor.
//!
//! The workhorse for period tables: every data row (or, transposed, every
//! data column) is one candidate record, and each schema column claims the
//! first cell in the record whose feature key matches one of its trained
//! features.

use fintab_core::{ElementResult, PredictorResult, RawElement};
use fintab_table::{concat_sticky_tables, ParsedTable, Region};

use crate::config::{ParseBy, RuleConfig};
use crate::extract;
use crate::feature::{
    candidate_features, feature_key, header_filters_pass, schema_columns, ModelData,
};
use crate::{AnswerGroup, Predictor};

/// Extracts one record per data row (or column) of a table.
#[derive(Debug, Clone)]
pub struct RowTablePredictor {
    rule: RuleConfig,
    model: ModelData,
}

impl RowTablePredictor {
    /// A predictor over one rule and its trained model.
    #[must_use]
    pub fn new(rule: RuleConfig, model: ModelData) -> Self {
        Self { rule, model }
    }

    fn predict_table(&self, table: &ParsedTable, groups: &mut Vec<AnswerGroup>) {
        let columns = schema_columns(&self.rule, &self.model);
        for region in &table.regions {
            match self.rule.parse_by {
                ParseBy::Row => {
                    for r in table.data_row_indices(region) {
                        if self.row_is_filtered(table, r) {
                            continue;
                        }
                        let cells: Vec<(usize, usize)> =
                            (0..table.width()).map(|c| (r, c)).collect();
                        if !self.emit_record(table, region, &columns, &cells, groups) {
                            return;
                        }
                    }
                }
                ParseBy::Col => {
                    for c in region.col_header_idx..table.width() {
                        let cells: Vec<(usize, usize)> = region
                            .rows()
                            .filter(|r| !region.is_header_row(*r))
                            .map(|r| (r, c))
                            .collect();
                        if !self.emit_record(table, region, &columns, &cells, groups) {
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Matches every schema column against one candidate record. Returns
    /// false when the caller should stop (single-record rule satisfied).
    fn emit_record(
        &self,
        table: &ParsedTable,
        region: &Region,
        columns: &[String],
        cells: &[(usize, usize)],
        groups: &mut Vec<AnswerGroup>,
    ) -> bool {
        let serial_split = self.serial_column(table, region);
        let mut group = AnswerGroup::new();
        for column in columns {
            let features = candidate_features(&self.rule, &self.model, column);
            if features.is_empty() {
                continue;
            }
            'cells: for &(r, c) in cells {
                if serial_split == Some(c) {
                    continue;
                }
                let Some(cell) = table.cell(r, c) else {
                    continue;
                };
                if cell.dummy || cell.is_empty() {
                    continue;
                }
                if !header_filters_pass(table, r, c, &self.rule) {
                    continue;
                }
                let key = feature_key(table, r, c, &self.rule);
                if self.rule.is_blacklisted(column, &key) {
                    continue;
                }
                for feature in &features {
                    if crate::feature::feature_matches(feature, &key) {
                        if let Some(er) = self.answer_for(table, region, r, c) {
                            group
                                .entry(column.clone())
                                .or_default()
                                .push(PredictorResult::from_element_result(column.clone(), er));
                            break 'cells;
                        }
                    }
                }
            }
        }
        if group.is_empty() {
            return true;
        }
        groups.push(group);
        self.rule.multi
    }

    /// Answer extraction for one matched cell, honoring the redirect knobs.
    fn answer_for(
        &self,
        table: &ParsedTable,
        region: &Region,
        r: usize,
        c: usize,
    ) -> Option<ElementResult> {
        if let Some(pattern) = &self.rule.from_title {
            let first_is_header = table.cell(r, 0).is_some_and(|cell| cell.is_header);
            if !first_is_header {
                let title = table.title.as_ref()?;
                return extract::text_result_match(pattern, title);
            }
        }
        if let Some(pattern) = &self.rule.from_header {
            for header in table.headers(r, c) {
                if let Some(caps) = pattern.search_captures(&header.text) {
                    let m = caps.group("dst").unwrap_or(&caps.whole);
                    return Some(extract::cell_match_result(table, header, m));
                }
            }
            return None;
        }
        if let Some(pattern) = &self.rule.from_above_row {
            for ar in (region.start..r).rev() {
                for ac in 0..table.width() {
                    let Some(above) = table.cell(ar, ac) else {
                        continue;
                    };
                    if above.dummy {
                        continue;
                    }
                    if let Some(caps) = pattern.search_captures(&above.text) {
                        let m = caps.group("dst").unwrap_or(&caps.whole);
                        return Some(extract::cell_match_result(table, above, m));
                    }
                }
            }
            return None;
        }
        let cell = table.cell(r, c)?;
        extract::cell_answer(&self.rule, table, cell)
    }

    /// A row is skipped when it is a horizontal-merge summary (every cell
    /// collapses to one text) or any cell hits a neglect pattern.
    fn row_is_filtered(&self, table: &ParsedTable, r: usize) -> bool {
        let texts: Vec<&str> = table.rows[r]
            .iter()
            .filter(|c| !c.dummy && !c.is_empty())
            .map(|c| c.text.trim())
            .collect();
        if texts.is_empty() {
            return true;
        }
        let mut distinct = texts.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if table.width() > 1 && texts.len() > 1 && distinct.len() == 1 {
            return true;
        }
        self.rule
            .neglect_patterns
            .as_ref()
            .is_some_and(|p| texts.iter().any(|t| p.is_match(t)))
    }

    /// The serial-number column of a region, when filtering is on.
    fn serial_column(&self, table: &ParsedTable, region: &Region) -> Option<usize> {
        if !self.rule.filter_serial_number {
            return None;
        }
        let first_header = *region.header_rows.first()?;
        let cell = table.cell(first_header, 0)?;
        (cell.text.trim() == "序号").then_some(0)
    }
}

impl Predictor for RowTablePredictor {
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
            self.predict_table(&table, &mut groups);
            if !self.rule.multi_elements && groups.len() > before {
                break;
            }
            if !self.rule.multi && !groups.is_empty() {
                break;
            }
        }
        groups
    }
}
