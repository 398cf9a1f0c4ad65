//! Feature training over gold-labeled documents.
//!
//! Training never inspects the schema: a labeled answer is just a schema
//! column name plus the literal answer text, and the features it
//! contributes are the feature keys of every cell whose text equals that
//! answer. Aggregated counters become the model data the predictors
//! consult through [`candidate_features`](crate::feature::candidate_features).

use fintab_core::RawElement;
use fintab_table::{concat_sticky_tables, ParsedTable};

use crate::config::RuleConfig;
use crate::feature::{feature_key, ModelData};

/// One gold-labeled answer in a training document.
#[derive(Debug, Clone)]
pub struct TrainingAnswer {
    /// Schema column the answer belongs to.
    pub column: String,
    /// Literal answer text, exactly as it appears in a cell.
    pub text: String,
}

/// One training document: its element stream plus labeled answers.
#[derive(Debug, Clone, Default)]
pub struct TrainingExample {
    /// Ordered element stream of the document.
    pub elements: Vec<RawElement>,
    /// Gold answers for this document.
    pub answers: Vec<TrainingAnswer>,
}

/// Feature keys of every cell whose text equals `answer`, across all
/// tables of `elements`.
#[must_use]
pub fn extract_feature(rule: &RuleConfig, elements: &[RawElement], answer: &str) -> Vec<String> {
    let options = rule.parse_options();
    let answer = answer.trim();
    let mut keys = Vec::new();
    if answer.is_empty() {
        return keys;
    }
    for element in concat_sticky_tables(elements) {
        if !element.is_table() {
            continue;
        }
        let Some(table) = ParsedTable::parse_with_context(&element, elements, &options) else {
            continue;
        };
        for row in &table.rows {
            for cell in row {
                if cell.dummy || cell.is_header || cell.text.trim() != answer {
                    continue;
                }
                let key = feature_key(&table, cell.rowidx, cell.colidx, rule);
                if !key.is_empty() && !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
    }
    keys
}

/// Aggregates feature counters over a labeled dataset.
///
/// The configured whitelist is folded in (so whitelisted features survive
/// persistence) and blacklisted features are struck from every counter.
#[must_use]
pub fn train(rule: &RuleConfig, dataset: &[TrainingExample]) -> ModelData {
    let mut model = ModelData::default();
    for example in dataset {
        for answer in &example.answers {
            for key in extract_feature(rule, &example.elements, &answer.text) {
                model.column_mut(&answer.column).add(&key);
            }
        }
    }
    for (column, features) in &rule.feature_white_list {
        let counter = model.column_mut(column);
        for feature in features {
            if counter.count(feature) == 0 {
                counter.add(feature);
            }
        }
    }
    for (column, features) in &rule.feature_black_list {
        if let Some(counter) = model.columns.get_mut(column) {
            for feature in features {
                counter.remove(feature);
            }
        }
    }
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use fintab_core::{grid_key, BoundingBox, ElementClass, RawCell};
    use std::collections::BTreeMap;

    fn table_element(index: usize, grid: &[&[&str]]) -> RawElement {
        let mut cells = BTreeMap::new();
        for (r, row) in grid.iter().enumerate() {
            for (c, text) in row.iter().enumerate() {
                cells.insert(
                    grid_key(r, c),
                    RawCell {
                        text: (*text).to_string(),
                        row: r,
                        col: c,
                        top: r,
                        bottom: r + 1,
                        left: c,
                        right: c + 1,
                        ..RawCell::default()
                    },
                );
            }
        }
        RawElement {
            class: ElementClass::Table,
            index,
            page: 0,
            outline: BoundingBox::default(),
            text: None,
            chars: Vec::new(),
            title: None,
            cells,
            merged: Vec::new(),
            syllabus: None,
            docx_meta: None,
        }
    }

    #[test]
    fn gold_answer_contributes_its_header_features() {
        let rule = RuleConfig::named("收入");
        let elements = vec![table_element(
            0,
            &[
                &["年度", "收入(万元)", "毛利率"],
                &["2022", "1,000", "30%"],
            ],
        )];
        let keys = extract_feature(&rule, &elements, "1,000");
        // Column header first, then the year-normalized row header.
        assert_eq!(keys, vec!["收入(万元)|largest_year_minus_0".to_string()]);
    }

    #[test]
    fn train_counts_across_documents_and_applies_lists() {
        let mut rule = RuleConfig::named("收入");
        rule.feature_white_list
            .insert("收入".to_string(), vec!["营业收入".to_string()]);
        rule.feature_black_list.insert(
            "收入".to_string(),
            vec!["毛利率|largest_year_minus_0".to_string()],
        );
        let example = TrainingExample {
            elements: vec![table_element(
                0,
                &[
                    &["年度", "收入(万元)", "毛利率"],
                    &["2022", "1,000", "30%"],
                ],
            )],
            answers: vec![
                TrainingAnswer {
                    column: "收入".to_string(),
                    text: "1,000".to_string(),
                },
                TrainingAnswer {
                    column: "收入".to_string(),
                    text: "30%".to_string(),
                },
            ],
        };
        let model = train(&rule, &[example.clone(), example]);
        let counter = model.column("收入").unwrap();
        assert_eq!(counter.count("收入(万元)|largest_year_minus_0"), 2);
        assert_eq!(
            counter.count("毛利率|largest_year_minus_0"),
            0,
            "blacklisted feature is struck"
        );
        assert_eq!(counter.count("营业收入"), 1, "whitelist is folded in");
    }
}
