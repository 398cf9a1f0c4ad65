//! # Fintab Predict - Rule-Driven Table Extraction
//!
//! The extraction layer above [`fintab_table`]: declarative rules select
//! one of four shape-specific predictors, each of which walks the parsed
//! tables of a document's element stream and emits provenance-carrying
//! answer records.
//!
//! - [`RowTablePredictor`] — one record per data row (or column).
//! - [`KeyValueTablePredictor`] / [`KeyValueColumnPredictor`] — facts from
//!   adjacent key/value cell pairs.
//! - [`TupleTablePredictor`] — `(dimensions…, value)` records from cross
//!   tables.
//! - [`RecordExpander`] — from one known record, every structurally
//!   analogous sibling.
//!
//! Prediction is conservative: a document that matches nothing yields an
//! empty list, never an error. Only rule loading can fail, and only with
//! [`fintab_core::FintabError::BadPattern`].

pub mod config;
pub mod expand;
mod extract;
pub mod feature;
pub mod kv;
pub mod kv_column;
pub mod row;
pub mod train;
pub mod tuple;

use fintab_core::RawElement;

pub use config::{Dimension, FeatureFrom, KvDirection, ParseBy, PatternSpec, RawRule, RuleConfig};
pub use expand::{ExpandOptions, RecordExpander, RecordShape, TableShape};
pub use feature::{candidate_features, feature_key, FeatureCounter, ModelData};
pub use fintab_core::AnswerGroup;
pub use kv::KeyValueTablePredictor;
pub use kv_column::KeyValueColumnPredictor;
pub use row::RowTablePredictor;
pub use train::{extract_feature, train, TrainingAnswer, TrainingExample};
pub use tuple::TupleTablePredictor;

/// Uniform contract of the predictor primitives.
///
/// Each answer group is one record, mapping schema column names to the
/// results extracted for them; a single element may yield several records.
pub trait Predictor {
    /// Runs the predictor over an ordered document element stream.
    fn predict_schema_answer(&self, elements: &[RawElement]) -> Vec<AnswerGroup>;
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::BTreeMap;

    use fintab_core::{grid_key, BoundingBox, DocChar, ElementClass, RawCell, RawElement};

    /// A TABLE element from a dense grid of texts, one char per DocChar.
    pub(crate) fn table_element(index: usize, grid: &[&[&str]]) -> RawElement {
        let mut cells = BTreeMap::new();
        for (r, row) in grid.iter().enumerate() {
            for (c, text) in row.iter().enumerate() {
                cells.insert(
                    grid_key(r, c),
                    RawCell {
                        text: (*text).to_string(),
                        chars: doc_chars(text),
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

    /// A PARAGRAPH element with char-exact provenance.
    pub(crate) fn paragraph_element(index: usize, text: &str) -> RawElement {
        RawElement {
            class: ElementClass::Paragraph,
            index,
            page: 0,
            outline: BoundingBox::default(),
            text: Some(text.to_string()),
            chars: doc_chars(text),
            title: None,
            cells: BTreeMap::new(),
            merged: Vec::new(),
            syllabus: None,
            docx_meta: None,
        }
    }

    fn doc_chars(text: &str) -> Vec<DocChar> {
        text.chars()
            .map(|c| DocChar {
                text: c.to_string(),
                ..DocChar::default()
            })
            .collect()
    }
}
