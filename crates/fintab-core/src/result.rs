//! Typed extraction results with character provenance.
//!
//! Every answer the predictors emit points back at the exact source
//! characters it was read from, so a verification pass can re-locate the
//! answer in the original document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::element::{BoundingBox, DocChar};

/// Provenance-carrying slice of one source element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementResult {
    /// A whole paragraph element.
    Paragraph {
        /// Document position of the source element.
        element_index: usize,
        /// Full paragraph text.
        text: String,
        /// Per-character provenance.
        chars: Vec<DocChar>,
    },
    /// A character slice of a paragraph element.
    Chars {
        /// Document position of the source element.
        element_index: usize,
        /// Start offset into the element's char sequence.
        start: usize,
        /// One past the last char offset.
        end: usize,
        /// Sliced text.
        text: String,
        /// Per-character provenance for the slice.
        chars: Vec<DocChar>,
    },
    /// One or more full cells of a table element.
    TableCells {
        /// Document position of the source element.
        element_index: usize,
        /// `(row, col)` anchor coordinates of the cells, in emission order.
        cells: Vec<(usize, usize)>,
        /// Concatenated cell text.
        text: String,
        /// Per-character provenance across the cells.
        chars: Vec<DocChar>,
    },
    /// A character slice inside one table cell.
    CellChars {
        /// Document position of the source element.
        element_index: usize,
        /// Anchor row of the cell.
        row: usize,
        /// Anchor column of the cell.
        col: usize,
        /// Start offset into the cell's char sequence.
        start: usize,
        /// One past the last char offset.
        end: usize,
        /// Sliced text.
        text: String,
        /// Per-character provenance for the slice.
        chars: Vec<DocChar>,
    },
    /// A page bounding box covering several elements.
    Outline {
        /// Zero-based page number.
        page: usize,
        /// Covering rectangle.
        bbox: BoundingBox,
    },
}

impl ElementResult {
    /// Extracted text, or the empty string for outline results.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Paragraph { text, .. }
            | Self::Chars { text, .. }
            | Self::TableCells { text, .. }
            | Self::CellChars { text, .. } => text,
            Self::Outline { .. } => "",
        }
    }

    /// Character provenance, empty for outline results.
    #[must_use]
    pub fn chars(&self) -> &[DocChar] {
        match self {
            Self::Paragraph { chars, .. }
            | Self::Chars { chars, .. }
            | Self::TableCells { chars, .. }
            | Self::CellChars { chars, .. } => chars,
            Self::Outline { .. } => &[],
        }
    }

    /// Document position of the source element, if the variant has one.
    #[must_use]
    pub fn element_index(&self) -> Option<usize> {
        match self {
            Self::Paragraph { element_index, .. }
            | Self::Chars { element_index, .. }
            | Self::TableCells { element_index, .. }
            | Self::CellChars { element_index, .. } => Some(*element_index),
            Self::Outline { .. } => None,
        }
    }
}

/// One typed answer for one schema column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorResult {
    /// Schema-key path of the answered column.
    pub schema_path: String,
    /// Extracted answer text.
    pub text: String,
    /// Character provenance for `text` (slice copies, owned by the result).
    pub chars: Vec<DocChar>,
    /// Ordered source slices backing the answer.
    pub element_results: Vec<ElementResult>,
}

impl PredictorResult {
    /// Builds a result from one provenance slice, inheriting its text and
    /// chars.
    #[must_use]
    pub fn from_element_result(schema_path: impl Into<String>, er: ElementResult) -> Self {
        Self {
            schema_path: schema_path.into(),
            text: er.text().to_string(),
            chars: er.chars().to_vec(),
            element_results: vec![er],
        }
    }
}

/// One record: answers per schema column, deterministically ordered.
pub type AnswerGroup = BTreeMap<String, Vec<PredictorResult>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_result_accessors() {
        let er = ElementResult::CellChars {
            element_index: 4,
            row: 1,
            col: 2,
            start: 0,
            end: 3,
            text: "100".to_string(),
            chars: Vec::new(),
        };
        assert_eq!(er.text(), "100");
        assert_eq!(er.element_index(), Some(4));

        let outline = ElementResult::Outline {
            page: 0,
            bbox: BoundingBox::default(),
        };
        assert_eq!(outline.text(), "");
        assert_eq!(outline.element_index(), None);
    }

    #[test]
    fn predictor_result_inherits_provenance() {
        let er = ElementResult::TableCells {
            element_index: 9,
            cells: vec![(0, 1)],
            text: "XYZ".to_string(),
            chars: vec![DocChar {
                text: "X".to_string(),
                ..DocChar::default()
            }],
        };
        let pr = PredictorResult::from_element_result("公司名称", er);
        assert_eq!(pr.text, "XYZ");
        assert_eq!(pr.chars.len(), 1);
        assert_eq!(pr.element_results.len(), 1);
    }

    #[test]
    fn result_serializes_with_kind_tag() {
        let er = ElementResult::Outline {
            page: 2,
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
        };
        let json = serde_json::to_value(&er).unwrap();
        assert_eq!(json["kind"], "outline");
        assert_eq!(json["page"], 2);
    }
}
