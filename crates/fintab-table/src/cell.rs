//! Logical table cells and regions.

use fintab_core::{BoundingBox, DocChar};
use serde::Serialize;

/// Classification of one table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowTag {
    /// Column-header row.
    Header,
    /// Full-width label row naming the rows beneath it.
    Subtitle,
    /// Data row.
    Dataline,
}

/// One logical slot of a parsed table.
///
/// Back-references are plain indices into the owning [`crate::ParsedTable`]
/// (`region`, `merge_to`); header lists are materialized lazily by the
/// table, so the object graph stays a DAG.
#[derive(Debug, Clone, Serialize)]
pub struct TableCell {
    /// Row of this slot.
    pub rowidx: usize,
    /// Column of this slot.
    pub colidx: usize,
    /// Canonical cell text (the anchor's text for dummies).
    pub text: String,
    /// Date-normalized text used for feature keys.
    pub normalized_text: String,
    /// Resolved unit, after inheritance.
    pub unit: Option<String>,
    /// True when this slot is covered by another cell's merge.
    pub dummy: bool,
    /// Anchor coordinates for dummies.
    pub merge_to: Option<(usize, usize)>,
    /// First grid row of the span.
    pub top: usize,
    /// One past the last grid row of the span.
    pub bottom: usize,
    /// First grid column of the span.
    pub left: usize,
    /// One past the last grid column of the span.
    pub right: usize,
    /// True for row or column headers.
    pub is_header: bool,
    /// True when the cell sits left of the region's header-column split.
    pub is_row_header: bool,
    /// True when the cell sits in a header row.
    pub is_col_header: bool,
    /// Text of the nearest subtitle row above, within the region.
    pub subtitle: Option<String>,
    /// Index of the owning region.
    pub region: usize,
    /// Zero-based page number.
    pub page: usize,
    /// Pixel rectangle, when known.
    pub bbox: Option<BoundingBox>,
    /// Per-character provenance.
    #[serde(skip)]
    pub chars: Vec<DocChar>,
}

impl TableCell {
    /// Number of grid columns the span covers.
    #[must_use]
    pub fn span_width(&self) -> usize {
        self.right.saturating_sub(self.left).max(1)
    }

    /// Number of grid rows the span covers.
    #[must_use]
    pub fn span_height(&self) -> usize {
        self.bottom.saturating_sub(self.top).max(1)
    }

    /// True when the cell has no visible text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Maximal contiguous row range with a uniform column schema.
#[derive(Debug, Clone, Serialize)]
pub struct Region {
    /// Index of this region within the table.
    pub index: usize,
    /// First row (inclusive).
    pub start: usize,
    /// One past the last row.
    pub end: usize,
    /// Header rows, in row order.
    pub header_rows: Vec<usize>,
    /// Columns `< col_header_idx` are row headers.
    pub col_header_idx: usize,
}

impl Region {
    /// Rows of the region, in order.
    pub fn rows(&self) -> impl Iterator<Item = usize> {
        self.start..self.end
    }

    /// True when `row` belongs to the region.
    #[must_use]
    pub fn contains_row(&self, row: usize) -> bool {
        (self.start..self.end).contains(&row)
    }

    /// True when `row` is one of the region's header rows.
    #[must_use]
    pub fn is_header_row(&self, row: usize) -> bool {
        self.header_rows.contains(&row)
    }
}
