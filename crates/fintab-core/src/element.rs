//! Layout-engine element model.
//!
//! The external layout engine converts a PDF into an ordered stream of
//! logical elements. Tables arrive as a sparse mapping from `"row_col"`
//! grid keys to [`RawCell`]s plus merge metadata; paragraphs arrive as text
//! with per-character boxes. This module mirrors that wire schema exactly
//! (serde round-trips it) and adds the small amount of geometry the table
//! engine needs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Classification of a layout element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementClass {
    /// Body text paragraph.
    Paragraph,
    /// Grid of cells.
    Table,
    /// Running page header (furniture).
    PageHeader,
    /// Running page footer (furniture).
    PageFooter,
    /// Raster or vector figure.
    Image,
}

/// Pixel-space rectangle `[x0, y0, x1, y1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    /// Left edge.
    pub x0: f32,
    /// Top edge.
    pub y0: f32,
    /// Right edge.
    pub x1: f32,
    /// Bottom edge.
    pub y1: f32,
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        Self {
            x0: v[0],
            y0: v[1],
            x1: v[2],
            y1: v[3],
        }
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

impl BoundingBox {
    /// Creates a bounding box from its four edges.
    #[must_use]
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Width of the rectangle.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Height of the rectangle.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Smallest rectangle covering both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// One source character with its exact page position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocChar {
    /// Character text (one scalar, but kept as `String` for ligatures).
    pub text: String,
    /// Character box on the page.
    #[serde(rename = "box", default)]
    pub bbox: BoundingBox,
    /// Zero-based page number.
    #[serde(default)]
    pub page: usize,
}

/// One slot of a raw table grid.
///
/// A merged span `(top..bottom, left..right)` is represented by exactly one
/// non-dummy *anchor* cell at `(top, left)`; every other covered slot is a
/// `dummy` carrying the anchor's grid rectangle, page and box. Only the
/// anchor's `text`/`chars` are canonical.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCell {
    /// Collapsed cell text.
    pub text: String,
    /// Per-character provenance.
    pub chars: Vec<DocChar>,
    /// Row of this slot.
    pub row: usize,
    /// Column of this slot.
    pub col: usize,
    /// First grid row of the (possibly merged) span.
    pub top: usize,
    /// One past the last grid row of the span.
    pub bottom: usize,
    /// First grid column of the span.
    pub left: usize,
    /// One past the last grid column of the span.
    pub right: usize,
    /// True when this slot is covered by another cell's merge.
    pub dummy: bool,
    /// Pixel rectangle, when the layout engine supplied one.
    #[serde(rename = "box")]
    pub bbox: Option<BoundingBox>,
    /// Zero-based page number.
    pub page: usize,
}

impl RawCell {
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

    /// True when the span covers more than one slot.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.span_width() > 1 || self.span_height() > 1
    }

    /// Grid coordinates of the span's anchor slot.
    #[must_use]
    pub const fn anchor(&self) -> (usize, usize) {
        (self.top, self.left)
    }
}

/// DOCX conversion metadata, used only for sticky-table detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocxMeta {
    /// XML path of the source node, e.g. `".../tbl[5]"`.
    #[serde(default)]
    pub xpath: String,
}

/// One logical layout block from the element stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawElement {
    /// Element classification.
    pub class: ElementClass,
    /// Strictly increasing position over the document.
    pub index: usize,
    /// Zero-based page number.
    #[serde(default)]
    pub page: usize,
    /// Page rectangle covering the element.
    #[serde(default)]
    pub outline: BoundingBox,
    /// Paragraph text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Character-exact paragraph provenance.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chars: Vec<DocChar>,
    /// Table caption recovered by the layout engine, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Sparse table grid keyed `"row_col"`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cells: BTreeMap<String, RawCell>,
    /// Merged slot groups, each a list of `[row, col]` coordinates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged: Vec<Vec<(usize, usize)>>,
    /// Back-link into the document's table of contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syllabus: Option<usize>,
    /// DOCX conversion metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docx_meta: Option<DocxMeta>,
}

impl RawElement {
    /// True for TABLE elements.
    #[must_use]
    pub fn is_table(&self) -> bool {
        self.class == ElementClass::Table
    }

    /// True for PARAGRAPH elements.
    #[must_use]
    pub fn is_paragraph(&self) -> bool {
        self.class == ElementClass::Paragraph
    }

    /// Looks up the raw cell at `(row, col)`, if the grid defines it.
    #[must_use]
    pub fn cell_at(&self, row: usize, col: usize) -> Option<&RawCell> {
        self.cells.get(&grid_key(row, col))
    }

    /// Paragraph text, or the empty string for non-paragraphs.
    #[must_use]
    pub fn paragraph_text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// Encodes `(row, col)` as the wire grid key `"row_col"`.
#[must_use]
pub fn grid_key(row: usize, col: usize) -> String {
    format!("{row}_{col}")
}

/// Decodes a wire grid key `"row_col"` back into `(row, col)`.
///
/// Returns `None` for keys that do not follow the scheme; callers treat
/// those as malformed-grid noise and skip them.
#[must_use]
pub fn parse_grid_key(key: &str) -> Option<(usize, usize)> {
    let (r, c) = key.split_once('_')?;
    Some((r.parse().ok()?, c.parse().ok()?))
}
