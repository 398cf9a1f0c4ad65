//! Raw-grid adapter.
//!
//! Normalizes a TABLE element's sparse `cells` mapping into a dense,
//! column-sorted grid where `rows[r][c]` is defined for every slot of the
//! rectangle: one non-dummy anchor per merged span at its top-left, a dummy
//! everywhere else. Also detects and concatenates sticky tables (one
//! logical table split across a page boundary).
//!
//! Every step here is total: malformed entries are logged at DEBUG and
//! skipped, never raised.

use fintab_core::{grid_key, parse_grid_key, RawCell, RawElement};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

/// Dense grid of raw cells with merge metadata resolved.
#[derive(Debug, Clone)]
pub struct Grid {
    /// `rows[r][c]` is the cell occupying `(r, c)` (anchor or dummy).
    pub rows: Vec<Vec<RawCell>>,
}

impl Grid {
    /// Lifts a TABLE element's sparse cell map into a dense grid, sized to
    /// the widest row.
    ///
    /// Returns `None` for non-tables and tables without a single usable
    /// cell.
    #[must_use]
    pub fn from_element(element: &RawElement) -> Option<Self> {
        Self::from_element_with_width(element, true)
    }

    /// Like [`Grid::from_element`]; when `width_from_all_rows` is false the
    /// grid is sized to the first row's width instead, and cells past that
    /// width are skipped.
    #[must_use]
    pub fn from_element_with_width(element: &RawElement, width_from_all_rows: bool) -> Option<Self> {
        if !element.is_table() {
            return None;
        }
        let mut anchors: Vec<RawCell> = Vec::new();
        for (key, cell) in &element.cells {
            let Some((row, col)) = parse_grid_key(key) else {
                debug!("skipping cell with malformed grid key {key:?}");
                continue;
            };
            if cell.dummy {
                continue;
            }
            let mut cell = cell.clone();
            cell.row = row;
            cell.col = col;
            // Engines that only fill row/col leave the span rect empty.
            if cell.bottom <= cell.top {
                cell.top = row;
                cell.bottom = row + 1;
            }
            if cell.right <= cell.left {
                cell.left = col;
                cell.right = col + 1;
            }
            anchors.push(cell);
        }
        // Merge groups widen anchors that did not carry their own span.
        for group in &element.merged {
            apply_merge_group(&mut anchors, group);
        }
        // A slot covered by another anchor's span loses its own cell; some
        // engines emit an empty placeholder there instead of a dummy flag.
        let spans: Vec<(usize, usize, usize, usize)> = anchors
            .iter()
            .filter(|c| c.is_merged())
            .map(|c| (c.top, c.left, c.bottom, c.right))
            .collect();
        anchors.retain(|cell| {
            let covered = spans.iter().any(|&(top, left, bottom, right)| {
                (top, left) != (cell.row, cell.col)
                    && (top..bottom).contains(&cell.row)
                    && (left..right).contains(&cell.col)
            });
            if covered {
                debug!(
                    "dropping placeholder cell ({}, {}) covered by a merge",
                    cell.row, cell.col
                );
            }
            !covered
        });

        let height = anchors.iter().map(|c| c.bottom).max()?;
        let width = if width_from_all_rows {
            anchors.iter().map(|c| c.right).max()?
        } else {
            // First-row width; rows without a top-row cell fall back to the
            // widest row so a headerless fragment still parses.
            anchors
                .iter()
                .filter(|c| c.top == 0)
                .map(|c| c.right)
                .max()
                .or_else(|| anchors.iter().map(|c| c.right).max())?
        };
        if height == 0 || width == 0 {
            return None;
        }

        let mut slots: Vec<Vec<Option<RawCell>>> = vec![vec![None; width]; height];
        for anchor in anchors {
            if anchor.bottom > height || anchor.right > width {
                debug!(
                    "skipping cell ({}, {}) outside the table rectangle",
                    anchor.row, anchor.col
                );
                continue;
            }
            for r in anchor.top..anchor.bottom {
                for c in anchor.left..anchor.right {
                    let is_anchor = r == anchor.top && c == anchor.left;
                    let mut cell = anchor.clone();
                    cell.row = r;
                    cell.col = c;
                    cell.dummy = !is_anchor;
                    match &slots[r][c] {
                        // First anchor claiming a slot wins; overlapping
                        // merges are malformed input.
                        Some(existing) if !existing.dummy || cell.dummy => {
                            if is_anchor {
                                debug!("overlapping merge at ({r}, {c}), keeping first");
                            }
                        }
                        _ => slots[r][c] = Some(cell),
                    }
                }
            }
        }

        let rows = slots
            .into_iter()
            .enumerate()
            .map(|(r, row)| {
                row.into_iter()
                    .enumerate()
                    .map(|(c, slot)| {
                        slot.unwrap_or_else(|| RawCell {
                            row: r,
                            col: c,
                            top: r,
                            bottom: r + 1,
                            left: c,
                            right: c + 1,
                            page: element.page,
                            ..RawCell::default()
                        })
                    })
                    .collect()
            })
            .collect();
        Some(Self { rows })
    }

    /// Row count.
    #[must_use]
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Column count (uniform after dummy fill).
    #[must_use]
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }
}

fn apply_merge_group(anchors: &mut [RawCell], group: &[(usize, usize)]) {
    let Some(&(top, left)) = group.iter().min() else {
        return;
    };
    let Some(bottom) = group.iter().map(|&(r, _)| r + 1).max() else {
        return;
    };
    let Some(right) = group.iter().map(|&(_, c)| c + 1).max() else {
        return;
    };
    if let Some(anchor) = anchors
        .iter_mut()
        .find(|c| c.row == top && c.col == left && !c.dummy)
    {
        anchor.top = anchor.top.min(top);
        anchor.left = anchor.left.min(left);
        anchor.bottom = anchor.bottom.max(bottom);
        anchor.right = anchor.right.max(right);
    } else {
        debug!("merge group without anchor at ({top}, {left})");
    }
}

static TBL_POSITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"tbl\[(\d+)\]").expect("valid tbl position regex"));

fn tbl_position(element: &RawElement) -> Option<u64> {
    let xpath = &element.docx_meta.as_ref()?.xpath;
    let caps = TBL_POSITION.captures_iter(xpath).last()?;
    caps.get(1)?.as_str().parse().ok()
}

fn column_count(element: &RawElement) -> usize {
    element
        .cells
        .values()
        .map(|c| c.right.max(c.col + 1))
        .max()
        .unwrap_or(0)
}

/// True when `a` and `b` are two halves of one logical table.
///
/// Requires the same column count, page indices differing by at most one,
/// and adjacent `tbl[i]` / `tbl[i+1]` positions in the DOCX xpaths.
#[must_use]
pub fn is_sticky_pair(a: &RawElement, b: &RawElement) -> bool {
    if !a.is_table() || !b.is_table() {
        return false;
    }
    if column_count(a) == 0 || column_count(a) != column_count(b) {
        return false;
    }
    if b.page < a.page || b.page - a.page > 1 {
        return false;
    }
    match (tbl_position(a), tbl_position(b)) {
        (Some(i), Some(j)) => j == i + 1,
        _ => false,
    }
}

/// Concatenates the tail sticky table under the head, re-basing the tail's
/// row indices above the head's last row.
#[must_use]
pub fn concat_sticky(head: &RawElement, tail: &RawElement) -> RawElement {
    let head_rows = head
        .cells
        .values()
        .map(|c| c.bottom.max(c.row + 1))
        .max()
        .unwrap_or(0);
    let mut merged = head.clone();
    for (key, cell) in &tail.cells {
        let Some((row, col)) = parse_grid_key(key) else {
            debug!("skipping sticky-tail cell with malformed key {key:?}");
            continue;
        };
        let mut cell = cell.clone();
        cell.row = row + head_rows;
        cell.top += head_rows;
        cell.bottom += head_rows;
        merged
            .cells
            .insert(grid_key(cell.row, col), cell);
    }
    for group in &tail.merged {
        merged.merged.push(
            group
                .iter()
                .map(|&(r, c)| (r + head_rows, c))
                .collect(),
        );
    }
    merged.outline = head.outline.union(&tail.outline);
    // Keep the tail's position metadata so a three-way split keeps chaining.
    merged.docx_meta = tail.docx_meta.clone();
    merged
}

/// Collapses every consecutive sticky run in `elements` into one logical
/// table, leaving all other elements untouched. Order is preserved.
#[must_use]
pub fn concat_sticky_tables(elements: &[RawElement]) -> Vec<RawElement> {
    let mut out: Vec<RawElement> = Vec::with_capacity(elements.len());
    let mut previous_original: Option<&RawElement> = None;
    for element in elements {
        let sticky = match (previous_original, out.last()) {
            (Some(prev), Some(_)) => is_sticky_pair(prev, element),
            _ => false,
        };
        if sticky {
            let head = out.pop().unwrap_or_else(|| element.clone());
            out.push(concat_sticky(&head, element));
        } else {
            out.push(element.clone());
        }
        previous_original = Some(element);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fintab_core::ElementClass;
    use std::collections::BTreeMap;

    fn table_with_cells(index: usize, page: usize, cells: &[(usize, usize, &str)]) -> RawElement {
        let mut map = BTreeMap::new();
        for &(r, c, text) in cells {
            map.insert(
                grid_key(r, c),
                RawCell {
                    text: text.to_string(),
                    row: r,
                    col: c,
                    top: r,
                    bottom: r + 1,
                    left: c,
                    right: c + 1,
                    page,
                    ..RawCell::default()
                },
            );
        }
        RawElement {
            class: ElementClass::Table,
            index,
            page,
            outline: fintab_core::BoundingBox::default(),
            text: None,
            chars: Vec::new(),
            title: None,
            cells: map,
            merged: Vec::new(),
            syllabus: None,
            docx_meta: None,
        }
    }

    #[test]
    fn dummy_fill_covers_merged_span() {
        let mut el = table_with_cells(0, 0, &[(0, 0, "2023"), (0, 1, "收入"), (1, 1, "成本")]);
        // 2023 spans rows 0..2 in column 0.
        el.cells.get_mut("0_0").unwrap().bottom = 2;
        let grid = Grid::from_element(&el).unwrap();
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.width(), 2);
        let dummy = &grid.rows[1][0];
        assert!(dummy.dummy);
        assert_eq!(dummy.anchor(), (0, 0));
        assert_eq!(dummy.text, "2023");
        assert!(!grid.rows[0][0].dummy);
    }

    #[test]
    fn merge_groups_extend_anchors() {
        let mut el = table_with_cells(0, 0, &[(0, 0, "标题"), (1, 0, "a"), (1, 1, "b")]);
        el.merged.push(vec![(0, 0), (0, 1)]);
        let grid = Grid::from_element(&el).unwrap();
        assert_eq!(grid.rows[0][0].right, 2);
        assert!(grid.rows[0][1].dummy);
        assert_eq!(grid.rows[0][1].text, "标题");
    }

    #[test]
    fn missing_slots_become_empty_cells() {
        let el = table_with_cells(0, 0, &[(0, 0, "a"), (1, 1, "b")]);
        let grid = Grid::from_element(&el).unwrap();
        assert_eq!(grid.rows[0][1].text, "");
        assert!(!grid.rows[0][1].dummy);
    }

    #[test]
    fn first_row_width_bounds_the_grid() {
        let el = table_with_cells(
            0,
            0,
            &[(0, 0, "项目"), (0, 1, "金额"), (1, 0, "资产"), (1, 1, "100"), (1, 2, "备注")],
        );
        let widest = Grid::from_element(&el).unwrap();
        assert_eq!(widest.width(), 3);
        let first_row = Grid::from_element_with_width(&el, false).unwrap();
        assert_eq!(first_row.width(), 2);
        assert_eq!(first_row.rows[1][1].text, "100");
        assert_eq!(first_row.rows.len(), 2);
    }

    #[test]
    fn non_table_is_rejected() {
        let mut el = table_with_cells(0, 0, &[(0, 0, "a")]);
        el.class = ElementClass::Paragraph;
        assert!(Grid::from_element(&el).is_none());
    }

    fn sticky_pair() -> (RawElement, RawElement) {
        let mut a = table_with_cells(10, 3, &[(0, 0, "年度"), (0, 1, "收入"), (1, 0, "2022"), (1, 1, "1,000")]);
        a.docx_meta = Some(fintab_core::DocxMeta {
            xpath: "/w:body/w:tbl[5]".to_string(),
        });
        let mut b = table_with_cells(11, 4, &[(0, 0, "2021"), (0, 1, "800")]);
        b.docx_meta = Some(fintab_core::DocxMeta {
            xpath: "/w:body/w:tbl[6]".to_string(),
        });
        (a, b)
    }

    #[test]
    fn sticky_detection_requires_all_conditions() {
        let (a, b) = sticky_pair();
        assert!(is_sticky_pair(&a, &b));

        let mut far_page = b.clone();
        far_page.page = 6;
        assert!(!is_sticky_pair(&a, &far_page));

        let mut wrong_pos = b.clone();
        wrong_pos.docx_meta = Some(fintab_core::DocxMeta {
            xpath: "/w:body/w:tbl[9]".to_string(),
        });
        assert!(!is_sticky_pair(&a, &wrong_pos));

        let mut wrong_width = b.clone();
        wrong_width.cells.remove("0_1");
        assert!(!is_sticky_pair(&a, &wrong_width));
    }

    #[test]
    fn sticky_concat_rebases_tail_rows() {
        let (a, b) = sticky_pair();
        let merged = concat_sticky_tables(&[a, b]);
        assert_eq!(merged.len(), 1);
        let grid = Grid::from_element(&merged[0]).unwrap();
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.rows[2][0].text, "2021");
        assert_eq!(grid.rows[2][1].text, "800");
    }
}
