//! The lifted table model.
//!
//! [`ParsedTable::parse`] turns a raw layout-engine grid into an
//! addressable, typed 2-D model: every row is tagged header / subtitle /
//! dataline, rows are partitioned into regions (each a self-contained
//! sub-table with its own header rows), years are normalized against the
//! table's largest year, and units are inherited down the header chain.
//!
//! The table is pure-functional after construction. Back-references are
//! plain indices and header lists are materialized lazily, so the object
//! graph is a DAG rooted here.

use std::collections::BTreeMap;

use fintab_core::{ElementResult, RawElement};
use log::debug;

use crate::cell::{Region, RowTag, TableCell};
use crate::grid::Grid;
use crate::options::ParseOptions;
use crate::year;

/// A typed 2-D table lifted from one TABLE element.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    /// Document position of the source element.
    pub element_index: usize,
    /// Page of the source element.
    pub page: usize,
    /// Logical cells; `rows[r][c]` is defined for the full rectangle.
    pub rows: Vec<Vec<TableCell>>,
    /// One tag per row.
    pub row_tags: Vec<RowTag>,
    /// Contiguous, non-overlapping regions covering all rows.
    pub regions: Vec<Region>,
    /// Title recovered from the element or an above-paragraph.
    pub title: Option<ElementResult>,
    /// Table-level unit, if discovered.
    pub unit: Option<String>,
    /// Multiset of distinct-cell counts per raw row.
    pub cols_counter: BTreeMap<usize, usize>,
    /// Largest in-window year found in any cell, or 0.
    pub largest_year: i32,
}

impl ParsedTable {
    /// Parses a TABLE element without surrounding context.
    #[must_use]
    pub fn parse(element: &RawElement, options: &ParseOptions) -> Option<Self> {
        Self::parse_with_context(element, &[], options)
    }

    /// Parses a TABLE element, recovering title and unit from the
    /// paragraphs above it.
    ///
    /// `context` is the (sub)stream of document elements; only PARAGRAPH
    /// elements with a smaller `index` on the same or previous page are
    /// consulted.
    #[must_use]
    pub fn parse_with_context(
        element: &RawElement,
        context: &[RawElement],
        options: &ParseOptions,
    ) -> Option<Self> {
        let grid = Grid::from_element_with_width(element, options.width_from_all_rows)?;
        let distinct = distinct_counts(&grid);
        let mut cols_counter = BTreeMap::new();
        for &count in &distinct {
            *cols_counter.entry(count).or_insert(0usize) += 1;
        }
        let dominant = dominant_width(&cols_counter);

        let row_tags = infer_row_tags(&grid, &distinct, dominant, options);
        let largest_year = grid
            .rows
            .iter()
            .flatten()
            .filter(|c| !c.dummy)
            .filter_map(|c| year::find_largest_year(&c.text, options.year_min, options.year_max))
            .max()
            .unwrap_or(0);

        let regions = segment_regions(&grid, &row_tags);
        let region_of: Vec<usize> = (0..grid.height())
            .map(|r| {
                regions
                    .iter()
                    .position(|reg| reg.contains_row(r))
                    .unwrap_or(0)
            })
            .collect();

        let mut table = Self {
            element_index: element.index,
            page: element.page,
            rows: Vec::new(),
            row_tags,
            regions,
            title: None,
            unit: None,
            cols_counter,
            largest_year,
        };
        table.recover_title_and_unit(element, context, options);
        table.build_cells(&grid, &region_of, options);
        table.inherit_units(options);
        Some(table)
    }

    /// Row count.
    #[must_use]
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Column count.
    #[must_use]
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// The cell occupying `(row, col)`, dummy or anchor.
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> Option<&TableCell> {
        self.rows.get(row)?.get(col)
    }

    /// The anchor cell canonical for `(row, col)`.
    #[must_use]
    pub fn anchor_cell(&self, row: usize, col: usize) -> Option<&TableCell> {
        let cell = self.cell(row, col)?;
        match cell.merge_to {
            Some((r, c)) => self.cell(r, c),
            None => Some(cell),
        }
    }

    /// The region a row belongs to.
    #[must_use]
    pub fn region_of_row(&self, row: usize) -> Option<&Region> {
        self.regions.iter().find(|r| r.contains_row(row))
    }

    /// Column headers of `(row, col)`: the anchor cells of the region's
    /// header rows in the same column, top-down, deduplicated.
    #[must_use]
    pub fn col_header_cells(&self, row: usize, col: usize) -> Vec<&TableCell> {
        let Some(region) = self.region_of_row(row) else {
            return Vec::new();
        };
        let mut seen: Vec<(usize, usize)> = Vec::new();
        let mut out = Vec::new();
        for &hr in &region.header_rows {
            if hr == row {
                continue;
            }
            if let Some(anchor) = self.anchor_cell(hr, col) {
                let key = (anchor.rowidx, anchor.colidx);
                if !anchor.is_empty() && !seen.contains(&key) {
                    seen.push(key);
                    out.push(anchor);
                }
            }
        }
        out
    }

    /// Row headers of `(row, col)`: the anchor cells left of the region's
    /// header-column split in the same row, left-to-right, deduplicated.
    #[must_use]
    pub fn row_header_cells(&self, row: usize, col: usize) -> Vec<&TableCell> {
        let Some(region) = self.region_of_row(row) else {
            return Vec::new();
        };
        let mut seen: Vec<(usize, usize)> = Vec::new();
        let mut out = Vec::new();
        for hc in 0..region.col_header_idx.min(self.width()) {
            if hc == col {
                continue;
            }
            if let Some(anchor) = self.anchor_cell(row, hc) {
                let key = (anchor.rowidx, anchor.colidx);
                if !anchor.is_empty() && !seen.contains(&key) {
                    seen.push(key);
                    out.push(anchor);
                }
            }
        }
        out
    }

    /// All headers of `(row, col)`: column headers first, then row headers.
    ///
    /// This is the order feature keys are built in; the header rows above a
    /// cell are its primary context, the label column refines it.
    #[must_use]
    pub fn headers(&self, row: usize, col: usize) -> Vec<&TableCell> {
        let mut out = self.col_header_cells(row, col);
        out.extend(self.row_header_cells(row, col));
        out
    }

    /// Data rows of `region`, in order.
    #[must_use]
    pub fn data_row_indices(&self, region: &Region) -> Vec<usize> {
        region
            .rows()
            .filter(|&r| self.row_tags.get(r) == Some(&RowTag::Dataline))
            .collect()
    }

    /// Applies this table's year normalization to arbitrary text.
    #[must_use]
    pub fn normalize_text(&self, text: &str, options: &ParseOptions) -> String {
        year::normalize_years(text, self.largest_year, options.year_min, options.year_max)
    }

    fn recover_title_and_unit(
        &mut self,
        element: &RawElement,
        context: &[RawElement],
        options: &ParseOptions,
    ) {
        let mut above: Vec<&RawElement> = context
            .iter()
            .filter(|e| {
                e.is_paragraph()
                    && e.index < element.index
                    && element.page.saturating_sub(e.page) <= 1
            })
            .collect();
        above.sort_by_key(|e| e.index);
        let above: Vec<&RawElement> = above
            .into_iter()
            .rev()
            .take(options.above_paragraph_window)
            .collect();

        for paragraph in &above {
            if self.unit.is_none() {
                if let Some(caps) = options.unit_patterns.search_captures(paragraph.paragraph_text())
                {
                    if let Some(unit) = caps.group("unit") {
                        self.unit = Some(unit.text.clone());
                    }
                }
            }
        }
        for paragraph in &above {
            let text = paragraph.paragraph_text().trim();
            if text.is_empty() || text.chars().count() > options.title_max_chars {
                continue;
            }
            // A bare unit line is not a title.
            let without_unit = options.unit_patterns.sub(text, "");
            if without_unit.trim().is_empty() {
                continue;
            }
            self.title = Some(ElementResult::Chars {
                element_index: paragraph.index,
                start: 0,
                end: paragraph.chars.len(),
                text: text.to_string(),
                chars: paragraph.chars.clone(),
            });
            break;
        }
        if self.title.is_none() {
            if let Some(title) = &element.title {
                self.title = Some(ElementResult::Paragraph {
                    element_index: element.index,
                    text: title.clone(),
                    chars: Vec::new(),
                });
            }
        }
    }

    fn build_cells(&mut self, grid: &Grid, region_of: &[usize], options: &ParseOptions) {
        let mut rows = Vec::with_capacity(grid.height());
        for (r, raw_row) in grid.rows.iter().enumerate() {
            let region_idx = region_of.get(r).copied().unwrap_or(0);
            let tag = self.row_tags.get(r).copied().unwrap_or(RowTag::Dataline);
            let region = &self.regions[region_idx];
            let subtitle = self.nearest_subtitle_above(grid, region, r);
            let mut row = Vec::with_capacity(raw_row.len());
            for (c, raw) in raw_row.iter().enumerate() {
                let is_col_header = tag == RowTag::Header;
                let is_row_header = c < region.col_header_idx;
                let normalized_text = year::normalize_years(
                    &raw.text,
                    self.largest_year,
                    options.year_min,
                    options.year_max,
                );
                let own_unit = options
                    .unit_patterns
                    .search_captures(&raw.text)
                    .and_then(|caps| caps.group("unit").map(|g| g.text.clone()));
                row.push(TableCell {
                    rowidx: r,
                    colidx: c,
                    text: raw.text.clone(),
                    normalized_text,
                    unit: own_unit,
                    dummy: raw.dummy,
                    merge_to: raw.dummy.then(|| raw.anchor()),
                    top: raw.top,
                    bottom: raw.bottom,
                    left: raw.left,
                    right: raw.right,
                    is_header: is_col_header || is_row_header,
                    is_row_header,
                    is_col_header,
                    subtitle: subtitle.clone(),
                    region: region_idx,
                    page: raw.page,
                    bbox: raw.bbox,
                    chars: raw.chars.clone(),
                });
            }
            rows.push(row);
        }
        self.rows = rows;
    }

    fn nearest_subtitle_above(&self, grid: &Grid, region: &Region, row: usize) -> Option<String> {
        (region.start..row)
            .rev()
            .find(|&r| self.row_tags.get(r) == Some(&RowTag::Subtitle))
            .and_then(|r| {
                grid.rows[r]
                    .iter()
                    .find(|c| !c.dummy && !c.text.trim().is_empty())
                    .map(|c| c.text.trim().to_string())
            })
    }

    /// Fills units for cells that have none: nearest subtitle above (for
    /// non-headers), then row headers, then column headers, then the
    /// table-level unit.
    fn inherit_units(&mut self, options: &ParseOptions) {
        let height = self.height();
        let width = self.width();
        let mut resolved: Vec<Vec<Option<String>>> = vec![vec![None; width]; height];
        for r in 0..height {
            for c in 0..width {
                if self.rows[r][c].unit.is_some() {
                    continue;
                }
                if !self.rows[r][c].is_header {
                    if let Some(unit) = self.subtitle_unit_above(r, options) {
                        resolved[r][c] = Some(unit);
                        continue;
                    }
                }
                let inherited = self
                    .row_header_cells(r, c)
                    .into_iter()
                    .chain(self.col_header_cells(r, c))
                    .find_map(|h| h.unit.clone())
                    .or_else(|| self.unit.clone());
                resolved[r][c] = inherited;
            }
        }
        for r in 0..height {
            for c in 0..width {
                if let Some(unit) = resolved[r][c].take() {
                    self.rows[r][c].unit = Some(unit);
                }
            }
        }
    }

    fn subtitle_unit_above(&self, row: usize, options: &ParseOptions) -> Option<String> {
        let region = self.region_of_row(row)?;
        (region.start..row)
            .rev()
            .filter(|&r| self.row_tags.get(r) == Some(&RowTag::Subtitle))
            .find_map(|r| {
                let text = self.rows[r]
                    .iter()
                    .find(|c| !c.dummy && !c.is_empty())
                    .map(|c| c.text.clone())?;
                // Subtitle rows only contribute whitelisted unit phrases.
                options
                    .subtitle_unit_patterns
                    .search_captures(&text)
                    .and_then(|caps| caps.group("unit").map(|g| g.text.clone()))
            })
    }
}

/// Distinct-cell count per row: merged horizontal spans count once.
fn distinct_counts(grid: &Grid) -> Vec<usize> {
    grid.rows
        .iter()
        .map(|row| {
            let mut seen: Vec<(usize, usize)> = Vec::new();
            for cell in row {
                let key = cell.anchor();
                if !seen.contains(&key) {
                    seen.push(key);
                }
            }
            seen.len()
        })
        .collect()
}

/// The distinct-cell count most rows share; ties prefer the wider count.
fn dominant_width(cols_counter: &BTreeMap<usize, usize>) -> usize {
    cols_counter
        .iter()
        .max_by_key(|&(width, count)| (*count, *width))
        .map_or(0, |(width, _)| *width)
}

fn infer_row_tags(
    grid: &Grid,
    distinct: &[usize],
    dominant: usize,
    options: &ParseOptions,
) -> Vec<RowTag> {
    let height = grid.height();
    let mut tags: Vec<Option<RowTag>> = vec![None; height];

    // Subtitles: one shared text across the row, i.e. one big horizontal
    // merge (or the engine duplicated the merged text into every slot).
    let mut prev_subtitle = false;
    for (r, row) in grid.rows.iter().enumerate() {
        let texts: Vec<&str> = row
            .iter()
            .filter(|c| !c.dummy && !c.text.trim().is_empty())
            .map(|c| c.text.trim())
            .collect();
        let mut distinct_texts = texts.clone();
        distinct_texts.dedup();
        distinct_texts.sort_unstable();
        distinct_texts.dedup();
        let is_subtitle = grid.width() > 1
            && distinct_texts.len() == 1
            && (distinct[r] == 1 || texts.len() > 1)
            // A row of identical numeric cells is data, not a banner.
            && !options.data_patterns.is_match(distinct_texts[0]);
        if is_subtitle {
            if !prev_subtitle {
                tags[r] = Some(RowTag::Subtitle);
            }
            // Runs of consecutive subtitles collapse to their first row.
            prev_subtitle = true;
        } else {
            prev_subtitle = false;
        }
    }

    // Datalines: at least half the non-empty cells look like data values.
    for (r, row) in grid.rows.iter().enumerate() {
        if tags[r].is_some() {
            continue;
        }
        let non_empty: Vec<&str> = row
            .iter()
            .filter(|c| !c.dummy && !c.text.trim().is_empty())
            .map(|c| c.text.trim())
            .collect();
        if non_empty.is_empty() {
            continue;
        }
        // Bare years are period labels, not data values; without this the
        // 50 % rule would swallow year header rows.
        let data_like = non_empty
            .iter()
            .filter(|t| {
                options.data_patterns.is_match(t)
                    && !year::is_pure_year(t, options.year_min, options.year_max)
            })
            .count();
        #[allow(clippy::cast_precision_loss)]
        if data_like as f64 / non_empty.len() as f64 >= options.dataline_ratio {
            tags[r] = Some(RowTag::Dataline);
        }
    }

    // Headers: within each inter-subtitle span, the contiguous prefix of
    // untagged rows matching the dominant width. The span's first row is
    // always a candidate, merged cells and all.
    let mut span_start = 0usize;
    let mut r = 0usize;
    while r <= height {
        let at_boundary = r == height || tags[r] == Some(RowTag::Subtitle);
        if at_boundary {
            tag_span_headers(&mut tags, distinct, dominant, span_start, r);
            span_start = r + 1;
        }
        r += 1;
    }

    // Everything left is data.
    let mut tags: Vec<RowTag> = tags
        .into_iter()
        .map(|t| t.unwrap_or(RowTag::Dataline))
        .collect();

    // A raw row fully covered by vertical continuations belongs to the
    // logical row above it and inherits its tag.
    for r in 1..height {
        let continuation = grid.rows[r]
            .iter()
            .all(|c| c.dummy && c.top < r);
        if continuation && !grid.rows[r].is_empty() {
            tags[r] = tags[r - 1];
        }
    }
    tags
}

fn tag_span_headers(
    tags: &mut [Option<RowTag>],
    distinct: &[usize],
    dominant: usize,
    start: usize,
    end: usize,
) {
    // The span's leading run of untagged rows: the first row is always a
    // header candidate, merged cells and all; the rest must match the
    // dominant width. Later untagged runs (a fresh header block after
    // datalines) require the dominant width throughout.
    let end = end.min(tags.len());
    let mut r = start;
    let mut leading_run = true;
    while r < end {
        if tags[r].is_some() {
            r += 1;
            leading_run = false;
            continue;
        }
        let run_start = r;
        while r < end && tags[r].is_none() {
            r += 1;
        }
        for (offset, row) in (run_start..r).enumerate() {
            let qualifies = distinct[row] == dominant || (leading_run && offset == 0);
            if qualifies {
                tags[row] = Some(RowTag::Header);
            } else {
                break;
            }
        }
        leading_run = false;
    }
}

fn segment_regions(grid: &Grid, row_tags: &[RowTag]) -> Vec<Region> {
    let height = row_tags.len();
    if height == 0 {
        return vec![Region {
            index: 0,
            start: 0,
            end: 0,
            header_rows: Vec::new(),
            col_header_idx: 1,
        }];
    }

    // meet_header sweep: a new region starts at row 0 and wherever the tag
    // sequence re-enters a header block after leaving one.
    let mut starts = vec![0usize];
    let mut seen_header = false;
    let mut left_header = false;
    for (r, tag) in row_tags.iter().enumerate() {
        match tag {
            RowTag::Header => {
                if seen_header && left_header {
                    starts.push(r);
                    left_header = false;
                }
                seen_header = true;
            }
            _ => {
                if seen_header {
                    left_header = true;
                }
            }
        }
    }

    // A subtitle directly above the next region's headers labels that
    // region, not the previous one.
    for start in &mut starts {
        if *start > 0 && row_tags[*start - 1] == RowTag::Subtitle {
            *start -= 1;
        }
    }
    starts.dedup();

    let mut regions = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(height);
        if end <= start {
            debug!("dropping empty region candidate at row {start}");
            continue;
        }
        let header_rows: Vec<usize> = (start..end)
            .filter(|&r| row_tags[r] == RowTag::Header)
            .collect();
        let col_header_idx = region_col_header_idx(grid, &header_rows, start, end);
        regions.push(Region {
            index: regions.len(),
            start,
            end,
            header_rows,
            col_header_idx,
        });
    }
    if regions.is_empty() {
        regions.push(Region {
            index: 0,
            start: 0,
            end: height,
            header_rows: Vec::new(),
            col_header_idx: region_col_header_idx(grid, &[], 0, height),
        });
    }
    regions
}

fn region_col_header_idx(
    grid: &Grid,
    header_rows: &[usize],
    start: usize,
    end: usize,
) -> usize {
    let Some(&first_header) = header_rows.first() else {
        return 1;
    };
    let base = grid
        .rows
        .get(first_header)
        .and_then(|row| row.first())
        .map_or(1, |cell| cell.right.saturating_sub(cell.left).max(1));

    let serial = grid
        .rows
        .get(first_header)
        .and_then(|row| row.first())
        .is_some_and(|cell| cell.text.trim() == "序号");
    let col0_blank = (start..end).all(|r| {
        grid.rows
            .get(r)
            .and_then(|row| row.first())
            .is_none_or(|cell| {
                cell.dummy || cell.text.trim().is_empty() || is_bar(cell.text.trim())
            })
    });
    if serial || col0_blank {
        base + 1
    } else {
        base
    }
}

fn is_bar(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| matches!(c, '—' | '–' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fintab_core::{grid_key, BoundingBox, ElementClass, RawCell};
    use std::collections::BTreeMap as Map;

    pub(crate) fn table_element(index: usize, grid: &[&[&str]]) -> RawElement {
        let mut cells = Map::new();
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

    fn parse(grid: &[&[&str]]) -> ParsedTable {
        ParsedTable::parse(&table_element(0, grid), &ParseOptions::default()).unwrap()
    }

    #[test]
    fn row_tags_cover_every_row() {
        let table = parse(&[
            &["年度", "收入(万元)", "毛利率"],
            &["2022", "1,000", "30%"],
            &["2021", "800", "25%"],
        ]);
        assert_eq!(table.row_tags.len(), table.height());
        assert_eq!(table.row_tags[0], RowTag::Header);
        assert_eq!(table.row_tags[1], RowTag::Dataline);
        assert_eq!(table.row_tags[2], RowTag::Dataline);
    }

    #[test]
    fn subtitle_row_is_detected_and_collapsed() {
        let mut el = table_element(
            0,
            &[
                &["主要财务数据", "", ""],
                &["项目", "2023", "2022"],
                &["资产", "100", "90"],
            ],
        );
        // The banner spans the full width.
        el.merged.push(vec![(0, 0), (0, 1), (0, 2)]);
        let table = ParsedTable::parse(&el, &ParseOptions::default()).unwrap();
        assert_eq!(table.row_tags[0], RowTag::Subtitle);
        assert_eq!(table.row_tags[1], RowTag::Header);
        assert_eq!(table.row_tags[2], RowTag::Dataline);
        assert_eq!(
            table.cell(2, 1).unwrap().subtitle.as_deref(),
            Some("主要财务数据")
        );
    }

    #[test]
    fn regions_partition_rows() {
        let table = parse(&[
            &["年度", "收入"],
            &["2022", "1,000"],
            &["项目", "金额"],
            &["负债", "40"],
        ]);
        assert_eq!(table.regions.len(), 2);
        assert_eq!(table.regions[0].start, 0);
        assert_eq!(table.regions[0].end, 2);
        assert_eq!(table.regions[1].start, 2);
        assert_eq!(table.regions[1].end, 4);
        let covered: Vec<usize> = table
            .regions
            .iter()
            .flat_map(Region::rows)
            .collect();
        assert_eq!(covered, vec![0, 1, 2, 3]);
    }

    #[test]
    fn headers_are_column_first_then_row() {
        let table = parse(&[
            &["", "2023", "2022"],
            &["资产", "100", "90"],
            &["负债", "40", "35"],
        ]);
        let headers = table.headers(1, 1);
        let texts: Vec<&str> = headers.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, ["2023", "资产"]);
        let keys: Vec<&str> = headers
            .iter()
            .map(|h| h.normalized_text.as_str())
            .collect();
        assert_eq!(keys, ["largest_year_minus_0", "资产"]);
    }

    #[test]
    fn row_header_flag_follows_col_header_idx() {
        let table = parse(&[
            &["项目", "2023", "2022"],
            &["资产", "100", "90"],
        ]);
        let region = table.region_of_row(1).unwrap();
        for row in &table.rows {
            for cell in row {
                assert_eq!(cell.is_row_header, cell.colidx < region.col_header_idx);
            }
        }
    }

    #[test]
    fn serial_number_column_widens_header_split() {
        let table = parse(&[
            &["序号", "名称", "2023"],
            &["1", "资产", "100"],
        ]);
        assert_eq!(table.regions[0].col_header_idx, 2);
    }

    #[test]
    fn year_normalization_is_stable() {
        let table = parse(&[
            &["", "2023", "2022"],
            &["资产", "100", "90"],
        ]);
        assert_eq!(table.largest_year, 2023);
        let options = ParseOptions::default();
        let once = table.normalize_text("2022年末", &options);
        let twice = table.normalize_text(&once, &options);
        assert_eq!(once, "largest_year_minus_1年末");
        assert_eq!(once, twice);
    }

    #[test]
    fn units_inherit_from_headers_and_table() {
        let table = parse(&[
            &["年度", "收入(万元)", "毛利率"],
            &["2022", "1,000", "30%"],
        ]);
        assert_eq!(
            table.cell(1, 1).unwrap().unit.as_deref(),
            Some("万元"),
            "data cell inherits its column header's unit"
        );
    }

    #[test]
    fn subtitle_unit_grammar_is_caller_replaceable() {
        let mut el = table_element(
            0,
            &[
                &["币别：美元", "", ""],
                &["项目", "2023", "2022"],
                &["资产", "100", "90"],
            ],
        );
        el.merged.push(vec![(0, 0), (0, 1), (0, 2)]);
        let mut options = ParseOptions::default();
        options.subtitle_unit_patterns =
            fintab_patterns::Pattern::collection([r"币别[:：]\s*(?P<unit>美元|人民币元)"])
                .unwrap();
        let table = ParsedTable::parse(&el, &options).unwrap();
        assert_eq!(table.row_tags[0], RowTag::Subtitle);
        assert_eq!(table.cell(2, 1).unwrap().unit.as_deref(), Some("美元"));

        // The default whitelist knows nothing about 币别.
        let table = ParsedTable::parse(&el, &ParseOptions::default()).unwrap();
        assert_eq!(table.cell(2, 1).unwrap().unit, None);
    }

    #[test]
    fn width_source_is_configurable() {
        let mut el = table_element(0, &[&["年度", "收入"], &["2022", "1,000"]]);
        el.cells.insert(
            grid_key(1, 2),
            RawCell {
                text: "备注".to_string(),
                row: 1,
                col: 2,
                top: 1,
                bottom: 2,
                left: 2,
                right: 3,
                ..RawCell::default()
            },
        );
        let mut options = ParseOptions::default();
        assert_eq!(ParsedTable::parse(&el, &options).unwrap().width(), 3);
        options.width_from_all_rows = false;
        let table = ParsedTable::parse(&el, &options).unwrap();
        assert_eq!(table.width(), 2);
        assert_eq!(table.cell(1, 1).unwrap().text, "1,000");
    }

    #[test]
    fn dummy_cells_point_at_anchors() {
        let mut el = table_element(
            0,
            &[
                &["2023", "收入", "100"],
                &["", "成本", "60"],
            ],
        );
        el.cells.get_mut("0_0").unwrap().bottom = 2;
        el.cells.remove("1_0");
        let table = ParsedTable::parse(&el, &ParseOptions::default()).unwrap();
        let dummy = table.cell(1, 0).unwrap();
        assert!(dummy.dummy);
        let (ar, ac) = dummy.merge_to.unwrap();
        let anchor = table.cell(ar, ac).unwrap();
        assert!(!anchor.dummy);
        assert!(anchor.top <= dummy.rowidx && dummy.rowidx < anchor.bottom);
        assert!(anchor.left <= dummy.colidx && dummy.colidx < anchor.right);
    }

    #[test]
    fn title_and_unit_come_from_above_paragraphs() {
        let mut para_title = RawElement {
            class: ElementClass::Paragraph,
            index: 4,
            page: 0,
            outline: BoundingBox::default(),
            text: Some("主要会计数据表".to_string()),
            chars: Vec::new(),
            title: None,
            cells: Map::new(),
            merged: Vec::new(),
            syllabus: None,
            docx_meta: None,
        };
        para_title.chars = Vec::new();
        let mut para_unit = para_title.clone();
        para_unit.index = 5;
        para_unit.text = Some("单位：万元".to_string());

        let el = table_element(6, &[&["年度", "收入"], &["2022", "1,000"]]);
        let table = ParsedTable::parse_with_context(
            &el,
            &[para_title, para_unit],
            &ParseOptions::default(),
        )
        .unwrap();
        assert_eq!(table.unit.as_deref(), Some("万元"));
        match table.title {
            Some(ElementResult::Chars { element_index, ref text, .. }) => {
                assert_eq!(element_index, 4);
                assert_eq!(text, "主要会计数据表");
            }
            ref other => panic!("unexpected title {other:?}"),
        }
    }
}
