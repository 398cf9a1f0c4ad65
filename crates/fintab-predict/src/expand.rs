//! Record expansion: from one known record, every analogous one.
//!
//! Financial tables repeat structure — a merged first-column year label
//! covering a block of rows, a merged header group repeated across
//! columns, a section banner starting each block. Given the coordinates
//! of one record, the engine classifies the table and the record, marks
//! which cells may move, and enumerates the sibling records by stepping
//! and by replicating across detected groups.
//!
//! All loops are bounded by the table's row/column count. The known
//! record is always emitted first; derived records follow in
//! strictly-increasing step order, deduplicated by exact coordinates.

use fintab_patterns::Pattern;
use fintab_table::{ParsedTable, RowTag};

/// Default minimum span height for a lone vertical merge to count as a
/// repeatable group.
pub const MIN_REAL_MERGE_LEN: usize = 3;

/// Default minimum number of groups for group-based classification.
pub const MIN_GROUP_COUNT: usize = 2;

/// Empirically tuned thresholds of the expansion engine.
#[derive(Debug, Clone)]
pub struct ExpandOptions {
    /// A single vertical merge this tall still forms a group.
    pub min_real_merge_len: usize,
    /// Groups needed before merges are treated as repetition.
    pub min_group_count: usize,
    /// Texts accepted as group labels (dates, periods).
    pub group_label_patterns: Pattern,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            min_real_merge_len: MIN_REAL_MERGE_LEN,
            min_group_count: MIN_GROUP_COUNT,
            group_label_patterns: default_group_label_patterns(),
        }
    }
}

/// Labels that mark a merged span as a repeatable period group.
#[must_use]
pub fn default_group_label_patterns() -> Pattern {
    Pattern::collection([
        r"(?:19|20|21)\d{2}",
        r"largest_year_minus_\d+",
        r"^\d{1,2}月",
        r"年度?",
        r"^[一二三四]季度",
    ])
    .expect("valid group label patterns")
}

/// Structural classification of a whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableShape {
    /// No repeating merges in row 0 or column 0.
    NoMerge,
    /// Row 0 carries horizontal merge groups over columns ≥ 1.
    HeadColMerge,
    /// Column 0 carries vertical date-labeled merge groups.
    Col0RowMerge,
    /// Both of the previous conditions hold.
    Col0RowMergeAndHeadColMerge,
    /// A full-width banner row splits the table into sections.
    MostWideColMerge,
    /// Anything else; no expansion is attempted.
    Unknown,
}

/// Structural classification of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    /// One cell.
    Single,
    /// Cells share both row edges.
    Horizontal,
    /// Cells share both column edges.
    Vertical,
    /// Cells share only the top edge.
    SemiHorizontal,
    /// Two cells sharing the top edge with differing bottoms.
    TallAndShort,
    /// The record includes a header-row cell.
    HaveHeadRecord,
    /// Anything else.
    Unknown,
}

type Coord = (usize, usize);

/// Enumerates records analogous to a known one inside a parsed table.
#[derive(Debug)]
pub struct RecordExpander<'a> {
    table: &'a ParsedTable,
    options: ExpandOptions,
    shape: TableShape,
    /// Half-open row ranges of vertical groups in column 0.
    vertical_groups: Vec<(usize, usize)>,
    /// Half-open column ranges of horizontal groups in row 0.
    horizontal_groups: Vec<(usize, usize)>,
}

impl<'a> RecordExpander<'a> {
    /// An expander with default thresholds.
    #[must_use]
    pub fn new(table: &'a ParsedTable) -> Self {
        Self::with_options(table, ExpandOptions::default())
    }

    /// An expander with caller-supplied thresholds.
    #[must_use]
    pub fn with_options(table: &'a ParsedTable, options: ExpandOptions) -> Self {
        let vertical_groups = find_vertical_groups(table, &options);
        let horizontal_groups = find_horizontal_groups(table, &options);
        let shape = classify_table(table, &vertical_groups, &horizontal_groups, &options);
        Self {
            table,
            options,
            shape,
            vertical_groups,
            horizontal_groups,
        }
    }

    /// The table's structural classification.
    #[must_use]
    pub fn table_shape(&self) -> TableShape {
        self.shape
    }

    /// Detected vertical groups, as half-open row ranges.
    #[must_use]
    pub fn vertical_groups(&self) -> &[(usize, usize)] {
        &self.vertical_groups
    }

    /// Detected horizontal groups, as half-open column ranges.
    #[must_use]
    pub fn horizontal_groups(&self) -> &[(usize, usize)] {
        &self.horizontal_groups
    }

    /// Classifies one record by its cell geometry.
    #[must_use]
    pub fn classify_record(&self, record: &[Coord]) -> RecordShape {
        if record.is_empty() {
            return RecordShape::Unknown;
        }
        if record
            .iter()
            .any(|&(r, _)| self.table.row_tags.get(r) == Some(&RowTag::Header))
        {
            return RecordShape::HaveHeadRecord;
        }
        let mut spans = Vec::with_capacity(record.len());
        for &(r, c) in record {
            match self.table.anchor_cell(r, c) {
                Some(cell) => spans.push((cell.top, cell.bottom, cell.left, cell.right)),
                None => return RecordShape::Unknown,
            }
        }
        if record.len() == 1 {
            return RecordShape::Single;
        }
        let same = |f: fn(&(usize, usize, usize, usize)) -> usize| {
            spans.iter().map(f).all(|v| v == f(&spans[0]))
        };
        let same_top = same(|s| s.0);
        let same_bottom = same(|s| s.1);
        let same_left = same(|s| s.2);
        let same_right = same(|s| s.3);
        if same_top && same_bottom {
            RecordShape::Horizontal
        } else if same_left && same_right {
            RecordShape::Vertical
        } else if same_top && record.len() == 2 {
            RecordShape::TallAndShort
        } else if same_top {
            RecordShape::SemiHorizontal
        } else {
            RecordShape::Unknown
        }
    }

    /// True when the cell at `(r, c)` may move during expansion.
    ///
    /// Non-movable cells are the labels of the classified shape: group
    /// labels in column 0, header row 0, banner rows, header rows of a
    /// plain table. They stay put in every derived record.
    #[must_use]
    pub fn movable(&self, r: usize, c: usize) -> bool {
        if r >= self.table.height() || c >= self.table.width() {
            return false;
        }
        match self.shape {
            TableShape::NoMerge => self.table.row_tags.get(r) != Some(&RowTag::Header),
            TableShape::Col0RowMerge => c != 0 && self.in_vertical_union(r),
            TableShape::HeadColMerge => r != 0 && self.in_horizontal_union(c),
            TableShape::Col0RowMergeAndHeadColMerge => {
                c != 0 && r != 0 && self.in_vertical_union(r)
            }
            TableShape::MostWideColMerge => !self.is_banner_row(r),
            TableShape::Unknown => false,
        }
    }

    /// All records analogous to `known`, the known record first.
    #[must_use]
    pub fn expand(&self, known: &[Coord]) -> Vec<Vec<Coord>> {
        let mut records: Vec<Vec<Coord>> = vec![known.to_vec()];
        if known.is_empty() {
            return records;
        }
        match self.shape {
            TableShape::Col0RowMerge | TableShape::Col0RowMergeAndHeadColMerge => {
                self.step_expand(&mut records, known, (1, 0));
                self.replicate_vertical(&mut records);
                if self.shape == TableShape::Col0RowMergeAndHeadColMerge {
                    self.replicate_horizontal(&mut records);
                }
            }
            TableShape::HeadColMerge => {
                let width = self
                    .horizontal_groups
                    .first()
                    .map_or(1, |&(left, right)| right - left);
                self.step_expand(&mut records, known, (0, width));
            }
            TableShape::NoMerge => {
                let delta = match self.classify_record(known) {
                    RecordShape::Vertical => (0, 1),
                    _ => (1, 0),
                };
                self.step_expand(&mut records, known, delta);
            }
            TableShape::MostWideColMerge => {
                self.step_expand(&mut records, known, (1, 0));
                self.replicate_banners(&mut records, known);
            }
            TableShape::Unknown => {}
        }
        dedup_records(records)
    }

    fn step_expand(&self, records: &mut Vec<Vec<Coord>>, known: &[Coord], delta: Coord) {
        let (dr, dc) = delta;
        let (row_bound, col_bound) = self.step_bound(known);
        let max_steps = self.table.height().max(self.table.width());
        'steps: for step in 1..=max_steps {
            let mut candidate = Vec::with_capacity(known.len());
            let mut moved = false;
            for &(r, c) in known {
                if self.movable(r, c) {
                    let nr = r + step * dr;
                    let nc = c + step * dc;
                    if nr >= row_bound || nc >= col_bound || !self.movable(nr, nc) {
                        break 'steps;
                    }
                    candidate.push((nr, nc));
                    moved = true;
                } else {
                    candidate.push((r, c));
                }
            }
            if !moved || records.contains(&candidate) {
                break;
            }
            records.push(candidate);
        }
    }

    /// Exclusive row/column bounds the stepping loop must stay inside.
    fn step_bound(&self, known: &[Coord]) -> (usize, usize) {
        let height = self.table.height();
        let width = self.table.width();
        match self.shape {
            TableShape::Col0RowMerge | TableShape::Col0RowMergeAndHeadColMerge => {
                // Stay inside the y-range of the record's label span.
                let label_bottom = known
                    .iter()
                    .filter(|&&(r, c)| !self.movable(r, c) && c == 0)
                    .filter_map(|&(r, c)| self.table.anchor_cell(r, c))
                    .map(|cell| cell.bottom)
                    .min();
                (label_bottom.unwrap_or(height), width)
            }
            TableShape::HeadColMerge => {
                let right = self
                    .horizontal_groups
                    .last()
                    .map_or(width, |&(_, right)| right);
                (height, right.min(width))
            }
            TableShape::NoMerge => {
                // Stay inside the owning region.
                let max_row = known.iter().map(|&(r, _)| r).max().unwrap_or(0);
                let end = self
                    .table
                    .region_of_row(max_row)
                    .map_or(height, |region| region.end);
                (end, width)
            }
            TableShape::MostWideColMerge => {
                let max_row = known.iter().map(|&(r, _)| r).max().unwrap_or(0);
                let next_banner = self
                    .banner_rows()
                    .into_iter()
                    .find(|&b| b > max_row)
                    .unwrap_or(height);
                (next_banner, width)
            }
            TableShape::Unknown => (height, width),
        }
    }

    /// Replicates every collected record into each other vertical group.
    fn replicate_vertical(&self, records: &mut Vec<Vec<Coord>>) {
        let Some(&first) = records.first().and_then(|r| r.first()) else {
            return;
        };
        let base_row = records[0].iter().map(|&(r, _)| r).min().unwrap_or(first.0);
        let Some(base) = self
            .vertical_groups
            .iter()
            .copied()
            .find(|&(top, bottom)| (top..bottom).contains(&base_row))
        else {
            return;
        };
        let snapshot = records.clone();
        for &group in &self.vertical_groups {
            if group == base {
                continue;
            }
            let delta = group.0 as isize - base.0 as isize;
            for record in &snapshot {
                if let Some(shifted) = shift_rows(record, delta, group, self.table.height()) {
                    if !records.contains(&shifted) {
                        records.push(shifted);
                    }
                }
            }
        }
    }

    /// Replicates every collected record into each other horizontal group.
    fn replicate_horizontal(&self, records: &mut Vec<Vec<Coord>>) {
        let snapshot = records.clone();
        for record in &snapshot {
            let Some(base) = self.horizontal_groups.iter().copied().find(|&(left, right)| {
                record.iter().any(|&(_, c)| (left..right).contains(&c))
            }) else {
                continue;
            };
            for &group in &self.horizontal_groups {
                if group == base {
                    continue;
                }
                let delta = group.0 as isize - base.0 as isize;
                let mut shifted = Vec::with_capacity(record.len());
                let mut ok = true;
                for &(r, c) in record {
                    if (base.0..base.1).contains(&c) {
                        let nc = c as isize + delta;
                        if nc < 0 || nc as usize >= self.table.width() {
                            ok = false;
                            break;
                        }
                        shifted.push((r, nc as usize));
                    } else {
                        shifted.push((r, c));
                    }
                }
                if ok && !records.contains(&shifted) {
                    records.push(shifted);
                }
            }
        }
    }

    /// Replicates the collected records below each further banner row.
    fn replicate_banners(&self, records: &mut Vec<Vec<Coord>>, known: &[Coord]) {
        let banners = self.banner_rows();
        let min_row = known.iter().map(|&(r, _)| r).min().unwrap_or(0);
        let Some(base) = banners.iter().copied().filter(|&b| b <= min_row).max() else {
            return;
        };
        let snapshot = records.clone();
        for &banner in &banners {
            if banner == base {
                continue;
            }
            let delta = banner as isize - base as isize;
            for record in &snapshot {
                let mut shifted = Vec::with_capacity(record.len());
                let mut ok = true;
                for &(r, c) in record {
                    let nr = r as isize + delta;
                    if nr < 0 || nr as usize >= self.table.height() {
                        ok = false;
                        break;
                    }
                    let nr = nr as usize;
                    if self.is_banner_row(nr) {
                        ok = false;
                        break;
                    }
                    shifted.push((nr, c));
                }
                if ok && !records.contains(&shifted) {
                    records.push(shifted);
                }
            }
        }
    }

    fn in_vertical_union(&self, r: usize) -> bool {
        self.vertical_groups
            .iter()
            .any(|&(top, bottom)| (top..bottom).contains(&r))
    }

    fn in_horizontal_union(&self, c: usize) -> bool {
        self.horizontal_groups
            .iter()
            .any(|&(left, right)| (left..right).contains(&c))
    }

    fn is_banner_row(&self, r: usize) -> bool {
        banner_rows_of(self.table).contains(&r)
    }

    fn banner_rows(&self) -> Vec<usize> {
        banner_rows_of(self.table)
    }
}

/// Shifts a record's rows by `delta`, requiring every row to land inside
/// `group`.
fn shift_rows(
    record: &[Coord],
    delta: isize,
    group: (usize, usize),
    height: usize,
) -> Option<Vec<Coord>> {
    let mut shifted = Vec::with_capacity(record.len());
    for &(r, c) in record {
        let nr = r as isize + delta;
        if nr < 0 {
            return None;
        }
        let nr = nr as usize;
        if nr >= height || !(group.0..group.1).contains(&nr) {
            return None;
        }
        shifted.push((nr, c));
    }
    Some(shifted)
}

/// Vertical groups: column-0 merges whose label is a date or empty.
fn find_vertical_groups(table: &ParsedTable, options: &ExpandOptions) -> Vec<(usize, usize)> {
    let mut groups = Vec::new();
    for r in 0..table.height() {
        let Some(cell) = table.cell(r, 0) else {
            continue;
        };
        if cell.dummy || cell.span_height() < 2 {
            continue;
        }
        let label = cell.normalized_text.trim();
        if label.is_empty() || options.group_label_patterns.is_match(label) {
            groups.push((cell.top, cell.bottom));
        }
    }
    groups
}

/// Horizontal groups: row-0 merges over columns ≥ 1, or repeated
/// date-like single-width headers.
fn find_horizontal_groups(table: &ParsedTable, options: &ExpandOptions) -> Vec<(usize, usize)> {
    let mut merged = Vec::new();
    let mut repeated = Vec::new();
    for c in 1..table.width() {
        let Some(cell) = table.cell(0, c) else {
            continue;
        };
        if cell.dummy {
            continue;
        }
        if cell.span_width() >= 2 {
            merged.push((cell.left, cell.right));
        } else if options
            .group_label_patterns
            .is_match(cell.normalized_text.trim())
        {
            repeated.push((c, c + 1));
        }
    }
    if merged.len() >= options.min_group_count {
        merged
    } else if repeated.len() >= options.min_group_count {
        repeated
    } else {
        merged
    }
}

fn classify_table(
    table: &ParsedTable,
    vertical: &[(usize, usize)],
    horizontal: &[(usize, usize)],
    options: &ExpandOptions,
) -> TableShape {
    let has_vertical = vertical.len() >= options.min_group_count
        || vertical
            .iter()
            .any(|&(top, bottom)| bottom - top >= options.min_real_merge_len);
    let has_horizontal = horizontal.len() >= options.min_group_count;
    match (has_vertical, has_horizontal) {
        (true, true) => TableShape::Col0RowMergeAndHeadColMerge,
        (true, false) => TableShape::Col0RowMerge,
        (false, true) => TableShape::HeadColMerge,
        (false, false) => {
            if !banner_rows_of(table).is_empty() {
                return TableShape::MostWideColMerge;
            }
            let col0_plain = (1..table.height()).all(|r| {
                table
                    .cell(r, 0)
                    .is_none_or(|c| c.dummy || c.span_height() == 1)
            });
            let row0_plain = (1..table.width()).all(|c| {
                table
                    .cell(0, c)
                    .is_none_or(|cell| cell.dummy || cell.span_width() == 1)
            });
            if col0_plain && row0_plain {
                TableShape::NoMerge
            } else {
                TableShape::Unknown
            }
        }
    }
}

/// Rows whose first anchor spans the full table width.
fn banner_rows_of(table: &ParsedTable) -> Vec<usize> {
    if table.width() < 2 {
        return Vec::new();
    }
    (0..table.height())
        .filter(|&r| {
            table
                .cell(r, 0)
                .is_some_and(|c| !c.dummy && c.span_width() == table.width())
        })
        .collect()
}

fn dedup_records(records: Vec<Vec<Coord>>) -> Vec<Vec<Coord>> {
    let mut out: Vec<Vec<Coord>> = Vec::with_capacity(records.len());
    for record in records {
        if !out.contains(&record) {
            out.push(record);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::table_element;
    use fintab_table::{ParseOptions, ParsedTable};

    fn year_block_table() -> ParsedTable {
        let mut element = table_element(
            0,
            &[
                &["2023", "收入", "100"],
                &["", "成本", "60"],
                &["2022", "收入", "90"],
                &["", "成本", "55"],
            ],
        );
        element.merged.push(vec![(0, 0), (1, 0)]);
        element.merged.push(vec![(2, 0), (3, 0)]);
        ParsedTable::parse(&element, &ParseOptions::default()).unwrap()
    }

    #[test]
    fn col0_merge_table_is_classified() {
        let table = year_block_table();
        let expander = RecordExpander::new(&table);
        assert_eq!(expander.table_shape(), TableShape::Col0RowMerge);
        assert_eq!(expander.vertical_groups(), &[(0, 2), (2, 4)]);
    }

    #[test]
    fn col0_merge_expansion_steps_and_replicates() {
        let table = year_block_table();
        let expander = RecordExpander::new(&table);
        let records = expander.expand(&[(0, 0), (0, 1), (0, 2)]);
        assert_eq!(
            records,
            vec![
                vec![(0, 0), (0, 1), (0, 2)],
                vec![(0, 0), (1, 1), (1, 2)],
                vec![(2, 0), (2, 1), (2, 2)],
                vec![(2, 0), (3, 1), (3, 2)],
            ]
        );
    }

    #[test]
    fn labels_stay_put_and_do_not_move() {
        let table = year_block_table();
        let expander = RecordExpander::new(&table);
        assert!(!expander.movable(0, 0), "group label");
        assert!(!expander.movable(1, 0), "slot covered by the label merge");
        assert!(expander.movable(1, 1));
        assert!(expander.movable(3, 2));
    }

    #[test]
    fn record_shapes_classify() {
        let mut element = table_element(
            0,
            &[
                &["年度", "金额", "备注"],
                &["2022", "10", "30"],
                &["2021", "20", ""],
            ],
        );
        // The remark cell spans both data rows.
        element.merged.push(vec![(1, 2), (2, 2)]);
        let table = ParsedTable::parse(&element, &ParseOptions::default()).unwrap();
        let expander = RecordExpander::new(&table);
        assert_eq!(expander.classify_record(&[(1, 1)]), RecordShape::Single);
        assert_eq!(
            expander.classify_record(&[(1, 0), (1, 1)]),
            RecordShape::Horizontal
        );
        assert_eq!(
            expander.classify_record(&[(1, 1), (2, 1)]),
            RecordShape::Vertical
        );
        assert_eq!(
            expander.classify_record(&[(1, 1), (1, 2)]),
            RecordShape::TallAndShort
        );
        assert_eq!(
            expander.classify_record(&[(1, 0), (1, 1), (1, 2)]),
            RecordShape::SemiHorizontal
        );
        assert_eq!(
            expander.classify_record(&[(0, 0), (1, 0)]),
            RecordShape::HaveHeadRecord
        );
    }

    #[test]
    fn no_merge_table_steps_down_rows() {
        let element = table_element(
            0,
            &[
                &["年度", "收入(万元)"],
                &["2022", "1,000"],
                &["2021", "800"],
            ],
        );
        let table = ParsedTable::parse(&element, &ParseOptions::default()).unwrap();
        let expander = RecordExpander::new(&table);
        assert_eq!(expander.table_shape(), TableShape::NoMerge);
        let records = expander.expand(&[(1, 0), (1, 1)]);
        assert_eq!(
            records,
            vec![vec![(1, 0), (1, 1)], vec![(2, 0), (2, 1)]]
        );
    }

    #[test]
    fn head_col_merge_steps_by_group_width() {
        let mut element = table_element(
            0,
            &[
                &["项目", "2023", "", "2022", ""],
                &["", "金额", "占比", "金额", "占比"],
                &["资产", "100", "40%", "90", "45%"],
            ],
        );
        element.merged.push(vec![(0, 1), (0, 2)]);
        element.merged.push(vec![(0, 3), (0, 4)]);
        let table = ParsedTable::parse(&element, &ParseOptions::default()).unwrap();
        let expander = RecordExpander::new(&table);
        assert_eq!(expander.table_shape(), TableShape::HeadColMerge);
        let records = expander.expand(&[(2, 1), (2, 2)]);
        assert_eq!(
            records,
            vec![vec![(2, 1), (2, 2)], vec![(2, 3), (2, 4)]]
        );
    }

    #[test]
    fn banner_table_replicates_per_section() {
        let mut element = table_element(
            0,
            &[
                &["合并口径", ""],
                &["收入", "100"],
                &["母公司口径", ""],
                &["收入", "80"],
            ],
        );
        element.merged.push(vec![(0, 0), (0, 1)]);
        element.merged.push(vec![(2, 0), (2, 1)]);
        let table = ParsedTable::parse(&element, &ParseOptions::default()).unwrap();
        let expander = RecordExpander::new(&table);
        assert_eq!(expander.table_shape(), TableShape::MostWideColMerge);
        let records = expander.expand(&[(1, 0), (1, 1)]);
        assert!(records.contains(&vec![(1, 0), (1, 1)]));
        assert!(records.contains(&vec![(3, 0), (3, 1)]));
    }

    #[test]
    fn expansion_never_leaves_the_table() {
        let table = year_block_table();
        let expander = RecordExpander::new(&table);
        for record in expander.expand(&[(2, 0), (2, 1), (2, 2)]) {
            for (r, c) in record {
                assert!(r < table.height());
                assert!(c < table.width());
            }
        }
    }
}
