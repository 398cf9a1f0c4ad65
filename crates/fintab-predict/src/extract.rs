//! Provenance-preserving answer extraction shared by the predictors.
//!
//! Every helper here turns a matched cell (or title paragraph) into an
//! [`ElementResult`] whose char slice points back at the source element.
//! Offsets inside results are char indices; pattern matches carry byte
//! offsets, so conversion happens exactly once, here.

use fintab_core::{DocChar, ElementResult};
use fintab_patterns::{Pattern, PatternMatch};
use fintab_table::{ParsedTable, TableCell};

use crate::config::RuleConfig;

/// Char index of the byte offset `byte` in `text`.
pub(crate) fn char_index(text: &str, byte: usize) -> usize {
    text[..byte.min(text.len())].chars().count()
}

fn char_slice(chars: &[DocChar], start: usize, end: usize) -> Vec<DocChar> {
    chars.get(start..end.min(chars.len())).map_or_else(Vec::new, <[DocChar]>::to_vec)
}

/// A whole-cell result for one anchor cell.
#[must_use]
pub(crate) fn whole_cell_result(table: &ParsedTable, cell: &TableCell) -> ElementResult {
    ElementResult::TableCells {
        element_index: table.element_index,
        cells: vec![(cell.rowidx, cell.colidx)],
        text: cell.text.clone(),
        chars: cell.chars.clone(),
    }
}

/// A char-slice result inside one cell, from a pattern match on its text.
#[must_use]
pub(crate) fn cell_match_result(
    table: &ParsedTable,
    cell: &TableCell,
    m: &PatternMatch,
) -> ElementResult {
    let start = char_index(&cell.text, m.start);
    let end = start + m.text.chars().count();
    ElementResult::CellChars {
        element_index: table.element_index,
        row: cell.rowidx,
        col: cell.colidx,
        start,
        end,
        text: m.text.clone(),
        chars: char_slice(&cell.chars, start, end),
    }
}

/// Applies `pattern` to another result's text, slicing its provenance.
///
/// Used for title-paragraph extraction. Prefers the `dst` named group,
/// falling back to the whole match.
#[must_use]
pub(crate) fn text_result_match(pattern: &Pattern, source: &ElementResult) -> Option<ElementResult> {
    let element_index = source.element_index()?;
    let text = source.text();
    let caps = pattern.search_captures(text)?;
    let m = caps.group("dst").unwrap_or(&caps.whole);
    let start = char_index(text, m.start);
    let end = start + m.text.chars().count();
    Some(ElementResult::Chars {
        element_index,
        start,
        end,
        text: m.text.clone(),
        chars: char_slice(source.chars(), start, end),
    })
}

/// Extracts the answer carried by `cell` under the rule's `cell_regs`.
///
/// Without `cell_regs` the whole cell is the answer. With it, the `dst`
/// named group is sliced out; a match without a `dst` group drops the
/// candidate.
#[must_use]
pub(crate) fn cell_answer(
    rule: &RuleConfig,
    table: &ParsedTable,
    cell: &TableCell,
) -> Option<ElementResult> {
    let Some(regs) = &rule.cell_regs else {
        return Some(whole_cell_result(table, cell));
    };
    let caps = regs.search_captures(&cell.text)?;
    let dst = caps.group("dst")?;
    Some(cell_match_result(table, cell, dst))
}

/// Like [`cell_answer`], but pulls every `cell_regs` match out of the cell
/// when `multi_answer_in_one_cell` is on.
#[must_use]
pub(crate) fn cell_answers(
    rule: &RuleConfig,
    table: &ParsedTable,
    cell: &TableCell,
) -> Vec<ElementResult> {
    let Some(regs) = &rule.cell_regs else {
        return cell_answer(rule, table, cell).into_iter().collect();
    };
    if !rule.multi_answer_in_one_cell {
        return cell_answer(rule, table, cell).into_iter().collect();
    }
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos < cell.text.len() {
        let Some(caps) = regs.search_captures(&cell.text[pos..]) else {
            break;
        };
        let mut advance = caps.whole.end;
        if advance == 0 {
            // Empty match: step one char to guarantee progress.
            advance = cell.text[pos..].chars().next().map_or(1, char::len_utf8);
        }
        if let Some(dst) = caps.group("dst") {
            let rebased = PatternMatch {
                start: pos + dst.start,
                end: pos + dst.end,
                text: dst.text.clone(),
            };
            out.push(cell_match_result(table, cell, &rebased));
        }
        pos += advance;
    }
    out
}
