//! # Fintab Table - Typed 2-D Table Model
//!
//! Lifts the raw cell grids produced by the external PDF-layout engine
//! into an addressable table model:
//!
//! - [`grid::Grid`] normalizes a TABLE element's sparse cell map into a
//!   dense grid with one anchor per merged span and dummies elsewhere, and
//!   concatenates sticky tables split across page boundaries.
//! - [`ParsedTable`] tags every row (header / subtitle / dataline),
//!   partitions rows into [`Region`]s, normalizes years against the
//!   table's largest year, and resolves per-cell units by inheritance.
//!
//! Parsing is total: malformed grids degrade to skipped cells and DEBUG
//! logs, never errors. A parsed table is immutable and safely shareable.

pub mod cell;
pub mod grid;
pub mod options;
pub mod parsed;
pub mod year;

pub use cell::{Region, RowTag, TableCell};
pub use grid::{concat_sticky_tables, is_sticky_pair, Grid};
pub use options::ParseOptions;
pub use parsed::ParsedTable;
