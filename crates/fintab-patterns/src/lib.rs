//! # Fintab Patterns - Composable Regex Predicates
//!
//! Extraction rules are written as trees of regexes combined with boolean
//! folds, ordered matching, negation and split-then-test. This crate
//! provides that tree ([`Pattern`]) with a uniform search surface
//! (`is_match` / `search` / `finditer` / `sub` / `split` /
//! `search_captures`) and a process-wide compiled-regex cache keyed by
//! `(pattern, flags)`.
//!
//! Patterns are values: trees built from the same sources compare and hash
//! equal, so rule tables can be cached and deduplicated. Building a tree
//! from an uncompilable source fails immediately with
//! [`fintab_core::FintabError::BadPattern`]; searching never fails.

pub mod cache;
mod pattern;

pub use pattern::{CachedRegex, IntoPattern, MatchOp, Pattern, PatternCaptures, PatternMatch};
