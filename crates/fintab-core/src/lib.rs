//! # Fintab Core - Element Stream Model and Typed Results
//!
//! Shared data model for the fintab extraction engine. The external
//! PDF-layout engine emits an ordered stream of logical elements
//! (paragraphs, tables, page furniture); this crate models that stream
//! ([`RawElement`], [`RawCell`], [`DocChar`]) and the typed answers the
//! predictors produce ([`PredictorResult`], [`ElementResult`]).
//!
//! Every result variant preserves exact character provenance back into the
//! source element, so a downstream verifier can locate each extracted
//! answer on the page.

pub mod element;
pub mod error;
pub mod result;

pub use element::{
    grid_key, parse_grid_key, BoundingBox, DocChar, DocxMeta, ElementClass, RawCell, RawElement,
};
pub use error::{FintabError, Result};
pub use result::{AnswerGroup, ElementResult, PredictorResult};

/// Parses a full layout-engine element stream from its JSON form.
///
/// # Errors
///
/// Returns [`FintabError::Json`] when the payload does not match the
/// element schema.
pub fn parse_elements(json: &str) -> Result<Vec<RawElement>> {
    Ok(serde_json::from_str(json)?)
}
