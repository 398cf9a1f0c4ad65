//! Process-wide compiled-regex cache.
//!
//! Rule tables repeat the same pattern sources across hundreds of schema
//! columns; compiling each occurrence once per process keeps rule loading
//! cheap. The cache is keyed by `(pattern, flags)` and is read-mostly:
//! under a compile race the loser performs one redundant compilation and
//! both ends hold the same-valued `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;

static REGEX_CACHE: Lazy<RwLock<HashMap<(String, String), Arc<Regex>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Compiles `pattern` with the given inline `flags` (e.g. `"i"`, `"is"`),
/// reusing a previously compiled instance when available.
///
/// # Errors
///
/// Returns the compiler diagnostic for an invalid pattern. The failure is
/// not cached; a later call with a fixed pattern starts clean.
pub fn compile(pattern: &str, flags: &str) -> Result<Arc<Regex>, regex::Error> {
    let key = (pattern.to_string(), flags.to_string());
    if let Ok(cache) = REGEX_CACHE.read() {
        if let Some(re) = cache.get(&key) {
            return Ok(Arc::clone(re));
        }
    }
    let source = if flags.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{flags}){pattern}")
    };
    let compiled = Arc::new(Regex::new(&source)?);
    if let Ok(mut cache) = REGEX_CACHE.write() {
        let entry = cache.entry(key).or_insert_with(|| Arc::clone(&compiled));
        return Ok(Arc::clone(entry));
    }
    Ok(compiled)
}
