//! The combinator tree behind every extraction rule.
//!
//! A [`Pattern`] is a value: two trees built from the same sources compare
//! equal and hash equal, so rule tables can deduplicate them freely. Leaves
//! are cache-backed compiled regexes; inner nodes compose leaves with
//! boolean folds, ordered matching, negation and split-then-test.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use fintab_core::{FintabError, Result};
use regex::Regex;

use crate::cache;

/// Fold operator for multi-part combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOp {
    /// At least one part must match.
    Any,
    /// Every part must match.
    All,
}

/// A compiled regex leaf with value identity.
///
/// Equality and hashing use only the pattern source and flags; the compiled
/// instance is shared through the process-wide cache.
#[derive(Debug, Clone)]
pub struct CachedRegex {
    source: String,
    flags: String,
    regex: Arc<Regex>,
}

impl CachedRegex {
    /// Compiles `source` with default flags.
    ///
    /// # Errors
    ///
    /// [`FintabError::BadPattern`] when the source does not compile.
    pub fn new(source: &str) -> Result<Self> {
        Self::with_flags(source, "")
    }

    /// Compiles `source` with inline `flags` (e.g. `"i"`).
    ///
    /// # Errors
    ///
    /// [`FintabError::BadPattern`] when the source does not compile.
    pub fn with_flags(source: &str, flags: &str) -> Result<Self> {
        let regex = cache::compile(source, flags).map_err(|e| FintabError::BadPattern {
            pattern: source.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: source.to_string(),
            flags: flags.to_string(),
            regex,
        })
    }

    /// The original pattern source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The compiled regex.
    #[must_use]
    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

impl PartialEq for CachedRegex {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl Eq for CachedRegex {}

impl Hash for CachedRegex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.flags.hash(state);
    }
}

/// One match with offsets into the searched text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternMatch {
    /// Byte offset of the match start.
    pub start: usize,
    /// Byte offset one past the match end.
    pub end: usize,
    /// Matched text.
    pub text: String,
}

/// Captures of one leaf match, with named groups.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternCaptures {
    /// The whole match.
    pub whole: PatternMatch,
    /// Named groups that participated in the match.
    pub named: HashMap<String, PatternMatch>,
}

impl PatternCaptures {
    /// Text of a named group, if it participated.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&PatternMatch> {
        self.named.get(name)
    }
}

/// A composable predicate over text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// A single compiled regex.
    Regex(CachedRegex),
    /// Ordered list; first match across the list wins, `finditer`/`sub`/
    /// `split` chain across all members.
    Collection(Vec<Pattern>),
    /// Boolean fold over component searches.
    Multi {
        /// Fold operator.
        op: MatchOp,
        /// Component patterns.
        parts: Vec<Pattern>,
    },
    /// First component that matches wins.
    First(Vec<Pattern>),
    /// `accept` must match and `reject` must not.
    Neglect {
        /// Positive condition.
        accept: Box<Pattern>,
        /// Negative condition, tested on the whole text.
        reject: Box<Pattern>,
    },
    /// Split by `separator`, then fold `pattern` over the pieces.
    SplitBefore {
        /// Predicate applied to each piece.
        pattern: Box<Pattern>,
        /// Piece separator.
        separator: CachedRegex,
        /// Fold operator over the pieces.
        op: MatchOp,
    },
    /// Components must match left-to-right, each strictly after the
    /// previous match's end, within the text after stripping `ignore`.
    Position {
        /// Ordered components.
        parts: Vec<Pattern>,
        /// Optional stripped-out noise.
        ignore: Option<CachedRegex>,
    },
}

/// Sources accepted wherever a pattern is expected: an existing tree, a raw
/// pattern string (auto-compiled), or a compiled leaf.
pub trait IntoPattern {
    /// Converts the source into a [`Pattern`].
    ///
    /// # Errors
    ///
    /// [`FintabError::BadPattern`] for uncompilable raw strings.
    fn into_pattern(self) -> Result<Pattern>;
}

impl IntoPattern for Pattern {
    fn into_pattern(self) -> Result<Pattern> {
        Ok(self)
    }
}

impl IntoPattern for CachedRegex {
    fn into_pattern(self) -> Result<Pattern> {
        Ok(Pattern::Regex(self))
    }
}

impl IntoPattern for &str {
    fn into_pattern(self) -> Result<Pattern> {
        Ok(Pattern::Regex(CachedRegex::new(self)?))
    }
}

impl IntoPattern for String {
    fn into_pattern(self) -> Result<Pattern> {
        self.as_str().into_pattern()
    }
}

impl IntoPattern for &String {
    fn into_pattern(self) -> Result<Pattern> {
        self.as_str().into_pattern()
    }
}

fn into_patterns<I, P>(parts: I) -> Result<Vec<Pattern>>
where
    I: IntoIterator<Item = P>,
    P: IntoPattern,
{
    parts.into_iter().map(IntoPattern::into_pattern).collect()
}

impl Pattern {
    /// Builds a single-regex leaf.
    ///
    /// # Errors
    ///
    /// [`FintabError::BadPattern`] when `source` does not compile.
    pub fn regex(source: &str) -> Result<Self> {
        Ok(Self::Regex(CachedRegex::new(source)?))
    }

    /// Builds a single-regex leaf with inline flags.
    ///
    /// # Errors
    ///
    /// [`FintabError::BadPattern`] when `source` does not compile.
    pub fn regex_with_flags(source: &str, flags: &str) -> Result<Self> {
        Ok(Self::Regex(CachedRegex::with_flags(source, flags)?))
    }

    /// Builds an ordered collection.
    ///
    /// # Errors
    ///
    /// [`FintabError::BadPattern`] for any uncompilable member.
    pub fn collection<I, P>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: IntoPattern,
    {
        Ok(Self::Collection(into_patterns(parts)?))
    }

    /// All parts must match.
    ///
    /// # Errors
    ///
    /// [`FintabError::BadPattern`] for any uncompilable member.
    pub fn all<I, P>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: IntoPattern,
    {
        Ok(Self::Multi {
            op: MatchOp::All,
            parts: into_patterns(parts)?,
        })
    }

    /// At least one part must match.
    ///
    /// # Errors
    ///
    /// [`FintabError::BadPattern`] for any uncompilable member.
    pub fn any<I, P>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: IntoPattern,
    {
        Ok(Self::Multi {
            op: MatchOp::Any,
            parts: into_patterns(parts)?,
        })
    }

    /// First part that matches wins.
    ///
    /// # Errors
    ///
    /// [`FintabError::BadPattern`] for any uncompilable member.
    pub fn first<I, P>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: IntoPattern,
    {
        Ok(Self::First(into_patterns(parts)?))
    }

    /// `accept` must match and `reject` must not.
    ///
    /// # Errors
    ///
    /// [`FintabError::BadPattern`] for uncompilable sources.
    pub fn neglect<A, R>(accept: A, reject: R) -> Result<Self>
    where
        A: IntoPattern,
        R: IntoPattern,
    {
        Ok(Self::Neglect {
            accept: Box::new(accept.into_pattern()?),
            reject: Box::new(reject.into_pattern()?),
        })
    }

    /// Split by `separator`, then fold `pattern` over the pieces.
    ///
    /// # Errors
    ///
    /// [`FintabError::BadPattern`] for uncompilable sources.
    pub fn split_before<P>(pattern: P, separator: &str, op: MatchOp) -> Result<Self>
    where
        P: IntoPattern,
    {
        Ok(Self::SplitBefore {
            pattern: Box::new(pattern.into_pattern()?),
            separator: CachedRegex::new(separator)?,
            op,
        })
    }

    /// Components must match in order; `ignore` is stripped first.
    ///
    /// # Errors
    ///
    /// [`FintabError::BadPattern`] for uncompilable sources.
    pub fn position<I, P>(parts: I, ignore: Option<&str>) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: IntoPattern,
    {
        Ok(Self::Position {
            parts: into_patterns(parts)?,
            ignore: ignore.map(CachedRegex::new).transpose()?,
        })
    }

    /// True when the pattern matches anywhere in `text`.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Regex(re) => re.regex().is_match(text),
            Self::Collection(parts) | Self::First(parts) => {
                parts.iter().any(|p| p.is_match(text))
            }
            Self::Multi { op, parts } => fold_parts(*op, parts, |p| p.is_match(text)),
            Self::Neglect { accept, reject } => accept.is_match(text) && !reject.is_match(text),
            Self::SplitBefore {
                pattern,
                separator,
                op,
            } => {
                let pieces = split_with_offsets(separator.regex(), text);
                match op {
                    MatchOp::Any => pieces.iter().any(|(_, piece)| pattern.is_match(piece)),
                    MatchOp::All => {
                        !pieces.is_empty()
                            && pieces.iter().all(|(_, piece)| pattern.is_match(piece))
                    }
                }
            }
            Self::Position { .. } => self.search(text).is_some(),
        }
    }

    /// First informative match in `text`.
    ///
    /// For boolean folds (`all`) the returned match is the first
    /// component's; callers that only need the truth value should use
    /// [`Pattern::is_match`]. For [`Pattern::Position`] the offsets refer
    /// to the ignore-stripped text.
    #[must_use]
    pub fn search(&self, text: &str) -> Option<PatternMatch> {
        self.search_in(text, 0, text.len())
    }

    /// [`Pattern::search`] restricted to `text[pos..endpos]`, offsets
    /// rebased to the full text.
    #[must_use]
    pub fn search_in(&self, text: &str, pos: usize, endpos: usize) -> Option<PatternMatch> {
        let (pos, endpos) = clamp_span(text, pos, endpos);
        let window = &text[pos..endpos];
        let rebase = |m: PatternMatch| PatternMatch {
            start: m.start + pos,
            end: m.end + pos,
            text: m.text,
        };
        match self {
            Self::Regex(re) => re.regex().find(window).map(|m| {
                rebase(PatternMatch {
                    start: m.start(),
                    end: m.end(),
                    text: m.as_str().to_string(),
                })
            }),
            Self::Collection(parts) | Self::First(parts) => {
                parts.iter().find_map(|p| p.search(window)).map(rebase)
            }
            Self::Multi { op, parts } => match op {
                MatchOp::Any => parts.iter().find_map(|p| p.search(window)).map(rebase),
                MatchOp::All => {
                    if parts.iter().all(|p| p.is_match(window)) {
                        parts.first().and_then(|p| p.search(window)).map(rebase)
                    } else {
                        None
                    }
                }
            },
            Self::Neglect { accept, reject } => {
                if reject.is_match(window) {
                    None
                } else {
                    accept.search(window).map(rebase)
                }
            }
            Self::SplitBefore {
                pattern,
                separator,
                op,
            } => {
                let pieces = split_with_offsets(separator.regex(), window);
                match op {
                    MatchOp::Any => pieces.iter().find_map(|(off, piece)| {
                        pattern.search(piece).map(|m| {
                            rebase(PatternMatch {
                                start: m.start + off,
                                end: m.end + off,
                                text: m.text,
                            })
                        })
                    }),
                    MatchOp::All => {
                        if !pieces.is_empty()
                            && pieces.iter().all(|(_, piece)| pattern.is_match(piece))
                        {
                            pieces.first().and_then(|(off, piece)| {
                                pattern.search(piece).map(|m| {
                                    rebase(PatternMatch {
                                        start: m.start + off,
                                        end: m.end + off,
                                        text: m.text,
                                    })
                                })
                            })
                        } else {
                            None
                        }
                    }
                }
            }
            Self::Position { parts, ignore } => {
                let stripped = match ignore {
                    Some(re) => re.regex().replace_all(window, "").into_owned(),
                    None => window.to_string(),
                };
                let mut cursor = 0usize;
                let mut last: Option<PatternMatch> = None;
                for part in parts {
                    let m = part
                        .search_in(&stripped, cursor, stripped.len())
                        .filter(|m| m.end > m.start)?;
                    cursor = m.end;
                    last = Some(m);
                }
                last
            }
        }
    }

    /// All matches in `text`.
    ///
    /// Collections flatten matches across every member, member-major.
    /// Combinators without a natural iteration yield at most the
    /// [`Pattern::search`] result.
    #[must_use]
    pub fn finditer(&self, text: &str) -> Vec<PatternMatch> {
        match self {
            Self::Regex(re) => re
                .regex()
                .find_iter(text)
                .map(|m| PatternMatch {
                    start: m.start(),
                    end: m.end(),
                    text: m.as_str().to_string(),
                })
                .collect(),
            Self::Collection(parts) => parts.iter().flat_map(|p| p.finditer(text)).collect(),
            _ => self.search(text).into_iter().collect(),
        }
    }

    /// Applies every constituent regex's `replace_all` in sequence.
    ///
    /// A [`Pattern::Neglect`] whose `reject` matches leaves the text
    /// unchanged.
    #[must_use]
    pub fn sub(&self, text: &str, replacement: &str) -> String {
        match self {
            Self::Neglect { accept, reject } => {
                if reject.is_match(text) {
                    text.to_string()
                } else {
                    accept.sub(text, replacement)
                }
            }
            Self::SplitBefore { .. } | Self::Position { .. } => text.to_string(),
            _ => {
                let mut out = text.to_string();
                for re in self.leaf_regexes() {
                    out = re.regex().replace_all(&out, replacement).into_owned();
                }
                out
            }
        }
    }

    /// Splits `text`, chaining splits across every constituent regex.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        match self {
            Self::Neglect { accept, reject } => {
                if reject.is_match(text) {
                    vec![text.to_string()]
                } else {
                    accept.split(text)
                }
            }
            Self::SplitBefore { separator, .. } => separator
                .regex()
                .split(text)
                .map(str::to_string)
                .collect(),
            Self::Position { .. } => vec![text.to_string()],
            _ => {
                let mut pieces = vec![text.to_string()];
                for re in self.leaf_regexes() {
                    pieces = pieces
                        .iter()
                        .flat_map(|piece| {
                            re.regex().split(piece).map(str::to_string).collect::<Vec<_>>()
                        })
                        .collect();
                }
                pieces
            }
        }
    }

    /// First match with named-group captures, for `dst`-style extraction.
    #[must_use]
    pub fn search_captures(&self, text: &str) -> Option<PatternCaptures> {
        match self {
            Self::Regex(re) => {
                let caps = re.regex().captures(text)?;
                let whole = caps.get(0)?;
                let mut named = HashMap::new();
                for name in re.regex().capture_names().flatten() {
                    if let Some(g) = caps.name(name) {
                        named.insert(
                            name.to_string(),
                            PatternMatch {
                                start: g.start(),
                                end: g.end(),
                                text: g.as_str().to_string(),
                            },
                        );
                    }
                }
                Some(PatternCaptures {
                    whole: PatternMatch {
                        start: whole.start(),
                        end: whole.end(),
                        text: whole.as_str().to_string(),
                    },
                    named,
                })
            }
            Self::Collection(parts) | Self::First(parts) => {
                parts.iter().find_map(|p| p.search_captures(text))
            }
            Self::Multi { op, parts } => match op {
                MatchOp::Any => parts.iter().find_map(|p| p.search_captures(text)),
                MatchOp::All => {
                    if parts.iter().all(|p| p.is_match(text)) {
                        parts.iter().find_map(|p| p.search_captures(text))
                    } else {
                        None
                    }
                }
            },
            Self::Neglect { accept, reject } => {
                if reject.is_match(text) {
                    None
                } else {
                    accept.search_captures(text)
                }
            }
            Self::SplitBefore {
                pattern, separator, ..
            } => split_with_offsets(separator.regex(), text)
                .iter()
                .find_map(|(_, piece)| pattern.search_captures(piece)),
            Self::Position { .. } => None,
        }
    }

    /// Flattens the tree into every regex source it contains.
    ///
    /// Used for debugging rule tables; a tree that cannot be flattened is a
    /// configuration bug upstream, not a runtime condition.
    #[must_use]
    pub fn all_patterns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_patterns(&mut out);
        out
    }

    fn collect_patterns(&self, out: &mut Vec<String>) {
        match self {
            Self::Regex(re) => out.push(re.source().to_string()),
            Self::Collection(parts) | Self::First(parts) | Self::Multi { parts, .. } => {
                for p in parts {
                    p.collect_patterns(out);
                }
            }
            Self::Neglect { accept, reject } => {
                accept.collect_patterns(out);
                reject.collect_patterns(out);
            }
            Self::SplitBefore {
                pattern, separator, ..
            } => {
                pattern.collect_patterns(out);
                out.push(separator.source().to_string());
            }
            Self::Position { parts, ignore } => {
                for p in parts {
                    p.collect_patterns(out);
                }
                if let Some(re) = ignore {
                    out.push(re.source().to_string());
                }
            }
        }
    }

    fn leaf_regexes(&self) -> Vec<&CachedRegex> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a CachedRegex>) {
        match self {
            Self::Regex(re) => out.push(re),
            Self::Collection(parts) | Self::First(parts) | Self::Multi { parts, .. } => {
                for p in parts {
                    p.collect_leaves(out);
                }
            }
            Self::Neglect { accept, .. } => accept.collect_leaves(out),
            Self::SplitBefore { pattern, .. } => pattern.collect_leaves(out),
            Self::Position { parts, .. } => {
                for p in parts {
                    p.collect_leaves(out);
                }
            }
        }
    }
}

fn fold_parts<F>(op: MatchOp, parts: &[Pattern], mut f: F) -> bool
where
    F: FnMut(&Pattern) -> bool,
{
    match op {
        MatchOp::Any => parts.iter().any(|p| f(p)),
        MatchOp::All => !parts.is_empty() && parts.iter().all(|p| f(p)),
    }
}

/// Splits `text` by `separator`, yielding one `(byte_offset, piece)` per
/// separator cut.
fn split_with_offsets<'t>(separator: &Regex, text: &'t str) -> Vec<(usize, &'t str)> {
    let mut pieces = Vec::new();
    let mut last = 0usize;
    for m in separator.find_iter(text) {
        pieces.push((last, &text[last..m.start()]));
        last = m.end();
    }
    pieces.push((last, &text[last..]));
    pieces
}

/// Clamps `[pos, endpos)` into `text` on char boundaries.
fn clamp_span(text: &str, pos: usize, endpos: usize) -> (usize, usize) {
    let mut pos = pos.min(text.len());
    let mut endpos = endpos.min(text.len());
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    while endpos > 0 && !text.is_char_boundary(endpos) {
        endpos -= 1;
    }
    if endpos < pos {
        endpos = pos;
    }
    (pos, endpos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_first_match_wins() {
        let p = Pattern::collection([r"\d+", "[a-z]+"]).unwrap();
        let m = p.search("abc 123").unwrap();
        assert_eq!(m.text, "123");

        let m = Pattern::collection(["[a-z]+", r"\d+"])
            .unwrap()
            .search("abc 123")
            .unwrap();
        assert_eq!(m.text, "abc");
    }

    #[test]
    fn collection_finditer_flattens_member_major() {
        let p = Pattern::collection([r"\d", "[ab]"]).unwrap();
        let texts: Vec<_> = p.finditer("a1b2").iter().map(|m| m.text.clone()).collect();
        assert_eq!(texts, ["1", "2", "a", "b"]);
    }

    #[test]
    fn multi_all_is_conjunction() {
        let p = Pattern::all([r"\d", "[a-z]"]).unwrap();
        assert!(p.is_match("a1"));
        assert!(!p.is_match("abc"));
        assert!(!p.is_match("123"));
    }

    #[test]
    fn multi_any_is_disjunction() {
        let p = Pattern::any([r"\d", "[a-z]"]).unwrap();
        assert!(p.is_match("abc"));
        assert!(p.is_match("123"));
        assert!(!p.is_match("!!!"));
    }

    #[test]
    fn neglect_excludes_rejected() {
        let p = Pattern::neglect(r"\d+", "元").unwrap();
        assert!(p.is_match("共 100 份"));
        assert!(!p.is_match("共 100 元"));
    }

    #[test]
    fn split_before_match_any() {
        let p = Pattern::split_before("^C", "[,;] ?", MatchOp::Any).unwrap();
        let m = p.search("A:1, B:2; C:3").unwrap();
        assert_eq!(m.text, "C");
        // Offsets are rebased into the original text.
        assert_eq!(&"A:1, B:2; C:3"[m.start..m.end], "C");
    }

    #[test]
    fn split_before_match_all() {
        let p = Pattern::split_before(r"\d", ",", MatchOp::All).unwrap();
        assert!(p.is_match("a1,b2,c3"));
        assert!(!p.is_match("a1,bx,c3"));
    }

    #[test]
    fn position_requires_order() {
        let p = Pattern::position(["甲", "乙"], None).unwrap();
        assert!(p.is_match("甲方与乙方"));
        assert!(!p.is_match("乙方与甲方"));
    }

    #[test]
    fn position_strips_ignore() {
        let p = Pattern::position(["ab", "cd"], Some(r"\s+")).unwrap();
        assert!(p.is_match("a b c d"));
    }

    #[test]
    fn position_rejects_overlapping_order() {
        // Second component must start strictly after the first match ends.
        let p = Pattern::position(["abc", "bcd"], None).unwrap();
        assert!(!p.is_match("abcd"));
    }

    #[test]
    fn sub_chains_over_collection() {
        let p = Pattern::collection([r"\d+", ","]).unwrap();
        assert_eq!(p.sub("1,000 股", ""), " 股");
    }

    #[test]
    fn split_chains_over_collection() {
        let p = Pattern::collection([";", ","]).unwrap();
        assert_eq!(p.split("a;b,c"), ["a", "b", "c"]);
    }

    #[test]
    fn captures_expose_named_groups() {
        let p = Pattern::regex(r"金额[:：](?P<dst>[\d,]+)元").unwrap();
        let caps = p.search_captures("金额：1,000元").unwrap();
        assert_eq!(caps.group("dst").unwrap().text, "1,000");
    }

    #[test]
    fn value_equality_and_hash() {
        use std::collections::hash_map::DefaultHasher;

        let a = Pattern::neglect(r"\d+", "元").unwrap();
        let b = Pattern::neglect(r"\d+", "元").unwrap();
        assert_eq!(a, b);

        let mut ha = DefaultHasher::new();
        let mut hb = DefaultHasher::new();
        a.hash(&mut ha);
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn all_patterns_flattens_the_tree() {
        let p = Pattern::neglect(Pattern::collection(["a", "b"]).unwrap(), "c").unwrap();
        assert_eq!(p.all_patterns(), ["a", "b", "c"]);
    }

    #[test]
    fn bad_pattern_is_fatal_at_build() {
        assert!(Pattern::regex("(unclosed").is_err());
    }

    #[test]
    fn search_in_restricts_window() {
        let p = Pattern::regex(r"\d+").unwrap();
        let text = "12 and 34";
        let m = p.search_in(text, 3, text.len()).unwrap();
        assert_eq!(m.text, "34");
        assert_eq!(m.start, 7);
    }
}
