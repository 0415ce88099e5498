//! Read-only queries against the character dataset.
//!
//! Every query is infallible from the caller's point of view: a miss and a
//! storage failure both come back as an empty result (or, for `simplify`, the
//! input unchanged). Backends log the failure before returning.

use ahash::AHashMap;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::utils::{char_len, split_chars, split_list};

/// Code whose candidate string holds the open/close punctuation pairs.
pub const PUNCTUATION_PAIR_CODE: u32 = 1;

/// Base code of the quick-pick sets: 1000 is the generic set, 1000+d the set
/// for a single typed digit d.
pub const QUICK_PICK_BASE: u32 = 1000;

/// The four dataset queries the state machine depends on.
pub trait Lookup: Send + Sync {
    /// Candidates for a numeric code, one entry per character.
    fn candidates_for_code(&self, code: u32) -> Vec<String>;

    /// Characters commonly following `ch`.
    fn related_for(&self, ch: &str) -> Vec<String>;

    /// Characters sharing the primary reading of `ch`. Entries that also share
    /// the secondary reading come first. More than one input character always
    /// yields an empty result.
    fn homophones_for(&self, ch: &str) -> Vec<String>;

    /// Map every character through the traditional→simplified table.
    fn simplify(&self, text: &str) -> String;
}

impl<L: Lookup + ?Sized> Lookup for Arc<L> {
    fn candidates_for_code(&self, code: u32) -> Vec<String> {
        (**self).candidates_for_code(code)
    }
    fn related_for(&self, ch: &str) -> Vec<String> {
        (**self).related_for(ch)
    }
    fn homophones_for(&self, ch: &str) -> Vec<String> {
        (**self).homophones_for(ch)
    }
    fn simplify(&self, text: &str) -> String {
        (**self).simplify(text)
    }
}

/// Order homophone matches: same secondary reading first, then the rest, each
/// group in dataset order, without duplicates.
pub(crate) fn order_homophones<'a, I>(secondary: &str, siblings: I) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut first = Vec::new();
    let mut rest = Vec::new();
    for (ch, sibling_secondary) in siblings {
        if first.iter().chain(rest.iter()).any(|c: &String| c == ch) {
            continue;
        }
        if sibling_secondary == secondary {
            first.push(ch.to_string());
        } else {
            rest.push(ch.to_string());
        }
    }
    first.extend(rest);
    first
}

/// In-memory lookup tables.
///
/// Used by tests and by the TSV loader; `RedbLookup` is the persistent
/// counterpart with the same semantics.
#[derive(Debug, Clone, Default)]
pub struct TableLookup {
    pub(crate) codes: AHashMap<u32, String>,
    pub(crate) related: AHashMap<String, String>,
    pub(crate) readings: AHashMap<String, (String, String)>,
    pub(crate) by_reading: AHashMap<String, Vec<String>>,
    pub(crate) simplified: AHashMap<String, String>,
}

impl TableLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the joined candidate string for a code (replaces any previous one).
    pub fn insert_code(&mut self, code: u32, characters: &str) {
        self.codes.insert(code, characters.to_string());
    }

    /// Store the space-delimited related list for a character.
    pub fn insert_related(&mut self, ch: &str, list: &str) {
        self.related.insert(ch.to_string(), list.to_string());
    }

    /// Record the primary and secondary reading of a character.
    pub fn insert_reading(&mut self, ch: &str, primary: &str, secondary: &str) {
        if let Some((old, _)) = self.readings.get(ch) {
            if let Some(list) = self.by_reading.get_mut(old) {
                list.retain(|c| c != ch);
            }
        }
        self.readings
            .insert(ch.to_string(), (primary.to_string(), secondary.to_string()));
        self.by_reading
            .entry(primary.to_string())
            .or_default()
            .push(ch.to_string());
    }

    /// Record a traditional→simplified mapping.
    pub fn insert_simplified(&mut self, traditional: &str, simplified: &str) {
        self.simplified
            .insert(traditional.to_string(), simplified.to_string());
    }

    pub fn code_count(&self) -> usize {
        self.codes.len()
    }
}

impl Lookup for TableLookup {
    fn candidates_for_code(&self, code: u32) -> Vec<String> {
        match self.codes.get(&code) {
            Some(text) => split_chars(text),
            None => {
                debug!(code, "no candidates for code");
                Vec::new()
            }
        }
    }

    fn related_for(&self, ch: &str) -> Vec<String> {
        self.related
            .get(ch)
            .map(|list| split_list(list))
            .unwrap_or_default()
    }

    fn homophones_for(&self, ch: &str) -> Vec<String> {
        if char_len(ch) != 1 {
            return Vec::new();
        }
        let Some((primary, secondary)) = self.readings.get(ch) else {
            return Vec::new();
        };
        let siblings = self.by_reading.get(primary).into_iter().flatten().filter_map(|c| {
            self.readings
                .get(c)
                .map(|(_, sibling_secondary)| (c.as_str(), sibling_secondary.as_str()))
        });
        order_homophones(secondary, siblings)
    }

    fn simplify(&self, text: &str) -> String {
        split_chars(text)
            .into_iter()
            .map(|c| self.simplified.get(&c).cloned().unwrap_or(c))
            .collect()
    }
}

/// Caches code lookups in front of another backend.
///
/// Only `candidates_for_code` is cached: it is the query hit on every third
/// keystroke. The other queries go straight through.
pub struct LruLookup<L> {
    inner: L,
    cache: Mutex<LruCache<u32, Vec<String>>>,
}

impl<L: Lookup> LruLookup<L> {
    pub fn new(inner: L, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// Number of cached codes.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl<L: Lookup> Lookup for LruLookup<L> {
    fn candidates_for_code(&self, code: u32) -> Vec<String> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&code) {
                return hit.clone();
            }
        }
        let result = self.inner.candidates_for_code(code);
        // empty results are never cached
        if !result.is_empty() {
            if let Ok(mut cache) = self.cache.lock() {
                cache.put(code, result.clone());
            }
        }
        result
    }

    fn related_for(&self, ch: &str) -> Vec<String> {
        self.inner.related_for(ch)
    }

    fn homophones_for(&self, ch: &str) -> Vec<String> {
        self.inner.homophones_for(ch)
    }

    fn simplify(&self, text: &str) -> String {
        self.inner.simplify(text)
    }
}
