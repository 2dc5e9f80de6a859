//! Process-global string interner backing [`Name`].
//!
//! Strings are spread over [`Name::NUM_SHARDS`] shards, each behind its own
//! `RwLock`, so lookups of already interned names only take a read lock.
//! Interned text is leaked: a `Name` resolves to `&'static str`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::Name;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InternError {
    #[error("interner shard {shard} is full: {count} strings, limit {}", Name::MAX_LOCAL)]
    ShardOverflow { shard: usize, count: usize },
}

#[derive(Default)]
struct Shard {
    index: FxHashMap<&'static str, u32>,
    texts: Vec<&'static str>,
}

impl Shard {
    fn find(&self, s: &str) -> Option<u32> {
        self.index.get(s).copied()
    }

    fn insert(&mut self, shard: usize, s: &str) -> Result<u32, InternError> {
        let local = u32::try_from(self.texts.len())
            .ok()
            .filter(|&local| local <= Name::MAX_LOCAL)
            .ok_or(InternError::ShardOverflow {
                shard,
                count: self.texts.len(),
            })?;
        let text: &'static str = Box::leak(Box::from(s));
        self.texts.push(text);
        self.index.insert(text, local);
        Ok(local)
    }
}

/// Sharded interner; use [`StringInterner::global`].
pub struct StringInterner {
    shards: [RwLock<Shard>; Name::NUM_SHARDS],
    count: AtomicUsize,
}

static GLOBAL: OnceLock<StringInterner> = OnceLock::new();

impl StringInterner {
    fn new() -> Self {
        let shards: [RwLock<Shard>; Name::NUM_SHARDS] = Default::default();
        // `Name::EMPTY` is local 0 of shard 0.
        shards[0].write().texts.push("");
        shards[0].write().index.insert("", 0);
        StringInterner {
            shards,
            count: AtomicUsize::new(1),
        }
    }

    pub fn global() -> &'static StringInterner {
        GLOBAL.get_or_init(StringInterner::new)
    }

    /// Shard 0 only ever holds the empty string.
    fn shard_of(s: &str) -> usize {
        if s.is_empty() {
            return 0;
        }
        let hash = s
            .bytes()
            .take(8)
            .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(u32::from(b)));
        hash as usize % (Name::NUM_SHARDS - 1) + 1
    }

    pub fn try_intern(&self, s: &str) -> Result<Name, InternError> {
        let shard = Self::shard_of(s);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "shard is below NUM_SHARDS (16)"
        )]
        let tag = shard as u32;
        let slot = &self.shards[shard];

        if let Some(local) = slot.read().find(s) {
            return Ok(Name::new(tag, local));
        }
        let mut guard = slot.write();
        let local = match guard.find(s) {
            Some(local) => local,
            None => {
                let local = guard.insert(shard, s)?;
                self.count.fetch_add(1, Ordering::Relaxed);
                local
            }
        };
        Ok(Name::new(tag, local))
    }

    /// # Panics
    /// Panics if a shard runs out of its 28-bit index space.
    pub fn intern(&self, s: &str) -> Name {
        self.try_intern(s).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn lookup(&self, name: Name) -> &'static str {
        self.shards[name.shard()]
            .read()
            .texts
            .get(name.local())
            .copied()
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Never empty: the empty string is always interned.
    pub fn is_empty(&self) -> bool {
        false
    }
}
