//! `ComponentSignature` — a dynamically sized bitset keying archetypes.
//!
//! The word-vector representation is grounded on
//! `saptak7777-Archetype-ECS/src/bitset.rs`'s `BitSet`; the pad-on-compare
//! equality and hashing are this crate's answer to the open question in
//! `SPEC_FULL.md` §9 ("Signature sizing and equality") — option (b), which
//! the spec recommends.

use std::hash::{Hash, Hasher};

use crate::registry::ComponentTypeId;

/// A bitset over `ComponentTypeId`s. Bit *i* is set iff the archetype that
/// owns this signature contains component type *i*. Grows on `with`; never
/// preallocated to a fixed width.
#[derive(Debug, Clone, Default)]
pub struct ComponentSignature {
    words: Vec<u64>,
    count: u32,
}

impl ComponentSignature {
    pub fn empty() -> Self {
        Self {
            words: Vec::new(),
            count: 0,
        }
    }

    /// Returns a new signature with `id` set. `self` is left unmodified —
    /// signatures are immutable once constructed.
    pub fn with(&self, id: ComponentTypeId) -> Self {
        if self.contains(id) {
            return self.clone();
        }
        let mut words = self.words.clone();
        let word_idx = id.index() / 64;
        let bit_idx = id.index() % 64;
        if word_idx >= words.len() {
            words.resize(word_idx + 1, 0);
        }
        words[word_idx] |= 1u64 << bit_idx;
        Self {
            words,
            count: self.count + 1,
        }
    }

    /// Returns a new signature with `id` cleared.
    pub fn without(&self, id: ComponentTypeId) -> Self {
        if !self.contains(id) {
            return self.clone();
        }
        let mut words = self.words.clone();
        let word_idx = id.index() / 64;
        let bit_idx = id.index() % 64;
        words[word_idx] &= !(1u64 << bit_idx);
        Self {
            words,
            count: self.count - 1,
        }
    }

    pub fn contains(&self, id: ComponentTypeId) -> bool {
        let word_idx = id.index() / 64;
        let bit_idx = id.index() % 64;
        self.words
            .get(word_idx)
            .map(|w| (w & (1u64 << bit_idx)) != 0)
            .unwrap_or(false)
    }

    /// Number of set bits (cached at construction time, not recomputed).
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Iterate set component ids in ascending order.
    pub fn iter_ids(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.words.iter().enumerate().flat_map(|(word_idx, &word)| {
            let mut remaining = word;
            std::iter::from_fn(move || {
                if remaining == 0 {
                    None
                } else {
                    let bit = remaining.trailing_zeros();
                    remaining &= !(1u64 << bit);
                    Some(ComponentTypeId((word_idx * 64 + bit as usize) as u32))
                }
            })
        })
    }

    /// True iff `self` contains every id that `other` contains (used by
    /// `ArchetypeIndex::query` for "archetype has at least these components").
    pub fn is_superset_of(&self, other: &ComponentSignature) -> bool {
        let len = self.words.len().max(other.words.len());
        for i in 0..len {
            let mine = self.words.get(i).copied().unwrap_or(0);
            let theirs = other.words.get(i).copied().unwrap_or(0);
            if theirs & !mine != 0 {
                return false;
            }
        }
        true
    }

    /// Word-wise comparison, padding the shorter signature's trailing words
    /// with zero (§9 option (b)). Two signatures built at different registry
    /// epochs compare equal as long as they contain the same ids.
    fn words_equal(&self, other: &Self) -> bool {
        let len = self.words.len().max(other.words.len());
        for i in 0..len {
            let mine = self.words.get(i).copied().unwrap_or(0);
            let theirs = other.words.get(i).copied().unwrap_or(0);
            if mine != theirs {
                return false;
            }
        }
        true
    }

    /// Highest word index that has any bit set, or `None` if empty. Used to
    /// build a canonical, trim-trailing-zero-words slice for hashing so that
    /// `equals` and `hash` agree across differing raw word-lengths.
    fn trimmed_len(&self) -> usize {
        self.words
            .iter()
            .rposition(|&w| w != 0)
            .map(|idx| idx + 1)
            .unwrap_or(0)
    }
}

impl PartialEq for ComponentSignature {
    fn eq(&self, other: &Self) -> bool {
        self.words_equal(other)
    }
}

impl Eq for ComponentSignature {}

impl Hash for ComponentSignature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let len = self.trimmed_len();
        self.words[..len].hash(state);
    }
}
