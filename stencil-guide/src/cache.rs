//! Compilation cache.
//!
//! Index construction is the expensive step, so built indexes are memoized
//! per (normalized pattern, vocabulary fingerprint). The cache is an
//! explicit, caller-owned collaborator with no implicit eviction: entries
//! live until `clear`/`remove`. At most one build runs per key; concurrent
//! callers for an in-flight key block on that build and observe its result,
//! success or failure. A failed build never leaves a poisoned entry behind —
//! the key is evicted and the next request retries.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;

use stencil_core::{GuideError, Result, TokenVocab};

use crate::index::TransitionIndex;

/// Semantic cache key: content, not object identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    pattern: String,
    vocab_fingerprint: u64,
}

impl CacheKey {
    fn new(pattern: &str, vocab: &TokenVocab) -> Self {
        Self {
            pattern: pattern.trim().to_string(),
            vocab_fingerprint: vocab.fingerprint(),
        }
    }
}

/// Write-once build outcome shared by every caller on one key.
type Slot = Arc<OnceLock<std::result::Result<Arc<TransitionIndex>, Arc<GuideError>>>>;

#[derive(Default)]
pub struct CompilationCache {
    slots: DashMap<CacheKey, Slot, FxBuildHasher>,
}

impl CompilationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached index for (pattern, vocabulary), building it with
    /// `build_fn` on a miss. The slot map's lock is held only to register
    /// the slot; the build itself runs under the slot's write-once cell, so
    /// builds for different keys proceed concurrently while same-key callers
    /// serialize onto one build.
    pub fn get_or_build<F>(
        &self,
        pattern: &str,
        vocab: &TokenVocab,
        build_fn: F,
    ) -> Result<Arc<TransitionIndex>>
    where
        F: FnOnce() -> Result<Arc<TransitionIndex>>,
    {
        let key = CacheKey::new(pattern, vocab);
        let slot: Slot = self.slots.entry(key.clone()).or_default().clone();

        let mut built_here = false;
        let outcome = slot.get_or_init(|| {
            built_here = true;
            build_fn().map_err(Arc::new)
        });
        tracing::debug!(
            pattern_len = key.pattern.len(),
            hit = !built_here,
            "compilation cache lookup"
        );

        match outcome {
            Ok(index) => Ok(index.clone()),
            Err(err) => {
                // Evict the failed slot (unless another caller already
                // replaced it) so the key is retryable.
                self.slots
                    .remove_if(&key, |_, current| Arc::ptr_eq(current, &slot));
                Err(err.duplicate())
            }
        }
    }

    /// Drop one entry. In-flight builds for the key are unaffected; their
    /// callers still observe the build's outcome through their slot.
    pub fn remove(&self, pattern: &str, vocab: &TokenVocab) {
        self.slots.remove(&CacheKey::new(pattern, vocab));
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
