//! Vocabulary transition index.
//!
//! For each DFA state, the index answers "which vocabulary tokens are legal
//! here, and where does each one lead". A token is legal from a state when
//! every byte of its text has a live DFA transition; most (state, token)
//! pairs fail this, which is expected rather than an error. Per-state
//! results are computed with one trie traversal so tokens sharing a prefix
//! are walked once, not once per token.
//!
//! Two construction strategies produce identical tables and differ only in
//! when the per-state cost is paid: eager fills every state at build time
//! (in parallel), lazy fills a state on its first query and caches the entry
//! permanently. Each state's entry is written at most once; concurrent first
//! visitors block on the single in-flight computation.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use stencil_core::{GuideError, Result, TokenBitmask, TokenVocab};

use crate::dfa::ByteDfa;
use crate::trie::TokenTrie;

/// When per-state allow-sets are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexStrategy {
    /// All reachable states computed before the index is first queried.
    #[default]
    Eager,
    /// Each state computed on first visit, cached permanently.
    Lazy,
}

/// Build-time configuration for a transition index.
#[derive(Debug, Clone, Default)]
pub struct IndexConfig {
    pub strategy: IndexStrategy,
    /// Abort construction with `CompilationTimeout` past this budget. Covers
    /// the build phase only; lazy first-visit fills are query-path work and
    /// are never cancelled.
    pub build_budget: Option<Duration>,
}

/// The allow-set of one DFA state: legal token ids (sorted), each token's
/// target state, and the packed mask for logit filtering.
#[derive(Debug)]
pub struct StateTokens {
    allowed: Vec<u32>,
    next: FxHashMap<u32, u32>,
    mask: TokenBitmask,
}

impl StateTokens {
    /// Allowed token ids in ascending order. May legitimately be empty when
    /// the pattern has no valid continuation from this state.
    pub fn allowed(&self) -> &[u32] {
        &self.allowed
    }

    pub fn contains(&self, token_id: u32) -> bool {
        self.next.contains_key(&token_id)
    }

    /// Target state for an allowed token, `None` if disallowed.
    pub fn next_state(&self, token_id: u32) -> Option<u32> {
        self.next.get(&token_id).copied()
    }

    pub fn mask(&self) -> &TokenBitmask {
        &self.mask
    }
}

/// Precomputed per-state token tables for one (pattern DFA, vocabulary)
/// pair. Immutable once a state's entry exists; cheap to share across any
/// number of guides.
pub struct TransitionIndex {
    dfa: Arc<dyn ByteDfa>,
    trie: TokenTrie,
    vocab: Arc<TokenVocab>,
    /// One write-once slot per DFA state, indexed by state id.
    entries: Vec<OnceLock<Arc<StateTokens>>>,
}

impl std::fmt::Debug for TransitionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionIndex")
            .field("states", &self.entries.len())
            .field("vocab_size", &self.vocab.vocab_size())
            .finish_non_exhaustive()
    }
}

impl TransitionIndex {
    /// Build an index over `dfa` for `vocab`.
    pub fn build(
        dfa: Arc<dyn ByteDfa>,
        vocab: Arc<TokenVocab>,
        config: &IndexConfig,
    ) -> Result<Self> {
        let started = Instant::now();
        let trie = TokenTrie::build(&vocab);
        check_deadline(started, config.build_budget)?;

        let entries = (0..dfa.state_count()).map(|_| OnceLock::new()).collect();
        let index = Self {
            dfa,
            trie,
            vocab,
            entries,
        };

        if config.strategy == IndexStrategy::Eager {
            index.populate_all(started, config.build_budget)?;
        }

        tracing::debug!(
            states = index.entries.len(),
            vocab = index.vocab.vocab_size(),
            strategy = ?config.strategy,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built transition index"
        );
        Ok(index)
    }

    /// Fill every state's entry. Per-state work is independent; the
    /// write-once slots are the single aggregation point.
    fn populate_all(&self, started: Instant, budget: Option<Duration>) -> Result<()> {
        (0..self.entries.len() as u32)
            .into_par_iter()
            .try_for_each(|state| {
                check_deadline(started, budget)?;
                let tokens = compute_state_tokens(&*self.dfa, &self.trie, &self.vocab, state);
                let _ = self.entries[state as usize].set(Arc::new(tokens));
                Ok(())
            })
    }

    pub fn initial_state(&self) -> u32 {
        self.dfa.initial_state()
    }

    pub fn state_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_final_state(&self, state: u32) -> bool {
        self.dfa.is_final_state(state)
    }

    pub fn eos_token_id(&self) -> u32 {
        self.vocab.eos_token_id()
    }

    pub fn vocab(&self) -> &Arc<TokenVocab> {
        &self.vocab
    }

    /// The allow-set for `state`. Under the lazy strategy the first call for
    /// a state computes its entry; later calls (from any guide sharing this
    /// index) are lookups. `InvalidState` iff `state` is not a state of the
    /// backing DFA.
    pub fn allowed_tokens(&self, state: u32) -> Result<Arc<StateTokens>> {
        let slot = self
            .entries
            .get(state as usize)
            .ok_or(GuideError::InvalidState(state))?;
        let entry = slot.get_or_init(|| {
            Arc::new(compute_state_tokens(
                &*self.dfa, &self.trie, &self.vocab, state,
            ))
        });
        Ok(entry.clone())
    }

    /// Target state for consuming `token_id` at `state`. `InvalidTransition`
    /// iff the token is not in the state's allow-set; callers must not
    /// advance a guide on a disallowed token.
    pub fn next_state(&self, state: u32, token_id: u32) -> Result<u32> {
        self.allowed_tokens(state)?
            .next_state(token_id)
            .ok_or(GuideError::InvalidTransition { state, token_id })
    }
}

/// Walk the token trie from `state`, pruning any branch whose byte has no
/// live DFA transition. Every token id reached with all bytes consumed is
/// allowed; its target is the DFA state at its terminal trie node. EOS is
/// allowed exactly at accepting states and is terminal (modeled as a
/// self-transition).
fn compute_state_tokens(
    dfa: &dyn ByteDfa,
    trie: &TokenTrie,
    vocab: &TokenVocab,
    state: u32,
) -> StateTokens {
    let mut allowed = Vec::new();
    let mut next = FxHashMap::default();

    let mut stack = vec![(TokenTrie::ROOT, state)];
    while let Some((node, dfa_state)) = stack.pop() {
        for &token_id in trie.tokens_at(node) {
            allowed.push(token_id);
            next.insert(token_id, dfa_state);
        }
        for (byte, child) in trie.children(node) {
            if let Some(target) = dfa.next_state(dfa_state, byte) {
                stack.push((child, target));
            }
        }
    }

    if dfa.is_final_state(state) {
        let eos = vocab.eos_token_id();
        allowed.push(eos);
        next.insert(eos, state);
    }

    allowed.sort_unstable();
    let mut mask = TokenBitmask::zeros(vocab.vocab_size());
    for &token_id in &allowed {
        mask.set(token_id);
    }

    StateTokens {
        allowed,
        next,
        mask,
    }
}

fn check_deadline(started: Instant, budget: Option<Duration>) -> Result<()> {
    match budget {
        Some(budget) if started.elapsed() > budget => {
            Err(GuideError::CompilationTimeout { budget })
        }
        _ => Ok(()),
    }
}
