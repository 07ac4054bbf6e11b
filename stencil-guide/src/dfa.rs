//! Pattern-to-automaton compilation via `regex-automata` dense DFAs.
//!
//! A pattern compiles into a byte-level DFA: deterministic, anchored at the
//! start, minimized so equivalent patterns produce comparable state counts,
//! and bounded in size. States are renumbered into dense `u32` ids with the
//! start state at 0; the dead state is implicit (`next_state` returns `None`).

use std::collections::VecDeque;

use regex_automata::dfa::dense;
use regex_automata::dfa::Automaton;
use regex_automata::util::primitives::StateID;
use regex_automata::util::start;
use regex_automata::Anchored;
use rustc_hash::FxHashMap;

use stencil_core::{GuideError, Result};

/// Maximum allowed pattern length to prevent abuse.
const MAX_PATTERN_LEN: usize = 8192;
/// Maximum DFA size in bytes (10 MB).
const MAX_DFA_SIZE: usize = 10 * 1024 * 1024;

/// Byte-level deterministic automaton seam.
///
/// The transition indexer only needs this surface, so tests can drive it
/// with hand-built toy automata instead of compiled patterns.
pub trait ByteDfa: Send + Sync {
    /// The start state.
    fn initial_state(&self) -> u32;

    /// Transition on one byte. `None` means the dead/reject state.
    fn next_state(&self, state: u32, byte: u8) -> Option<u32>;

    /// Whether the input consumed so far is a complete match at `state`.
    fn is_final_state(&self, state: u32) -> bool;

    /// Number of live states. Valid state ids are `0..state_count`.
    fn state_count(&self) -> usize;

    /// Drive a byte sequence from `state`. `None` if any step hits the dead
    /// state.
    fn walk(&self, state: u32, bytes: &[u8]) -> Option<u32> {
        let mut current = state;
        for &byte in bytes {
            current = self.next_state(current, byte)?;
        }
        Some(current)
    }

    /// All accepting states.
    fn final_states(&self) -> Vec<u32> {
        (0..self.state_count() as u32)
            .filter(|&s| self.is_final_state(s))
            .collect()
    }
}

/// A byte-level DFA compiled from a regex pattern.
#[derive(Debug)]
pub struct PatternDfa {
    dfa: dense::DFA<Vec<u32>>,
    /// Dense id → backend StateID, in BFS discovery order (start first).
    state_map: Vec<StateID>,
    /// Backend StateID → dense id.
    state_ids: FxHashMap<StateID, u32>,
    /// accepting[s] is true when the bytes consumed to reach `s` form a
    /// complete match (resolved through the end-of-input transition, which
    /// also handles `$` anchors).
    accepting: Vec<bool>,
}

impl PatternDfa {
    /// Compile a regex pattern into a byte-level DFA.
    pub fn compile(pattern: &str) -> Result<Self> {
        if pattern.len() > MAX_PATTERN_LEN {
            return Err(GuideError::PatternSyntax(format!(
                "pattern too long ({} bytes, max {})",
                pattern.len(),
                MAX_PATTERN_LEN
            )));
        }

        // Anchored + minimized, with a size cap so hostile patterns cannot
        // exhaust memory during determinization. MatchKind::All keeps every
        // alternation branch alive: leftmost-first semantics would prune a
        // branch that extends an earlier one (e.g. `(a|ab)` rejecting "ab"),
        // and this DFA must recognize the full language of the pattern.
        let dfa = dense::Builder::new()
            .configure(
                dense::DFA::config()
                    .start_kind(regex_automata::dfa::StartKind::Anchored)
                    .match_kind(regex_automata::MatchKind::All)
                    .minimize(true)
                    .dfa_size_limit(Some(MAX_DFA_SIZE)),
            )
            .build(pattern)
            .map_err(|e| GuideError::PatternSyntax(e.to_string()))?;

        let start_config = start::Config::new().anchored(Anchored::Yes);
        let start_id = dfa
            .start_state(&start_config)
            .map_err(|e| GuideError::Internal(format!("no start state: {e}")))?;

        // Enumerate reachable states breadth-first so numbering is stable
        // for a given pattern and the start state is always 0. Dead and quit
        // states are left out of the numbering entirely.
        let mut order: Vec<StateID> = Vec::new();
        let mut seen: FxHashMap<StateID, usize> = FxHashMap::default();
        let mut successors: Vec<Vec<usize>> = Vec::new();
        let mut raw_accepting: Vec<bool> = Vec::new();
        let mut queue = VecDeque::new();

        seen.insert(start_id, 0);
        order.push(start_id);
        queue.push_back(0usize);

        while let Some(idx) = queue.pop_front() {
            let sid = order[idx];
            let eoi = dfa.next_eoi_state(sid);
            raw_accepting.push(dfa.is_match_state(eoi));

            let mut succ = Vec::new();
            for byte in 0..=255u8 {
                let next = dfa.next_state(sid, byte);
                if dfa.is_dead_state(next) || dfa.is_quit_state(next) {
                    continue;
                }
                let next_idx = match seen.get(&next) {
                    Some(&i) => i,
                    None => {
                        let i = order.len();
                        seen.insert(next, i);
                        order.push(next);
                        queue.push_back(i);
                        i
                    }
                };
                succ.push(next_idx);
            }
            succ.sort_unstable();
            succ.dedup();
            successors.push(succ);
        }

        // The backend delays match reporting by one byte, so the state
        // entered on the first off-language byte past a match is a non-dead
        // bookkeeping state with no path back to acceptance. Trim every
        // state that cannot reach an accepting state; with them gone,
        // `next_state` reports dead exactly when no completion can match.
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); order.len()];
        for (idx, succ) in successors.iter().enumerate() {
            for &s in succ {
                preds[s].push(idx);
            }
        }
        let mut live = vec![false; order.len()];
        let mut frontier: VecDeque<usize> = (0..order.len())
            .filter(|&i| raw_accepting[i])
            .collect();
        for &i in &frontier {
            live[i] = true;
        }
        while let Some(i) = frontier.pop_front() {
            for &p in &preds[i] {
                if !live[p] {
                    live[p] = true;
                    frontier.push_back(p);
                }
            }
        }

        // Renumber the survivors in discovery order. The start state stays
        // id 0 even when the pattern's language is empty.
        let mut state_map = Vec::new();
        let mut state_ids = FxHashMap::default();
        let mut accepting = Vec::new();
        for (idx, &sid) in order.iter().enumerate() {
            if idx == 0 || live[idx] {
                state_ids.insert(sid, state_map.len() as u32);
                state_map.push(sid);
                accepting.push(raw_accepting[idx]);
            }
        }

        tracing::debug!(
            states = state_map.len(),
            pattern_len = pattern.len(),
            "compiled pattern DFA"
        );

        Ok(Self {
            dfa,
            state_map,
            state_ids,
            accepting,
        })
    }

    fn sid(&self, state: u32) -> Option<StateID> {
        self.state_map.get(state as usize).copied()
    }
}

impl ByteDfa for PatternDfa {
    fn initial_state(&self) -> u32 {
        0
    }

    fn next_state(&self, state: u32, byte: u8) -> Option<u32> {
        let sid = self.sid(state)?;
        let next = self.dfa.next_state(sid, byte);
        if self.dfa.is_dead_state(next) || self.dfa.is_quit_state(next) {
            return None;
        }
        // States trimmed during compilation (no path to acceptance) are
        // absent from the map, so they read as dead here too.
        self.state_ids.get(&next).copied()
    }

    fn is_final_state(&self, state: u32) -> bool {
        self.accepting.get(state as usize).copied().unwrap_or(false)
    }

    fn state_count(&self) -> usize {
        self.state_map.len()
    }
}
