//! Guide runtime: the object a generation loop holds.
//!
//! A `Guide` is a reference to a shared [`TransitionIndex`] plus one integer,
//! the current DFA state. All heavy work happened at index build time; per
//! token the guide does a table lookup (or, on a lazy index, at most one
//! first-visit fill). Guides perform no I/O and many guides may share one
//! index.

use std::sync::Arc;

use stencil_core::{GuideError, Result};

use crate::index::{StateTokens, TransitionIndex};

#[derive(Clone)]
pub struct Guide {
    index: Arc<TransitionIndex>,
    state: u32,
}

impl Guide {
    /// A fresh guide positioned at the index's start state.
    pub fn new(index: Arc<TransitionIndex>) -> Self {
        let state = index.initial_state();
        Self { index, state }
    }

    /// The current automaton state.
    pub fn current_state(&self) -> u32 {
        self.state
    }

    /// The allow-set at the current state. EOS appears exactly when the
    /// current state is accepting; an empty set means the pattern has no
    /// valid continuation.
    pub fn allowed_tokens(&self) -> Result<Arc<StateTokens>> {
        self.index.allowed_tokens(self.state)
    }

    /// Consume `token_id`, moving to its target state. Returns the new
    /// state. `InvalidTransition` if the token is not allowed here; the
    /// guide's state is unchanged on error.
    pub fn advance(&mut self, token_id: u32) -> Result<u32> {
        let next = self.index.next_state(self.state, token_id)?;
        self.state = next;
        Ok(next)
    }

    /// Whether the text consumed so far is a complete match, i.e. EOS is
    /// currently allowed.
    pub fn is_finished(&self) -> bool {
        self.index.is_final_state(self.state)
    }

    /// Rewind to the start state. The shared index (including any lazily
    /// filled entries) is untouched.
    pub fn reset(&mut self) {
        self.state = self.index.initial_state();
    }

    /// Set disallowed token logits to `-inf` in place.
    pub fn mask_logits(&self, logits: &mut [f32]) -> Result<()> {
        let tokens = self.allowed_tokens()?;
        tokens.mask().apply_to_logits(logits);
        Ok(())
    }

    pub fn index(&self) -> &Arc<TransitionIndex> {
        &self.index
    }

    /// Drive the guide over a whole token sequence, then take the terminal
    /// EOS step. Errors with `InvalidTransition` at the first illegal token.
    pub fn accept_sequence(&mut self, token_ids: &[u32]) -> Result<()> {
        for &token_id in token_ids {
            self.advance(token_id)?;
        }
        let eos = self.index.eos_token_id();
        if !self.is_finished() {
            return Err(GuideError::InvalidTransition {
                state: self.state,
                token_id: eos,
            });
        }
        self.advance(eos)?;
        Ok(())
    }
}
