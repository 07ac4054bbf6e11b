//! Token vocabulary: the fixed table mapping token ids to decoded text.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// A vocabulary mapping: token id → decoded token text.
/// Built once per model, reused across patterns and guides.
#[derive(Debug, Clone)]
pub struct TokenVocab {
    /// token_id → token string (decoded bytes)
    id_to_token: Vec<String>,
    /// The end-of-sequence token id. Allowed exactly at accepting states.
    eos_token_id: u32,
}

impl TokenVocab {
    /// Create a vocabulary from an id-ordered token table.
    pub fn new(id_to_token: Vec<String>, eos_token_id: u32) -> Self {
        Self {
            id_to_token,
            eos_token_id,
        }
    }

    /// Build a vocabulary from a decode function.
    /// `decode_fn` takes a token id and returns the decoded string; ids the
    /// tokenizer cannot decode (padding, reserved slots) become empty tokens,
    /// which no allow-set ever contains.
    pub fn from_decode_fn<F>(vocab_size: usize, eos_token_id: u32, decode_fn: F) -> Self
    where
        F: Fn(u32) -> Option<String>,
    {
        let mut id_to_token = Vec::with_capacity(vocab_size);
        for id in 0..vocab_size as u32 {
            id_to_token.push(decode_fn(id).unwrap_or_default());
        }
        Self {
            id_to_token,
            eos_token_id,
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn eos_token_id(&self) -> u32 {
        self.eos_token_id
    }

    /// The decoded text for `token_id`, or `None` if the id is out of range.
    pub fn token(&self, token_id: u32) -> Option<&str> {
        self.id_to_token.get(token_id as usize).map(|s| s.as_str())
    }

    /// Iterate `(token_id, text)` pairs in id order, skipping empty tokens.
    pub fn iter_nonempty(&self) -> impl Iterator<Item = (u32, &str)> {
        self.id_to_token
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_empty())
            .map(|(id, t)| (id as u32, t.as_str()))
    }

    /// A stable content fingerprint of the vocabulary: a hash over the
    /// id-ordered token table plus the EOS id. Used as the vocabulary half of
    /// compilation cache keys, so equality is semantic rather than by object
    /// identity.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.id_to_token.len().hash(&mut hasher);
        for token in &self.id_to_token {
            token.hash(&mut hasher);
        }
        self.eos_token_id.hash(&mut hasher);
        hasher.finish()
    }
}
