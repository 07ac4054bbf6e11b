//! Packed token bitmask.
//!
//! A bitmask over the vocabulary where bit `i` set means token `i` is
//! allowed. Used to apply an allow-set to a logits buffer in O(V) without
//! hashing each token id.

/// A fixed-width bitmask over token ids, packed into u64 words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBitmask {
    words: Vec<u64>,
    vocab_size: usize,
}

impl TokenBitmask {
    /// An all-zero mask (every token rejected) sized for `vocab_size` tokens.
    pub fn zeros(vocab_size: usize) -> Self {
        Self {
            words: vec![0; vocab_size.div_ceil(64)],
            vocab_size,
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Mark `token_id` as allowed. Out-of-range ids are ignored.
    pub fn set(&mut self, token_id: u32) {
        let i = token_id as usize;
        if i < self.vocab_size {
            self.words[i / 64] |= 1 << (i % 64);
        }
    }

    /// Whether `token_id` is allowed.
    pub fn get(&self, token_id: u32) -> bool {
        let i = token_id as usize;
        i < self.vocab_size && (self.words[i / 64] >> (i % 64)) & 1 == 1
    }

    /// Number of allowed tokens.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Set logits of rejected tokens to `-inf`, in place. Logits beyond the
    /// mask's vocabulary size are rejected as well.
    pub fn apply_to_logits(&self, logits: &mut [f32]) {
        for (i, logit) in logits.iter_mut().enumerate() {
            let allowed = i < self.vocab_size && (self.words[i / 64] >> (i % 64)) & 1 == 1;
            if !allowed {
                *logit = f32::NEG_INFINITY;
            }
        }
    }
}
