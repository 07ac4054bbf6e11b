//! Byte trie over the token vocabulary.
//!
//! Walking every vocabulary token character-by-character from every DFA
//! state is the dominant cost of index construction. The trie folds tokens
//! sharing a prefix into one path so each shared prefix is traversed once
//! per state instead of once per token.

use rustc_hash::FxHashMap;
use stencil_core::TokenVocab;

#[derive(Debug, Default)]
struct TrieNode {
    children: FxHashMap<u8, u32>,
    /// Token ids whose full text ends at this node.
    token_ids: Vec<u32>,
}

/// A byte trie over all non-empty, non-EOS vocabulary tokens.
#[derive(Debug)]
pub struct TokenTrie {
    nodes: Vec<TrieNode>,
}

impl TokenTrie {
    /// Build the trie from a vocabulary. Empty tokens cannot be consumed by
    /// any automaton and the EOS token is handled separately by the indexer,
    /// so neither enters the trie.
    pub fn build(vocab: &TokenVocab) -> Self {
        let mut nodes = vec![TrieNode::default()];
        for (token_id, text) in vocab.iter_nonempty() {
            if token_id == vocab.eos_token_id() {
                continue;
            }
            let mut node = 0u32;
            for &byte in text.as_bytes() {
                node = match nodes[node as usize].children.get(&byte) {
                    Some(&child) => child,
                    None => {
                        let child = nodes.len() as u32;
                        nodes.push(TrieNode::default());
                        nodes[node as usize].children.insert(byte, child);
                        child
                    }
                };
            }
            nodes[node as usize].token_ids.push(token_id);
        }
        Self { nodes }
    }

    pub const ROOT: u32 = 0;

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Outgoing byte edges of `node`.
    pub fn children(&self, node: u32) -> impl Iterator<Item = (u8, u32)> + '_ {
        self.nodes[node as usize]
            .children
            .iter()
            .map(|(&b, &n)| (b, n))
    }

    /// Token ids terminating at `node`.
    pub fn tokens_at(&self, node: u32) -> &[u32] {
        &self.nodes[node as usize].token_ids
    }
}
