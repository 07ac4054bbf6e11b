//! Constrained-decoding guide.
//!
//! Compiles a regex pattern or JSON Schema into a byte-level DFA, precomputes
//! which vocabulary tokens are legal at each DFA state, and answers O(1)
//! allow-set and transition queries while a caller generates tokens:
//! - **Regex**: compile the pattern into an anchored, minimized DFA, then
//!   build a token-level index mapping each DFA state to its allowed
//!   vocabulary tokens and their target states.
//! - **JSON Schema**: convert the schema to an equivalent regex pattern,
//!   then use the regex machinery.
//!
//! The expensive part is index construction; `CompilationCache` amortizes it
//! across repeated uses of the same (pattern, vocabulary) pair, and a built
//! index is shared by any number of cheap `Guide` instances.

pub mod cache;
pub mod dfa;
pub mod guide;
pub mod index;
pub mod schema;
pub mod trie;

use std::sync::Arc;

pub use cache::CompilationCache;
pub use dfa::{ByteDfa, PatternDfa};
pub use guide::Guide;
pub use index::{IndexConfig, IndexStrategy, StateTokens, TransitionIndex};
pub use schema::{compile_schema, compile_schema_value};
pub use stencil_core::{GuideError, Result, TokenBitmask, TokenVocab};

/// Compile a regex pattern and build its transition index for `vocab`.
pub fn build_regex_index(
    pattern: &str,
    vocab: &Arc<TokenVocab>,
    config: &IndexConfig,
) -> Result<Arc<TransitionIndex>> {
    let dfa = PatternDfa::compile(pattern)?;
    Ok(Arc::new(TransitionIndex::build(
        Arc::new(dfa),
        vocab.clone(),
        config,
    )?))
}

/// Compile a JSON Schema document and build its transition index for `vocab`.
pub fn build_schema_index(
    schema: &str,
    vocab: &Arc<TokenVocab>,
    config: &IndexConfig,
) -> Result<Arc<TransitionIndex>> {
    let pattern = compile_schema(schema)?;
    build_regex_index(&pattern, vocab, config)
}

/// Like [`build_regex_index`], memoized through `cache`.
pub fn cached_regex_index(
    cache: &CompilationCache,
    pattern: &str,
    vocab: &Arc<TokenVocab>,
    config: &IndexConfig,
) -> Result<Arc<TransitionIndex>> {
    cache.get_or_build(pattern, vocab, || build_regex_index(pattern, vocab, config))
}

/// Like [`build_schema_index`], memoized through `cache`. The cache key is
/// the compiled pattern, so a schema and its equivalent regex share one
/// entry.
pub fn cached_schema_index(
    cache: &CompilationCache,
    schema: &str,
    vocab: &Arc<TokenVocab>,
    config: &IndexConfig,
) -> Result<Arc<TransitionIndex>> {
    let pattern = compile_schema(schema)?;
    cache.get_or_build(&pattern, vocab, || build_regex_index(&pattern, vocab, config))
}
