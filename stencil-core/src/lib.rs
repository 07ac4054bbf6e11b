//! Stencil core types, traits, and error definitions.

pub mod bitmask;
pub mod error;
pub mod vocab;

pub use bitmask::TokenBitmask;
pub use error::{GuideError, Result};
pub use vocab::TokenVocab;
