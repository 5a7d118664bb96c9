//! Turn exported group-chat transcripts into prediction-market ideas.
//!
//! The entry point is [`markets::pipeline::MarketGenerator`]: it sizes the
//! input, builds a chunked digest when needed, runs the generate/repair
//! exchange across shrinking budgets and falls back to a local heuristic
//! generator when the backend path is exhausted.

pub mod env_loader;
pub mod error;
pub mod markets;

pub mod env_keys {
    include!(concat!(env!("OUT_DIR"), "/env_allowlist.rs"));
}

pub use error::MarketGenError;
pub use markets::pipeline::{MarketGenerator, generate_heuristic};
pub use markets::types::{GenerationResult, MarketIdea};
