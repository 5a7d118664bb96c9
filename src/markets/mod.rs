pub mod budget;
pub mod chat;
pub mod chunk;
pub mod client;
pub mod config;
pub mod digest;
pub mod events;
pub mod extract;
pub mod heuristic;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod protocol;
pub mod schema;
pub mod signals;
pub mod summarize;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;
pub mod util;
