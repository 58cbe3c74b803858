//! The embedded schema catalog: loading it from the file, and ordering it
//! so the class synthesizer can process each streamer after everything it
//! depends on.

pub mod catalog;
pub mod topo;
pub mod types;

pub use catalog::{Catalog, RuleList};
pub use types::{ElementCommon, TStreamerElement, TStreamerInfo};
