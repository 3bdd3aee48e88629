//! Producer variants.

mod json_lines;
mod memory;

pub use json_lines::JsonLinesProducer;
pub use memory::StaticProducer;
