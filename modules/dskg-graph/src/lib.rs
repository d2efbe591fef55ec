pub mod client;
pub mod mastery;
pub mod memory;
pub mod migrate;
pub mod reader;
pub mod writer;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::GraphClient;
pub use mastery::{MasteryGraph, Neo4jMasteryGraph};
pub use memory::InMemoryMasteryGraph;
pub use reader::GraphReader;
pub use writer::GraphWriter;

pub use neo4rs::query;
