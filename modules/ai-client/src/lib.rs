//! Thin Claude client used for schema-constrained generation.
//!
//! Callers describe the shape they want as a `JsonSchema` type and get a
//! deserialized value back; the model is forced to answer through a single
//! tool whose input schema is that type.

pub mod claude;
pub mod schema;

pub use claude::Claude;
pub use schema::StructuredOutput;
