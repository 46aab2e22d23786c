//! LanceDB-backed vector storage for persona knowledge.

pub mod knowledge;
pub mod lance;
pub mod schema;
