//! HTTP clients for the external LLM endpoints.

pub mod completion;
pub mod embedding;
