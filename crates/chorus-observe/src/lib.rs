//! Observability helpers: tracing initialization and GenAI span attributes.

pub mod genai_attrs;
pub mod tracing_setup;
