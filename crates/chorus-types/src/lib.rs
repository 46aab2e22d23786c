//! Shared domain types for Chorus.
//!
//! Pure data types with serde modeling and thiserror error enums.
//! No I/O happens in this crate.

pub mod config;
pub mod error;
pub mod job;
pub mod knowledge;
pub mod llm;
pub mod persona;
pub mod session;
pub mod turn;
pub mod webhook;
