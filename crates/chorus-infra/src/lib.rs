//! Infrastructure layer for Chorus.
//!
//! Concrete implementations of the chorus-core trait seams: SQLite
//! repositories, the LanceDB knowledge store, HTTP LLM clients, webhook
//! signatures, and the reply dispatcher.

pub mod dispatch;
pub mod llm;
pub mod sqlite;
pub mod vector;
pub mod webhook;
