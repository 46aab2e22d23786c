//! HTTP layer for Chorus.
//!
//! Axum-based webhook receiver with HMAC verification, envelope response
//! format, and CORS support.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
