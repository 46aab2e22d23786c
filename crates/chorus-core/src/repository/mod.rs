//! Repository trait definitions.
//!
//! Implementations live in chorus-infra. All traits use native async fn in
//! traits (RPITIT, Rust 2024 edition).

pub mod persona;
pub mod queue;
pub mod session;
pub mod telemetry;
pub mod turn;
