//! Webhook authentication primitives.

pub mod signature;
