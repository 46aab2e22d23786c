//! Business logic for the Chorus webhook pipeline.
//!
//! Defines the trait seams (repositories, LLM clients, knowledge store,
//! reply dispatcher) and the pure decision logic (bot resolver, onboarding
//! state machine, retrieval engine, prompt composer) that the pipeline
//! wires together. This crate never depends on chorus-infra.

pub mod dispatch;
pub mod knowledge;
pub mod llm;
pub mod onboarding;
pub mod pipeline;
pub mod prompt;
pub mod repository;
pub mod resolver;
pub mod retrieval;
