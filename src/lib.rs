//! Thầy Dũng: a classroom tutor chat backed by a hosted LLM.
//!
//! ARCHITECTURE
//! ============
//! `state` holds the session and conversation model. `services` owns the
//! tutoring rules: prompt building, the off-topic policy, login, preferences
//! and the turn orchestrator. `llm` adapts the remote providers behind the
//! [`llm::LlmChat`] trait. `console` renders a session on a terminal.

pub mod config;
pub mod console;
pub mod llm;
pub mod services;
pub mod state;
