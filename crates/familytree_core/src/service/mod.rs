//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep hosts decoupled from storage details and transaction handling.

pub mod cancel;
pub mod error;
pub mod graph_service;
pub mod retry;
pub mod tree_service;
