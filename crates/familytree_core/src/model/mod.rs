//! Genealogy domain model.
//!
//! # Responsibility
//! - Define the member, relationship and family tree records the graph
//!   engine operates on.
//! - Keep attribute validation next to the data it guards.
//!
//! # Invariants
//! - Every record is identified by a stable UUID and scoped to one tree.
//! - Members and relationships are never hard-deleted by core.

pub mod family_tree;
pub mod member;
pub mod relationship;
