//! Genealogy decision policies.
//!
//! # Responsibility
//! - Decide root placement (`root`) and placeholder synthesis/resolution
//!   (`placeholder`) from facts the orchestrator has loaded.
//! - Stay free of storage writes; callers apply the decisions.
//!
//! # Invariants
//! - Root ownership only moves through `root::reassign_root_on_new_ancestor`.
//! - Every planned `children` edge names two parents.

use crate::model::member::MemberId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod placeholder;
pub mod root;

/// A relationship-category precondition that does not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    /// Member already has a parent pair with a real co-parent.
    ParentPairAlreadyRegistered(MemberId),
    /// Member has no recorded parent pair to share.
    MissingParentPair(MemberId),
    /// A `children` edge would give the member a second parent pair.
    ParentPairConflict(MemberId),
}

impl Display for PolicyViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParentPairAlreadyRegistered(id) => {
                write!(f, "parent relationship count invalid for member {id}")
            }
            Self::MissingParentPair(id) => {
                write!(f, "member {id} has no recorded parents to share")
            }
            Self::ParentPairConflict(id) => {
                write!(f, "member {id} already belongs to a parent pair")
            }
        }
    }
}

impl Error for PolicyViolation {}
