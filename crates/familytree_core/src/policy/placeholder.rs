//! Placeholder synthesis and resolution policy.
//!
//! # Responsibility
//! - Decide, per relationship category, whether an insertion creates new
//!   structure, resolves an `Undefined` placeholder, or is rejected.
//! - Decide where a child's co-parent comes from.
//!
//! # Invariants
//! - Resolution never plans new members or edges.
//! - A member has at most one parent pair.
//! - A parent never gets a second placeholder partner while one exists.

use crate::model::member::{Member, MemberId};
use crate::model::relationship::RelationshipId;
use crate::policy::PolicyViolation;

/// Second parent of a parent pair, tagged by whether it is real yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoParent {
    Resolved(MemberId),
    Placeholder(MemberId),
}

impl CoParent {
    /// Tags `member` by its status.
    pub fn classify(member: &Member) -> Self {
        if member.is_placeholder() {
            Self::Placeholder(member.id)
        } else {
            Self::Resolved(member.id)
        }
    }

    pub fn id(self) -> MemberId {
        match self {
            Self::Resolved(id) | Self::Placeholder(id) => id,
        }
    }
}

/// Parent pair recorded by one `children` edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentPair {
    pub edge_id: RelationshipId,
    pub parent: MemberId,
    pub co_parent: CoParent,
}

/// Outcome of inserting a parent above a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentPlan {
    /// No parents yet: create the ancestor, its placeholder partner and the
    /// parent pair. Root moves to the ancestor.
    NewAncestor,
    /// Overwrite the placeholder co-parent with the supplied person.
    ResolveCoParent(MemberId),
}

/// Outcome of inserting a partner of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartnerPlan {
    NewPartner,
    /// Overwrite the placeholder partner with the supplied person.
    Resolve(MemberId),
}

/// Where a new child's second parent comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoParentSource {
    Existing(MemberId),
    /// Synthesize a placeholder partner for the parent.
    Synthesize,
}

/// Plans a parent insertion for `child_id` given its current parent pair.
pub fn plan_parent(
    child_id: MemberId,
    existing: Option<&ParentPair>,
) -> Result<ParentPlan, PolicyViolation> {
    match existing.map(|pair| pair.co_parent) {
        None => Ok(ParentPlan::NewAncestor),
        Some(CoParent::Placeholder(placeholder_id)) => {
            Ok(ParentPlan::ResolveCoParent(placeholder_id))
        }
        Some(CoParent::Resolved(_)) => Err(PolicyViolation::ParentPairAlreadyRegistered(child_id)),
    }
}

/// Returns the parent pair a new sibling of `reference_id` shares.
pub fn plan_sibling(
    reference_id: MemberId,
    existing: Option<&ParentPair>,
) -> Result<ParentPair, PolicyViolation> {
    existing
        .copied()
        .ok_or(PolicyViolation::MissingParentPair(reference_id))
}

/// Plans a partner insertion given the reference member's current partners.
///
/// The first placeholder partner, in edge order, is resolved.
pub fn plan_partner(partners: &[CoParent]) -> PartnerPlan {
    partners
        .iter()
        .find_map(|partner| match partner {
            CoParent::Placeholder(id) => Some(PartnerPlan::Resolve(*id)),
            CoParent::Resolved(_) => None,
        })
        .unwrap_or(PartnerPlan::NewPartner)
}

/// Picks the co-parent of a new child.
///
/// An explicit co-parent wins. Otherwise the parent's first placeholder
/// partner is reused, and a parent without one gets a new placeholder.
pub fn plan_child_co_parent(explicit: Option<MemberId>, partners: &[CoParent]) -> CoParentSource {
    if let Some(co_parent_id) = explicit {
        return CoParentSource::Existing(co_parent_id);
    }
    partners
        .iter()
        .find_map(|partner| match partner {
            CoParent::Placeholder(id) => Some(CoParentSource::Existing(*id)),
            CoParent::Resolved(_) => None,
        })
        .unwrap_or(CoParentSource::Synthesize)
}

/// Rejects a `children` edge to a member that already has a parent pair.
pub fn ensure_no_parent_pair(
    child_id: MemberId,
    existing: Option<&ParentPair>,
) -> Result<(), PolicyViolation> {
    match existing {
        None => Ok(()),
        Some(_) => Err(PolicyViolation::ParentPairConflict(child_id)),
    }
}
