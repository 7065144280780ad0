//! Relationship edge model.
//!
//! # Invariants
//! - Edges are immutable after creation.
//! - A `Children` edge names both parents (`from_member_id` and
//!   `from_member_partner_id`) once committed.
//! - A `Partner` edge is stored once, from the initiating member.

use crate::model::family_tree::FamilyTreeId;
use crate::model::member::MemberId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a relationship edge.
pub type RelationshipId = Uuid;

/// Kinship category of an edge or insertion request.
///
/// `Parent` and `Sibling` describe insertion intent; they are materialized
/// as `Children` edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipCategory {
    Parent,
    Sibling,
    Partner,
    Children,
}

/// Directed, typed edge between members of one tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub tree_id: FamilyTreeId,
    pub category: RelationshipCategory,
    pub from_member_id: MemberId,
    /// Co-parent for `Children` edges.
    pub from_member_partner_id: Option<MemberId>,
    pub to_member_id: MemberId,
}

impl Relationship {
    /// Creates a partner edge from `from_member_id` to `to_member_id`.
    pub fn partner(tree_id: FamilyTreeId, from_member_id: MemberId, to_member_id: MemberId) -> Self {
        Self {
            id: Uuid::new_v4(),
            tree_id,
            category: RelationshipCategory::Partner,
            from_member_id,
            from_member_partner_id: None,
            to_member_id,
        }
    }

    /// Creates a children edge from a parent pair to `child_id`.
    pub fn children(
        tree_id: FamilyTreeId,
        parent_id: MemberId,
        co_parent_id: MemberId,
        child_id: MemberId,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tree_id,
            category: RelationshipCategory::Children,
            from_member_id: parent_id,
            from_member_partner_id: Some(co_parent_id),
            to_member_id: child_id,
        }
    }

    /// For a partner edge, returns the endpoint opposite to `member_id`.
    pub fn partner_of(&self, member_id: MemberId) -> Option<MemberId> {
        if self.category != RelationshipCategory::Partner {
            return None;
        }
        if self.from_member_id == member_id {
            Some(self.to_member_id)
        } else if self.to_member_id == member_id {
            Some(self.from_member_id)
        } else {
            None
        }
    }

    /// Returns whether this edge satisfies its category's shape.
    pub fn is_complete(&self) -> bool {
        match self.category {
            RelationshipCategory::Children => self.from_member_partner_id.is_some(),
            _ => true,
        }
    }
}
