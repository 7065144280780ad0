//! Family tree aggregate.
//!
//! # Responsibility
//! - Define the container that scopes which members and relationships may
//!   reference each other.
//!
//! # Invariants
//! - `id` is stable and never reused for another tree.
//! - All members and relationships touched by one insertion share `id`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a family tree.
pub type FamilyTreeId = Uuid;

/// Identifier of the account owning a tree. Opaque to core.
pub type OwnerId = Uuid;

/// Who may see a tree. Enforcement belongs to the host's authorization layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeVisibility {
    /// Only the owner.
    Private,
    /// Members invited into the tree.
    Family,
    /// Anyone.
    Public,
}

/// Family tree record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyTree {
    pub id: FamilyTreeId,
    pub display_name: String,
    pub owner_id: OwnerId,
    pub visibility: TreeVisibility,
}

impl FamilyTree {
    /// Creates a tree record with a generated stable ID.
    pub fn new(owner_id: OwnerId, display_name: impl Into<String>, visibility: TreeVisibility) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            owner_id,
            visibility,
        }
    }
}
