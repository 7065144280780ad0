//! Family tree use-case service.
//!
//! # Responsibility
//! - Create the containers members are inserted into.
//! - Resolve tree ids for callers before they mutate the graph.
//!
//! # Invariants
//! - Display names are trimmed and never blank.
//! - New trees start empty; their first member is added through
//!   `MemberGraphService`.

use crate::model::family_tree::{FamilyTree, FamilyTreeId, OwnerId, TreeVisibility};
use crate::repo::tree_repo::FamilyTreeRepository;
use crate::repo::StoreError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from family tree service operations.
#[derive(Debug)]
pub enum TreeServiceError {
    /// Display name is blank after trim.
    InvalidDisplayName,
    /// Target tree does not exist.
    TreeNotFound(FamilyTreeId),
    /// Repository-level failure.
    Repo(StoreError),
}

impl Display for TreeServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDisplayName => write!(f, "display name must not be blank"),
            Self::TreeNotFound(id) => write!(f, "family tree not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TreeServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for TreeServiceError {
    fn from(value: StoreError) -> Self {
        Self::Repo(value)
    }
}

/// Use-case service for family tree containers.
pub struct FamilyTreeService<R: FamilyTreeRepository> {
    repo: R,
}

impl<R: FamilyTreeRepository> FamilyTreeService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates an empty tree owned by `owner_id`.
    pub fn create_tree(
        &self,
        owner_id: OwnerId,
        display_name: &str,
        visibility: TreeVisibility,
    ) -> Result<FamilyTree, TreeServiceError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(TreeServiceError::InvalidDisplayName);
        }

        let tree = FamilyTree::new(owner_id, display_name, visibility);
        self.repo.create_tree(&tree)?;
        info!(
            "event=tree_create module=tree status=ok tree_id={} visibility={:?}",
            tree.id, tree.visibility
        );
        Ok(tree)
    }

    /// Loads one tree, failing when it does not exist.
    pub fn get_tree(&self, id: FamilyTreeId) -> Result<FamilyTree, TreeServiceError> {
        self.repo
            .get_tree(id)?
            .ok_or(TreeServiceError::TreeNotFound(id))
    }
}
