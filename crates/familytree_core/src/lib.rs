//! Core domain logic for family tree graphs.
//! This crate is the single source of truth for genealogy graph invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod policy;
pub mod repo;
pub mod service;

pub use config::{EngineConfig, RetryPolicy};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::family_tree::{FamilyTree, FamilyTreeId, OwnerId, TreeVisibility};
pub use model::member::{
    Gender, Member, MemberAttributes, MemberId, MemberRole, MemberStatus, MemberValidationError,
};
pub use model::relationship::{Relationship, RelationshipCategory, RelationshipId};
pub use policy::placeholder::CoParent;
pub use policy::PolicyViolation;
pub use repo::tree_repo::{FamilyTreeRepository, SqliteFamilyTreeRepository};
pub use repo::unit_of_work::{GraphTransaction, SqliteUnitOfWork, UnitOfWork};
pub use repo::{StoreError, StoreResult};
pub use service::cancel::CancelToken;
pub use service::error::{ErrorKind, GraphError};
pub use service::graph_service::{AddMemberRequest, MemberGraph, MemberGraphService, Placement};
pub use service::tree_service::{FamilyTreeService, TreeServiceError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
