//! Graph engine error taxonomy.
//!
//! # Invariants
//! - Only `ErrorKind::Transient` is eligible for retry.
//! - Every variant maps to exactly one `ErrorKind`.

use crate::model::family_tree::FamilyTreeId;
use crate::model::member::{MemberId, MemberValidationError};
use crate::policy::PolicyViolation;
use crate::repo::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Coarse classification used for retry dispatch and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    ArgumentInvalid,
    Transient,
    Storage,
    Cancelled,
}

/// Errors from graph mutation use-cases.
#[derive(Debug)]
pub enum GraphError {
    /// Target tree does not exist.
    TreeNotFound(FamilyTreeId),
    /// Referenced member does not exist in the target tree.
    MemberNotFound(MemberId),
    /// Relationship-category precondition violated.
    InvalidState(PolicyViolation),
    /// Caller omitted or misused a category-mandatory field.
    ArgumentInvalid(String),
    /// Supplied person data is inconsistent.
    InvalidAttributes(MemberValidationError),
    /// Storage contention that outlived the retry budget.
    TransientStorage(StoreError),
    /// Non-retryable storage failure.
    Storage(StoreError),
    /// Caller cancelled the call.
    Cancelled,
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TreeNotFound(_) | Self::MemberNotFound(_) => ErrorKind::NotFound,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::ArgumentInvalid(_) | Self::InvalidAttributes(_) => ErrorKind::ArgumentInvalid,
            Self::TransientStorage(_) => ErrorKind::Transient,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Stable code for log events.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TreeNotFound(_) => "tree_not_found",
            Self::MemberNotFound(_) => "member_not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::ArgumentInvalid(_) => "argument_invalid",
            Self::InvalidAttributes(_) => "invalid_attributes",
            Self::TransientStorage(_) => "storage_transient",
            Self::Storage(_) => "storage_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TreeNotFound(id) => write!(f, "family tree not found: {id}"),
            Self::MemberNotFound(id) => write!(f, "member not found: {id}"),
            Self::InvalidState(violation) => write!(f, "{violation}"),
            Self::ArgumentInvalid(message) => write!(f, "invalid argument: {message}"),
            Self::InvalidAttributes(err) => write!(f, "invalid member attributes: {err}"),
            Self::TransientStorage(err) => write!(f, "storage temporarily unavailable: {err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl Error for GraphError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidState(violation) => Some(violation),
            Self::InvalidAttributes(err) => Some(err),
            Self::TransientStorage(err) | Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for GraphError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound {
                entity: "member",
                id,
            } => Self::MemberNotFound(id),
            StoreError::NotFound {
                entity: "family tree",
                id,
            } => Self::TreeNotFound(id),
            StoreError::Validation(err) => Self::InvalidAttributes(err),
            other if other.is_transient() => Self::TransientStorage(other),
            other => Self::Storage(other),
        }
    }
}

impl From<PolicyViolation> for GraphError {
    fn from(value: PolicyViolation) -> Self {
        Self::InvalidState(value)
    }
}

impl From<MemberValidationError> for GraphError {
    fn from(value: MemberValidationError) -> Self {
        Self::InvalidAttributes(value)
    }
}
