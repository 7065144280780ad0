//! Member insertion use-case service.
//!
//! # Responsibility
//! - Provide the single `add_member` entry point that grows a family tree.
//! - Consult root and placeholder policies, issue every member/relationship
//!   write, and commit them as one unit.
//! - Retry transient storage failures; never retry logical failures.
//!
//! # Invariants
//! - All writes of one call happen inside one `GraphTransaction`.
//! - Any error after `begin` rolls the transaction back before returning.
//! - The returned member is re-read after the writes, never echoed from the
//!   request.

use crate::config::EngineConfig;
use crate::model::family_tree::FamilyTreeId;
use crate::model::member::{Member, MemberAttributes, MemberId};
use crate::model::relationship::{Relationship, RelationshipCategory};
use crate::policy::placeholder::{self, CoParent, CoParentSource, ParentPair, ParentPlan, PartnerPlan};
use crate::policy::root;
use crate::repo::relationship_repo::RelationshipQuery;
use crate::repo::unit_of_work::{GraphTransaction, UnitOfWork};
use crate::repo::StoreError;
use crate::service::cancel::CancelToken;
use crate::service::error::GraphError;
use crate::service::retry::execute_with_retry;
use log::{error, info, warn};
use std::time::Instant;

/// Insertion request in the caller's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddMemberRequest {
    pub tree_id: FamilyTreeId,
    /// Member the new one is placed relative to.
    pub reference_member_id: Option<MemberId>,
    /// `None` inserts the first member of an empty tree.
    pub category: Option<RelationshipCategory>,
    /// First parent of a new child. Required for `Children`.
    pub from_member_id: Option<MemberId>,
    /// Second parent of a new child. Optional for `Children`.
    pub from_member_partner_id: Option<MemberId>,
    pub attributes: MemberAttributes,
}

impl AddMemberRequest {
    /// Request for the first member of an empty tree.
    pub fn first_member(tree_id: FamilyTreeId, attributes: MemberAttributes) -> Self {
        Self {
            tree_id,
            reference_member_id: None,
            category: None,
            from_member_id: None,
            from_member_partner_id: None,
            attributes,
        }
    }

    /// Request placing the new member relative to `reference_member_id`.
    pub fn related(
        tree_id: FamilyTreeId,
        category: RelationshipCategory,
        reference_member_id: MemberId,
        attributes: MemberAttributes,
    ) -> Self {
        Self {
            tree_id,
            reference_member_id: Some(reference_member_id),
            category: Some(category),
            from_member_id: None,
            from_member_partner_id: None,
            attributes,
        }
    }

    /// Request for a child of `parent_id`, optionally with a known co-parent.
    pub fn child(
        tree_id: FamilyTreeId,
        parent_id: MemberId,
        co_parent_id: Option<MemberId>,
        attributes: MemberAttributes,
    ) -> Self {
        Self {
            tree_id,
            reference_member_id: None,
            category: Some(RelationshipCategory::Children),
            from_member_id: Some(parent_id),
            from_member_partner_id: co_parent_id,
            attributes,
        }
    }
}

/// Validated placement of a new member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// First member of an empty tree.
    Standalone,
    ParentOf(MemberId),
    SiblingOf(MemberId),
    PartnerOf(MemberId),
    ChildOf {
        parent: MemberId,
        co_parent: Option<MemberId>,
    },
}

impl Placement {
    /// Interprets the request's category fields.
    ///
    /// A `Parent` request without a reference is a standalone insertion. For
    /// `Children`, the reference member stands in for a missing explicit
    /// co-parent.
    pub fn from_request(request: &AddMemberRequest) -> Result<Self, GraphError> {
        let reference = request.reference_member_id;
        match request.category {
            None => Ok(Self::Standalone),
            Some(RelationshipCategory::Parent) => {
                Ok(reference.map_or(Self::Standalone, Self::ParentOf))
            }
            Some(RelationshipCategory::Sibling) => reference
                .map(Self::SiblingOf)
                .ok_or_else(|| missing_field("sibling", "reference_member_id")),
            Some(RelationshipCategory::Partner) => reference
                .map(Self::PartnerOf)
                .ok_or_else(|| missing_field("partner", "reference_member_id")),
            Some(RelationshipCategory::Children) => {
                let parent = request
                    .from_member_id
                    .ok_or_else(|| missing_field("children", "from_member_id"))?;
                let co_parent = request
                    .from_member_partner_id
                    .or(reference.filter(|id| *id != parent));
                if co_parent == Some(parent) {
                    return Err(GraphError::ArgumentInvalid(
                        "a child's two parents must be different members".to_string(),
                    ));
                }
                Ok(Self::ChildOf { parent, co_parent })
            }
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Standalone => "standalone",
            Self::ParentOf(_) => "parent",
            Self::SiblingOf(_) => "sibling",
            Self::PartnerOf(_) => "partner",
            Self::ChildOf { .. } => "children",
        }
    }
}

fn missing_field(category: &str, field: &str) -> GraphError {
    GraphError::ArgumentInvalid(format!("`{field}` is required for category `{category}`"))
}

/// A member together with every edge it takes part in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberGraph {
    pub member: Member,
    /// Edges in insertion order.
    pub relationships: Vec<Relationship>,
}

impl MemberGraph {
    /// The `children` edge naming this member's parents.
    pub fn parent_edge(&self) -> Option<&Relationship> {
        self.relationships.iter().find(|edge| {
            edge.category == RelationshipCategory::Children && edge.to_member_id == self.member.id
        })
    }

    /// Ids of this member's partners, either direction.
    pub fn partner_ids(&self) -> Vec<MemberId> {
        self.relationships
            .iter()
            .filter_map(|edge| edge.partner_of(self.member.id))
            .collect()
    }
}

/// Graph mutation orchestrator.
pub struct MemberGraphService<U: UnitOfWork> {
    uow: U,
    config: EngineConfig,
}

impl<U: UnitOfWork> MemberGraphService<U> {
    /// Creates service with default engine configuration.
    pub fn new(uow: U) -> Self {
        Self::with_config(uow, EngineConfig::default())
    }

    pub fn with_config(uow: U, config: EngineConfig) -> Self {
        Self { uow, config }
    }

    /// Inserts one member and returns it with its relationships.
    ///
    /// # Errors
    /// - `NotFound` when the tree or a referenced member is missing.
    /// - `InvalidState` when the category's precondition does not hold.
    /// - `ArgumentInvalid` when mandatory fields are missing or attributes
    ///   are inconsistent.
    /// - `TransientStorage` once the retry budget is exhausted.
    pub fn add_member(&self, request: &AddMemberRequest) -> Result<MemberGraph, GraphError> {
        self.add_member_cancellable(request, &CancelToken::new())
    }

    /// Same as `add_member`, abandoning the transaction once `cancel` fires.
    pub fn add_member_cancellable(
        &self,
        request: &AddMemberRequest,
        cancel: &CancelToken,
    ) -> Result<MemberGraph, GraphError> {
        let started_at = Instant::now();
        let result = Placement::from_request(request).and_then(|placement| -> Result<_, GraphError> {
            let attributes = request.attributes.normalized()?;
            execute_with_retry(&self.config.retry, "member_add", |attempt| {
                self.try_add_member(request.tree_id, placement, &attributes, cancel)
                    .map(|graph| (graph, attempt))
            })
            .map(|(graph, attempts)| (graph, placement, attempts))
        });

        match result {
            Ok((graph, placement, attempts)) => {
                info!(
                    "event=member_add module=graph status=ok tree_id={} member_id={} placement={} is_root={} attempts={} duration_ms={}",
                    request.tree_id,
                    graph.member.id,
                    placement.label(),
                    graph.member.is_root,
                    attempts,
                    started_at.elapsed().as_millis()
                );
                Ok(graph)
            }
            Err(err) => {
                let elapsed_ms = started_at.elapsed().as_millis();
                match err {
                    GraphError::TransientStorage(ref source) | GraphError::Storage(ref source) => {
                        error!(
                            "event=member_add module=graph status=error tree_id={} duration_ms={} error_code={} error={}",
                            request.tree_id,
                            elapsed_ms,
                            err.error_code(),
                            source
                        );
                    }
                    _ => warn!(
                        "event=member_add module=graph status=rejected tree_id={} duration_ms={} error_code={}",
                        request.tree_id,
                        elapsed_ms,
                        err.error_code()
                    ),
                }
                Err(err)
            }
        }
    }

    /// Loads one member with its relationships.
    pub fn member_graph(&self, member_id: MemberId) -> Result<MemberGraph, GraphError> {
        execute_with_retry(&self.config.retry, "member_graph", |_| {
            self.in_transaction(&CancelToken::new(), |tx| {
                load_member_graph(tx, member_id)?.ok_or(GraphError::MemberNotFound(member_id))
            })
        })
    }

    /// Loads the root member of a tree; `None` for an empty tree.
    pub fn tree_root(&self, tree_id: FamilyTreeId) -> Result<Option<Member>, GraphError> {
        execute_with_retry(&self.config.retry, "tree_root", |_| {
            self.in_transaction(&CancelToken::new(), |tx| {
                tx.trees()
                    .get_tree(tree_id)?
                    .ok_or(GraphError::TreeNotFound(tree_id))?;
                Ok(tx.members().find_root(tree_id)?)
            })
        })
    }

    fn try_add_member(
        &self,
        tree_id: FamilyTreeId,
        placement: Placement,
        attributes: &MemberAttributes,
        cancel: &CancelToken,
    ) -> Result<MemberGraph, GraphError> {
        self.in_transaction(cancel, |tx| {
            let insertion = Insertion {
                tx,
                tree_id,
                cancel,
            };
            let member_id = insertion.apply(placement, attributes)?;
            load_member_graph(tx, member_id)?.ok_or_else(|| {
                GraphError::Storage(StoreError::InvalidData(format!(
                    "member {member_id} missing after insertion"
                )))
            })
        })
    }

    /// Runs `work` in one transaction; commits on success, rolls back on
    /// any error.
    fn in_transaction<T>(
        &self,
        cancel: &CancelToken,
        work: impl FnOnce(&dyn GraphTransaction) -> Result<T, GraphError>,
    ) -> Result<T, GraphError> {
        cancel.check()?;
        let tx = self.uow.begin()?;
        let outcome = work(&*tx).and_then(|value| {
            cancel.check()?;
            Ok(value)
        });

        match outcome {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    error!(
                        "event=tx_rollback module=graph status=error error_code={} error={}",
                        err.error_code(),
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }
}

/// One insertion's view of the open transaction.
struct Insertion<'a> {
    tx: &'a dyn GraphTransaction,
    tree_id: FamilyTreeId,
    cancel: &'a CancelToken,
}

impl Insertion<'_> {
    fn apply(&self, placement: Placement, attributes: &MemberAttributes) -> Result<MemberId, GraphError> {
        self.tx
            .trees()
            .get_tree(self.tree_id)?
            .ok_or(GraphError::TreeNotFound(self.tree_id))?;

        match placement {
            Placement::Standalone => self.insert_standalone(attributes),
            Placement::ParentOf(child_id) => self.insert_parent(child_id, attributes),
            Placement::SiblingOf(reference_id) => self.insert_sibling(reference_id, attributes),
            Placement::PartnerOf(reference_id) => self.insert_partner(reference_id, attributes),
            Placement::ChildOf { parent, co_parent } => {
                self.insert_child(parent, co_parent, attributes)
            }
        }
    }

    fn insert_standalone(&self, attributes: &MemberAttributes) -> Result<MemberId, GraphError> {
        let tree_is_empty = root::is_empty(self.tx.members(), self.tree_id)?;
        if !tree_is_empty {
            return Err(GraphError::ArgumentInvalid(
                "tree already has members; a relationship category is required".to_string(),
            ));
        }

        let mut member = Member::new(self.tree_id, attributes.clone());
        root::assign_root_if_empty(&mut member, tree_is_empty);
        Ok(self.tx.members().add_member(&member)?)
    }

    fn insert_parent(
        &self,
        child_id: MemberId,
        attributes: &MemberAttributes,
    ) -> Result<MemberId, GraphError> {
        self.load_tree_member(child_id)?;
        let existing = self.load_parent_pair(child_id)?;

        match placeholder::plan_parent(child_id, existing.as_ref())? {
            ParentPlan::ResolveCoParent(placeholder_id) => {
                self.resolve_placeholder(placeholder_id, attributes)
            }
            ParentPlan::NewAncestor => {
                self.cancel.check()?;
                let members = self.tx.members();
                let mut ancestor = Member::new(self.tree_id, attributes.clone());
                let previous_root = members.find_root(self.tree_id)?;
                if let Some(demoted) =
                    root::reassign_root_on_new_ancestor(&mut ancestor, previous_root)
                {
                    members.update_member(&demoted)?;
                }
                members.add_member(&ancestor)?;

                let co_parent_id = self.synthesize_partner(&ancestor)?;
                self.link_child(ancestor.id, co_parent_id, child_id)?;
                Ok(ancestor.id)
            }
        }
    }

    fn insert_sibling(
        &self,
        reference_id: MemberId,
        attributes: &MemberAttributes,
    ) -> Result<MemberId, GraphError> {
        self.load_tree_member(reference_id)?;
        let existing = self.load_parent_pair(reference_id)?;
        let parents = placeholder::plan_sibling(reference_id, existing.as_ref())?;

        self.cancel.check()?;
        let sibling = Member::new(self.tree_id, attributes.clone());
        self.tx.members().add_member(&sibling)?;
        self.link_child(parents.parent, parents.co_parent.id(), sibling.id)?;
        Ok(sibling.id)
    }

    fn insert_partner(
        &self,
        reference_id: MemberId,
        attributes: &MemberAttributes,
    ) -> Result<MemberId, GraphError> {
        self.load_tree_member(reference_id)?;
        let partners = self.load_partners(reference_id)?;

        match placeholder::plan_partner(&partners) {
            PartnerPlan::Resolve(placeholder_id) => {
                self.resolve_placeholder(placeholder_id, attributes)
            }
            PartnerPlan::NewPartner => {
                self.cancel.check()?;
                let partner = Member::new(self.tree_id, attributes.clone());
                self.tx.members().add_member(&partner)?;
                self.tx.relationships().add_relationship(&Relationship::partner(
                    self.tree_id,
                    reference_id,
                    partner.id,
                ))?;
                Ok(partner.id)
            }
        }
    }

    fn insert_child(
        &self,
        parent_id: MemberId,
        explicit_co_parent: Option<MemberId>,
        attributes: &MemberAttributes,
    ) -> Result<MemberId, GraphError> {
        let parent = self.load_tree_member(parent_id)?;
        let partners = match explicit_co_parent {
            Some(co_parent_id) => {
                self.load_tree_member(co_parent_id)?;
                Vec::new()
            }
            None => self.load_partners(parent_id)?,
        };
        let source = placeholder::plan_child_co_parent(explicit_co_parent, &partners);

        self.cancel.check()?;
        let child = Member::new(self.tree_id, attributes.clone());
        self.tx.members().add_member(&child)?;
        let co_parent_id = match source {
            CoParentSource::Existing(co_parent_id) => co_parent_id,
            CoParentSource::Synthesize => self.synthesize_partner(&parent)?,
        };
        self.link_child(parent_id, co_parent_id, child.id)?;
        Ok(child.id)
    }

    /// Creates an `Undefined` partner for `anchor` linked by a partner edge.
    fn synthesize_partner(&self, anchor: &Member) -> Result<MemberId, GraphError> {
        let placeholder = Member::placeholder_for(anchor);
        self.tx.members().add_member(&placeholder)?;
        self.tx.relationships().add_relationship(&Relationship::partner(
            self.tree_id,
            anchor.id,
            placeholder.id,
        ))?;
        Ok(placeholder.id)
    }

    fn link_child(
        &self,
        parent_id: MemberId,
        co_parent_id: MemberId,
        child_id: MemberId,
    ) -> Result<(), GraphError> {
        let existing = self.load_parent_pair(child_id)?;
        placeholder::ensure_no_parent_pair(child_id, existing.as_ref())?;
        self.tx.relationships().add_relationship(&Relationship::children(
            self.tree_id,
            parent_id,
            co_parent_id,
            child_id,
        ))?;
        Ok(())
    }

    fn resolve_placeholder(
        &self,
        placeholder_id: MemberId,
        attributes: &MemberAttributes,
    ) -> Result<MemberId, GraphError> {
        let mut placeholder = self.load_tree_member(placeholder_id)?;
        placeholder.resolve_with(attributes.clone());
        self.cancel.check()?;
        self.tx.members().update_member(&placeholder)?;
        Ok(placeholder_id)
    }

    fn load_tree_member(&self, member_id: MemberId) -> Result<Member, GraphError> {
        self.tx
            .members()
            .get_member(member_id)?
            .filter(|member| member.tree_id == self.tree_id)
            .ok_or(GraphError::MemberNotFound(member_id))
    }

    fn load_parent_pair(&self, child_id: MemberId) -> Result<Option<ParentPair>, GraphError> {
        let mut edges = self
            .tx
            .relationships()
            .query_relationships(&RelationshipQuery::parent_pair_of(child_id))?;
        if edges.len() > 1 {
            return Err(GraphError::Storage(StoreError::InvalidData(format!(
                "member {child_id} has {} parent pairs",
                edges.len()
            ))));
        }
        let Some(edge) = edges.pop() else {
            return Ok(None);
        };

        let co_parent_id = edge.from_member_partner_id.ok_or_else(|| {
            GraphError::Storage(StoreError::IncompleteRelationship(edge.id))
        })?;
        let co_parent = self.load_edge_member(co_parent_id)?;
        Ok(Some(ParentPair {
            edge_id: edge.id,
            parent: edge.from_member_id,
            co_parent: CoParent::classify(&co_parent),
        }))
    }

    fn load_partners(&self, member_id: MemberId) -> Result<Vec<CoParent>, GraphError> {
        let edges = self
            .tx
            .relationships()
            .query_relationships(&RelationshipQuery::partners_of(member_id))?;
        let mut partners = Vec::with_capacity(edges.len());
        for partner_id in edges.iter().filter_map(|edge| edge.partner_of(member_id)) {
            partners.push(CoParent::classify(&self.load_edge_member(partner_id)?));
        }
        Ok(partners)
    }

    /// Loads a member an existing edge points at; absence is corruption.
    fn load_edge_member(&self, member_id: MemberId) -> Result<Member, GraphError> {
        self.tx.members().get_member(member_id)?.ok_or_else(|| {
            GraphError::Storage(StoreError::InvalidData(format!(
                "relationship references missing member {member_id}"
            )))
        })
    }
}

fn load_member_graph(
    tx: &dyn GraphTransaction,
    member_id: MemberId,
) -> Result<Option<MemberGraph>, GraphError> {
    let Some(member) = tx.members().get_member(member_id)? else {
        return Ok(None);
    };
    let relationships = tx
        .relationships()
        .query_relationships(&RelationshipQuery::involving(member_id))?;
    Ok(Some(MemberGraph {
        member,
        relationships,
    }))
}
