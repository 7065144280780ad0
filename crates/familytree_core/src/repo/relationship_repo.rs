//! Relationship repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Append typed edges to the `relationships` store.
//! - Answer predicate queries used to find a member's parent pair and
//!   partner edges.
//!
//! # Invariants
//! - Edges are append-only; there is no update or delete path.
//! - Query results are ordered by insertion.

use crate::model::family_tree::FamilyTreeId;
use crate::model::member::MemberId;
use crate::model::relationship::{Relationship, RelationshipCategory, RelationshipId};
use crate::repo::{ensure_connection_ready, parse_uuid, StoreError, StoreResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const RELATIONSHIP_SELECT_SQL: &str = "SELECT
    relationship_uuid,
    tree_uuid,
    category,
    from_member_uuid,
    from_member_partner_uuid,
    to_member_uuid
FROM relationships";

/// Conjunctive filter over relationship edges. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipQuery {
    pub tree_id: Option<FamilyTreeId>,
    pub category: Option<RelationshipCategory>,
    pub from_member_id: Option<MemberId>,
    pub to_member_id: Option<MemberId>,
    /// Matches edges where the member is any endpoint.
    pub involving: Option<MemberId>,
}

impl RelationshipQuery {
    /// The `children` edge recording `child_id`'s parent pair.
    pub fn parent_pair_of(child_id: MemberId) -> Self {
        Self {
            category: Some(RelationshipCategory::Children),
            to_member_id: Some(child_id),
            ..Self::default()
        }
    }

    /// Partner edges initiated by `member_id`.
    pub fn partners_from(member_id: MemberId) -> Self {
        Self {
            category: Some(RelationshipCategory::Partner),
            from_member_id: Some(member_id),
            ..Self::default()
        }
    }

    /// Partner edges in either direction.
    pub fn partners_of(member_id: MemberId) -> Self {
        Self {
            category: Some(RelationshipCategory::Partner),
            involving: Some(member_id),
            ..Self::default()
        }
    }

    /// Every edge touching `member_id`.
    pub fn involving(member_id: MemberId) -> Self {
        Self {
            involving: Some(member_id),
            ..Self::default()
        }
    }
}

/// Repository interface for relationship edges.
pub trait RelationshipRepository {
    /// Appends one edge and returns its id.
    fn add_relationship(&self, relationship: &Relationship) -> StoreResult<RelationshipId>;
    /// Returns edges matching every set field of `query`.
    fn query_relationships(&self, query: &RelationshipQuery) -> StoreResult<Vec<Relationship>>;
}

/// SQLite-backed relationship repository.
pub struct SqliteRelationshipRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRelationshipRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_connection_ready(conn, &["relationships"])?;
        Ok(Self { conn })
    }

    pub(crate) fn from_ready(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RelationshipRepository for SqliteRelationshipRepository<'_> {
    fn add_relationship(&self, relationship: &Relationship) -> StoreResult<RelationshipId> {
        if !relationship.is_complete() {
            return Err(StoreError::IncompleteRelationship(relationship.id));
        }

        self.conn.execute(
            "INSERT INTO relationships (
                relationship_uuid,
                tree_uuid,
                category,
                from_member_uuid,
                from_member_partner_uuid,
                to_member_uuid
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                relationship.id.to_string(),
                relationship.tree_id.to_string(),
                category_to_db(relationship.category),
                relationship.from_member_id.to_string(),
                relationship.from_member_partner_id.map(|id| id.to_string()),
                relationship.to_member_id.to_string(),
            ],
        )?;
        Ok(relationship.id)
    }

    fn query_relationships(&self, query: &RelationshipQuery) -> StoreResult<Vec<Relationship>> {
        let mut sql = format!("{RELATIONSHIP_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(tree_id) = query.tree_id {
            sql.push_str(" AND tree_uuid = ?");
            bind_values.push(Value::Text(tree_id.to_string()));
        }
        if let Some(category) = query.category {
            sql.push_str(" AND category = ?");
            bind_values.push(Value::Text(category_to_db(category).to_string()));
        }
        if let Some(from_member_id) = query.from_member_id {
            sql.push_str(" AND from_member_uuid = ?");
            bind_values.push(Value::Text(from_member_id.to_string()));
        }
        if let Some(to_member_id) = query.to_member_id {
            sql.push_str(" AND to_member_uuid = ?");
            bind_values.push(Value::Text(to_member_id.to_string()));
        }
        if let Some(member_id) = query.involving {
            sql.push_str(
                " AND (from_member_uuid = ? OR from_member_partner_uuid = ? OR to_member_uuid = ?)",
            );
            for _ in 0..3 {
                bind_values.push(Value::Text(member_id.to_string()));
            }
        }
        sql.push_str(" ORDER BY rowid ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut relationships = Vec::new();
        while let Some(row) = rows.next()? {
            relationships.push(parse_relationship_row(row)?);
        }
        Ok(relationships)
    }
}

fn parse_relationship_row(row: &Row<'_>) -> StoreResult<Relationship> {
    let id_text: String = row.get("relationship_uuid")?;
    let tree_text: String = row.get("tree_uuid")?;
    let from_text: String = row.get("from_member_uuid")?;
    let to_text: String = row.get("to_member_uuid")?;
    let from_member_partner_id = row
        .get::<_, Option<String>>("from_member_partner_uuid")?
        .map(|value| parse_uuid(&value, "relationships.from_member_partner_uuid"))
        .transpose()?;

    let category_text: String = row.get("category")?;
    let category = parse_category(&category_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid category `{category_text}` in relationships.category"
        ))
    })?;

    let relationship = Relationship {
        id: parse_uuid(&id_text, "relationships.relationship_uuid")?,
        tree_id: parse_uuid(&tree_text, "relationships.tree_uuid")?,
        category,
        from_member_id: parse_uuid(&from_text, "relationships.from_member_uuid")?,
        from_member_partner_id,
        to_member_id: parse_uuid(&to_text, "relationships.to_member_uuid")?,
    };
    if !relationship.is_complete() {
        return Err(StoreError::InvalidData(format!(
            "children relationship {} has no co-parent",
            relationship.id
        )));
    }
    Ok(relationship)
}

fn category_to_db(category: RelationshipCategory) -> &'static str {
    match category {
        RelationshipCategory::Parent => "parent",
        RelationshipCategory::Sibling => "sibling",
        RelationshipCategory::Partner => "partner",
        RelationshipCategory::Children => "children",
    }
}

fn parse_category(value: &str) -> Option<RelationshipCategory> {
    match value {
        "parent" => Some(RelationshipCategory::Parent),
        "sibling" => Some(RelationshipCategory::Sibling),
        "partner" => Some(RelationshipCategory::Partner),
        "children" => Some(RelationshipCategory::Children),
        _ => None,
    }
}
