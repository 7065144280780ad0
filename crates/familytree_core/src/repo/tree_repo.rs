//! Family tree repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist and load the `family_trees` aggregate records.
//!
//! # Invariants
//! - Tree ids are immutable once written.

use crate::model::family_tree::{FamilyTree, FamilyTreeId, TreeVisibility};
use crate::repo::{ensure_connection_ready, parse_uuid, StoreError, StoreResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Repository interface for family tree records.
pub trait FamilyTreeRepository {
    /// Inserts one tree and returns its id.
    fn create_tree(&self, tree: &FamilyTree) -> StoreResult<FamilyTreeId>;
    /// Loads one tree by id.
    fn get_tree(&self, id: FamilyTreeId) -> StoreResult<Option<FamilyTree>>;
}

/// SQLite-backed family tree repository.
pub struct SqliteFamilyTreeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFamilyTreeRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_connection_ready(conn, &["family_trees"])?;
        Ok(Self { conn })
    }

    pub(crate) fn from_ready(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl FamilyTreeRepository for SqliteFamilyTreeRepository<'_> {
    fn create_tree(&self, tree: &FamilyTree) -> StoreResult<FamilyTreeId> {
        self.conn.execute(
            "INSERT INTO family_trees (
                tree_uuid,
                display_name,
                owner_uuid,
                visibility
            ) VALUES (?1, ?2, ?3, ?4);",
            params![
                tree.id.to_string(),
                tree.display_name.as_str(),
                tree.owner_id.to_string(),
                visibility_to_db(tree.visibility),
            ],
        )?;
        Ok(tree.id)
    }

    fn get_tree(&self, id: FamilyTreeId) -> StoreResult<Option<FamilyTree>> {
        self.conn
            .query_row(
                "SELECT tree_uuid, display_name, owner_uuid, visibility
                 FROM family_trees
                 WHERE tree_uuid = ?1;",
                [id.to_string()],
                |row| Ok(parse_tree_row(row)),
            )
            .optional()?
            .transpose()
    }
}

fn parse_tree_row(row: &Row<'_>) -> StoreResult<FamilyTree> {
    let id_text: String = row.get("tree_uuid")?;
    let owner_text: String = row.get("owner_uuid")?;
    let visibility_text: String = row.get("visibility")?;
    let visibility = parse_visibility(&visibility_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid visibility `{visibility_text}` in family_trees.visibility"
        ))
    })?;

    Ok(FamilyTree {
        id: parse_uuid(&id_text, "family_trees.tree_uuid")?,
        display_name: row.get("display_name")?,
        owner_id: parse_uuid(&owner_text, "family_trees.owner_uuid")?,
        visibility,
    })
}

fn visibility_to_db(visibility: TreeVisibility) -> &'static str {
    match visibility {
        TreeVisibility::Private => "private",
        TreeVisibility::Family => "family",
        TreeVisibility::Public => "public",
    }
}

fn parse_visibility(value: &str) -> Option<TreeVisibility> {
    match value {
        "private" => Some(TreeVisibility::Private),
        "family" => Some(TreeVisibility::Family),
        "public" => Some(TreeVisibility::Public),
        _ => None,
    }
}
