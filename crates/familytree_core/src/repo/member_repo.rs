//! Member repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide add/get/update over the `members` node store.
//! - Answer the tree-level questions root handling needs (count, root).
//!
//! # Invariants
//! - Write paths call `Member::validate()` before SQL mutations.
//! - `tree_uuid` is never rewritten by `update_member`.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::model::family_tree::FamilyTreeId;
use crate::model::member::{Gender, Member, MemberId, MemberRole, MemberStatus};
use crate::repo::{
    bool_to_int, ensure_connection_ready, parse_flag, parse_uuid, StoreError, StoreResult,
};
use rusqlite::{params, Connection, Row};

const MEMBER_SELECT_SQL: &str = "SELECT
    member_uuid,
    tree_uuid,
    full_name,
    gender,
    birth_date,
    death_date,
    is_dead,
    is_root,
    status,
    role
FROM members";

/// Repository interface for member nodes.
pub trait MemberRepository {
    /// Loads one member by id.
    fn get_member(&self, id: MemberId) -> StoreResult<Option<Member>>;
    /// Inserts one member and returns its id.
    fn add_member(&self, member: &Member) -> StoreResult<MemberId>;
    /// Overwrites mutable attributes of an existing member.
    fn update_member(&self, member: &Member) -> StoreResult<()>;
    /// Counts members in one tree.
    fn count_in_tree(&self, tree_id: FamilyTreeId) -> StoreResult<u64>;
    /// Loads the root member of one tree, if any.
    fn find_root(&self, tree_id: FamilyTreeId) -> StoreResult<Option<Member>>;
    /// Lists members of one tree in insertion order.
    fn list_in_tree(&self, tree_id: FamilyTreeId) -> StoreResult<Vec<Member>>;
}

/// SQLite-backed member repository.
pub struct SqliteMemberRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMemberRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_connection_ready(conn, &["members"])?;
        Ok(Self { conn })
    }

    pub(crate) fn from_ready(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_members(&self, sql: &str, tree_id: FamilyTreeId) -> StoreResult<Vec<Member>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([tree_id.to_string()])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(parse_member_row(row)?);
        }
        Ok(members)
    }
}

impl MemberRepository for SqliteMemberRepository<'_> {
    fn get_member(&self, id: MemberId) -> StoreResult<Option<Member>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEMBER_SELECT_SQL} WHERE member_uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_member_row(row)?));
        }
        Ok(None)
    }

    fn add_member(&self, member: &Member) -> StoreResult<MemberId> {
        member.validate()?;

        self.conn.execute(
            "INSERT INTO members (
                member_uuid,
                tree_uuid,
                full_name,
                gender,
                birth_date,
                death_date,
                is_dead,
                is_root,
                status,
                role
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                member.id.to_string(),
                member.tree_id.to_string(),
                member.full_name.as_str(),
                gender_to_db(member.gender),
                member.birth_date,
                member.death_date,
                bool_to_int(member.is_dead),
                bool_to_int(member.is_root),
                status_to_db(member.status),
                role_to_db(member.role),
            ],
        )?;
        Ok(member.id)
    }

    fn update_member(&self, member: &Member) -> StoreResult<()> {
        member.validate()?;

        let changed = self.conn.execute(
            "UPDATE members
             SET
                full_name = ?1,
                gender = ?2,
                birth_date = ?3,
                death_date = ?4,
                is_dead = ?5,
                is_root = ?6,
                status = ?7,
                role = ?8,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE member_uuid = ?9;",
            params![
                member.full_name.as_str(),
                gender_to_db(member.gender),
                member.birth_date,
                member.death_date,
                bool_to_int(member.is_dead),
                bool_to_int(member.is_root),
                status_to_db(member.status),
                role_to_db(member.role),
                member.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "member",
                id: member.id,
            });
        }
        Ok(())
    }

    fn count_in_tree(&self, tree_id: FamilyTreeId) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM members WHERE tree_uuid = ?1;",
            [tree_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn find_root(&self, tree_id: FamilyTreeId) -> StoreResult<Option<Member>> {
        let mut roots = self.query_members(
            &format!("{MEMBER_SELECT_SQL} WHERE tree_uuid = ?1 AND is_root = 1;"),
            tree_id,
        )?;
        if roots.len() > 1 {
            return Err(StoreError::InvalidData(format!(
                "tree {tree_id} has {} root members",
                roots.len()
            )));
        }
        Ok(roots.pop())
    }

    fn list_in_tree(&self, tree_id: FamilyTreeId) -> StoreResult<Vec<Member>> {
        self.query_members(
            &format!("{MEMBER_SELECT_SQL} WHERE tree_uuid = ?1 ORDER BY rowid ASC;"),
            tree_id,
        )
    }
}

fn parse_member_row(row: &Row<'_>) -> StoreResult<Member> {
    let id_text: String = row.get("member_uuid")?;
    let tree_text: String = row.get("tree_uuid")?;

    let gender_text: String = row.get("gender")?;
    let gender = parse_gender(&gender_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid gender `{gender_text}` in members.gender"))
    })?;
    let status_text: String = row.get("status")?;
    let status = parse_status(&status_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid status `{status_text}` in members.status"))
    })?;
    let role_text: String = row.get("role")?;
    let role = parse_role(&role_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid role `{role_text}` in members.role"))
    })?;

    let member = Member {
        id: parse_uuid(&id_text, "members.member_uuid")?,
        tree_id: parse_uuid(&tree_text, "members.tree_uuid")?,
        full_name: row.get("full_name")?,
        gender,
        birth_date: row.get("birth_date")?,
        death_date: row.get("death_date")?,
        is_dead: parse_flag(row.get("is_dead")?, "members.is_dead")?,
        is_root: parse_flag(row.get("is_root")?, "members.is_root")?,
        status,
        role,
    };
    member.validate()?;
    Ok(member)
}

fn gender_to_db(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "male",
        Gender::Female => "female",
        Gender::Unknown => "unknown",
    }
}

fn parse_gender(value: &str) -> Option<Gender> {
    match value {
        "male" => Some(Gender::Male),
        "female" => Some(Gender::Female),
        "unknown" => Some(Gender::Unknown),
        _ => None,
    }
}

fn status_to_db(status: MemberStatus) -> &'static str {
    match status {
        MemberStatus::Normal => "normal",
        MemberStatus::Undefined => "undefined",
    }
}

fn parse_status(value: &str) -> Option<MemberStatus> {
    match value {
        "normal" => Some(MemberStatus::Normal),
        "undefined" => Some(MemberStatus::Undefined),
        _ => None,
    }
}

fn role_to_db(role: MemberRole) -> &'static str {
    match role {
        MemberRole::Member => "member",
        MemberRole::TreeAdmin => "tree_admin",
    }
}

fn parse_role(value: &str) -> Option<MemberRole> {
    match value {
        "member" => Some(MemberRole::Member),
        "tree_admin" => Some(MemberRole::TreeAdmin),
        _ => None,
    }
}
