//! Unit-of-work boundary over the genealogy stores.
//!
//! # Responsibility
//! - Open one write transaction that scopes tree, member and relationship
//!   repository calls.
//! - Commit or roll back every write of that scope together.
//!
//! # Invariants
//! - A transaction dropped without `commit` rolls back.
//! - Repositories handed out by a transaction only see that transaction's
//!   connection.

use crate::repo::member_repo::{MemberRepository, SqliteMemberRepository};
use crate::repo::relationship_repo::{RelationshipRepository, SqliteRelationshipRepository};
use crate::repo::tree_repo::{FamilyTreeRepository, SqliteFamilyTreeRepository};
use crate::repo::{ensure_connection_ready, StoreResult};
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// One open write scope over all genealogy stores.
pub trait GraphTransaction {
    fn trees(&self) -> &dyn FamilyTreeRepository;
    fn members(&self) -> &dyn MemberRepository;
    fn relationships(&self) -> &dyn RelationshipRepository;
    /// Makes every write of this scope durable.
    fn commit(self: Box<Self>) -> StoreResult<()>;
    /// Discards every write of this scope.
    fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Factory for write scopes.
pub trait UnitOfWork {
    /// Opens a new write scope.
    fn begin(&self) -> StoreResult<Box<dyn GraphTransaction + '_>>;
}

impl<U: UnitOfWork + ?Sized> UnitOfWork for &U {
    fn begin(&self) -> StoreResult<Box<dyn GraphTransaction + '_>> {
        (**self).begin()
    }
}

/// SQLite unit of work. Each scope is a `BEGIN IMMEDIATE` transaction, so
/// concurrent writers serialize and contention surfaces as `SQLITE_BUSY`.
pub struct SqliteUnitOfWork<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUnitOfWork<'conn> {
    /// Creates unit of work from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_connection_ready(conn, &["family_trees", "members", "relationships"])?;
        Ok(Self { conn })
    }
}

impl UnitOfWork for SqliteUnitOfWork<'_> {
    fn begin(&self) -> StoreResult<Box<dyn GraphTransaction + '_>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        Ok(Box::new(SqliteGraphTransaction {
            tx,
            trees: SqliteFamilyTreeRepository::from_ready(self.conn),
            members: SqliteMemberRepository::from_ready(self.conn),
            relationships: SqliteRelationshipRepository::from_ready(self.conn),
        }))
    }
}

/// Open SQLite write scope.
pub struct SqliteGraphTransaction<'conn> {
    tx: Transaction<'conn>,
    trees: SqliteFamilyTreeRepository<'conn>,
    members: SqliteMemberRepository<'conn>,
    relationships: SqliteRelationshipRepository<'conn>,
}

impl GraphTransaction for SqliteGraphTransaction<'_> {
    fn trees(&self) -> &dyn FamilyTreeRepository {
        &self.trees
    }

    fn members(&self) -> &dyn MemberRepository {
        &self.members
    }

    fn relationships(&self) -> &dyn RelationshipRepository {
        &self.relationships
    }

    fn commit(self: Box<Self>) -> StoreResult<()> {
        let Self { tx, .. } = *self;
        tx.commit()?;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> StoreResult<()> {
        let Self { tx, .. } = *self;
        tx.rollback()?;
        Ok(())
    }
}
