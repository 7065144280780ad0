use familytree_core::db::open_db_in_memory;
use familytree_core::repo::member_repo::{MemberRepository, SqliteMemberRepository};
use familytree_core::repo::relationship_repo::{RelationshipQuery, RelationshipRepository};
use familytree_core::{
    AddMemberRequest, CancelToken, DbError, EngineConfig, ErrorKind, FamilyTree, FamilyTreeId,
    FamilyTreeRepository, FamilyTreeService, Gender, GraphError, GraphTransaction, Member,
    MemberAttributes, MemberGraphService, MemberId, Relationship, RelationshipCategory,
    RelationshipId, RetryPolicy, SqliteFamilyTreeRepository, SqliteUnitOfWork, StoreError,
    StoreResult, TreeVisibility, UnitOfWork,
};
use rusqlite::{ffi, Connection};
use std::cell::Cell;
use uuid::Uuid;

fn busy() -> StoreError {
    StoreError::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(
        ffi::Error::new(ffi::SQLITE_BUSY),
        None,
    )))
}

/// Fails `begin` with `SQLITE_BUSY` a fixed number of times, then delegates.
struct FlakyUnitOfWork<'conn> {
    inner: SqliteUnitOfWork<'conn>,
    busy_failures: Cell<u32>,
    begins: Cell<u32>,
}

impl<'conn> FlakyUnitOfWork<'conn> {
    fn new(conn: &'conn Connection, busy_failures: u32) -> Self {
        Self {
            inner: SqliteUnitOfWork::try_new(conn).unwrap(),
            busy_failures: Cell::new(busy_failures),
            begins: Cell::new(0),
        }
    }
}

impl UnitOfWork for FlakyUnitOfWork<'_> {
    fn begin(&self) -> StoreResult<Box<dyn GraphTransaction + '_>> {
        self.begins.set(self.begins.get() + 1);
        let remaining = self.busy_failures.get();
        if remaining > 0 {
            self.busy_failures.set(remaining - 1);
            return Err(busy());
        }
        self.inner.begin()
    }
}

/// Opens real transactions whose writes can fire a cancel token or fail
/// with `SQLITE_BUSY` partway through an insertion.
struct ScriptedUnitOfWork<'conn> {
    inner: SqliteUnitOfWork<'conn>,
    /// Cancelled right after the first member write of a transaction lands.
    cancel_on_member_write: Option<CancelToken>,
    /// `children` edge writes left to fail with `SQLITE_BUSY`.
    busy_children_writes: Cell<u32>,
    begins: Cell<u32>,
}

impl<'conn> ScriptedUnitOfWork<'conn> {
    fn new(conn: &'conn Connection) -> Self {
        Self {
            inner: SqliteUnitOfWork::try_new(conn).unwrap(),
            cancel_on_member_write: None,
            busy_children_writes: Cell::new(0),
            begins: Cell::new(0),
        }
    }
}

impl UnitOfWork for ScriptedUnitOfWork<'_> {
    fn begin(&self) -> StoreResult<Box<dyn GraphTransaction + '_>> {
        self.begins.set(self.begins.get() + 1);
        let inner = self.inner.begin()?;
        Ok(Box::new(ScriptedTransaction {
            inner,
            script: self,
        }))
    }
}

struct ScriptedTransaction<'a, 'conn> {
    inner: Box<dyn GraphTransaction + 'a>,
    script: &'a ScriptedUnitOfWork<'conn>,
}

impl GraphTransaction for ScriptedTransaction<'_, '_> {
    fn trees(&self) -> &dyn FamilyTreeRepository {
        self.inner.trees()
    }

    fn members(&self) -> &dyn MemberRepository {
        self
    }

    fn relationships(&self) -> &dyn RelationshipRepository {
        self
    }

    fn commit(self: Box<Self>) -> StoreResult<()> {
        let Self { inner, .. } = *self;
        inner.commit()
    }

    fn rollback(self: Box<Self>) -> StoreResult<()> {
        let Self { inner, .. } = *self;
        inner.rollback()
    }
}

impl MemberRepository for ScriptedTransaction<'_, '_> {
    fn get_member(&self, id: MemberId) -> StoreResult<Option<Member>> {
        self.inner.members().get_member(id)
    }

    fn add_member(&self, member: &Member) -> StoreResult<MemberId> {
        let id = self.inner.members().add_member(member)?;
        if let Some(cancel) = &self.script.cancel_on_member_write {
            cancel.cancel();
        }
        Ok(id)
    }

    fn update_member(&self, member: &Member) -> StoreResult<()> {
        self.inner.members().update_member(member)
    }

    fn count_in_tree(&self, tree_id: FamilyTreeId) -> StoreResult<u64> {
        self.inner.members().count_in_tree(tree_id)
    }

    fn find_root(&self, tree_id: FamilyTreeId) -> StoreResult<Option<Member>> {
        self.inner.members().find_root(tree_id)
    }

    fn list_in_tree(&self, tree_id: FamilyTreeId) -> StoreResult<Vec<Member>> {
        self.inner.members().list_in_tree(tree_id)
    }
}

impl RelationshipRepository for ScriptedTransaction<'_, '_> {
    fn add_relationship(&self, relationship: &Relationship) -> StoreResult<RelationshipId> {
        let remaining = self.script.busy_children_writes.get();
        if relationship.category == RelationshipCategory::Children && remaining > 0 {
            self.script.busy_children_writes.set(remaining - 1);
            return Err(busy());
        }
        self.inner.relationships().add_relationship(relationship)
    }

    fn query_relationships(&self, query: &RelationshipQuery) -> StoreResult<Vec<Relationship>> {
        self.inner.relationships().query_relationships(query)
    }
}

fn fast_retry(max_attempts: u32) -> EngineConfig {
    EngineConfig {
        retry: RetryPolicy {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
        },
    }
}

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn create_tree(conn: &Connection) -> FamilyTree {
    FamilyTreeService::new(SqliteFamilyTreeRepository::try_new(conn).unwrap())
        .create_tree(Uuid::new_v4(), "Invariants", TreeVisibility::Family)
        .unwrap()
}

fn first_member(tree: &FamilyTree, name: &str) -> AddMemberRequest {
    AddMemberRequest::first_member(tree.id, MemberAttributes::new(name, Gender::Female))
}

fn related(
    tree: &FamilyTree,
    category: RelationshipCategory,
    reference: MemberId,
    name: &str,
) -> AddMemberRequest {
    AddMemberRequest::related(
        tree.id,
        category,
        reference,
        MemberAttributes::new(name, Gender::Male),
    )
}

fn root_ids(conn: &Connection, tree: &FamilyTree) -> Vec<MemberId> {
    SqliteMemberRepository::try_new(conn)
        .unwrap()
        .list_in_tree(tree.id)
        .unwrap()
        .into_iter()
        .filter(|member| member.is_root)
        .map(|member| member.id)
        .collect()
}

fn member_count(conn: &Connection, tree: &FamilyTree) -> u64 {
    SqliteMemberRepository::try_new(conn)
        .unwrap()
        .count_in_tree(tree.id)
        .unwrap()
}

fn edge_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM relationships;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn mixed_insertions_keep_single_root_and_complete_parent_pairs() {
    let conn = setup();
    let tree = create_tree(&conn);
    let graph = MemberGraphService::new(SqliteUnitOfWork::try_new(&conn).unwrap());

    let me = graph.add_member(&first_member(&tree, "Me")).unwrap();
    assert_eq!(root_ids(&conn, &tree), vec![me.member.id]);

    let father = graph
        .add_member(&related(&tree, RelationshipCategory::Parent, me.member.id, "Father"))
        .unwrap();
    assert_eq!(root_ids(&conn, &tree), vec![father.member.id]);

    let grandfather = graph
        .add_member(&related(&tree, RelationshipCategory::Parent, father.member.id, "Grandfather"))
        .unwrap();
    assert_eq!(root_ids(&conn, &tree), vec![grandfather.member.id]);

    let steps = [
        related(&tree, RelationshipCategory::Sibling, me.member.id, "Brother"),
        related(&tree, RelationshipCategory::Sibling, father.member.id, "Uncle"),
        related(&tree, RelationshipCategory::Partner, me.member.id, "Spouse"),
        AddMemberRequest::child(
            tree.id,
            me.member.id,
            None,
            MemberAttributes::new("Kid", Gender::Unknown),
        ),
        related(&tree, RelationshipCategory::Parent, me.member.id, "Mother"),
    ];
    for request in &steps {
        graph.add_member(request).unwrap();
        assert_eq!(root_ids(&conn, &tree), vec![grandfather.member.id]);
    }

    let half_pairs: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM relationships
             WHERE category = 'children' AND from_member_partner_uuid IS NULL;",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(half_pairs, 0);

    let multi_parented: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM (
                SELECT to_member_uuid FROM relationships
                WHERE category = 'children'
                GROUP BY to_member_uuid
                HAVING COUNT(*) > 1
            );",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(multi_parented, 0);

    assert_eq!(
        graph.tree_root(tree.id).unwrap().map(|root| root.id),
        Some(grandfather.member.id)
    );
}

#[test]
fn failure_mid_insertion_rolls_back_every_write() {
    let conn = setup();
    let tree = create_tree(&conn);
    let graph = MemberGraphService::new(SqliteUnitOfWork::try_new(&conn).unwrap());
    let a = graph.add_member(&first_member(&tree, "A")).unwrap();

    conn.execute_batch(
        "CREATE TRIGGER fail_children_edges
         BEFORE INSERT ON relationships
         WHEN NEW.category = 'children'
         BEGIN
             SELECT RAISE(ABORT, 'injected children edge failure');
         END;",
    )
    .unwrap();

    let err = graph
        .add_member(&related(&tree, RelationshipCategory::Parent, a.member.id, "B"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(member_count(&conn, &tree), 1);
    assert_eq!(edge_count(&conn), 0);
    assert_eq!(root_ids(&conn, &tree), vec![a.member.id]);

    conn.execute_batch("DROP TRIGGER fail_children_edges;").unwrap();
    let b = graph
        .add_member(&related(&tree, RelationshipCategory::Parent, a.member.id, "B"))
        .unwrap();
    assert!(b.member.is_root);
    assert_eq!(member_count(&conn, &tree), 3);
}

#[test]
fn transient_begin_failures_are_retried() {
    let conn = setup();
    let tree = create_tree(&conn);
    let graph = MemberGraphService::with_config(FlakyUnitOfWork::new(&conn, 2), fast_retry(3));

    let a = graph.add_member(&first_member(&tree, "A")).unwrap();

    assert!(a.member.is_root);
    assert_eq!(member_count(&conn, &tree), 1);
}

#[test]
fn transient_failure_surfaces_once_budget_is_spent() {
    let conn = setup();
    let tree = create_tree(&conn);
    let flaky = FlakyUnitOfWork::new(&conn, 10);
    let graph = MemberGraphService::with_config(flaky, fast_retry(3));

    let err = graph.add_member(&first_member(&tree, "A")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transient);
    assert!(matches!(err, GraphError::TransientStorage(_)));
    assert_eq!(member_count(&conn, &tree), 0);
}

#[test]
fn retry_budget_counts_every_attempt() {
    let conn = setup();
    let tree = create_tree(&conn);
    let flaky = FlakyUnitOfWork::new(&conn, 10);
    let begins = {
        let graph = MemberGraphService::with_config(&flaky, fast_retry(4));
        graph.add_member(&first_member(&tree, "A")).unwrap_err();
        flaky.begins.get()
    };
    assert_eq!(begins, 4);

    let logical = FlakyUnitOfWork::new(&conn, 0);
    {
        let graph = MemberGraphService::with_config(&logical, fast_retry(4));
        let a = graph.add_member(&first_member(&tree, "A")).unwrap();
        let err = graph
            .add_member(&related(&tree, RelationshipCategory::Sibling, a.member.id, "F"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
    // One begin for the first member, one for the rejected sibling.
    assert_eq!(logical.begins.get(), 2);
}

#[test]
fn cancelled_call_writes_nothing() {
    let conn = setup();
    let tree = create_tree(&conn);
    let flaky = FlakyUnitOfWork::new(&conn, 0);
    let cancel = CancelToken::new();
    cancel.cancel();

    {
        let graph = MemberGraphService::new(&flaky);
        let err = graph
            .add_member_cancellable(&first_member(&tree, "A"), &cancel)
            .unwrap_err();
        assert!(matches!(err, GraphError::Cancelled));
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    assert_eq!(flaky.begins.get(), 0);
    assert_eq!(member_count(&conn, &tree), 0);
}

#[test]
fn cancel_during_insertion_rolls_back_written_members() {
    let conn = setup();
    let tree = create_tree(&conn);
    let a = MemberGraphService::new(SqliteUnitOfWork::try_new(&conn).unwrap())
        .add_member(&first_member(&tree, "A"))
        .unwrap();

    let cancel = CancelToken::new();
    let mut scripted = ScriptedUnitOfWork::new(&conn);
    scripted.cancel_on_member_write = Some(cancel.clone());
    {
        let graph = MemberGraphService::with_config(&scripted, fast_retry(3));
        let err = graph
            .add_member_cancellable(
                &related(&tree, RelationshipCategory::Parent, a.member.id, "B"),
                &cancel,
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::Cancelled));
    }

    assert!(cancel.is_cancelled());
    assert_eq!(scripted.begins.get(), 1);
    assert_eq!(member_count(&conn, &tree), 1);
    assert_eq!(edge_count(&conn), 0);
    assert_eq!(root_ids(&conn, &tree), vec![a.member.id]);
}

#[test]
fn transient_failure_after_partial_writes_retries_from_scratch() {
    let conn = setup();
    let tree = create_tree(&conn);
    let a = MemberGraphService::new(SqliteUnitOfWork::try_new(&conn).unwrap())
        .add_member(&first_member(&tree, "A"))
        .unwrap();

    let scripted = ScriptedUnitOfWork::new(&conn);
    scripted.busy_children_writes.set(1);
    let b = {
        let graph = MemberGraphService::with_config(&scripted, fast_retry(3));
        graph
            .add_member(&related(&tree, RelationshipCategory::Parent, a.member.id, "B"))
            .unwrap()
    };

    // First attempt demoted A and wrote B plus its placeholder before failing.
    assert_eq!(scripted.begins.get(), 2);
    assert_eq!(scripted.busy_children_writes.get(), 0);
    assert!(b.member.is_root);
    assert_eq!(member_count(&conn, &tree), 3);
    assert_eq!(edge_count(&conn), 2);
    assert_eq!(root_ids(&conn, &tree), vec![b.member.id]);

    let reloaded = MemberGraphService::new(SqliteUnitOfWork::try_new(&conn).unwrap())
        .member_graph(a.member.id)
        .unwrap();
    assert!(!reloaded.member.is_root);
    assert_eq!(
        reloaded.parent_edge().map(|edge| edge.from_member_id),
        Some(b.member.id)
    );
}

#[test]
fn member_graph_and_tree_root_report_missing_targets() {
    let conn = setup();
    let tree = create_tree(&conn);
    let graph = MemberGraphService::new(SqliteUnitOfWork::try_new(&conn).unwrap());

    assert_eq!(graph.tree_root(tree.id).unwrap(), None);
    let missing_tree = Uuid::new_v4();
    assert!(matches!(
        graph.tree_root(missing_tree),
        Err(GraphError::TreeNotFound(id)) if id == missing_tree
    ));

    let missing_member = Uuid::new_v4();
    assert!(matches!(
        graph.member_graph(missing_member),
        Err(GraphError::MemberNotFound(id)) if id == missing_member
    ));

    let a = graph.add_member(&first_member(&tree, "A")).unwrap();
    let b = graph
        .add_member(&related(&tree, RelationshipCategory::Parent, a.member.id, "B"))
        .unwrap();
    let loaded = graph.member_graph(a.member.id).unwrap();
    assert!(!loaded.member.is_root);
    assert_eq!(loaded.relationships.len(), 1);
    assert_eq!(
        loaded.parent_edge().map(|edge| edge.from_member_id),
        Some(b.member.id)
    );
}
