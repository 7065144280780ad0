//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `familytree_core` linkage and schema bootstrap.
//! - Grow a small demo tree through `add_member` and print its shape.
//!
//! Usage: `familytree_cli [DB_PATH] [LOG_DIR]`. Without `DB_PATH` the demo
//! runs against an in-memory database.

use familytree_core::{
    open_db, open_db_in_memory, AddMemberRequest, FamilyTreeService, Gender, GraphError,
    MemberAttributes, MemberGraph, MemberGraphService, RelationshipCategory,
    SqliteFamilyTreeRepository, SqliteUnitOfWork, TreeVisibility,
};
use log::info;
use std::error::Error;
use std::process::ExitCode;
use uuid::Uuid;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let db_path = args.next();
    if let Some(log_dir) = args.next() {
        familytree_core::init_logging(familytree_core::default_log_level(), log_dir)?;
    }

    println!("familytree_core ping={}", familytree_core::ping());
    println!("familytree_core version={}", familytree_core::core_version());

    let conn = match db_path.as_deref() {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };

    let trees = FamilyTreeService::new(SqliteFamilyTreeRepository::try_new(&conn)?);
    let tree = trees.create_tree(Uuid::new_v4(), "Demo family", TreeVisibility::Private)?;
    let graph = MemberGraphService::new(SqliteUnitOfWork::try_new(&conn)?);

    let me = graph.add_member(&AddMemberRequest::first_member(
        tree.id,
        MemberAttributes::new("Alex Doe", Gender::Male),
    ))?;
    print_step("first member", &me);

    let father = graph.add_member(&AddMemberRequest::related(
        tree.id,
        RelationshipCategory::Parent,
        me.member.id,
        MemberAttributes::new("Sam Doe", Gender::Male),
    ))?;
    print_step("father", &father);

    let mother = graph.add_member(&AddMemberRequest::related(
        tree.id,
        RelationshipCategory::Parent,
        me.member.id,
        MemberAttributes::new("Maria Doe", Gender::Female),
    ))?;
    print_step("mother (resolves placeholder)", &mother);

    let sister = graph.add_member(&AddMemberRequest::related(
        tree.id,
        RelationshipCategory::Sibling,
        me.member.id,
        MemberAttributes::new("Jo Doe", Gender::Female),
    ))?;
    print_step("sister", &sister);

    let daughter = graph.add_member(&AddMemberRequest::child(
        tree.id,
        me.member.id,
        None,
        MemberAttributes::new("Kim Doe", Gender::Female),
    ))?;
    print_step("daughter", &daughter);

    match graph.add_member(&AddMemberRequest::related(
        tree.id,
        RelationshipCategory::Parent,
        me.member.id,
        MemberAttributes::new("Third Parent", Gender::Unknown),
    )) {
        Err(err @ GraphError::InvalidState(_)) => {
            println!("third parent rejected: {} ({:?})", err, err.kind());
        }
        Err(err) => return Err(err.into()),
        Ok(unexpected) => print_step("unexpected third parent", &unexpected),
    }

    if let Some(root) = graph.tree_root(tree.id)? {
        println!("tree root: {} ({})", root.full_name, root.id);
    }
    info!("event=cli_demo module=cli status=ok tree_id={}", tree.id);
    Ok(())
}

fn print_step(label: &str, graph: &MemberGraph) {
    println!(
        "{label}: {} id={} root={} status={:?} edges={}",
        graph.member.full_name,
        graph.member.id,
        graph.member.is_root,
        graph.member.status,
        graph.relationships.len()
    );
}
