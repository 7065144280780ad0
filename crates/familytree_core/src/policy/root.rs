//! Root designation policy.
//!
//! # Invariants
//! - A non-empty tree has exactly one member with `is_root = true`.
//! - The first member of an empty tree becomes root.
//! - Root moves only to a new ancestor inserted above a parentless member.

use crate::model::family_tree::FamilyTreeId;
use crate::model::member::Member;
use crate::repo::member_repo::MemberRepository;
use crate::repo::StoreResult;

/// Returns whether `tree_id` has no members yet.
pub fn is_empty(members: &dyn MemberRepository, tree_id: FamilyTreeId) -> StoreResult<bool> {
    Ok(members.count_in_tree(tree_id)? == 0)
}

/// Marks `member` as root when it is the first member of its tree.
pub fn assign_root_if_empty(member: &mut Member, tree_is_empty: bool) {
    member.is_root = tree_is_empty;
}

/// Moves the root designation to `new_ancestor`.
///
/// Returns the demoted previous root, which callers must persist before the
/// new ancestor so that the tree never holds two roots.
pub fn reassign_root_on_new_ancestor(
    new_ancestor: &mut Member,
    previous_root: Option<Member>,
) -> Option<Member> {
    new_ancestor.is_root = true;
    previous_root
        .filter(|previous| previous.id != new_ancestor.id)
        .map(|mut previous| {
            previous.is_root = false;
            previous
        })
}

#[cfg(test)]
mod tests {
    use super::{assign_root_if_empty, reassign_root_on_new_ancestor};
    use crate::model::member::{Gender, Member, MemberAttributes};
    use uuid::Uuid;

    fn member(tree_id: Uuid, name: &str) -> Member {
        Member::new(tree_id, MemberAttributes::new(name, Gender::Female))
    }

    #[test]
    fn first_member_becomes_root_only_in_empty_tree() {
        let tree_id = Uuid::new_v4();
        let mut first = member(tree_id, "A");
        assign_root_if_empty(&mut first, true);
        assert!(first.is_root);

        let mut second = member(tree_id, "B");
        assign_root_if_empty(&mut second, false);
        assert!(!second.is_root);
    }

    #[test]
    fn new_ancestor_takes_root_and_previous_root_is_demoted() {
        let tree_id = Uuid::new_v4();
        let mut previous = member(tree_id, "A");
        previous.is_root = true;
        let previous_id = previous.id;
        let mut ancestor = member(tree_id, "B");

        let demoted = reassign_root_on_new_ancestor(&mut ancestor, Some(previous)).unwrap();

        assert!(ancestor.is_root);
        assert_eq!(demoted.id, previous_id);
        assert!(!demoted.is_root);
    }

    #[test]
    fn new_ancestor_in_rootless_tree_demotes_nobody() {
        let mut ancestor = member(Uuid::new_v4(), "B");
        assert!(reassign_root_on_new_ancestor(&mut ancestor, None).is_none());
        assert!(ancestor.is_root);
    }
}
