use wcms::actual::{self, ConflictAction, ConflictReason, TextConflict, TreeConflict};
use wcms::checksum::Sha1Checksum;
use wcms::path::LocalRelPath;

#[test]
fn text_conflict_then_tree_conflict_both_flag_the_same_row_as_victim() {
    let (_temp, mut session) = testutils::open_test_session();
    let wc_id = session.wc_id();
    let path = testutils::populate_base_tree(&mut session, b"base content");

    let text_conflict = TextConflict {
        older: Sha1Checksum::of(b"base content"),
        left: Sha1Checksum::of(b"local edit"),
        right: Sha1Checksum::of(b"incoming edit"),
    };
    testutils::in_transaction(&mut session, |tx| {
        actual::set_text_conflict(tx, wc_id, &path, &text_conflict)
    });
    assert!(actual::read(session.storage().conn(), wc_id, &path)
        .unwrap()
        .unwrap()
        .is_conflict_victim());

    let tree_conflict = TreeConflict {
        operation: "update".to_string(),
        left_kind: Some("file".to_string()),
        left_revision: Some(4),
        right_kind: Some("file".to_string()),
        right_revision: Some(5),
        action: ConflictAction::Edited,
        reason: ConflictReason::Deleted,
    };
    testutils::in_transaction(&mut session, |tx| {
        actual::set_tree_conflict(tx, wc_id, &path, &tree_conflict)
    });

    let victims = actual::list_conflict_victims(session.storage().conn(), wc_id, &LocalRelPath::root())
        .unwrap();
    assert_eq!(victims, vec![path.clone()]);

    testutils::in_transaction(&mut session, |tx| {
        actual::clear_text_conflict(tx, wc_id, &path)?;
        actual::clear_tree_conflict(tx, wc_id, &path)
    });
    assert!(actual::read(session.storage().conn(), wc_id, &path)
        .unwrap()
        .is_none());
}

#[test]
fn changelist_membership_survives_independent_of_conflicts() {
    let (_temp, mut session) = testutils::open_test_session();
    let wc_id = session.wc_id();
    let path = testutils::populate_base_tree(&mut session, b"anything");

    testutils::in_transaction(&mut session, |tx| {
        actual::set_changelist(tx, wc_id, &path, Some("feature-x"))
    });
    let actual_node = actual::read(session.storage().conn(), wc_id, &path)
        .unwrap()
        .unwrap();
    assert_eq!(actual_node.changelist.as_deref(), Some("feature-x"));
    assert!(!actual_node.is_conflict_victim());
}
