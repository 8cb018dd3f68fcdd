use wcms::actual;
use wcms::nodes::{self, Presence};
use wcms::path::LocalRelPath;

#[test]
fn delete_then_revert_restores_base_presence() {
    let (_temp, mut session) = testutils::open_test_session();
    let wc_id = session.wc_id();
    let file = testutils::populate_base_tree(&mut session, b"keep me");

    testutils::in_transaction(&mut session, |tx| nodes::schedule_delete(tx, wc_id, &file));
    assert_eq!(
        nodes::read_effective_node(session.storage().conn(), wc_id, &file)
            .unwrap()
            .presence,
        Presence::BaseDeleted
    );

    testutils::in_transaction(&mut session, |tx| nodes::revert(tx, wc_id, &file, false));
    assert_eq!(
        nodes::read_effective_node(session.storage().conn(), wc_id, &file)
            .unwrap()
            .presence,
        Presence::Normal
    );
}

#[test]
fn full_revert_of_subtree_also_clears_conflict_state() {
    let (_temp, mut session) = testutils::open_test_session();
    let wc_id = session.wc_id();
    let file = testutils::populate_base_tree(&mut session, b"contested");
    let dir = LocalRelPath::from("src");

    testutils::in_transaction(&mut session, |tx| {
        nodes::schedule_delete(tx, wc_id, &file)?;
        actual::set_prop_conflict(tx, wc_id, &file, "f.prej")
    });
    assert!(actual::read(session.storage().conn(), wc_id, &file)
        .unwrap()
        .unwrap()
        .is_conflict_victim());

    testutils::in_transaction(&mut session, |tx| nodes::revert(tx, wc_id, &dir, true));

    assert!(actual::read(session.storage().conn(), wc_id, &file)
        .unwrap()
        .is_none());
    // The BASE row for `dir` itself still exists; reverting only removed
    // working-layer rows and the actual overlay under it.
    assert!(nodes::read_base_node(session.storage().conn(), wc_id, &dir).is_ok());
}
