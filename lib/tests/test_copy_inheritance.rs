use wcms::checksum::Sha1Checksum;
use wcms::nodes::{self, Kind, NewNode};
use wcms::path::LocalRelPath;

#[test]
fn copied_subtree_children_inherit_until_individually_materialized() {
    let (_temp, mut session) = testutils::open_test_session();
    let wc_id = session.wc_id();
    let src = LocalRelPath::from("src");
    let src_a = LocalRelPath::from("src/a.rs");
    let src_b = LocalRelPath::from("src/b.rs");
    let dst = LocalRelPath::from("dst");
    let dst_a = LocalRelPath::from("dst/a.rs");
    let dst_b = LocalRelPath::from("dst/b.rs");

    testutils::in_transaction(&mut session, |tx| {
        nodes::apply_base_node(tx, wc_id, &src, &NewNode::dir())?;
        nodes::apply_base_node(tx, wc_id, &src_a, &NewNode::file(Sha1Checksum::of(b"a")))?;
        nodes::apply_base_node(tx, wc_id, &src_b, &NewNode::file(Sha1Checksum::of(b"b")))?;
        nodes::schedule_copy_from_base(tx, wc_id, &src, &dst)
    });

    let a = nodes::read_effective_node(session.storage().conn(), wc_id, &dst_a).unwrap();
    assert!(a.inherited);
    assert_eq!(a.checksum, Some(Sha1Checksum::of(b"a")));

    let b = nodes::read_effective_node(session.storage().conn(), wc_id, &dst_b).unwrap();
    assert!(b.inherited);
    assert_eq!(b.checksum, Some(Sha1Checksum::of(b"b")));

    // Materializing `dst/a.rs` on its own (e.g. a local edit after the
    // copy) stops it from inheriting; its sibling is unaffected.
    testutils::in_transaction(&mut session, |tx| {
        nodes::schedule_delete(tx, wc_id, &dst_a)
    });
    let a_after = nodes::read_effective_node(session.storage().conn(), wc_id, &dst_a).unwrap();
    assert!(!a_after.inherited);
    let b_after = nodes::read_effective_node(session.storage().conn(), wc_id, &dst_b).unwrap();
    assert!(b_after.inherited);
    assert_eq!(b_after.kind, Kind::File);
}

#[test]
fn copy_from_working_layer_chains_through_two_copies() {
    let (_temp, mut session) = testutils::open_test_session();
    let wc_id = session.wc_id();
    let original = LocalRelPath::from("orig.txt");
    let first_copy = LocalRelPath::from("copy1.txt");
    let second_copy = LocalRelPath::from("copy2.txt");

    testutils::in_transaction(&mut session, |tx| {
        nodes::apply_base_node(
            tx,
            wc_id,
            &original,
            &NewNode::file(Sha1Checksum::of(b"payload")),
        )?;
        nodes::schedule_copy_from_base(tx, wc_id, &original, &first_copy)?;
        nodes::schedule_copy_from_working(tx, wc_id, &first_copy, &second_copy)
    });

    let copy = nodes::read_effective_node(session.storage().conn(), wc_id, &second_copy).unwrap();
    assert_eq!(copy.checksum, Some(Sha1Checksum::of(b"payload")));
}
