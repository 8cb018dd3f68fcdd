use wcms::checksum::{Md5Checksum, Sha1Checksum};
use wcms::nodes::{self, NewNode};
use wcms::path::LocalRelPath;
use wcms::pristine;

#[test]
fn gc_leaves_blobs_referenced_by_a_node_alone() {
    let (_temp, mut session) = testutils::open_test_session();
    let wc_id = session.wc_id();
    let checksum = Sha1Checksum::of(b"referenced content");
    let md5 = Md5Checksum::from_bytes(&[7u8; 16]);
    let path = LocalRelPath::from("f.txt");

    testutils::in_transaction(&mut session, |tx| {
        pristine::add_ref(tx, &checksum, &md5, 19)?;
        pristine::release(tx, &checksum)?;
        nodes::apply_base_node(tx, wc_id, &path, &NewNode::file(checksum.clone()))
    });

    let collected = testutils::in_transaction(&mut session, |tx| pristine::gc(tx));
    assert!(collected.is_empty());
    assert!(pristine::lookup_by_sha(session.storage().conn(), &checksum)
        .unwrap()
        .is_some());
}

#[test]
fn gc_collects_blobs_once_their_node_is_reverted_away() {
    let (_temp, mut session) = testutils::open_test_session();
    let wc_id = session.wc_id();
    let checksum = Sha1Checksum::of(b"soon orphaned");
    let md5 = Md5Checksum::from_bytes(&[8u8; 16]);
    let path = LocalRelPath::from("f.txt");

    testutils::in_transaction(&mut session, |tx| {
        pristine::add_ref(tx, &checksum, &md5, 13)?;
        nodes::apply_base_node(tx, wc_id, &path, &NewNode::file(checksum.clone()))
    });

    // Removing the BASE row directly (simulating the owning BASE update
    // having moved past this content) then releasing the reference makes
    // the blob collectible.
    testutils::in_transaction(&mut session, |tx| {
        tx.execute(
            "DELETE FROM nodes WHERE wc_id = ?1 AND local_relpath = ?2",
            (wc_id, path.as_str()),
        )?;
        pristine::release(tx, &checksum)
    });

    let collected = testutils::in_transaction(&mut session, |tx| pristine::gc(tx));
    assert_eq!(collected, vec![checksum.clone()]);
    assert!(pristine::lookup_by_sha(session.storage().conn(), &checksum)
        .unwrap()
        .is_none());
}
