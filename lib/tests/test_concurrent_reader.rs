use wcms::checksum::Sha1Checksum;
use wcms::nodes::{self, NewNode};
use wcms::path::LocalRelPath;
use wcms::storage::Storage;

/// A reader opened against the on-disk file sees a committed write once
/// it commits, through its own connection, without the writer handing it
/// anything directly.
#[test]
fn reader_connection_observes_committed_writes_from_the_writer_session() {
    let temp_dir = testutils::new_temp_dir();
    let config = wcms::config::SessionConfig::default();
    let mut session = wcms::Session::open(temp_dir.path(), config).unwrap();
    let wc_id = session.wc_id();
    let path = LocalRelPath::from("f.txt");

    let db_path = wcms::storage::wc_db_path(temp_dir.path());
    let reader = Storage::open_reader(&db_path).unwrap();
    assert!(nodes::read_effective_node(&reader, wc_id, &path).is_err());

    testutils::in_transaction(&mut session, |tx| {
        nodes::apply_base_node(tx, wc_id, &path, &NewNode::file(Sha1Checksum::of(b"x")))
    });

    let fresh_reader = Storage::open_reader(&db_path).unwrap();
    let record = nodes::read_effective_node(&fresh_reader, wc_id, &path).unwrap();
    assert_eq!(record.checksum, Some(Sha1Checksum::of(b"x")));
}
