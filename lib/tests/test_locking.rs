use wcms::config::SessionConfig;
use wcms::error::WcmsError;
use wcms::lock_registry;
use wcms::path::LocalRelPath;

#[test]
fn in_db_lock_does_not_prevent_a_second_process_level_session() {
    // The in-DB `wc_lock` (this module) and the process-level advisory
    // file lock (`Session::open`) guard different things: a second
    // `Session::open` on the same root only fails if the first session
    // is still holding the file lock, not because of any row in
    // `wc_lock`.
    let (_temp, mut session) = testutils::open_test_session();
    let wc_id = session.wc_id();
    let root = LocalRelPath::root();

    testutils::in_transaction(&mut session, |tx| lock_registry::acquire(tx, wc_id, &root, -1));
    assert!(lock_registry::is_locked(session.storage().conn(), wc_id, &root).unwrap());

    let err = testutils::in_transaction_expect_err(&mut session, |tx| {
        lock_registry::acquire(tx, wc_id, &root, -1)
    });
    assert!(matches!(err, WcmsError::ConstraintViolation(_)));
}

#[test]
fn session_lock_file_is_removed_on_drop_so_a_later_session_can_open() {
    let temp_dir = testutils::new_temp_dir();
    let lock_path = temp_dir.path().join(".wcms").join("write-lock");
    {
        let _first = wcms::Session::open(temp_dir.path(), SessionConfig::default()).unwrap();
        assert!(lock_path.exists());
    }
    assert!(!lock_path.exists());
    wcms::Session::open(temp_dir.path(), SessionConfig::default()).unwrap();
}
