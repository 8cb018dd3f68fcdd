use std::path::PathBuf;

#[test]
fn test_no_forgotten_test_files() {
    let test_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests");
    testutils::assert_no_forgotten_test_files(&test_dir);
}

mod test_concurrent_reader;
mod test_conflict_lifecycle;
mod test_copy_inheritance;
mod test_local_delete;
mod test_locking;
mod test_pristine_gc;
