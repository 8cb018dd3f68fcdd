// Copyright 2020 The Jujutsu Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use wcms::checksum::Sha1Checksum;
use wcms::config::SessionConfig;
use wcms::nodes::{self, NewNode};
use wcms::path::LocalRelPath;
use wcms::session::Session;
use wcms::WcmsResult;

pub fn new_temp_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("wcms-test-")
        .tempdir()
        .unwrap()
}

/// Opens a fresh session rooted at a throwaway temp directory, returning
/// both so the caller can keep the directory alive for the session's
/// lifetime.
pub fn open_test_session() -> (TempDir, Session) {
    let temp_dir = new_temp_dir();
    let session = Session::open(temp_dir.path(), SessionConfig::default()).unwrap();
    (temp_dir, session)
}

/// A tiny BASE tree fixture used by several resolver and conflict tests:
/// a `src/` directory containing one file `src/f` with the given content.
pub fn populate_base_tree(session: &mut Session, content: &[u8]) -> LocalRelPath {
    let wc_id = session.wc_id();
    let dir = LocalRelPath::from("src");
    let file = LocalRelPath::from("src/f");
    session
        .storage_mut()
        .with_write_transaction(|tx| {
            nodes::apply_base_node(tx, wc_id, &dir, &NewNode::dir())?;
            nodes::apply_base_node(tx, wc_id, &file, &NewNode::file(Sha1Checksum::of(content)))
        })
        .unwrap();
    file
}

pub fn write_working_copy_file(workcopy_root: &Path, relpath: &LocalRelPath, contents: &str) {
    let path = workcopy_root.join(relpath.as_str());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// Runs `body` in a write transaction, unwrapping the result — trims the
/// `with_write_transaction(...).unwrap()` boilerplate repeated across
/// nearly every integration test in this crate.
pub fn in_transaction<T>(
    session: &mut Session,
    body: impl Fn(&rusqlite::Transaction) -> WcmsResult<T>,
) -> T {
    session.storage_mut().with_write_transaction(body).unwrap()
}

/// As [`in_transaction`], but for assertions that the transaction itself
/// fails — unwraps the error instead of the value.
pub fn in_transaction_expect_err<T: std::fmt::Debug>(
    session: &mut Session,
    body: impl Fn(&rusqlite::Transaction) -> WcmsResult<T>,
) -> wcms::WcmsError {
    session.storage_mut().with_write_transaction(body).unwrap_err()
}

pub use rusqlite;

/// Fails the build if any `tests/*.rs` file isn't declared as a `mod` in
/// `runner.rs`, so a forgotten file doesn't silently stop running.
pub fn assert_no_forgotten_test_files(test_dir: &Path) {
    let runner_path = test_dir.join("runner.rs");
    let runner = fs::read_to_string(&runner_path).unwrap();
    let entries = fs::read_dir(test_dir).unwrap();
    for entry in entries {
        let path = entry.unwrap().path();
        if let Some(ext) = path.extension() {
            let name = path.file_stem().unwrap();
            if ext == "rs" && name != "runner" {
                let search = format!("mod {};", name.to_str().unwrap());
                assert!(
                    runner.contains(&search),
                    "missing `{search}` declaration in {}",
                    runner_path.display()
                );
            }
        }
    }
}
