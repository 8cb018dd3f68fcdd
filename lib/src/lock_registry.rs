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

//! Component E: the two in-DB lock tables. `wc_lock` rows are WCMS's own
//! cooperative write lock over a subtree of the working copy, acquired
//! and released as part of an ordinary transaction — not to be confused
//! with [`crate::lock::FileLock`], the process-level advisory lock over
//! the whole `wc.db` file that guards concurrent *processes* rather than
//! concurrent callers within one process (§4.E, §4.I). `lock` rows cache
//! server-granted path locks so a client can tell "locked by me" from
//! "locked by someone else" without a round trip.

use rusqlite::OptionalExtension;

use crate::error::{WcmsError, WcmsResult};
use crate::path::LocalRelPath;
use crate::storage::catalog;

/// Acquires (or extends) the WCMS write lock rooted at `path`. `levels`
/// bounds how far below `path` the lock reaches: `0` for just `path`
/// itself, a positive count for that many levels of descendants, or a
/// negative sentinel meaning unlimited depth, matching svn's own
/// `wc_lock.locked_levels` convention.
pub fn acquire(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    path: &LocalRelPath,
    levels: i64,
) -> WcmsResult<()> {
    if find_covering(tx, wc_id, path)?.is_some() {
        return Err(WcmsError::ConstraintViolation(format!(
            "{path} is already locked"
        )));
    }
    tx.execute(catalog::INSERT_WC_LOCK, (wc_id, path.as_str(), levels))?;
    Ok(())
}

pub fn release(tx: &rusqlite::Transaction, wc_id: i64, path: &LocalRelPath) -> WcmsResult<()> {
    tx.execute(catalog::DELETE_WC_LOCK, (wc_id, path.as_str()))?;
    Ok(())
}

pub fn is_locked(conn: &rusqlite::Connection, wc_id: i64, path: &LocalRelPath) -> WcmsResult<bool> {
    let levels: Option<i64> = conn
        .query_row(catalog::SELECT_WC_LOCK, (wc_id, path.as_str()), |row| {
            row.get(0)
        })
        .optional()?;
    Ok(levels.is_some())
}

/// Finds the nearest ancestor-or-self lock whose depth covers `path`,
/// the same walk svn's `wc_db` does before allowing a write (§4.E).
pub fn find_covering(
    conn: &rusqlite::Connection,
    wc_id: i64,
    path: &LocalRelPath,
) -> WcmsResult<Option<LocalRelPath>> {
    let mut candidate = Some(path.clone());
    while let Some(current) = candidate {
        let found: Option<(String, i64)> = conn
            .query_row(catalog::FIND_WC_LOCK, (wc_id, current.as_str()), |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?;
        if let Some((lock_root, levels)) = found {
            let lock_root = LocalRelPath::parse(&lock_root)?;
            let depth_below = path.depth() - lock_root.depth();
            if levels < 0 || depth_below <= levels {
                return Ok(Some(lock_root));
            }
        }
        candidate = current.parent();
    }
    Ok(None)
}

/// Records a server-granted path lock (§4.E). `repo_id` identifies which
/// repository's namespace `repos_relpath` lives in, since a single
/// workcopy root may in principle mix externals from different
/// repositories.
pub fn record_server_lock(
    tx: &rusqlite::Transaction,
    repo_id: i64,
    repos_relpath: &str,
    lock_token: &str,
    lock_owner: Option<&str>,
    lock_comment: Option<&str>,
    lock_date: Option<i64>,
) -> WcmsResult<()> {
    tx.execute(
        catalog::INSERT_LOCK,
        (
            repo_id,
            repos_relpath,
            lock_token,
            lock_owner,
            lock_comment,
            lock_date,
        ),
    )?;
    Ok(())
}

pub fn forget_server_lock(
    tx: &rusqlite::Transaction,
    repo_id: i64,
    repos_relpath: &str,
) -> WcmsResult<()> {
    tx.execute(catalog::DELETE_LOCK, (repo_id, repos_relpath))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::storage::Storage;

    fn open() -> Storage {
        Storage::open_in_memory(SessionConfig::default()).unwrap()
    }

    #[test]
    fn acquire_then_release_round_trips() {
        let mut storage = open();
        let path = LocalRelPath::from("src");
        storage
            .with_write_transaction(|tx| acquire(tx, 1, &path, -1))
            .unwrap();
        assert!(is_locked(storage.conn(), 1, &path).unwrap());
        storage
            .with_write_transaction(|tx| release(tx, 1, &path))
            .unwrap();
        assert!(!is_locked(storage.conn(), 1, &path).unwrap());
    }

    #[test]
    fn nested_path_is_covered_by_ancestor_lock() {
        let mut storage = open();
        let dir = LocalRelPath::from("src");
        let child = LocalRelPath::from("src/main.rs");
        storage
            .with_write_transaction(|tx| acquire(tx, 1, &dir, -1))
            .unwrap();
        let covering = find_covering(storage.conn(), 1, &child).unwrap();
        assert_eq!(covering, Some(dir));
    }

    #[test]
    fn double_acquire_is_rejected() {
        let mut storage = open();
        let path = LocalRelPath::from("src");
        storage
            .with_write_transaction(|tx| acquire(tx, 1, &path, -1))
            .unwrap();
        let err = storage
            .with_write_transaction(|tx| acquire(tx, 1, &path, -1))
            .unwrap_err();
        assert!(matches!(err, WcmsError::ConstraintViolation(_)));
    }
}
