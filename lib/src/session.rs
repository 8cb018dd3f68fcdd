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

//! Component I: the session entry point. A `Session` binds one workcopy's
//! [`Storage`], its process-level [`FileLock`], and a [`SessionConfig`] —
//! nothing here is global mutable state, matching how a caller configures
//! one store at a time rather than mutating a shared singleton (§1
//! "Single-process" design principle).

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::SessionConfig;
use crate::error::{WcmsError, WcmsResult};
use crate::lock::FileLock;
use crate::storage::{self, Storage};

const LOCK_FILE_NAME: &str = "write-lock";

/// An open handle on one workcopy's metadata store. Holds the process
/// lock for its entire lifetime; dropping it releases both the lock and
/// the database connection.
pub struct Session {
    storage: Storage,
    _process_lock: FileLock,
    wc_id: i64,
    root: PathBuf,
}

impl Session {
    /// Opens (creating if necessary) the store rooted at `workcopy_root`,
    /// taking the process-level write lock first so two processes never
    /// race to initialize the same `wc.db` (§4.I).
    pub fn open(workcopy_root: &Path, config: SessionConfig) -> WcmsResult<Self> {
        let admin_dir = workcopy_root.join(".wcms");
        std::fs::create_dir_all(&admin_dir).map_err(|err| WcmsError::io(admin_dir.clone(), err))?;
        let process_lock = FileLock::try_lock(admin_dir.join(LOCK_FILE_NAME))?;
        let db_path = storage::wc_db_path(workcopy_root);
        let mut storage = Storage::open(&db_path, config)?;
        let wc_id = ensure_wcroot(&mut storage, workcopy_root)?;
        info!(wc_id, root = %workcopy_root.display(), "opened workcopy session");
        Ok(Session {
            storage,
            _process_lock: process_lock,
            wc_id,
            root: workcopy_root.to_path_buf(),
        })
    }

    /// An in-memory session for tests: no admin directory, no process
    /// lock file, schema initialized directly.
    #[cfg(any(test, feature = "testing"))]
    pub fn open_in_memory(config: SessionConfig) -> WcmsResult<Self> {
        let lock_dir = tempfile_lock_dir()?;
        let process_lock = FileLock::try_lock(lock_dir.join(LOCK_FILE_NAME))?;
        let mut storage = Storage::open_in_memory(config)?;
        let wc_id = ensure_wcroot(&mut storage, Path::new("."))?;
        Ok(Session {
            storage,
            _process_lock: process_lock,
            wc_id,
            root: PathBuf::from("."),
        })
    }

    pub fn wc_id(&self) -> i64 {
        self.wc_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }
}

#[cfg(any(test, feature = "testing"))]
fn tempfile_lock_dir() -> WcmsResult<PathBuf> {
    let dir = std::env::temp_dir().join(format!("wcms-session-{}", std::process::id()));
    std::fs::create_dir_all(&dir).map_err(|err| WcmsError::io(dir.clone(), err))?;
    Ok(dir)
}

fn ensure_wcroot(storage: &mut Storage, root: &Path) -> WcmsResult<i64> {
    let abspath = root.to_string_lossy().into_owned();
    storage.with_write_transaction(|tx| {
        tx.execute(
            "UPDATE wcroot SET local_abspath = ?1 WHERE id = 1 AND local_abspath IS NULL",
            [&abspath],
        )?;
        Ok(())
    })?;
    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_assigns_wc_id_one() {
        let session = Session::open_in_memory(SessionConfig::default()).unwrap();
        assert_eq!(session.wc_id(), 1);
    }
}
