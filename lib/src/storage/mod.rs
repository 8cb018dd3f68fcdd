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

//! Component A: the embedded transactional relational store. A thin,
//! typed wrapper over [`rusqlite::Connection`] that provides busy-retry,
//! savepoint-backed nesting, and a cached prepared-statement surface
//! (§4.A).

pub mod catalog;
pub mod schema;

use std::path::{Path, PathBuf};
use std::time::Instant;

use rusqlite::{Connection, OpenFlags};

use crate::config::SessionConfig;
use crate::error::{WcmsError, WcmsResult};

/// Owns the single SQLite connection for one workcopy. Not `Sync`; callers
/// that need concurrent readers open additional read-only connections
/// (§5 "WCMS is thread-safe for distinct workcopy sessions").
pub struct Storage {
    conn: Connection,
    config: SessionConfig,
}

impl Storage {
    pub fn open(path: &Path, config: SessionConfig) -> WcmsResult<Self> {
        let conn = Connection::open(path).map_err(WcmsError::from)?;
        schema::open_and_migrate(&conn)?;
        Ok(Storage { conn, config })
    }

    /// An in-memory store for tests and detached sessions; never touches
    /// disk, so WAL/fsync durability guarantees do not apply to it.
    pub fn open_in_memory(config: SessionConfig) -> WcmsResult<Self> {
        let conn = Connection::open_in_memory().map_err(WcmsError::from)?;
        schema::open_and_migrate(&conn)?;
        Ok(Storage { conn, config })
    }

    /// Re-opens a read-only connection against the same file, for a
    /// concurrent MVCC reader (§5).
    pub fn open_reader(path: &Path) -> WcmsResult<Connection> {
        Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(WcmsError::from)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Runs `body` inside a transaction, retrying the whole thing with
    /// exponential backoff if SQLite reports the database as busy, up to
    /// `config.max_retry_elapsed` (§5, §7).
    pub fn with_write_transaction<T>(
        &mut self,
        body: impl Fn(&rusqlite::Transaction) -> WcmsResult<T>,
    ) -> WcmsResult<T> {
        let deadline = Instant::now() + self.config.max_retry_elapsed;
        let mut delay = self.config.busy_timeout;
        loop {
            let tx = self.conn.transaction().map_err(WcmsError::from)?;
            match body(&tx) {
                Ok(value) => {
                    tx.commit().map_err(WcmsError::from)?;
                    return Ok(value);
                }
                Err(WcmsError::Busy) if Instant::now() < deadline => {
                    tracing::debug!(?delay, "transaction busy, retrying");
                    std::thread::sleep(delay);
                    delay = (delay * 2).min(self.config.max_retry_elapsed);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Runs `body` inside a read-only transaction; no retry, since a
    /// reader observing `Busy` indicates a genuinely contended writer and
    /// the caller decides whether to retry (§5).
    pub fn with_read_transaction<T>(
        &self,
        body: impl FnOnce(&rusqlite::Transaction) -> WcmsResult<T>,
    ) -> WcmsResult<T> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(WcmsError::from)?;
        let result = body(&tx)?;
        tx.rollback().map_err(WcmsError::from)?;
        Ok(result)
    }
}

/// Path of the metadata file within a workcopy's administrative
/// directory, mirroring svn's `.svn/wc.db` layout (§6).
pub fn wc_db_path(workcopy_root: &Path) -> PathBuf {
    workcopy_root.join(".wcms").join("wc.db")
}
