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

//! Table definitions, indices, and the forward-migration ladder (§4.G,
//! §6). Schema version is tracked in the `wcroot` table itself (every
//! workcopy has exactly one row there) rather than a separate
//! `schema_version` table, since a `wc.db` never holds more than one
//! workcopy.

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{WcmsError, WcmsResult};

/// The schema version this build of the crate knows how to read and
/// write. Bump this and add a `migrate_v{N}` step when the schema changes.
pub const SCHEMA_VERSION: i64 = 3;

/// Oldest on-disk version this build can upgrade from. Anything older is
/// `UnsupportedSchema`, matching svn's "too old to auto-upgrade" refusal.
const OLDEST_SUPPORTED_VERSION: i64 = 1;

pub fn open_and_migrate(conn: &Connection) -> WcmsResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    let version = current_version(conn)?;
    match version.cmp(&SCHEMA_VERSION) {
        std::cmp::Ordering::Equal => {
            debug!(version, "schema up to date");
        }
        std::cmp::Ordering::Less if version == 0 => {
            info!("initializing new workcopy metadata store");
            init_fresh(conn)?;
        }
        std::cmp::Ordering::Less => {
            if version < OLDEST_SUPPORTED_VERSION {
                return Err(WcmsError::UnsupportedSchema(version));
            }
            migrate(conn, version)?;
        }
        std::cmp::Ordering::Greater => {
            return Err(WcmsError::SchemaTooNew {
                found: version,
                supported: SCHEMA_VERSION,
            });
        }
    }
    Ok(())
}

fn current_version(conn: &Connection) -> WcmsResult<i64> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'wcroot'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Ok(0);
    }
    let version: Option<i64> = conn
        .query_row("SELECT schema_version FROM wcroot LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(version.unwrap_or(0))
}

/// Creates a brand-new `wc.db` at the current schema version directly,
/// rather than replaying every historical migration step.
fn init_fresh(conn: &Connection) -> WcmsResult<()> {
    let tx = conn.unchecked_transaction()?;
    create_base_tables(&tx)?;
    tx.execute(
        "INSERT INTO wcroot (id, local_abspath, schema_version) VALUES (1, NULL, ?1)",
        [SCHEMA_VERSION],
    )?;
    tx.commit()?;
    Ok(())
}

/// `REFERENCES pristine (checksum)` below is documentation, not enforcement:
/// `PRAGMA foreign_keys` is left off, so a node can point at a pristine
/// checksum before any blob is registered under it. Referential integrity
/// is instead checked by query, the way svn's `wc.db` does it (§9).
fn create_base_tables(conn: &Connection) -> WcmsResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE wcroot (
            id INTEGER PRIMARY KEY,
            local_abspath TEXT UNIQUE,
            schema_version INTEGER NOT NULL
        );

        CREATE TABLE repository (
            repo_id INTEGER PRIMARY KEY AUTOINCREMENT,
            root TEXT NOT NULL,
            uuid TEXT NOT NULL,
            UNIQUE (root, uuid)
        );

        CREATE TABLE nodes (
            wc_id INTEGER NOT NULL,
            local_relpath TEXT NOT NULL,
            op_depth INTEGER NOT NULL,
            parent_relpath TEXT,
            repo_id INTEGER REFERENCES repository (repo_id),
            repos_path TEXT,
            revision INTEGER,
            presence TEXT NOT NULL,
            kind TEXT NOT NULL,
            checksum TEXT REFERENCES pristine (checksum),
            properties BLOB,
            depth INTEGER,
            changed_revision INTEGER,
            changed_date INTEGER,
            changed_author TEXT,
            translated_size INTEGER,
            last_mod_time INTEGER,
            symlink_target TEXT,
            dav_cache BLOB,
            moved_here INTEGER,
            moved_to TEXT,
            file_external INTEGER,
            PRIMARY KEY (wc_id, local_relpath, op_depth)
        );

        CREATE INDEX nodes_parent_index
            ON nodes (wc_id, parent_relpath, op_depth);

        CREATE TABLE actual_node (
            wc_id INTEGER NOT NULL,
            local_relpath TEXT NOT NULL,
            parent_relpath TEXT,
            properties BLOB,
            changelist TEXT,
            -- Reserved for conflict-marker relpaths; WCMS takes conflict
            -- descriptors as already resolved by the caller and never
            -- populates these itself (see the text-conflict checksum
            -- columns below for what it actually tracks).
            conflict_old TEXT,
            conflict_new TEXT,
            conflict_working TEXT,
            prop_reject TEXT,
            tree_conflict_data BLOB,
            conflict_operation TEXT,
            conflict_left_kind TEXT,
            conflict_left_revision INTEGER,
            conflict_right_kind TEXT,
            conflict_right_revision INTEGER,
            conflict_action TEXT,
            conflict_reason TEXT,
            older_checksum TEXT REFERENCES pristine (checksum),
            left_checksum TEXT REFERENCES pristine (checksum),
            right_checksum TEXT REFERENCES pristine (checksum),
            PRIMARY KEY (wc_id, local_relpath)
        );

        CREATE INDEX actual_node_parent_index
            ON actual_node (wc_id, parent_relpath);

        CREATE TABLE pristine (
            checksum TEXT PRIMARY KEY,
            md5_checksum TEXT NOT NULL,
            size INTEGER NOT NULL,
            refcount INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX pristine_md5_index ON pristine (md5_checksum);

        CREATE TABLE lock (
            repo_id INTEGER NOT NULL REFERENCES repository (repo_id),
            repos_relpath TEXT NOT NULL,
            lock_token TEXT NOT NULL,
            lock_owner TEXT,
            lock_comment TEXT,
            lock_date INTEGER,
            PRIMARY KEY (repo_id, repos_relpath)
        );

        CREATE TABLE wc_lock (
            wc_id INTEGER NOT NULL,
            local_dir_relpath TEXT NOT NULL,
            locked_levels INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (wc_id, local_dir_relpath)
        );

        CREATE TABLE work_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            work BLOB NOT NULL
        );
        ",
    )?;
    Ok(())
}

fn migrate(conn: &Connection, from_version: i64) -> WcmsResult<()> {
    for version in (from_version + 1)..=SCHEMA_VERSION {
        info!(version, "applying schema migration");
        let tx = conn.unchecked_transaction()?;
        apply_migration(&tx, version)?;
        tx.execute("UPDATE wcroot SET schema_version = ?1", [version])?;
        tx.commit()?;
    }
    Ok(())
}

fn apply_migration(conn: &Connection, version: i64) -> WcmsResult<()> {
    match version {
        2 => migrate_v2_typed_tree_conflicts(conn),
        3 => migrate_v3_file_external(conn),
        _ => Err(WcmsError::Corrupt(format!(
            "no migration step registered for version {version}"
        ))),
    }
}

/// v1 -> v2: parse the legacy opaque `tree_conflict_data` blob on
/// `actual_node` into the typed `conflict_*` columns (§4.C, §4.G), then
/// null the legacy column. The typed columns already exist in
/// `create_base_tables` for a fresh init; a v1 database predates them.
fn migrate_v2_typed_tree_conflicts(conn: &Connection) -> WcmsResult<()> {
    let has_typed_columns: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('actual_node') WHERE name = 'conflict_operation'",
            [],
            |row| row.get::<_, i64>(0),
        )?
        > 0;
    if !has_typed_columns {
        conn.execute_batch(
            "
            ALTER TABLE actual_node ADD COLUMN conflict_operation TEXT;
            ALTER TABLE actual_node ADD COLUMN conflict_left_kind TEXT;
            ALTER TABLE actual_node ADD COLUMN conflict_left_revision INTEGER;
            ALTER TABLE actual_node ADD COLUMN conflict_right_kind TEXT;
            ALTER TABLE actual_node ADD COLUMN conflict_right_revision INTEGER;
            ALTER TABLE actual_node ADD COLUMN conflict_action TEXT;
            ALTER TABLE actual_node ADD COLUMN conflict_reason TEXT;
            ",
        )?;
    }
    crate::upgrade::migrate_legacy_tree_conflicts(conn)?;
    Ok(())
}

/// v2 -> v3: `file_external` was added to `nodes` after the initial
/// layered-node design; older databases need the column added as NULL
/// (meaning "not a file external") rather than refusing to open.
fn migrate_v3_file_external(conn: &Connection) -> WcmsResult<()> {
    let has_column: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('nodes') WHERE name = 'file_external'",
            [],
            |row| row.get::<_, i64>(0),
        )?
        > 0;
    if !has_column {
        conn.execute_batch("ALTER TABLE nodes ADD COLUMN file_external INTEGER;")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_lands_on_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        open_and_migrate(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn opening_twice_is_a_noop() {
        let conn = Connection::open_in_memory().unwrap();
        open_and_migrate(&conn).unwrap();
        open_and_migrate(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn refuses_schema_too_new() {
        let conn = Connection::open_in_memory().unwrap();
        open_and_migrate(&conn).unwrap();
        conn.execute(
            "UPDATE wcroot SET schema_version = ?1",
            [SCHEMA_VERSION + 1],
        )
        .unwrap();
        let err = open_and_migrate(&conn).unwrap_err();
        assert!(matches!(err, WcmsError::SchemaTooNew { .. }));
    }

    #[test]
    fn migrates_from_version_one() {
        let conn = Connection::open_in_memory().unwrap();
        create_base_tables(&conn).unwrap();
        // v1 predates the typed conflict columns and file_external.
        conn.execute_batch(
            "
            ALTER TABLE nodes DROP COLUMN file_external;
            ALTER TABLE actual_node DROP COLUMN conflict_operation;
            ALTER TABLE actual_node DROP COLUMN conflict_left_kind;
            ALTER TABLE actual_node DROP COLUMN conflict_left_revision;
            ALTER TABLE actual_node DROP COLUMN conflict_right_kind;
            ALTER TABLE actual_node DROP COLUMN conflict_right_revision;
            ALTER TABLE actual_node DROP COLUMN conflict_action;
            ALTER TABLE actual_node DROP COLUMN conflict_reason;
            ",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO wcroot (id, local_abspath, schema_version) VALUES (1, NULL, 1)",
            [],
        )
        .unwrap();
        open_and_migrate(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), SCHEMA_VERSION);
    }
}
