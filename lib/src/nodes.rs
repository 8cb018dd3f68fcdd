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

//! Component B: the layered-node model. `nodes` is a stack of trees
//! indexed by `op_depth` — `op_depth = 0` is BASE, `op_depth = k > 0` is a
//! working layer rooted at the path of path-depth `k` (§4.B). Everything
//! in this module answers one question: for a given path, which row is
//! effective, and what does a caller see when that path was never
//! individually materialized because it falls under a copied subtree.

use std::collections::BTreeMap;

use rusqlite::{OptionalExtension, Row};

use crate::checksum::Sha1Checksum;
use crate::error::{WcmsError, WcmsResult};
use crate::path::LocalRelPath;
use crate::storage::catalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Normal,
    NotPresent,
    Excluded,
    Absent,
    Incomplete,
    BaseDeleted,
}

impl Presence {
    fn as_str(self) -> &'static str {
        match self {
            Presence::Normal => "normal",
            Presence::NotPresent => "not-present",
            Presence::Excluded => "excluded",
            Presence::Absent => "absent",
            Presence::Incomplete => "incomplete",
            Presence::BaseDeleted => "base-deleted",
        }
    }

    fn parse(s: &str) -> WcmsResult<Self> {
        match s {
            "normal" => Ok(Presence::Normal),
            "not-present" => Ok(Presence::NotPresent),
            "excluded" => Ok(Presence::Excluded),
            "absent" => Ok(Presence::Absent),
            "incomplete" => Ok(Presence::Incomplete),
            "base-deleted" => Ok(Presence::BaseDeleted),
            other => Err(WcmsError::Corrupt(format!("unknown presence {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    File,
    Dir,
    Symlink,
    Unknown,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Kind::File => "file",
            Kind::Dir => "dir",
            Kind::Symlink => "symlink",
            Kind::Unknown => "unknown",
        }
    }

    fn parse(s: &str) -> WcmsResult<Self> {
        match s {
            "file" => Ok(Kind::File),
            "dir" => Ok(Kind::Dir),
            "symlink" => Ok(Kind::Symlink),
            "unknown" => Ok(Kind::Unknown),
            other => Err(WcmsError::Corrupt(format!("unknown kind {other:?}"))),
        }
    }
}

/// Opaque key-value property map (§3), serialized to the `properties`
/// BLOB column as JSON. svn stores these as a serialized "skel"; JSON is
/// the closest idiomatic equivalent for a Rust crate with no bespoke
/// wire-format dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties(pub BTreeMap<String, String>);

impl Properties {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn to_blob(&self) -> Option<Vec<u8>> {
        if self.0.is_empty() {
            None
        } else {
            Some(serde_json::to_vec(&self.0).expect("property map is always serializable"))
        }
    }

    pub(crate) fn from_blob(blob: Option<Vec<u8>>) -> WcmsResult<Self> {
        match blob {
            None => Ok(Properties::default()),
            Some(bytes) => {
                let map = serde_json::from_slice(&bytes)
                    .map_err(|err| WcmsError::Corrupt(format!("bad properties blob: {err}")))?;
                Ok(Properties(map))
            }
        }
    }
}

/// A fully resolved node, either a row read directly or one reconstructed
/// by the layer-selection resolver's inheritance walk (§4.B step c).
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub op_depth: i64,
    pub parent_relpath: Option<LocalRelPath>,
    pub repo_id: Option<i64>,
    pub repos_path: Option<String>,
    pub revision: Option<i64>,
    pub presence: Presence,
    pub kind: Kind,
    pub checksum: Option<Sha1Checksum>,
    pub properties: Properties,
    pub depth: Option<i64>,
    pub changed_revision: Option<i64>,
    pub changed_date: Option<i64>,
    pub changed_author: Option<String>,
    pub translated_size: Option<i64>,
    pub last_mod_time: Option<i64>,
    pub symlink_target: Option<String>,
    pub dav_cache: Option<Vec<u8>>,
    pub moved_here: Option<bool>,
    pub moved_to: Option<LocalRelPath>,
    pub file_external: Option<bool>,
    /// Set when this record was reconstructed by walking up to an
    /// ancestor working layer rather than read from a row materialized at
    /// the queried path (§4.B step c).
    pub inherited: bool,
}

/// Raw column values as read out of a row, before the fallible
/// conversions (hex decode, JSON parse, path parse) that turn them into a
/// [`NodeRecord`]. Kept separate because the `rusqlite` row-mapping
/// closure must return `rusqlite::Result`, while those conversions return
/// [`WcmsError`].
struct RawCols {
    parent_relpath: Option<String>,
    repo_id: Option<i64>,
    repos_path: Option<String>,
    revision: Option<i64>,
    presence: String,
    kind: String,
    checksum: Option<String>,
    properties: Option<Vec<u8>>,
    depth: Option<i64>,
    changed_revision: Option<i64>,
    changed_date: Option<i64>,
    changed_author: Option<String>,
    translated_size: Option<i64>,
    last_mod_time: Option<i64>,
    symlink_target: Option<String>,
    dav_cache: Option<Vec<u8>>,
    moved_here: Option<i64>,
    moved_to: Option<String>,
    file_external: Option<i64>,
}

fn raw_cols(row: &Row) -> rusqlite::Result<RawCols> {
    Ok(RawCols {
        parent_relpath: row.get("parent_relpath")?,
        repo_id: row.get("repo_id")?,
        repos_path: row.get("repos_path")?,
        revision: row.get("revision")?,
        presence: row.get("presence")?,
        kind: row.get("kind")?,
        checksum: row.get("checksum")?,
        properties: row.get("properties")?,
        depth: row.get("depth")?,
        changed_revision: row.get("changed_revision")?,
        changed_date: row.get("changed_date")?,
        changed_author: row.get("changed_author")?,
        translated_size: row.get("translated_size")?,
        last_mod_time: row.get("last_mod_time")?,
        symlink_target: row.get("symlink_target")?,
        dav_cache: row.get("dav_cache")?,
        moved_here: row.get("moved_here")?,
        moved_to: row.get("moved_to")?,
        file_external: row.get("file_external")?,
    })
}

fn opt_local_relpath(value: Option<String>) -> WcmsResult<Option<LocalRelPath>> {
    value.map(|s| LocalRelPath::parse(&s)).transpose()
}

fn finish_record(raw: RawCols, op_depth: i64) -> WcmsResult<NodeRecord> {
    Ok(NodeRecord {
        op_depth,
        parent_relpath: opt_local_relpath(raw.parent_relpath)?,
        repo_id: raw.repo_id,
        repos_path: raw.repos_path,
        revision: raw.revision,
        presence: Presence::parse(&raw.presence)?,
        kind: Kind::parse(&raw.kind)?,
        checksum: raw
            .checksum
            .map(|hex| {
                Sha1Checksum::from_hex(&hex)
                    .ok_or_else(|| WcmsError::Corrupt(format!("bad checksum hex {hex:?}")))
            })
            .transpose()?,
        properties: Properties::from_blob(raw.properties)?,
        depth: raw.depth,
        changed_revision: raw.changed_revision,
        changed_date: raw.changed_date,
        changed_author: raw.changed_author,
        translated_size: raw.translated_size,
        last_mod_time: raw.last_mod_time,
        symlink_target: raw.symlink_target,
        dav_cache: raw.dav_cache,
        moved_here: raw.moved_here.map(|v| v != 0),
        moved_to: opt_local_relpath(raw.moved_to)?,
        file_external: raw.file_external.map(|v| v != 0),
        inherited: false,
    })
}

/// A new BASE or working row to write, grouped so call sites don't pass
/// many positional arguments (§4.B operations 5, 7, 8).
#[derive(Debug, Clone)]
pub struct NewNode {
    pub repo_id: Option<i64>,
    pub repos_path: Option<String>,
    pub revision: Option<i64>,
    pub presence: Presence,
    pub kind: Kind,
    pub checksum: Option<Sha1Checksum>,
    pub properties: Properties,
    pub depth: Option<i64>,
    pub changed_revision: Option<i64>,
    pub changed_date: Option<i64>,
    pub changed_author: Option<String>,
}

impl NewNode {
    pub fn file(checksum: Sha1Checksum) -> Self {
        NewNode {
            repo_id: None,
            repos_path: None,
            revision: None,
            presence: Presence::Normal,
            kind: Kind::File,
            checksum: Some(checksum),
            properties: Properties::default(),
            depth: None,
            changed_revision: None,
            changed_date: None,
            changed_author: None,
        }
    }

    pub fn dir() -> Self {
        NewNode {
            repo_id: None,
            repos_path: None,
            revision: None,
            presence: Presence::Normal,
            kind: Kind::Dir,
            checksum: None,
            properties: Properties::default(),
            depth: Some(0),
            changed_revision: None,
            changed_date: None,
            changed_author: None,
        }
    }

    pub fn with_repo(mut self, repo_id: i64, repos_path: impl Into<String>, revision: i64) -> Self {
        self.repo_id = Some(repo_id);
        self.repos_path = Some(repos_path.into());
        self.revision = Some(revision);
        self
    }
}

/// Operation 1: read the single row of greatest `op_depth` at `(wc, P)`,
/// falling back to the inheritance walk of step c when P was never
/// individually materialized. A row found this way can still be shadowed
/// by an ancestor's deletion tombstone (operation 6) that was never
/// propagated down to this path's own BASE row — see
/// [`find_shadowing_delete`].
pub fn read_effective_node(
    conn: &rusqlite::Connection,
    wc_id: i64,
    path: &LocalRelPath,
) -> WcmsResult<NodeRecord> {
    if let Some(record) = query_exact(conn, wc_id, path)? {
        if let Some(shadow) = find_shadowing_delete(conn, wc_id, path, record.op_depth)? {
            return Ok(shadow);
        }
        return Ok(record);
    }
    inherit_from_ancestor(conn, wc_id, path)
}

/// Walks `path`'s ancestors looking for a working-layer delete tombstone
/// (`presence = base-deleted` at `op_depth > 0`) planted above
/// `own_op_depth`. `schedule_delete` (operation 6) only writes a tombstone
/// at the op root it's given, not at every descendant, so a descendant
/// that still has nothing but its own BASE row would otherwise read back
/// as `normal` underneath a deleted ancestor. The nearest such tombstone
/// shadows this path's own row; a descendant materialized above it (e.g.
/// re-added after the delete) is unaffected since its own op_depth then
/// exceeds the tombstone's.
fn find_shadowing_delete(
    conn: &rusqlite::Connection,
    wc_id: i64,
    path: &LocalRelPath,
    own_op_depth: i64,
) -> WcmsResult<Option<NodeRecord>> {
    let mut ancestor = path.parent();
    while let Some(current) = ancestor {
        if let Some(arow) = query_exact(conn, wc_id, &current)? {
            if arow.op_depth > own_op_depth && arow.presence == Presence::BaseDeleted {
                let mut shadow = arow;
                shadow.parent_relpath = path.parent();
                shadow.inherited = true;
                return Ok(Some(shadow));
            }
            if arow.op_depth == 0 {
                break;
            }
        }
        ancestor = current.parent();
    }
    Ok(None)
}

/// A server-granted path lock, joined onto a node read by `(repo_id,
/// repos_path)` (§4.E).
#[derive(Debug, Clone)]
pub struct RepositoryLock {
    pub lock_token: String,
    pub lock_owner: Option<String>,
    pub lock_comment: Option<String>,
    pub lock_date: Option<i64>,
}

/// As [`read_effective_node`], additionally joined against the
/// [`crate::lock_registry`] server-lock table keyed by the node's
/// `(repo_id, repos_path)`, per operation 1's "joined optionally with the
/// repository-lock overlay".
pub fn read_effective_node_with_lock(
    conn: &rusqlite::Connection,
    wc_id: i64,
    path: &LocalRelPath,
) -> WcmsResult<(NodeRecord, Option<RepositoryLock>)> {
    let found = conn
        .query_row(
            catalog::SELECT_NODE_INFO_WITH_LOCK,
            (wc_id, path.as_str()),
            |row| {
                let op_depth: i64 = row.get("op_depth")?;
                let cols = raw_cols(row)?;
                let lock_token: Option<String> = row.get("lock_token")?;
                let lock_owner: Option<String> = row.get("lock_owner")?;
                let lock_comment: Option<String> = row.get("lock_comment")?;
                let lock_date: Option<i64> = row.get("lock_date")?;
                Ok((op_depth, cols, lock_token, lock_owner, lock_comment, lock_date))
            },
        )
        .optional()?;
    match found {
        Some((op_depth, cols, lock_token, lock_owner, lock_comment, lock_date)) => {
            let record = finish_record(cols, op_depth)?;
            if let Some(shadow) = find_shadowing_delete(conn, wc_id, path, record.op_depth)? {
                return Ok((shadow, None));
            }
            let lock = lock_token.map(|lock_token| RepositoryLock {
                lock_token,
                lock_owner,
                lock_comment,
                lock_date,
            });
            Ok((record, lock))
        }
        None => {
            let record = inherit_from_ancestor(conn, wc_id, path)?;
            Ok((record, None))
        }
    }
}

fn query_exact(
    conn: &rusqlite::Connection,
    wc_id: i64,
    path: &LocalRelPath,
) -> WcmsResult<Option<NodeRecord>> {
    let found = conn
        .query_row(catalog::SELECT_NODE_INFO, (wc_id, path.as_str()), |row| {
            let op_depth: i64 = row.get("op_depth")?;
            let cols = raw_cols(row)?;
            Ok((op_depth, cols))
        })
        .optional()?;
    found
        .map(|(op_depth, cols)| finish_record(cols, op_depth))
        .transpose()
}

/// Walks `path`'s ancestors looking for the nearest materialized row.
/// Only working (`op_depth > 0`) ancestors extend coverage to
/// unmaterialized descendants; if the nearest row found is BASE, there is
/// nothing to inherit because BASE rows are materialized one-per-path.
fn inherit_from_ancestor(
    conn: &rusqlite::Connection,
    wc_id: i64,
    path: &LocalRelPath,
) -> WcmsResult<NodeRecord> {
    let mut ancestor = path.parent();
    while let Some(current) = ancestor {
        if let Some(arow) = query_exact(conn, wc_id, &current)? {
            if arow.op_depth == 0 {
                break;
            }
            let suffix = path
                .as_str()
                .strip_prefix(current.as_str())
                .and_then(|s| s.strip_prefix('/'))
                .unwrap_or(path.as_str());
            // `repos_path` on a purely local copy is recorded as the copy
            // source's own local_relpath (there being only one workcopy's
            // worth of coordinate space in scope here — see DESIGN.md).
            let source = match &arow.repos_path {
                Some(base) if base.is_empty() => LocalRelPath::parse(suffix)?,
                Some(base) => LocalRelPath::parse(&format!("{base}/{suffix}"))?,
                None => return Err(WcmsError::NotFound(path.to_string())),
            };
            let mut inherited = query_exact(conn, wc_id, &source)?
                .ok_or_else(|| WcmsError::NotFound(path.to_string()))?;
            inherited.op_depth = arow.op_depth;
            inherited.inherited = true;
            inherited.parent_relpath = path.parent();
            return Ok(inherited);
        }
        ancestor = current.parent();
    }
    Err(WcmsError::NotFound(path.to_string()))
}

/// Operation 2.
pub fn read_base_node(
    conn: &rusqlite::Connection,
    wc_id: i64,
    path: &LocalRelPath,
) -> WcmsResult<NodeRecord> {
    let raw = conn
        .query_row(catalog::SELECT_BASE_NODE, (wc_id, path.as_str()), raw_cols)
        .optional()?
        .ok_or_else(|| WcmsError::NotFound(path.to_string()))?;
    finish_record(raw, 0)
}

/// Operation 3.
pub fn read_working_node(
    conn: &rusqlite::Connection,
    wc_id: i64,
    path: &LocalRelPath,
) -> WcmsResult<NodeRecord> {
    let found = conn
        .query_row(catalog::SELECT_WORKING_NODE, (wc_id, path.as_str()), |row| {
            let op_depth: i64 = row.get("op_depth")?;
            let cols = raw_cols(row)?;
            Ok((op_depth, cols))
        })
        .optional()?
        .ok_or_else(|| WcmsError::NotFound(path.to_string()))?;
    finish_record(found.1, found.0)
}

/// Operation 4, effective view: children known at BASE, overridden
/// per-path by any working-layer child.
pub fn list_children_effective(
    conn: &rusqlite::Connection,
    wc_id: i64,
    path: &LocalRelPath,
) -> WcmsResult<Vec<LocalRelPath>> {
    let mut children: BTreeMap<String, LocalRelPath> = BTreeMap::new();
    for child in list_children_base(conn, wc_id, path)? {
        children.insert(child.as_str().to_string(), child);
    }
    for child in list_children_working(conn, wc_id, path)? {
        children.insert(child.as_str().to_string(), child);
    }
    Ok(children.into_values().collect())
}

pub fn list_children_base(
    conn: &rusqlite::Connection,
    wc_id: i64,
    path: &LocalRelPath,
) -> WcmsResult<Vec<LocalRelPath>> {
    let mut stmt = conn.prepare_cached(catalog::SELECT_BASE_NODE_CHILDREN)?;
    let rows = stmt.query_map((wc_id, path.as_str()), |row| row.get::<_, String>(0))?;
    rows.map(|r| LocalRelPath::parse(&r?).map_err(Into::into))
        .collect()
}

pub fn list_children_working(
    conn: &rusqlite::Connection,
    wc_id: i64,
    path: &LocalRelPath,
) -> WcmsResult<Vec<LocalRelPath>> {
    let mut stmt = conn.prepare_cached(catalog::SELECT_WORKING_NODE_CHILDREN)?;
    let rows = stmt.query_map((wc_id, path.as_str()), |row| row.get::<_, String>(0))?;
    rows.map(|r| LocalRelPath::parse(&r?).map_err(Into::into))
        .collect()
}

/// Operation 5: `INSERT OR REPLACE` at `op_depth = 0`, then invalidate any
/// stale `dav_cache` in the subtree rooted at `path`.
pub fn apply_base_node(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    path: &LocalRelPath,
    node: &NewNode,
) -> WcmsResult<()> {
    insert_node_row(tx, wc_id, path, 0, node)?;
    let pattern = path.like_subtree_pattern();
    tx.execute(
        catalog::INVALIDATE_DAV_CACHE_SUBTREE,
        (wc_id, path.as_str(), pattern),
    )?;
    Ok(())
}

fn insert_node_row(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    path: &LocalRelPath,
    op_depth: i64,
    node: &NewNode,
) -> WcmsResult<()> {
    tx.execute(
        catalog::INSERT_NODE,
        rusqlite::params![
            wc_id,
            path.as_str(),
            op_depth,
            path.parent().map(|p| p.as_str().to_string()),
            node.repo_id,
            node.repos_path,
            node.revision,
            node.presence.as_str(),
            node.kind.as_str(),
            node.checksum.as_ref().map(Sha1Checksum::hex),
            node.properties.to_blob(),
            node.depth,
            node.changed_revision,
            node.changed_date,
            node.changed_author,
            Option::<i64>::None,
            Option::<i64>::None,
            Option::<String>::None,
            Option::<Vec<u8>>::None,
            Option::<i64>::None,
            Option::<String>::None,
            Option::<i64>::None,
        ],
    )?;
    Ok(())
}

/// Operation 6: marks `path` with a working row at presence
/// `base-deleted` rooted at `path`'s own op_depth. Descendants are not
/// given their own rows — the resolver's inheritance walk (step c) makes
/// them read as absent through this single row, the same way a copy's
/// descendants inherit through their root.
pub fn schedule_delete(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    path: &LocalRelPath,
) -> WcmsResult<()> {
    let current = read_effective_node(tx, wc_id, path)?;
    let node = NewNode {
        repo_id: current.repo_id,
        repos_path: current.repos_path,
        revision: current.revision,
        presence: Presence::BaseDeleted,
        kind: current.kind,
        checksum: current.checksum,
        properties: Properties::default(),
        depth: current.depth,
        changed_revision: current.changed_revision,
        changed_date: current.changed_date,
        changed_author: current.changed_author,
    };
    insert_node_row(tx, wc_id, path, path.depth(), &node)
}

/// Operation 7: copy from BASE@source into a new working row at `target`,
/// rooted at `target`'s own op_depth.
pub fn schedule_copy_from_base(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    source: &LocalRelPath,
    target: &LocalRelPath,
) -> WcmsResult<()> {
    copy_into_working_row(
        tx,
        wc_id,
        source,
        target,
        catalog::INSERT_WORKING_NODE_COPY_FROM_BASE,
    )
}

/// Operation 8: as (7), but sourcing from the effective *working* row at
/// `source`.
pub fn schedule_copy_from_working(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    source: &LocalRelPath,
    target: &LocalRelPath,
) -> WcmsResult<()> {
    copy_into_working_row(
        tx,
        wc_id,
        source,
        target,
        catalog::INSERT_WORKING_NODE_COPY_FROM_WORKING,
    )
}

fn copy_into_working_row(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    source: &LocalRelPath,
    target: &LocalRelPath,
    statement: &str,
) -> WcmsResult<()> {
    let op_depth = target.depth();
    let affected = tx.execute(
        statement,
        (
            wc_id,
            source.as_str(),
            target.as_str(),
            op_depth,
            target.parent().map(|p| p.as_str().to_string()),
        ),
    )?;
    if affected == 0 {
        return Err(WcmsError::NotFound(source.to_string()));
    }
    // Overwrite `repos_path` with the copy source's own local path so
    // unmaterialized descendants of `target` can inherit through it (see
    // `inherit_from_ancestor`).
    tx.execute(
        catalog::UPDATE_NODE_COPYFROM_LOCAL_PATH,
        (wc_id, target.as_str(), source.as_str(), op_depth),
    )?;
    Ok(())
}

/// Operation 9. `full = true` removes every `op_depth > 0` row at `path`
/// and its descendants and clears the actual overlay; `full = false`
/// removes only the single topmost working layer at `path`, restoring the
/// next-deeper layer as effective.
pub fn revert(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    path: &LocalRelPath,
    full: bool,
) -> WcmsResult<()> {
    if full {
        let pattern = path.like_subtree_pattern();
        tx.execute(
            catalog::DELETE_WORKING_NODES,
            (wc_id, path.as_str(), pattern),
        )?;
        crate::actual::clear_subtree(tx, wc_id, path)?;
    } else {
        tx.execute(catalog::DELETE_WORKING_NODE_TOP_LAYER, (wc_id, path.as_str()))?;
    }
    Ok(())
}

/// Operation 10: recursively retarget `repo_id` for all BASE rows under
/// `path`, invalidating `dav_cache` as a side effect of the same update.
pub fn set_repository_of_subtree(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    path: &LocalRelPath,
    repo_id: i64,
) -> WcmsResult<()> {
    let pattern = path.like_subtree_pattern();
    tx.execute(
        catalog::UPDATE_BASE_REPO_SUBTREE,
        (wc_id, path.as_str(), repo_id, pattern),
    )?;
    Ok(())
}

/// Operation 11: excludes `path` — "server said this exists but we chose
/// not to materialize" — at whichever layer is currently topmost.
pub fn exclude(tx: &rusqlite::Transaction, wc_id: i64, path: &LocalRelPath) -> WcmsResult<()> {
    let affected = tx.execute(catalog::UPDATE_NODE_WORKING_EXCLUDED, (wc_id, path.as_str()))?;
    if affected == 0 {
        tx.execute(catalog::UPDATE_NODE_BASE_EXCLUDED, (wc_id, path.as_str()))?;
    }
    Ok(())
}

/// The inverse of `exclude`: reinstates `normal` presence so the caller
/// can re-fetch and materialize the subtree.
pub fn include(tx: &rusqlite::Transaction, wc_id: i64, path: &LocalRelPath) -> WcmsResult<()> {
    tx.execute(catalog::UPDATE_NODE_INCLUDE, (wc_id, path.as_str()))?;
    Ok(())
}

/// Finds BASE rows left `incomplete` by an interrupted update (§4.B
/// "Resume-after-interrupt"). WCMS does not resume the fetch itself — it
/// only surfaces the marker for the out-of-scope update driver.
pub fn find_incomplete_subtrees(
    conn: &rusqlite::Connection,
    wc_id: i64,
) -> WcmsResult<Vec<LocalRelPath>> {
    let mut stmt = conn.prepare_cached(catalog::SELECT_INCOMPLETE_BASE_NODES)?;
    let rows = stmt.query_map([wc_id], |row| row.get::<_, String>(0))?;
    rows.map(|r| LocalRelPath::parse(&r?).map_err(Into::into))
        .collect()
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
    fn apply_and_read_base_node() {
        let mut storage = open();
        let root = LocalRelPath::from("src/main.rs");
        storage
            .with_write_transaction(|tx| {
                apply_base_node(tx, 1, &root, &NewNode::file(Sha1Checksum::of(b"fn main() {}")))
            })
            .unwrap();
        let record = read_base_node(storage.conn(), 1, &root).unwrap();
        assert_eq!(record.kind, Kind::File);
        assert_eq!(record.presence, Presence::Normal);
    }

    #[test]
    fn effective_read_prefers_working_layer_over_base() {
        let mut storage = open();
        let path = LocalRelPath::from("a.txt");
        storage
            .with_write_transaction(|tx| {
                apply_base_node(tx, 1, &path, &NewNode::file(Sha1Checksum::of(b"base")))?;
                insert_node_row(
                    tx,
                    1,
                    &path,
                    path.depth(),
                    &NewNode::file(Sha1Checksum::of(b"working")),
                )
            })
            .unwrap();
        let effective = read_effective_node(storage.conn(), 1, &path).unwrap();
        assert_eq!(effective.checksum, Some(Sha1Checksum::of(b"working")));
        assert!(!effective.inherited);
    }

    #[test]
    fn copy_then_child_read_inherits_from_base() {
        let mut storage = open();
        let src = LocalRelPath::from("src");
        let src_f = LocalRelPath::from("src/f");
        let dst = LocalRelPath::from("dst");
        let dst_f = LocalRelPath::from("dst/f");
        storage
            .with_write_transaction(|tx| {
                apply_base_node(tx, 1, &src, &NewNode::dir())?;
                apply_base_node(tx, 1, &src_f, &NewNode::file(Sha1Checksum::of(b"hello")))?;
                schedule_copy_from_base(tx, 1, &src, &dst)
            })
            .unwrap();
        let inherited = read_effective_node(storage.conn(), 1, &dst_f).unwrap();
        assert!(inherited.inherited);
        assert_eq!(inherited.checksum, Some(Sha1Checksum::of(b"hello")));
        assert_eq!(inherited.kind, Kind::File);
    }

    #[test]
    fn schedule_delete_shadows_descendant_reads() {
        let mut storage = open();
        let dir = LocalRelPath::from("gone");
        let child = LocalRelPath::from("gone/child");
        storage
            .with_write_transaction(|tx| {
                apply_base_node(tx, 1, &dir, &NewNode::dir())?;
                apply_base_node(tx, 1, &child, &NewNode::file(Sha1Checksum::of(b"x")))?;
                schedule_delete(tx, 1, &dir)
            })
            .unwrap();
        let effective = read_effective_node(storage.conn(), 1, &dir).unwrap();
        assert_eq!(effective.presence, Presence::BaseDeleted);
        // `child` still has its own untouched BASE row, but it reads as
        // deleted too: the tombstone at `dir` shadows it.
        let child_effective = read_effective_node(storage.conn(), 1, &child).unwrap();
        assert_eq!(child_effective.presence, Presence::BaseDeleted);
        assert!(child_effective.inherited);
    }

    #[test]
    fn materializing_a_child_above_the_tombstone_escapes_the_shadow() {
        let mut storage = open();
        let dir = LocalRelPath::from("gone");
        let child = LocalRelPath::from("gone/child");
        storage
            .with_write_transaction(|tx| {
                apply_base_node(tx, 1, &dir, &NewNode::dir())?;
                apply_base_node(tx, 1, &child, &NewNode::file(Sha1Checksum::of(b"x")))?;
                schedule_delete(tx, 1, &dir)?;
                insert_node_row(
                    tx,
                    1,
                    &child,
                    child.depth(),
                    &NewNode::file(Sha1Checksum::of(b"readded")),
                )
            })
            .unwrap();
        let child_effective = read_effective_node(storage.conn(), 1, &child).unwrap();
        assert_eq!(child_effective.presence, Presence::Normal);
        assert_eq!(child_effective.checksum, Some(Sha1Checksum::of(b"readded")));
    }

    #[test]
    fn revert_partial_restores_base_layer() {
        let mut storage = open();
        let path = LocalRelPath::from("a.txt");
        storage
            .with_write_transaction(|tx| {
                apply_base_node(tx, 1, &path, &NewNode::file(Sha1Checksum::of(b"base")))?;
                insert_node_row(
                    tx,
                    1,
                    &path,
                    path.depth(),
                    &NewNode::file(Sha1Checksum::of(b"working")),
                )?;
                revert(tx, 1, &path, false)
            })
            .unwrap();
        let effective = read_effective_node(storage.conn(), 1, &path).unwrap();
        assert_eq!(effective.checksum, Some(Sha1Checksum::of(b"base")));
        assert_eq!(effective.op_depth, 0);
    }

    #[test]
    fn read_with_lock_joins_server_lock_by_repo_and_repos_path() {
        let mut storage = open();
        let path = LocalRelPath::from("a.txt");
        storage
            .with_write_transaction(|tx| {
                let repo_id = crate::repository::intern(tx, "https://example.com/r", "uuid-1")?;
                apply_base_node(
                    tx,
                    1,
                    &path,
                    &NewNode::file(Sha1Checksum::of(b"x")).with_repo(repo_id, "a.txt", 5),
                )?;
                crate::lock_registry::record_server_lock(
                    tx,
                    repo_id,
                    "a.txt",
                    "opaquelocktoken:1",
                    Some("alice"),
                    None,
                    Some(1_700_000_000),
                )
            })
            .unwrap();
        let (record, lock) =
            read_effective_node_with_lock(storage.conn(), 1, &path).unwrap();
        assert_eq!(record.checksum, Some(Sha1Checksum::of(b"x")));
        let lock = lock.unwrap();
        assert_eq!(lock.lock_token, "opaquelocktoken:1");
        assert_eq!(lock.lock_owner.as_deref(), Some("alice"));
    }

    #[test]
    fn find_incomplete_subtrees_reports_marked_rows() {
        let mut storage = open();
        let path = LocalRelPath::from("partial");
        storage
            .with_write_transaction(|tx| {
                let mut node = NewNode::dir();
                node.presence = Presence::Incomplete;
                apply_base_node(tx, 1, &path, &node)
            })
            .unwrap();
        let incomplete = find_incomplete_subtrees(storage.conn(), 1).unwrap();
        assert_eq!(incomplete, vec![path]);
    }
}
