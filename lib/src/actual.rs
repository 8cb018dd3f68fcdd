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

//! Component C: the actual overlay. Unlike `nodes`, `actual_node` has no
//! layering — at most one row per `(wc_id, local_relpath)` — and records
//! facts about the working file that aren't part of any tree shape:
//! unresolved conflicts, a changelist membership, and locally modified
//! properties not yet committed to a working node. A row that goes back
//! to all-NULL is deleted rather than kept around empty (§4.C invariant).

use rusqlite::OptionalExtension;

use crate::checksum::Sha1Checksum;
use crate::error::WcmsResult;
use crate::nodes::Properties;
use crate::path::LocalRelPath;
use crate::storage::catalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    Edited,
    Deleted,
    Added,
    Replaced,
}

impl ConflictAction {
    fn as_str(self) -> &'static str {
        match self {
            ConflictAction::Edited => "edited",
            ConflictAction::Deleted => "deleted",
            ConflictAction::Added => "added",
            ConflictAction::Replaced => "replaced",
        }
    }

    fn parse(s: &str) -> WcmsResult<Self> {
        match s {
            "edited" => Ok(ConflictAction::Edited),
            "deleted" => Ok(ConflictAction::Deleted),
            "added" => Ok(ConflictAction::Added),
            "replaced" => Ok(ConflictAction::Replaced),
            other => Err(crate::error::WcmsError::Corrupt(format!(
                "unknown conflict action {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    Edited,
    Obstructed,
    Deleted,
    Missing,
    Unversioned,
    Moved,
}

impl ConflictReason {
    fn as_str(self) -> &'static str {
        match self {
            ConflictReason::Edited => "edited",
            ConflictReason::Obstructed => "obstructed",
            ConflictReason::Deleted => "deleted",
            ConflictReason::Missing => "missing",
            ConflictReason::Unversioned => "unversioned",
            ConflictReason::Moved => "moved",
        }
    }

    fn parse(s: &str) -> WcmsResult<Self> {
        match s {
            "edited" => Ok(ConflictReason::Edited),
            "obstructed" => Ok(ConflictReason::Obstructed),
            "deleted" => Ok(ConflictReason::Deleted),
            "missing" => Ok(ConflictReason::Missing),
            "unversioned" => Ok(ConflictReason::Unversioned),
            "moved" => Ok(ConflictReason::Moved),
            other => Err(crate::error::WcmsError::Corrupt(format!(
                "unknown conflict reason {other:?}"
            ))),
        }
    }
}

/// The typed tree-conflict description (§4.C, §4.G): what the local
/// operation was, and what it collided with server-side.
#[derive(Debug, Clone)]
pub struct TreeConflict {
    pub operation: String,
    pub left_kind: Option<String>,
    pub left_revision: Option<i64>,
    pub right_kind: Option<String>,
    pub right_revision: Option<i64>,
    pub action: ConflictAction,
    pub reason: ConflictReason,
}

/// A text conflict: three pristine checksums bracketing the conflict
/// markers left in the working file.
#[derive(Debug, Clone)]
pub struct TextConflict {
    pub older: Sha1Checksum,
    pub left: Sha1Checksum,
    pub right: Sha1Checksum,
}

#[derive(Debug, Clone, Default)]
pub struct ActualNode {
    pub properties: Option<Properties>,
    pub changelist: Option<String>,
    pub text_conflict: Option<TextConflict>,
    pub prop_conflict: bool,
    pub tree_conflict: Option<TreeConflict>,
}

impl ActualNode {
    pub fn is_conflict_victim(&self) -> bool {
        self.text_conflict.is_some() || self.prop_conflict || self.tree_conflict.is_some()
    }
}

fn ensure_row(tx: &rusqlite::Transaction, wc_id: i64, path: &LocalRelPath) -> WcmsResult<()> {
    tx.execute(
        catalog::INSERT_ACTUAL_EMPTY,
        (
            wc_id,
            path.as_str(),
            path.parent().map(|p| p.as_str().to_string()),
        ),
    )?;
    Ok(())
}

/// Deletes the row at `path` if every column has gone back to NULL. Every
/// mutation in this module ends by calling this, which is what keeps
/// `actual_node` free of rows for paths with nothing noteworthy recorded.
fn prune_if_empty(tx: &rusqlite::Transaction, wc_id: i64, path: &LocalRelPath) -> WcmsResult<()> {
    tx.execute(catalog::DELETE_ACTUAL_EMPTY_NODE, (wc_id, path.as_str()))?;
    Ok(())
}

pub fn read(
    conn: &rusqlite::Connection,
    wc_id: i64,
    path: &LocalRelPath,
) -> WcmsResult<Option<ActualNode>> {
    conn.query_row(catalog::SELECT_ACTUAL_NODE, (wc_id, path.as_str()), |row| {
        let properties: Option<Vec<u8>> = row.get(0)?;
        let changelist: Option<String> = row.get(1)?;
        let older_checksum: Option<String> = row.get(2)?;
        let left_checksum: Option<String> = row.get(3)?;
        let right_checksum: Option<String> = row.get(4)?;
        let prop_reject: Option<String> = row.get(5)?;
        let conflict_operation: Option<String> = row.get(6)?;
        let conflict_left_kind: Option<String> = row.get(7)?;
        let conflict_left_revision: Option<i64> = row.get(8)?;
        let conflict_right_kind: Option<String> = row.get(9)?;
        let conflict_right_revision: Option<i64> = row.get(10)?;
        let conflict_action: Option<String> = row.get(11)?;
        let conflict_reason: Option<String> = row.get(12)?;
        Ok((
            properties,
            changelist,
            older_checksum,
            left_checksum,
            right_checksum,
            prop_reject,
            conflict_operation,
            conflict_left_kind,
            conflict_left_revision,
            conflict_right_kind,
            conflict_right_revision,
            conflict_action,
            conflict_reason,
        ))
    })
    .optional()?
    .map(
        |(
            properties,
            changelist,
            older_checksum,
            left_checksum,
            right_checksum,
            prop_reject,
            conflict_operation,
            conflict_left_kind,
            conflict_left_revision,
            conflict_right_kind,
            conflict_right_revision,
            conflict_action,
            conflict_reason,
        )| {
            let text_conflict = match (older_checksum, left_checksum, right_checksum) {
                (Some(older), Some(left), Some(right)) => Some(TextConflict {
                    older: Sha1Checksum::from_hex(&older)
                        .ok_or_else(|| crate::error::WcmsError::Corrupt("bad checksum".into()))?,
                    left: Sha1Checksum::from_hex(&left)
                        .ok_or_else(|| crate::error::WcmsError::Corrupt("bad checksum".into()))?,
                    right: Sha1Checksum::from_hex(&right)
                        .ok_or_else(|| crate::error::WcmsError::Corrupt("bad checksum".into()))?,
                }),
                _ => None,
            };
            let tree_conflict = match conflict_operation {
                Some(operation) => Some(TreeConflict {
                    operation,
                    left_kind: conflict_left_kind,
                    left_revision: conflict_left_revision,
                    right_kind: conflict_right_kind,
                    right_revision: conflict_right_revision,
                    action: ConflictAction::parse(&conflict_action.ok_or_else(|| {
                        crate::error::WcmsError::Corrupt("conflict missing action".into())
                    })?)?,
                    reason: ConflictReason::parse(&conflict_reason.ok_or_else(|| {
                        crate::error::WcmsError::Corrupt("conflict missing reason".into())
                    })?)?,
                }),
                None => None,
            };
            Ok(ActualNode {
                properties: match properties {
                    Some(_) => Some(Properties::from_blob(properties)?),
                    None => None,
                },
                changelist,
                text_conflict,
                prop_conflict: prop_reject.is_some(),
                tree_conflict,
            })
        },
    )
    .transpose()
}

pub fn set_text_conflict(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    path: &LocalRelPath,
    conflict: &TextConflict,
) -> WcmsResult<()> {
    ensure_row(tx, wc_id, path)?;
    tx.execute(
        catalog::UPDATE_ACTUAL_TEXT_CONFLICT,
        (
            wc_id,
            path.as_str(),
            conflict.older.hex(),
            conflict.left.hex(),
            conflict.right.hex(),
        ),
    )?;
    Ok(())
}

pub fn clear_text_conflict(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    path: &LocalRelPath,
) -> WcmsResult<()> {
    tx.execute(catalog::CLEAR_TEXT_CONFLICT, (wc_id, path.as_str()))?;
    prune_if_empty(tx, wc_id, path)
}

pub fn set_prop_conflict(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    path: &LocalRelPath,
    prop_reject: &str,
) -> WcmsResult<()> {
    ensure_row(tx, wc_id, path)?;
    tx.execute(
        catalog::UPDATE_ACTUAL_PROP_CONFLICT,
        (wc_id, path.as_str(), prop_reject),
    )?;
    Ok(())
}

pub fn clear_prop_conflict(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    path: &LocalRelPath,
) -> WcmsResult<()> {
    tx.execute(catalog::CLEAR_PROPS_CONFLICT, (wc_id, path.as_str()))?;
    prune_if_empty(tx, wc_id, path)
}

pub fn set_tree_conflict(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    path: &LocalRelPath,
    conflict: &TreeConflict,
) -> WcmsResult<()> {
    ensure_row(tx, wc_id, path)?;
    tx.execute(
        catalog::UPDATE_ACTUAL_TREE_CONFLICT,
        (
            wc_id,
            path.as_str(),
            &conflict.operation,
            &conflict.left_kind,
            conflict.left_revision,
            &conflict.right_kind,
            conflict.right_revision,
            conflict.action.as_str(),
            conflict.reason.as_str(),
        ),
    )?;
    Ok(())
}

pub fn clear_tree_conflict(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    path: &LocalRelPath,
) -> WcmsResult<()> {
    tx.execute(catalog::CLEAR_TREE_CONFLICT, (wc_id, path.as_str()))?;
    prune_if_empty(tx, wc_id, path)
}

pub fn set_changelist(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    path: &LocalRelPath,
    changelist: Option<&str>,
) -> WcmsResult<()> {
    if changelist.is_some() {
        ensure_row(tx, wc_id, path)?;
    }
    tx.execute(
        catalog::UPDATE_ACTUAL_CHANGELIST,
        (wc_id, path.as_str(), changelist),
    )?;
    prune_if_empty(tx, wc_id, path)
}

pub fn set_properties(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    path: &LocalRelPath,
    properties: &Properties,
) -> WcmsResult<()> {
    if !properties.is_empty() {
        ensure_row(tx, wc_id, path)?;
    }
    tx.execute(
        catalog::UPDATE_ACTUAL_PROPERTIES,
        (wc_id, path.as_str(), properties.to_blob()),
    )?;
    prune_if_empty(tx, wc_id, path)
}

/// Lists every conflict victim at or below `path`, ordered by path (§4.C).
pub fn list_conflict_victims(
    conn: &rusqlite::Connection,
    wc_id: i64,
    path: &LocalRelPath,
) -> WcmsResult<Vec<LocalRelPath>> {
    let pattern = path.like_subtree_pattern();
    let mut stmt = conn.prepare_cached(catalog::SELECT_ACTUAL_CONFLICT_VICTIMS)?;
    let rows = stmt.query_map((wc_id, path.as_str(), pattern), |row| row.get::<_, String>(0))?;
    rows.map(|r| LocalRelPath::parse(&r?).map_err(Into::into))
        .collect()
}

/// Drops every `actual_node` row at or below `path` without regard to
/// emptiness; used by a full [`crate::nodes::revert`] to wipe conflict
/// state alongside the reverted working rows.
pub fn clear_subtree(
    tx: &rusqlite::Transaction,
    wc_id: i64,
    path: &LocalRelPath,
) -> WcmsResult<()> {
    let pattern = path.like_subtree_pattern();
    tx.execute(
        "DELETE FROM actual_node WHERE wc_id = ?1 AND (local_relpath = ?2 OR local_relpath LIKE ?3 ESCAPE '#')",
        (wc_id, path.as_str(), pattern),
    )?;
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
    fn text_conflict_round_trips_and_prunes_on_clear() {
        let mut storage = open();
        let path = LocalRelPath::from("a.txt");
        let conflict = TextConflict {
            older: Sha1Checksum::of(b"older"),
            left: Sha1Checksum::of(b"left"),
            right: Sha1Checksum::of(b"right"),
        };
        storage
            .with_write_transaction(|tx| set_text_conflict(tx, 1, &path, &conflict))
            .unwrap();
        let actual = read(storage.conn(), 1, &path).unwrap().unwrap();
        assert!(actual.is_conflict_victim());
        storage
            .with_write_transaction(|tx| clear_text_conflict(tx, 1, &path))
            .unwrap();
        assert!(read(storage.conn(), 1, &path).unwrap().is_none());
    }

    #[test]
    fn changelist_alone_keeps_row_and_prunes_when_cleared() {
        let mut storage = open();
        let path = LocalRelPath::from("a.txt");
        storage
            .with_write_transaction(|tx| set_changelist(tx, 1, &path, Some("my-changes")))
            .unwrap();
        let actual = read(storage.conn(), 1, &path).unwrap().unwrap();
        assert_eq!(actual.changelist.as_deref(), Some("my-changes"));
        storage
            .with_write_transaction(|tx| set_changelist(tx, 1, &path, None))
            .unwrap();
        assert!(read(storage.conn(), 1, &path).unwrap().is_none());
    }

    #[test]
    fn list_conflict_victims_finds_descendants() {
        let mut storage = open();
        let dir = LocalRelPath::from("src");
        let victim = LocalRelPath::from("src/a.txt");
        storage
            .with_write_transaction(|tx| {
                set_prop_conflict(tx, 1, &victim, "a.txt.prej")
            })
            .unwrap();
        let victims = list_conflict_victims(storage.conn(), 1, &dir).unwrap();
        assert_eq!(victims, vec![victim]);
    }
}
