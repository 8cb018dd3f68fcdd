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

//! Component G: one-off data migrations that don't fit the plain
//! `ALTER TABLE` shape schema.rs handles on its own. The v1->v2 step adds
//! typed conflict columns to `actual_node`; this module is what backfills
//! them from the legacy opaque `tree_conflict_data` blob so no tree
//! conflict recorded under the old format is silently dropped.

use rusqlite::Connection;
use tracing::warn;

use crate::error::WcmsResult;
use crate::storage::catalog;

/// A conservative parse of the legacy skel-encoded tree conflict blob.
/// Real svn skels are a nested s-expression-like format; WCMS never wrote
/// any, so this only has to cope with whatever a previous installation
/// left behind. Unparseable blobs are logged and left as-is rather than
/// aborting the whole migration — the row keeps its legacy blob and the
/// typed columns stay NULL, which callers can treat as "conflict detail
/// unavailable" without corrupting unrelated rows.
fn parse_legacy_skel(blob: &[u8]) -> Option<LegacyConflict> {
    let text = std::str::from_utf8(blob).ok()?;
    let fields: Vec<&str> = text.split('\x01').collect();
    if fields.len() < 6 {
        return None;
    }
    Some(LegacyConflict {
        operation: fields[0].to_string(),
        left_kind: non_empty(fields[1]),
        left_revision: fields[2].parse().ok(),
        right_kind: non_empty(fields[3]),
        right_revision: fields[4].parse().ok(),
        action: fields[5].to_string(),
        reason: fields.get(6).map(|s| s.to_string()).unwrap_or_default(),
    })
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

struct LegacyConflict {
    operation: String,
    left_kind: Option<String>,
    left_revision: Option<i64>,
    right_kind: Option<String>,
    right_revision: Option<i64>,
    action: String,
    reason: String,
}

/// Backfills the typed `conflict_*` columns from every row still holding
/// a legacy `tree_conflict_data` blob, then erases the blobs.
pub fn migrate_legacy_tree_conflicts(conn: &Connection) -> WcmsResult<()> {
    let rows: Vec<(i64, String, Vec<u8>)> = {
        let mut stmt = conn.prepare(catalog::SELECT_OLD_TREE_CONFLICT)?;
        let mapped = stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        mapped.collect::<Result<_, _>>()?
    };

    for (wc_id, local_relpath, blob) in rows {
        match parse_legacy_skel(&blob) {
            Some(parsed) => {
                conn.execute(
                    catalog::INSERT_NEW_CONFLICT,
                    (
                        wc_id,
                        &local_relpath,
                        &parsed.operation,
                        &parsed.left_kind,
                        parsed.left_revision,
                        &parsed.right_kind,
                        parsed.right_revision,
                        &parsed.action,
                        &parsed.reason,
                    ),
                )?;
            }
            None => {
                warn!(wc_id, %local_relpath, "could not parse legacy tree conflict, leaving unconverted");
            }
        }
    }
    conn.execute(catalog::ERASE_OLD_CONFLICTS, [])?;
    Ok(())
}
