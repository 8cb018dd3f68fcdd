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

//! Component D: the content-addressed pristine store index. WCMS never
//! touches the actual blob bytes on disk (§1 Non-goals) — this module
//! only owns the refcounted catalog row keyed by SHA-1, with an MD5
//! secondary index for clients that still quote MD5 over the wire.

use rusqlite::OptionalExtension;

use crate::checksum::{Md5Checksum, Sha1Checksum};
use crate::error::{WcmsError, WcmsResult};
use crate::storage::catalog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PristineEntry {
    pub checksum: Sha1Checksum,
    pub md5: Md5Checksum,
    pub size: i64,
    pub refcount: i64,
}

/// Registers a reference to `checksum`, inserting a fresh row at
/// `refcount = 1` the first time it's seen and incrementing thereafter
/// (§4.D operation 1). `md5`/`size` are only meaningful on first insert;
/// later calls must agree with what's already stored or the pristine
/// content for that checksum would be ambiguous.
pub fn add_ref(
    tx: &rusqlite::Transaction,
    checksum: &Sha1Checksum,
    md5: &Md5Checksum,
    size: i64,
) -> WcmsResult<()> {
    tx.execute(
        catalog::INSERT_PRISTINE,
        (checksum.hex(), md5.hex(), size),
    )?;
    Ok(())
}

/// Drops one reference (§4.D operation 2). Does not delete the row even
/// at `refcount = 0` — that's left for [`gc`], which also double-checks
/// no node or conflict-slot still points at the blob before removing it.
pub fn release(tx: &rusqlite::Transaction, checksum: &Sha1Checksum) -> WcmsResult<()> {
    tx.execute(catalog::RELEASE_PRISTINE, (checksum.hex(),))?;
    Ok(())
}

pub fn lookup_by_sha(
    conn: &rusqlite::Connection,
    checksum: &Sha1Checksum,
) -> WcmsResult<Option<PristineEntry>> {
    conn.query_row(catalog::SELECT_PRISTINE_BY_SHA, (checksum.hex(),), |row| {
        let md5: String = row.get(0)?;
        let size: i64 = row.get(1)?;
        let refcount: i64 = row.get(2)?;
        Ok((md5, size, refcount))
    })
    .optional()?
    .map(|(md5, size, refcount)| {
        Ok(PristineEntry {
            checksum: checksum.clone(),
            md5: Md5Checksum::from_hex(&md5)
                .ok_or_else(|| WcmsError::Corrupt(format!("bad md5 hex {md5:?}")))?,
            size,
            refcount,
        })
    })
    .transpose()
}

pub fn lookup_by_md5(
    conn: &rusqlite::Connection,
    md5: &Md5Checksum,
) -> WcmsResult<Option<PristineEntry>> {
    conn.query_row(catalog::SELECT_PRISTINE_BY_MD5, (md5.hex(),), |row| {
        let checksum: String = row.get(0)?;
        let size: i64 = row.get(1)?;
        let refcount: i64 = row.get(2)?;
        Ok((checksum, size, refcount))
    })
    .optional()?
    .map(|(checksum, size, refcount)| {
        Ok(PristineEntry {
            checksum: Sha1Checksum::from_hex(&checksum)
                .ok_or_else(|| WcmsError::Corrupt(format!("bad checksum hex {checksum:?}")))?,
            md5: md5.clone(),
            size,
            refcount,
        })
    })
    .transpose()
}

/// Sweeps every pristine row at `refcount = 0` that no `nodes` or
/// `actual_node` row still names (the union reference query from the
/// catalog), deleting them and returning what was collected so the
/// caller can delete the corresponding blobs from its own store (§4.D
/// operation 5, out-of-scope: WCMS only tracks the index, not the bytes).
pub fn gc(tx: &rusqlite::Transaction) -> WcmsResult<Vec<Sha1Checksum>> {
    let candidates: Vec<String> = {
        let mut stmt = tx.prepare_cached(catalog::SELECT_GC_CANDIDATES)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<_, _>>()?
    };
    let mut collected = Vec::with_capacity(candidates.len());
    for hex in candidates {
        tx.execute(catalog::DELETE_PRISTINE, (&hex,))?;
        collected.push(
            Sha1Checksum::from_hex(&hex)
                .ok_or_else(|| WcmsError::Corrupt(format!("bad checksum hex {hex:?}")))?,
        );
    }
    Ok(collected)
}
