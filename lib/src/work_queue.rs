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

//! Component F: the durable post-commit work queue. Work items are
//! opaque bytes to WCMS — the caller defines whatever serialization its
//! deferred actions need (file moves, prop translations, ...) and is
//! responsible for interpreting what it dequeues. All WCMS guarantees is
//! strict FIFO order and that an item enqueued in a committed transaction
//! survives a crash until explicitly dequeued (§4.F).

use rusqlite::OptionalExtension;

use crate::error::WcmsResult;
use crate::storage::catalog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: i64,
    pub work: Vec<u8>,
}

/// Appends `work` to the tail of the queue, in the same transaction as
/// whatever operation scheduled it, so the item is never visible without
/// its triggering change also being durable.
pub fn enqueue(tx: &rusqlite::Transaction, work: &[u8]) -> WcmsResult<()> {
    tx.execute(catalog::INSERT_WORK_ITEM, (work,))?;
    Ok(())
}

/// Returns the head of the queue without removing it, so a crash between
/// `peek` and completing the work leaves the item to be retried.
pub fn peek(conn: &rusqlite::Connection) -> WcmsResult<Option<WorkItem>> {
    conn.query_row(catalog::SELECT_WORK_ITEM, [], |row| {
        Ok(WorkItem {
            id: row.get(0)?,
            work: row.get(1)?,
        })
    })
    .optional()
    .map_err(Into::into)
}

/// Removes a specific item once its work has been carried out.
pub fn dequeue(tx: &rusqlite::Transaction, id: i64) -> WcmsResult<()> {
    tx.execute(catalog::DELETE_WORK_ITEM, (id,))?;
    Ok(())
}

pub fn has_pending_work(conn: &rusqlite::Connection) -> WcmsResult<bool> {
    let exists: i64 = conn.query_row(catalog::LOOK_FOR_WORK, [], |row| row.get(0))?;
    Ok(exists != 0)
}

/// Drains the whole queue in FIFO order, calling `handler` once per item
/// inside the same transaction as its dequeue so a `handler` failure
/// leaves the item in place for the next attempt.
pub fn drain(
    tx: &rusqlite::Transaction,
    mut handler: impl FnMut(&WorkItem) -> WcmsResult<()>,
) -> WcmsResult<()> {
    loop {
        let item = conn_peek(tx)?;
        match item {
            Some(item) => {
                handler(&item)?;
                dequeue(tx, item.id)?;
            }
            None => return Ok(()),
        }
    }
}

fn conn_peek(tx: &rusqlite::Transaction) -> WcmsResult<Option<WorkItem>> {
    tx.query_row(catalog::SELECT_WORK_ITEM, [], |row| {
        Ok(WorkItem {
            id: row.get(0)?,
            work: row.get(1)?,
        })
    })
    .optional()
    .map_err(Into::into)
}
