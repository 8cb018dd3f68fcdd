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

//! Repository identity interning (§3). `repository` rows are never
//! mutated once inserted — a `(root, uuid)` pair is assigned a stable
//! `repo_id` the first time it's referenced and reused thereafter.

use crate::error::WcmsResult;
use crate::storage::catalog;

/// Interns `(root, uuid)`, returning the assigned `repo_id`. Idempotent:
/// a repeat call with the same pair returns the same id.
pub fn intern(tx: &rusqlite::Transaction, root: &str, uuid: &str) -> WcmsResult<i64> {
    tx.execute(catalog::INTERN_REPOSITORY, (root, uuid))?;
    let repo_id = tx.query_row(catalog::SELECT_REPOSITORY_ID, (root, uuid), |row| row.get(0))?;
    Ok(repo_id)
}
