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

//! The fixed statement catalog (§6): every query and mutation the engine
//! ever runs is named and enumerated here, with positional `?1, ?2, ...`
//! bindings. Keeping the SQL text in one file is what lets the storage
//! engine be swapped for a different relational dialect (§9 "Dynamic
//! dispatch over storage backends") without touching the typed wrappers
//! in [`crate::nodes`], [`crate::actual`], etc.
//!
//! Callers never interpolate user data into these strings; all variable
//! input goes through bound parameters.

// -- reads: nodes --

pub const SELECT_NODE_INFO: &str = "
    SELECT op_depth, parent_relpath, repo_id, repos_path, revision, presence, kind,
           checksum, properties, depth, changed_revision, changed_date, changed_author,
           translated_size, last_mod_time, symlink_target, dav_cache, moved_here,
           moved_to, file_external
    FROM nodes
    WHERE wc_id = ?1 AND local_relpath = ?2
    ORDER BY op_depth DESC
    LIMIT 1
";

pub const SELECT_NODE_INFO_WITH_LOCK: &str = "
    SELECT n.op_depth, n.parent_relpath, n.repo_id, n.repos_path, n.revision, n.presence,
           n.kind, n.checksum, n.properties, n.depth, n.changed_revision, n.changed_date,
           n.changed_author, n.translated_size, n.last_mod_time, n.symlink_target,
           n.dav_cache, n.moved_here, n.moved_to, n.file_external,
           l.lock_token, l.lock_owner, l.lock_comment, l.lock_date
    FROM nodes n
    LEFT JOIN lock l ON l.repo_id = n.repo_id AND l.repos_relpath = n.repos_path
    WHERE n.wc_id = ?1 AND n.local_relpath = ?2
    ORDER BY n.op_depth DESC
    LIMIT 1
";

pub const SELECT_BASE_NODE: &str = "
    SELECT parent_relpath, repo_id, repos_path, revision, presence, kind, checksum,
           properties, depth, changed_revision, changed_date, changed_author,
           translated_size, last_mod_time, symlink_target, dav_cache, moved_here,
           moved_to, file_external
    FROM nodes
    WHERE wc_id = ?1 AND local_relpath = ?2 AND op_depth = 0
";

pub const SELECT_WORKING_NODE: &str = "
    SELECT op_depth, parent_relpath, repo_id, repos_path, revision, presence, kind,
           checksum, properties, depth, changed_revision, changed_date, changed_author,
           translated_size, last_mod_time, symlink_target, dav_cache, moved_here,
           moved_to, file_external
    FROM nodes
    WHERE wc_id = ?1 AND local_relpath = ?2 AND op_depth > 0
    ORDER BY op_depth DESC
    LIMIT 1
";

pub const SELECT_BASE_NODE_CHILDREN: &str = "
    SELECT local_relpath
    FROM nodes
    WHERE wc_id = ?1 AND parent_relpath = ?2 AND op_depth = 0
";

pub const SELECT_WORKING_NODE_CHILDREN: &str = "
    SELECT DISTINCT local_relpath
    FROM nodes
    WHERE wc_id = ?1 AND parent_relpath = ?2 AND op_depth > 0
";

pub const SELECT_NODE_PROPS: &str = "
    SELECT properties FROM nodes
    WHERE wc_id = ?1 AND local_relpath = ?2
    ORDER BY op_depth DESC
    LIMIT 1
";

pub const SELECT_DELETION_INFO: &str = "
    SELECT op_depth FROM nodes
    WHERE wc_id = ?1 AND local_relpath = ?2 AND presence = 'base-deleted'
    ORDER BY op_depth DESC
    LIMIT 1
";

pub const SELECT_MAX_OP_DEPTH_AT_OR_ABOVE: &str = "
    SELECT local_relpath, op_depth FROM nodes
    WHERE wc_id = ?1
      AND op_depth > 0
      AND (local_relpath = ?2 OR (?2 LIKE local_relpath || '/%' ESCAPE '#'))
    ORDER BY LENGTH(local_relpath) DESC, op_depth DESC
    LIMIT 1
";

// -- writes: nodes --

pub const INSERT_NODE: &str = "
    INSERT OR REPLACE INTO nodes (
        wc_id, local_relpath, op_depth, parent_relpath, repo_id, repos_path, revision,
        presence, kind, checksum, properties, depth, changed_revision, changed_date,
        changed_author, translated_size, last_mod_time, symlink_target, dav_cache,
        moved_here, moved_to, file_external
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18,
        ?19, ?20, ?21, ?22
    )
";

pub const APPLY_CHANGES_TO_BASE_NODE: &str = "
    UPDATE nodes SET
        repo_id = ?3, repos_path = ?4, revision = ?5, presence = ?6, kind = ?7,
        checksum = ?8, properties = ?9, depth = ?10, changed_revision = ?11,
        changed_date = ?12, changed_author = ?13, dav_cache = NULL
    WHERE wc_id = ?1 AND local_relpath = ?2 AND op_depth = 0
";

pub const UPDATE_NODE_BASE_PRESENCE: &str = "
    UPDATE nodes SET presence = ?3
    WHERE wc_id = ?1 AND local_relpath = ?2 AND op_depth = 0
";

pub const UPDATE_NODE_WORKING_PRESENCE: &str = "
    UPDATE nodes SET presence = ?3
    WHERE wc_id = ?1 AND local_relpath = ?2 AND op_depth = ?4
";

pub const INSERT_WORKING_NODE_FROM_BASE: &str = "
    INSERT OR REPLACE INTO nodes (
        wc_id, local_relpath, op_depth, parent_relpath, repo_id, repos_path, revision,
        presence, kind, checksum, properties, depth, changed_revision, changed_date,
        changed_author
    )
    SELECT wc_id, local_relpath, ?3, parent_relpath, repo_id, repos_path, revision,
           ?4, kind, checksum, properties, depth, changed_revision, changed_date,
           changed_author
    FROM nodes
    WHERE wc_id = ?1 AND local_relpath = ?2 AND op_depth = 0
";

pub const INSERT_WORKING_NODE_COPY_FROM_BASE: &str = "
    INSERT OR REPLACE INTO nodes (
        wc_id, local_relpath, op_depth, parent_relpath, repo_id, repos_path, revision,
        presence, kind, checksum, properties, depth, changed_revision, changed_date,
        changed_author
    )
    SELECT ?1, ?3, ?4, ?5, repo_id, repos_path, revision,
           'normal', kind, checksum, properties, depth, changed_revision, changed_date,
           changed_author
    FROM nodes
    WHERE wc_id = ?1 AND local_relpath = ?2 AND op_depth = 0
";

pub const INSERT_WORKING_NODE_COPY_FROM_WORKING: &str = "
    INSERT OR REPLACE INTO nodes (
        wc_id, local_relpath, op_depth, parent_relpath, repo_id, repos_path, revision,
        presence, kind, checksum, properties, depth, changed_revision, changed_date,
        changed_author
    )
    SELECT ?1, ?3, ?4, ?5, repo_id, repos_path, revision,
           'normal', kind, checksum, properties, depth, changed_revision, changed_date,
           changed_author
    FROM nodes
    WHERE wc_id = ?1 AND local_relpath = ?2 AND op_depth > 0
    ORDER BY op_depth DESC
    LIMIT 1
";

pub const DELETE_BASE_NODE: &str = "
    DELETE FROM nodes WHERE wc_id = ?1 AND local_relpath = ?2 AND op_depth = 0
";

pub const DELETE_WORKING_NODES: &str = "
    DELETE FROM nodes
    WHERE wc_id = ?1 AND op_depth > 0
      AND (local_relpath = ?2 OR local_relpath LIKE ?3 ESCAPE '#')
";

pub const DELETE_ALL_NODES: &str = "
    DELETE FROM nodes
    WHERE wc_id = ?1
      AND (local_relpath = ?2 OR local_relpath LIKE ?3 ESCAPE '#')
";

// Per §9's Open Question: the recursive clause after the stray semicolon
// in the original is unreachable, so this statement intentionally updates
// only the exact row at `local_relpath`, not its descendants.
pub const UPDATE_COPYFROM: &str = "
    UPDATE nodes SET repo_id = ?3, repos_path = ?4, revision = ?5
    WHERE wc_id = ?1 AND local_relpath = ?2 AND op_depth = (
        SELECT MAX(op_depth) FROM nodes WHERE wc_id = ?1 AND local_relpath = ?2
    )
";

pub const UPDATE_OP_DEPTH: &str = "
    UPDATE nodes SET op_depth = ?4
    WHERE wc_id = ?1 AND local_relpath = ?2 AND op_depth = ?3
";

// Filters to `op_depth > 0` explicitly, resolving §9's second Open
// Question in favor of "BASE is never touched by exclude".
pub const UPDATE_NODE_WORKING_EXCLUDED: &str = "
    UPDATE nodes SET presence = 'excluded', depth = NULL
    WHERE wc_id = ?1 AND local_relpath = ?2 AND op_depth = (
        SELECT MAX(op_depth) FROM nodes
        WHERE wc_id = ?1 AND local_relpath = ?2 AND op_depth > 0
    )
";

pub const UPDATE_NODE_BASE_EXCLUDED: &str = "
    UPDATE nodes SET presence = 'excluded', depth = NULL
    WHERE wc_id = ?1 AND local_relpath = ?2 AND op_depth = 0
";

pub const INVALIDATE_DAV_CACHE_SUBTREE: &str = "
    UPDATE nodes SET dav_cache = NULL
    WHERE wc_id = ?1 AND op_depth = 0
      AND (local_relpath = ?2 OR local_relpath LIKE ?3 ESCAPE '#')
";

pub const UPDATE_BASE_REPO_SUBTREE: &str = "
    UPDATE nodes SET repo_id = ?3, dav_cache = NULL
    WHERE wc_id = ?1 AND op_depth = 0
      AND (local_relpath = ?2 OR local_relpath LIKE ?4 ESCAPE '#')
";

// Records a copy's source as the *local* relpath it was copied from, so
// an unmaterialized descendant can rebuild its source path by
// concatenating this with its own suffix (§4.B step c). This is narrower
// than the general `repos_path` column, which in a networked client would
// hold a full repository-root-relative path.
pub const UPDATE_NODE_COPYFROM_LOCAL_PATH: &str = "
    UPDATE nodes SET repos_path = ?3
    WHERE wc_id = ?1 AND local_relpath = ?2 AND op_depth = ?4
";

pub const DELETE_WORKING_NODE_TOP_LAYER: &str = "
    DELETE FROM nodes WHERE wc_id = ?1 AND local_relpath = ?2 AND op_depth = (
        SELECT MAX(op_depth) FROM nodes WHERE wc_id = ?1 AND local_relpath = ?2 AND op_depth > 0
    )
";

pub const UPDATE_NODE_INCLUDE: &str = "
    UPDATE nodes SET presence = 'normal'
    WHERE wc_id = ?1 AND local_relpath = ?2 AND presence = 'excluded'
";

pub const SELECT_INCOMPLETE_BASE_NODES: &str = "
    SELECT local_relpath FROM nodes
    WHERE wc_id = ?1 AND op_depth = 0 AND presence = 'incomplete'
";

// -- reads/writes: actual_node --

pub const SELECT_ACTUAL_NODE: &str = "
    SELECT properties, changelist, older_checksum, left_checksum, right_checksum,
           prop_reject, conflict_operation, conflict_left_kind, conflict_left_revision,
           conflict_right_kind, conflict_right_revision, conflict_action, conflict_reason
    FROM actual_node
    WHERE wc_id = ?1 AND local_relpath = ?2
";

pub const SELECT_CONFLICT_DETAILS: &str = "
    SELECT older_checksum, left_checksum, right_checksum, prop_reject, conflict_operation,
           conflict_left_kind, conflict_left_revision, conflict_right_kind,
           conflict_right_revision, conflict_action, conflict_reason
    FROM actual_node
    WHERE wc_id = ?1 AND local_relpath = ?2
";

pub const SELECT_ACTUAL_CONFLICT_VICTIMS: &str = "
    SELECT local_relpath FROM actual_node
    WHERE wc_id = ?1
      AND (local_relpath = ?2 OR local_relpath LIKE ?3 ESCAPE '#')
      AND (older_checksum IS NOT NULL OR left_checksum IS NOT NULL
           OR right_checksum IS NOT NULL OR prop_reject IS NOT NULL
           OR conflict_operation IS NOT NULL)
    ORDER BY local_relpath
";

pub const INSERT_ACTUAL_EMPTY: &str = "
    INSERT OR IGNORE INTO actual_node (wc_id, local_relpath, parent_relpath)
    VALUES (?1, ?2, ?3)
";

pub const UPDATE_ACTUAL_TEXT_CONFLICT: &str = "
    UPDATE actual_node SET older_checksum = ?3, left_checksum = ?4, right_checksum = ?5
    WHERE wc_id = ?1 AND local_relpath = ?2
";

pub const CLEAR_TEXT_CONFLICT: &str = "
    UPDATE actual_node SET older_checksum = NULL, left_checksum = NULL, right_checksum = NULL
    WHERE wc_id = ?1 AND local_relpath = ?2
";

pub const UPDATE_ACTUAL_PROP_CONFLICT: &str = "
    UPDATE actual_node SET prop_reject = ?3
    WHERE wc_id = ?1 AND local_relpath = ?2
";

pub const CLEAR_PROPS_CONFLICT: &str = "
    UPDATE actual_node SET prop_reject = NULL
    WHERE wc_id = ?1 AND local_relpath = ?2
";

pub const UPDATE_ACTUAL_TREE_CONFLICT: &str = "
    UPDATE actual_node SET
        conflict_operation = ?3, conflict_left_kind = ?4, conflict_left_revision = ?5,
        conflict_right_kind = ?6, conflict_right_revision = ?7, conflict_action = ?8,
        conflict_reason = ?9, tree_conflict_data = NULL
    WHERE wc_id = ?1 AND local_relpath = ?2
";

pub const CLEAR_TREE_CONFLICT: &str = "
    UPDATE actual_node SET
        conflict_operation = NULL, conflict_left_kind = NULL, conflict_left_revision = NULL,
        conflict_right_kind = NULL, conflict_right_revision = NULL, conflict_action = NULL,
        conflict_reason = NULL, tree_conflict_data = NULL
    WHERE wc_id = ?1 AND local_relpath = ?2
";

pub const UPDATE_ACTUAL_CHANGELIST: &str = "
    UPDATE actual_node SET changelist = ?3
    WHERE wc_id = ?1 AND local_relpath = ?2
";

pub const UPDATE_ACTUAL_PROPERTIES: &str = "
    UPDATE actual_node SET properties = ?3
    WHERE wc_id = ?1 AND local_relpath = ?2
";

pub const DELETE_ACTUAL_EMPTY_NODE: &str = "
    DELETE FROM actual_node
    WHERE wc_id = ?1 AND local_relpath = ?2
      AND properties IS NULL AND changelist IS NULL AND older_checksum IS NULL
      AND left_checksum IS NULL AND right_checksum IS NULL AND prop_reject IS NULL
      AND conflict_operation IS NULL AND tree_conflict_data IS NULL
";

// -- pristine --

pub const INSERT_PRISTINE: &str = "
    INSERT INTO pristine (checksum, md5_checksum, size, refcount) VALUES (?1, ?2, ?3, 1)
    ON CONFLICT (checksum) DO UPDATE SET refcount = refcount + 1
";

pub const SELECT_PRISTINE_BY_SHA: &str = "
    SELECT md5_checksum, size, refcount FROM pristine WHERE checksum = ?1
";

pub const SELECT_PRISTINE_BY_MD5: &str = "
    SELECT checksum, size, refcount FROM pristine WHERE md5_checksum = ?1
";

pub const RELEASE_PRISTINE: &str = "
    UPDATE pristine SET refcount = MAX(refcount - 1, 0) WHERE checksum = ?1
";

pub const SELECT_ANY_PRISTINE_REFERENCE: &str = "
    SELECT 1 WHERE EXISTS (
        SELECT 1 FROM nodes WHERE checksum = ?1
        UNION ALL
        SELECT 1 FROM actual_node
        WHERE older_checksum = ?1 OR left_checksum = ?1 OR right_checksum = ?1
    )
";

pub const SELECT_GC_CANDIDATES: &str = "
    SELECT checksum FROM pristine
    WHERE refcount = 0
      AND checksum NOT IN (SELECT checksum FROM nodes WHERE checksum IS NOT NULL)
      AND checksum NOT IN (
          SELECT older_checksum FROM actual_node WHERE older_checksum IS NOT NULL
          UNION
          SELECT left_checksum FROM actual_node WHERE left_checksum IS NOT NULL
          UNION
          SELECT right_checksum FROM actual_node WHERE right_checksum IS NOT NULL
      )
";

pub const DELETE_PRISTINE: &str = "DELETE FROM pristine WHERE checksum = ?1";

// -- locks --

pub const INSERT_LOCK: &str = "
    INSERT OR REPLACE INTO lock (repo_id, repos_relpath, lock_token, lock_owner, lock_comment, lock_date)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
";

pub const DELETE_LOCK: &str = "DELETE FROM lock WHERE repo_id = ?1 AND repos_relpath = ?2";

pub const UPDATE_LOCK_REPOS_ID: &str = "UPDATE lock SET repo_id = ?2 WHERE repo_id = ?1";

pub const INSERT_WC_LOCK: &str = "
    INSERT INTO wc_lock (wc_id, local_dir_relpath, locked_levels) VALUES (?1, ?2, ?3)
";

pub const SELECT_WC_LOCK: &str = "
    SELECT locked_levels FROM wc_lock WHERE wc_id = ?1 AND local_dir_relpath = ?2
";

pub const FIND_WC_LOCK: &str = "
    SELECT local_dir_relpath, locked_levels FROM wc_lock
    WHERE wc_id = ?1 AND (?2 = local_dir_relpath OR local_dir_relpath = '')
    ORDER BY LENGTH(local_dir_relpath) DESC
    LIMIT 1
";

pub const DELETE_WC_LOCK: &str = "DELETE FROM wc_lock WHERE wc_id = ?1 AND local_dir_relpath = ?2";

// -- work queue --

pub const INSERT_WORK_ITEM: &str = "INSERT INTO work_queue (work) VALUES (?1)";

pub const SELECT_WORK_ITEM: &str = "SELECT id, work FROM work_queue ORDER BY id LIMIT 1";

pub const LOOK_FOR_WORK: &str = "SELECT EXISTS(SELECT 1 FROM work_queue)";

pub const DELETE_WORK_ITEM: &str = "DELETE FROM work_queue WHERE id = ?1";

// -- upgrade --

pub const SELECT_OLD_TREE_CONFLICT: &str = "
    SELECT wc_id, local_relpath, tree_conflict_data FROM actual_node
    WHERE tree_conflict_data IS NOT NULL
";

pub const INSERT_NEW_CONFLICT: &str = "
    UPDATE actual_node SET
        conflict_operation = ?3, conflict_left_kind = ?4, conflict_left_revision = ?5,
        conflict_right_kind = ?6, conflict_right_revision = ?7, conflict_action = ?8,
        conflict_reason = ?9
    WHERE wc_id = ?1 AND local_relpath = ?2
";

pub const ERASE_OLD_CONFLICTS: &str = "
    UPDATE actual_node SET tree_conflict_data = NULL WHERE tree_conflict_data IS NOT NULL
";

pub const PLAN_PROP_UPGRADE: &str = "
    SELECT wc_id, local_relpath FROM actual_node WHERE properties IS NOT NULL
";

// -- repository interning --

pub const INTERN_REPOSITORY: &str = "
    INSERT INTO repository (root, uuid) VALUES (?1, ?2)
    ON CONFLICT (root, uuid) DO NOTHING
";

pub const SELECT_REPOSITORY_ID: &str = "
    SELECT repo_id FROM repository WHERE root = ?1 AND uuid = ?2
";
