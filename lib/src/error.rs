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

//! Error taxonomy for the working-copy metadata store.
//!
//! Every fallible public function returns [`WcmsResult<T>`]. Internal
//! modules may define a narrower enum for callers that want to match on a
//! specific failure mode; those convert into [`WcmsError`] via `#[from]` at
//! the crate boundary, the same way `jj-lib` composes `BackendError` into
//! its higher-level errors.

use std::path::PathBuf;

use thiserror::Error;

pub type WcmsResult<T> = Result<T, WcmsError>;

#[derive(Debug, Error)]
pub enum WcmsError {
    // -- retryable --
    #[error("database busy")]
    Busy,
    #[error("operation interrupted")]
    Interrupted,

    // -- caller-fault --
    #[error("no node at {0:?}")]
    NotFound(String),
    #[error("{0:?} already exists")]
    AlreadyExists(String),
    #[error("invalid local path {0:?}: {1}")]
    InvalidPath(String, &'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    // -- environment --
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },
    #[error("no space left on device")]
    NoSpace,
    #[error("permission denied: {0:?}")]
    PermissionDenied(PathBuf),

    // -- fatal to session --
    #[error("metadata file is corrupt: {0}")]
    Corrupt(String),
    #[error("schema version {found} is newer than the supported version {supported}")]
    SchemaTooNew { found: i64, supported: i64 },
    #[error("schema version {0} predates the oldest supported migration")]
    UnsupportedSchema(i64),
}

impl WcmsError {
    /// True for errors the caller may reasonably retry without changing
    /// anything (as opposed to giving up or fixing their call).
    pub fn is_retryable(&self) -> bool {
        matches!(self, WcmsError::Busy | WcmsError::Interrupted)
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WcmsError::Io {
            path: Some(path.into()),
            source,
        }
    }
}

impl From<std::io::Error> for WcmsError {
    fn from(source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => {
                WcmsError::PermissionDenied(PathBuf::new())
            }
            _ => WcmsError::Io { path: None, source },
        }
    }
}

impl From<rusqlite::Error> for WcmsError {
    fn from(source: rusqlite::Error) -> Self {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as E;

        match &source {
            E::SqliteFailure(err, _) => match err.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => WcmsError::Busy,
                ErrorCode::ConstraintViolation => {
                    WcmsError::ConstraintViolation(source.to_string())
                }
                ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt => {
                    WcmsError::Corrupt(source.to_string())
                }
                _ => WcmsError::ConstraintViolation(source.to_string()),
            },
            E::QueryReturnedNoRows => WcmsError::NotFound(source.to_string()),
            _ => WcmsError::ConstraintViolation(source.to_string()),
        }
    }
}
