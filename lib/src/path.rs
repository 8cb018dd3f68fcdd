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

//! The `local_relpath` path grammar (§6): forward-slash separated, no
//! leading or trailing slash, no `.`/`..` components, UTF-8. The workcopy
//! root is the empty path `""`.

use std::fmt::{Debug, Error, Formatter};

use crate::error::{WcmsError, WcmsResult};

/// A canonicalized path relative to a workcopy root.
///
/// Never starts or ends with `/`, never contains an empty, `.`, or `..`
/// component. The root itself is represented by the empty string.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub struct LocalRelPath(String);

impl Debug for LocalRelPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.debug_tuple("LocalRelPath").field(&self.0).finish()
    }
}

impl LocalRelPath {
    pub fn root() -> Self {
        LocalRelPath(String::new())
    }

    pub fn parse(s: &str) -> WcmsResult<Self> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        if s.starts_with('/') || s.ends_with('/') {
            return Err(WcmsError::InvalidPath(
                s.to_string(),
                "must not start or end with '/'",
            ));
        }
        for component in s.split('/') {
            match component {
                "" => {
                    return Err(WcmsError::InvalidPath(s.to_string(), "empty path component"))
                }
                "." | ".." => {
                    return Err(WcmsError::InvalidPath(
                        s.to_string(),
                        "'.' and '..' are not allowed",
                    ))
                }
                _ => {}
            }
        }
        Ok(LocalRelPath(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The path-depth used as the ordinate for `op_depth`: the root is
    /// depth 0, each path component below it adds one.
    pub fn depth(&self) -> i64 {
        if self.is_root() {
            0
        } else {
            self.0.matches('/').count() as i64 + 1
        }
    }

    /// Textual parent, per invariant 6: `None` iff this is the root.
    pub fn parent(&self) -> Option<LocalRelPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(LocalRelPath(self.0[..idx].to_string())),
            None => Some(LocalRelPath::root()),
        }
    }

    pub fn basename(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    pub fn join(&self, component: &str) -> LocalRelPath {
        if self.is_root() {
            LocalRelPath(component.to_string())
        } else {
            LocalRelPath(format!("{}/{}", self.0, component))
        }
    }

    /// Is `self` equal to or an ancestor of `other`?
    pub fn contains(&self, other: &LocalRelPath) -> bool {
        if self.is_root() {
            return true;
        }
        other.0 == self.0 || other.0.starts_with(&format!("{}/", self.0))
    }

    /// A `LIKE` pattern matching this path and everything below it, with
    /// `#` as the escape character and a trailing `/%` for the recursive
    /// subtree, per §6's path grammar.
    pub fn like_subtree_pattern(&self) -> String {
        let escaped = self.0.replace('#', "##").replace('%', "#%").replace('_', "#_");
        if self.is_root() {
            "%".to_string()
        } else {
            format!("{escaped}/%")
        }
    }
}

impl From<&str> for LocalRelPath {
    fn from(s: &str) -> Self {
        LocalRelPath::parse(s).expect("invalid local_relpath")
    }
}

impl std::fmt::Display for LocalRelPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.write_str(&self.0)
    }
}
