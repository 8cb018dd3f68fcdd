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

//! Per-session configuration (§9 "Global state"). Each [`crate::session::Session`]
//! owns one of these; there is no process-wide cache or config singleton.

use std::time::Duration;

/// An optional memcache-style shared cache endpoint, kept as an opaque
/// address rather than a parsed URL since WCMS never dials it itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address(pub String);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Cache deserialized node full-texts in-process.
    pub cache_fulltexts: bool,
    /// Cache the delta chains used to reconstruct pristine text, if the
    /// backing blob store is delta-compressed.
    pub cache_txdeltas: bool,
    /// If a cache layer hits an internal error, surface it to the caller
    /// instead of silently downgrading to a cache miss (§7).
    pub fail_stop: bool,
    pub memcache_endpoint: Option<Address>,
    /// How long `busy_retry` backs off before surfacing `Busy` to the
    /// caller (§5).
    pub busy_timeout: Duration,
    pub max_retry_elapsed: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            cache_fulltexts: true,
            cache_txdeltas: false,
            fail_stop: false,
            memcache_endpoint: None,
            busy_timeout: Duration::from_millis(50),
            max_retry_elapsed: Duration::from_secs(10),
        }
    }
}
