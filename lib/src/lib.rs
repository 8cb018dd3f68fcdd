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

//! `wcms`: a layered working-copy metadata store for version-control
//! clients, modeled on Subversion's `wc.db`. A workcopy is a tree of
//! "nodes" stacked across operation depths — BASE at depth zero, any
//! number of uncommitted working layers above it — with a second overlay
//! table for transient facts (conflicts, changelists) that don't belong
//! to the tree shape itself. See the module docs on [`nodes`] for the
//! resolver that ties the layers together.

pub mod actual;
pub mod checksum;
pub mod config;
pub mod error;
pub mod lock;
pub mod lock_registry;
pub mod nodes;
pub mod path;
pub mod pristine;
pub mod repository;
pub mod session;
pub mod storage;
pub mod upgrade;
pub mod work_queue;

pub use error::{WcmsError, WcmsResult};
pub use path::LocalRelPath;
pub use session::Session;
