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

//! Content-addressing hash types for the pristine store (§3, §4.D).
//! `Sha1Checksum` is the primary key of `pristine`; `Md5Checksum` is its
//! secondary index, kept only because svn's wire protocol still quotes
//! MD5s for legacy clients.

use std::fmt::{Debug, Error, Formatter};

use sha1::{Digest, Sha1};

macro_rules! hex_checksum {
    ($name:ident) => {
        #[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
        pub struct $name(Vec<u8>);

        impl $name {
            pub fn from_bytes(bytes: &[u8]) -> Self {
                $name(bytes.to_vec())
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn hex(&self) -> String {
                hex::encode(&self.0)
            }

            pub fn from_hex(s: &str) -> Option<Self> {
                hex::decode(s).ok().map($name)
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
                f.debug_tuple(stringify!($name)).field(&self.hex()).finish()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
                f.write_str(&self.hex())
            }
        }
    };
}

hex_checksum!(Sha1Checksum);
hex_checksum!(Md5Checksum);

impl Sha1Checksum {
    pub fn of(content: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(content);
        Sha1Checksum(hasher.finalize().to_vec())
    }
}
