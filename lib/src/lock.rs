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

//! The process-level advisory lock over a workcopy's `wc.db` file
//! (component I). This is distinct from the in-database `wc_lock` rows of
//! [`crate::lock_registry`], which record which subtrees the current
//! writer has claimed *within* one process; `FileLock` keeps a second
//! process from opening a writer [`crate::session::Session`] on the same
//! workcopy at all.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::time::Duration;

use backoff::{ExponentialBackoff, Operation};

use crate::error::{WcmsError, WcmsResult};

pub struct FileLock {
    path: PathBuf,
    _file: File,
}

impl FileLock {
    /// Acquires the lock, retrying with exponential backoff for up to 10s
    /// if another process holds it, per the `Busy` retry policy of §5.
    pub fn try_lock(path: PathBuf) -> WcmsResult<FileLock> {
        let mut options = OpenOptions::new();
        options.create_new(true);
        options.write(true);
        let mut try_write_lock_file = || match options.open(&path) {
            Ok(file) => Ok(FileLock {
                path: path.clone(),
                _file: file,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(backoff::Error::Transient(err))
            }
            Err(err) => Err(backoff::Error::Permanent(err)),
        };
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(1),
            max_elapsed_time: Some(Duration::from_secs(10)),
            ..Default::default()
        };
        match try_write_lock_file.retry(&mut backoff) {
            Ok(file_lock) => Ok(file_lock),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::debug!(path = %path.display(), "workcopy lock file contended past deadline");
                Err(WcmsError::Busy)
            }
            Err(err) => Err(WcmsError::io(path, err)),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), %err, "failed to delete lock file");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::io::{Read, Write};
    use std::thread;

    use super::*;

    #[test]
    fn lock_basic() {
        let number: u32 = rand::random();
        let lock_path = env::temp_dir().join(format!("wcms-test-{number}.lock"));
        assert!(!lock_path.exists());
        {
            let _lock = FileLock::try_lock(lock_path.clone()).unwrap();
            assert!(lock_path.exists());
        }
        assert!(!lock_path.exists());
    }

    #[test]
    fn lock_rejects_second_holder() {
        let number: u32 = rand::random();
        let lock_path = env::temp_dir().join(format!("wcms-test-{number}-busy.lock"));
        let _lock = FileLock::try_lock(lock_path.clone()).unwrap();
        let mut options = OpenOptions::new();
        options.create_new(true).write(true);
        assert!(options.open(&lock_path).is_err());
    }

    #[test]
    fn lock_concurrent() {
        let number: u32 = rand::random();
        let data_path = env::temp_dir().join(format!("wcms-test-{number}-data"));
        let lock_path = env::temp_dir().join(format!("wcms-test-{number}-data.lock"));
        let mut data_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&data_path)
            .unwrap();
        data_file.write_all(&0u32.to_le_bytes()).unwrap();
        let mut threads = vec![];
        for _ in 0..20 {
            let data_path = data_path.clone();
            let lock_path = lock_path.clone();
            threads.push(thread::spawn(move || {
                let _lock = FileLock::try_lock(lock_path).unwrap();
                let mut buf = [0u8; 4];
                let mut data_file = OpenOptions::new().read(true).open(&data_path).unwrap();
                data_file.read_exact(&mut buf).unwrap();
                let value = u32::from_le_bytes(buf);
                thread::sleep(Duration::from_millis(1));
                let mut data_file = OpenOptions::new().write(true).open(&data_path).unwrap();
                data_file.write_all(&(value + 1).to_le_bytes()).unwrap();
            }));
        }
        for thread in threads {
            thread.join().unwrap();
        }
        let mut buf = [0u8; 4];
        let mut data_file = OpenOptions::new().read(true).open(&data_path).unwrap();
        data_file.read_exact(&mut buf).unwrap();
        assert_eq!(u32::from_le_bytes(buf), 20);
        std::fs::remove_file(&data_path).unwrap();
    }
}
