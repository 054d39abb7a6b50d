// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of OpenEthereum.

// OpenEthereum is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// OpenEthereum is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with OpenEthereum.  If not, see <http://www.gnu.org/licenses/>.

//! On-disk protocol/database version gate (spec.md §4.6), ported from
//! `original_source`'s `VersionChecker`: two small RLP-encoded files under
//! the db path, compared against built-in constants, rewritten on a
//! successful open.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::EthcoreResult;

/// Bump whenever the wire-level protocol this client speaks changes.
pub const PROTOCOL_VERSION: u64 = 63;
/// Bump whenever the on-disk layout of `Chain`/`StateDB` changes
/// incompatibly.
pub const DATABASE_VERSION: u64 = 13;

const PROTOCOL_FILE: &str = "protocol";
const DATABASE_FILE: &str = "database";

/// Whether the gate passed, and therefore whether `Chain`/`StateDB` should
/// be opened in wipe mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionGateResult {
    /// Both files matched; open normally.
    Pass,
    /// At least one file was missing or stale; open in wipe mode.
    ForceClean,
}

pub struct VersionChecker {
    db_path: PathBuf,
}

impl VersionChecker {
    pub fn new<P: AsRef<Path>>(db_path: P) -> VersionChecker {
        VersionChecker { db_path: db_path.as_ref().to_path_buf() }
    }

    /// Read the two version files and compare against the built-in
    /// constants. A missing or malformed file reads as a mismatch rather
    /// than an error, matching spec.md §4.6 ("the gate passes iff both
    /// equal the built-in constants").
    pub fn check(&self) -> VersionGateResult {
        let protocol_ok = self.read_version(PROTOCOL_FILE) == Some(PROTOCOL_VERSION);
        let database_ok = self.read_version(DATABASE_FILE) == Some(DATABASE_VERSION);
        if protocol_ok && database_ok {
            VersionGateResult::Pass
        } else {
            VersionGateResult::ForceClean
        }
    }

    fn read_version(&self, file: &str) -> Option<u64> {
        let bytes = fs::read(self.db_path.join(file)).ok()?;
        rlp::decode::<u64>(&bytes).ok()
    }

    /// Rewrite both version files, as required after a successful open
    /// (spec.md §4.6: "After a successful open, both files are
    /// (re)written.").
    pub fn write_current(&self) -> EthcoreResult<()> {
        fs::create_dir_all(&self.db_path)?;
        fs::write(self.db_path.join(PROTOCOL_FILE), rlp::encode(&PROTOCOL_VERSION))?;
        fs::write(self.db_path.join(DATABASE_FILE), rlp::encode(&DATABASE_VERSION))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_directory_forces_clean() {
        let dir = tempdir();
        let checker = VersionChecker::new(dir.path());
        assert_eq!(checker.check(), VersionGateResult::ForceClean);
    }

    #[test]
    fn matching_files_pass() {
        let dir = tempdir();
        let checker = VersionChecker::new(dir.path());
        checker.write_current().unwrap();
        assert_eq!(checker.check(), VersionGateResult::Pass);
    }

    #[test]
    fn stale_database_file_forces_clean() {
        let dir = tempdir();
        let checker = VersionChecker::new(dir.path());
        checker.write_current().unwrap();
        std::fs::write(dir.path().join(DATABASE_FILE), rlp::encode(&0u64)).unwrap();
        assert_eq!(checker.check(), VersionGateResult::ForceClean);
    }

    // Minimal temp-dir helper so this test module does not pull in a
    // dev-dependency just for directory cleanup.
    struct TempDir(PathBuf);
    impl TempDir {
        fn path(&self) -> &Path {
            &self.0
        }
    }
    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }
    fn tempdir() -> TempDir {
        let mut p = std::env::temp_dir();
        let unique = format!("client-core-version-gate-test-{:?}", std::thread::current().id());
        p.push(unique);
        let _ = fs::remove_dir_all(&p);
        fs::create_dir_all(&p).unwrap();
        TempDir(p)
    }
}
