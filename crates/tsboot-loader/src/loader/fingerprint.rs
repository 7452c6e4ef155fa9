// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Content digests for cache invalidation

use ring::digest::{digest, SHA256};
use std::fmt;
use std::path::Path;

/// SHA-256 of a module's bytes, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Digest of `bytes`
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(digest(&SHA256, bytes).as_ref()))
    }

    /// Digest of the file at `path`
    pub fn of_file(path: &Path) -> std::io::Result<Self> {
        Ok(Self::of_bytes(&std::fs::read(path)?))
    }

    /// Hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            Fingerprint::of_bytes(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_file_digest_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ts");

        std::fs::write(&path, "const a: number = 1;").unwrap();
        let first = Fingerprint::of_file(&path).unwrap();
        assert_eq!(first, Fingerprint::of_bytes(b"const a: number = 1;"));

        std::fs::write(&path, "const a: number = 2;").unwrap();
        assert_ne!(first, Fingerprint::of_file(&path).unwrap());
    }
}
