// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # tsboot-bridge
//!
//! The single wire between tsboot and an external transpiler.
//!
//! A transpiler is anything that can turn the file at an absolute path into
//! JavaScript source text. The loader only ever sees the [`Transform`] trait,
//! so the back-end can be swapped freely:
//!
//! - [`LibraryTranspiler`] - a shared library exporting
//!   `extern "C" fn require(path: *const c_char) -> *const c_char`
//! - [`CommandTranspiler`] - an external program printing the result on stdout
//! - any closure `Fn(&Path) -> Result<String, TransformError>`
//!
//! ```rust,ignore
//! use tsboot_bridge::{LibraryTranspiler, Transform};
//!
//! let transpiler = LibraryTranspiler::new("target/release/libffi.so");
//! let js = transpiler.transform(Path::new("/abs/path/to/module.ts"))?;
//! ```
//!
//! The [`fixtures`] module runs input/expected-output pairs against a
//! transpiler and backs the `tsboot-fixtures` binary.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod error;
pub mod fixtures;
pub mod library;

use std::path::Path;

pub use command::CommandTranspiler;
pub use error::{Result, TransformError};
pub use library::{LibraryTranspiler, DEFAULT_SYMBOL};

/// Synchronous source-to-source transformation.
///
/// Implementations receive an absolute path to an existing file and return
/// the complete translated source for the file's content at call time, or
/// fail. They must not return partial output and must not retry.
pub trait Transform: Send + Sync {
    /// Translate the file at `path`.
    fn transform(&self, path: &Path) -> Result<String>;
}

impl<F> Transform for F
where
    F: Fn(&Path) -> Result<String> + Send + Sync,
{
    fn transform(&self, path: &Path) -> Result<String> {
        self(path)
    }
}

/// Check the input constraint shared by every back-end.
///
/// The path must be absolute and name a readable file.
pub fn ensure_readable(path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(TransformError::NotAbsolute {
            path: path.to_path_buf(),
        });
    }

    let metadata = std::fs::metadata(path).map_err(|source| TransformError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    if !metadata.is_file() {
        return Err(TransformError::Read {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file"),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_closure_is_a_transform() {
        let upper = |path: &Path| -> Result<String> {
            Ok(path.display().to_string().to_uppercase())
        };
        assert_eq!(upper.transform(Path::new("/a/b.ts")).unwrap(), "/A/B.TS");
    }

    #[test]
    fn test_ensure_readable_rejects_relative() {
        let err = ensure_readable(Path::new("src/main.ts")).unwrap_err();
        assert!(matches!(err, TransformError::NotAbsolute { .. }));
    }

    #[test]
    fn test_ensure_readable_rejects_missing_and_directories() {
        let dir = tempdir().unwrap();

        let missing = dir.path().join("missing.ts");
        assert!(matches!(
            ensure_readable(&missing),
            Err(TransformError::Read { .. })
        ));

        assert!(matches!(
            ensure_readable(dir.path()),
            Err(TransformError::Read { .. })
        ));

        let file = dir.path().join("present.ts");
        std::fs::write(&file, "let a = 1;").unwrap();
        assert!(ensure_readable(&file).is_ok());
    }
}
