// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Shared library transpilers
//!
//! The library exports one C function taking a NUL-terminated absolute path
//! and returning a NUL-terminated string of JavaScript, or null on failure:
//!
//! ```c
//! const char *require(const char *path);
//! ```
//!
//! If the library also exports a release function (`void release(const char *)`)
//! it is called with every returned pointer once the text has been copied.

use crate::error::{Result, TransformError};
use crate::{ensure_readable, Transform};
use libloading::Library;
use std::ffi::{c_char, CStr, CString, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Symbol looked up when none is configured
pub const DEFAULT_SYMBOL: &str = "require";

/// File stem of the transpiler library looked up when none is configured
pub const DEFAULT_LIBRARY_STEM: &str = "tsboot_transpiler";

type RequireFn = unsafe extern "C" fn(*const c_char) -> *const c_char;
type ReleaseFn = unsafe extern "C" fn(*const c_char);

/// An opened library and the functions resolved from it
struct Loaded {
    require: RequireFn,
    release: Option<ReleaseFn>,
    // Keeps the function pointers above valid.
    _library: Library,
}

/// Transpiler backed by a dynamically loaded shared library.
///
/// The library is opened on first use. A failure to open it, or to find the
/// entry symbol, is remembered and reported as
/// [`TransformError::Unavailable`] on every later call.
pub struct LibraryTranspiler {
    path: PathBuf,
    symbol: String,
    free_symbol: Option<String>,
    loaded: OnceLock<std::result::Result<Loaded, String>>,
}

impl LibraryTranspiler {
    /// Create a transpiler for the library at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            symbol: DEFAULT_SYMBOL.to_string(),
            free_symbol: None,
            loaded: OnceLock::new(),
        }
    }

    /// Use a different entry symbol
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    /// Release returned strings through `symbol`
    pub fn with_free_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.free_symbol = Some(symbol.into());
        self
    }

    /// Platform file name of the default library (`libtsboot_transpiler.so`, ...)
    pub fn default_file_name() -> OsString {
        libloading::library_filename(DEFAULT_LIBRARY_STEM)
    }

    /// Path of the library
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn handle(&self) -> Result<&Loaded> {
        self.loaded
            .get_or_init(|| self.open())
            .as_ref()
            .map_err(|reason| TransformError::Unavailable {
                transpiler: self.path.display().to_string(),
                reason: reason.clone(),
            })
    }

    fn open(&self) -> std::result::Result<Loaded, String> {
        tracing::debug!("Opening transpiler library {}", self.path.display());

        // SAFETY: loading a library runs its initializers; the path comes from
        // the user's configuration and is trusted like any other executable.
        let library = unsafe { Library::new(&self.path) }.map_err(|e| e.to_string())?;

        // SAFETY: the symbol is declared with the C signature documented above.
        let require = unsafe { library.get::<RequireFn>(self.symbol.as_bytes()) }
            .map(|symbol| *symbol)
            .map_err(|e| format!("missing symbol '{}': {}", self.symbol, e))?;

        let release = match &self.free_symbol {
            Some(name) => {
                // SAFETY: as above, for `void release(const char *)`.
                let release = unsafe { library.get::<ReleaseFn>(name.as_bytes()) }
                    .map(|symbol| *symbol)
                    .map_err(|e| format!("missing symbol '{}': {}", name, e))?;
                Some(release)
            }
            None => None,
        };

        Ok(Loaded {
            require,
            release,
            _library: library,
        })
    }
}

impl Transform for LibraryTranspiler {
    fn transform(&self, path: &Path) -> Result<String> {
        ensure_readable(path)?;
        let loaded = self.handle()?;

        let utf8 = path
            .to_str()
            .ok_or_else(|| TransformError::rejected(path, "path is not valid UTF-8"))?;
        let c_path = CString::new(utf8)
            .map_err(|_| TransformError::rejected(path, "path contains a NUL byte"))?;

        // SAFETY: `c_path` is a valid NUL-terminated string that outlives the call.
        let raw = unsafe { (loaded.require)(c_path.as_ptr()) };
        if raw.is_null() {
            return Err(TransformError::rejected(path, "transpiler returned no output"));
        }

        // SAFETY: a non-null result is a NUL-terminated string owned by the library.
        let text = unsafe { CStr::from_ptr(raw) }
            .to_str()
            .map(str::to_owned)
            .map_err(|e| {
                TransformError::rejected(path, format!("output is not valid UTF-8: {}", e))
            });

        if let Some(release) = loaded.release {
            // SAFETY: `raw` came from this library and is not used after this call.
            unsafe { release(raw) };
        }

        text
    }
}

impl fmt::Debug for LibraryTranspiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryTranspiler")
            .field("path", &self.path)
            .field("symbol", &self.symbol)
            .field("free_symbol", &self.free_symbol)
            .field("opened", &matches!(self.loaded.get(), Some(Ok(_))))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_library_is_unavailable() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("a.ts");
        std::fs::write(&input, "const a: number = 1;").unwrap();

        let transpiler = LibraryTranspiler::new(dir.path().join("libnothing.so"));
        for _ in 0..2 {
            let err = transpiler.transform(&input).unwrap_err();
            assert!(matches!(err, TransformError::Unavailable { .. }));
        }
    }

    #[test]
    fn test_input_checked_before_opening() {
        let transpiler = LibraryTranspiler::new("/definitely/not/here.so");
        let err = transpiler.transform(Path::new("relative.ts")).unwrap_err();
        assert!(matches!(err, TransformError::NotAbsolute { .. }));
        assert!(transpiler.loaded.get().is_none());
    }

    #[test]
    fn test_default_file_name_mentions_stem() {
        let name = LibraryTranspiler::default_file_name();
        assert!(name.to_string_lossy().contains(DEFAULT_LIBRARY_STEM));
    }
}
