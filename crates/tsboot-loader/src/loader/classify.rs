// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Extension classification
//!
//! Whether a resolved path is handed to the host as-is or through the
//! transpiler depends only on its final extension.

use std::fmt;
use std::path::Path;

/// TypeScript-family extensions transformed by default, in probing order.
pub const FOREIGN_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".mts", ".cts"];

/// Extensions the host understands on its own, in probing order.
pub const NATIVE_EXTENSIONS: &[&str] = &[".js", ".json"];

/// How a resolved module is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionClass {
    /// Executed by the host directly
    Native,
    /// Needs the transpiler first
    Foreign,
}

impl fmt::Display for ExtensionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionClass::Native => write!(f, "native"),
            ExtensionClass::Foreign => write!(f, "foreign"),
        }
    }
}

/// Maps paths to an [`ExtensionClass`].
///
/// Anything that is not listed as foreign is native, so every path has
/// exactly one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    foreign: Vec<String>,
}

impl Classifier {
    /// Create a classifier from dotted extensions (`".ts"`)
    pub fn new<I, S>(foreign: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            foreign: foreign
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_string())
                .collect(),
        }
    }

    /// Classify a path by its extension
    pub fn classify(&self, path: &Path) -> ExtensionClass {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if self.foreign.iter().any(|f| f == ext) => ExtensionClass::Foreign,
            _ => ExtensionClass::Native,
        }
    }

    /// Foreign extensions with their leading dot, in probing order
    pub fn foreign_extensions(&self) -> Vec<String> {
        self.foreign.iter().map(|e| format!(".{}", e)).collect()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(FOREIGN_EXTENSIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classification() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify(Path::new("/a/file.ts")), ExtensionClass::Foreign);
        assert_eq!(classifier.classify(Path::new("/a/file.tsx")), ExtensionClass::Foreign);
        assert_eq!(classifier.classify(Path::new("/a/file.mts")), ExtensionClass::Foreign);
        assert_eq!(classifier.classify(Path::new("/a/file.cts")), ExtensionClass::Foreign);
        assert_eq!(classifier.classify(Path::new("/a/file.js")), ExtensionClass::Native);
        assert_eq!(classifier.classify(Path::new("/a/file.json")), ExtensionClass::Native);
    }

    #[test]
    fn test_only_last_extension_counts() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify(Path::new("/a/b.in.ts")), ExtensionClass::Foreign);
        assert_eq!(classifier.classify(Path::new("/a/b.ts.js")), ExtensionClass::Native);
        assert_eq!(classifier.classify(Path::new("/a/Makefile")), ExtensionClass::Native);
        assert_eq!(classifier.classify(Path::new("/a/.ts")), ExtensionClass::Native);
    }

    #[test]
    fn test_custom_extensions() {
        let classifier = Classifier::new([".coffee"]);
        assert_eq!(classifier.classify(Path::new("x.coffee")), ExtensionClass::Foreign);
        assert_eq!(classifier.classify(Path::new("x.ts")), ExtensionClass::Native);
        assert_eq!(classifier.foreign_extensions(), vec![".coffee"]);
    }
}
