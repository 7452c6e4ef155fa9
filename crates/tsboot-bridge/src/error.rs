// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the transform bridge

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for transform operations
pub type Result<T> = std::result::Result<T, TransformError>;

/// Errors raised while translating a module
#[derive(Debug, Error)]
pub enum TransformError {
    /// Relative paths are never handed to a transpiler
    #[error("Transform requires an absolute path, got '{}'", path.display())]
    NotAbsolute {
        /// Offending path
        path: PathBuf,
    },

    /// The input file could not be read
    #[error("Cannot read '{}': {source}", path.display())]
    Read {
        /// Input path
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The transpiler ran but refused the input
    #[error("Failed to transform '{}': {reason}", path.display())]
    Rejected {
        /// Input path
        path: PathBuf,
        /// Reason reported by the transpiler
        reason: String,
    },

    /// The transpiler itself could not be reached
    #[error("Transpiler '{transpiler}' is unavailable: {reason}")]
    Unavailable {
        /// Library path or program name
        transpiler: String,
        /// Why it could not be used
        reason: String,
    },
}

impl TransformError {
    /// Create a rejection for `path`
    pub fn rejected(path: &Path, reason: impl Into<String>) -> Self {
        Self::Rejected {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// The input path this error is about, when there is one
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotAbsolute { path } | Self::Read { path, .. } | Self::Rejected { path, .. } => {
                Some(path)
            }
            Self::Unavailable { .. } => None,
        }
    }
}
