// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the loader

use std::path::PathBuf;
use thiserror::Error;
use tsboot_bridge::TransformError;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that can occur while loading modules
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The specifier does not name an existing file
    #[error("Cannot find module '{specifier}' from '{}'", parent.display())]
    ModuleNotFound {
        /// Specifier as written
        specifier: String,
        /// Requesting module
        parent: PathBuf,
    },

    /// The transpiler failed for a foreign module
    #[error("Cannot load '{}': {source}", path.display())]
    Transform {
        /// Module being loaded
        path: PathBuf,
        /// Bridge failure
        #[source]
        source: TransformError,
    },

    /// The module threw during its own initialization
    #[error("Error evaluating '{}': {message}", path.display())]
    Evaluation {
        /// Module being evaluated
        path: PathBuf,
        /// Exception message (with stack when available)
        message: String,
    },

    /// The interception loader could not be installed
    #[error("Cannot install loader: {0}")]
    Installation(String),

    /// A native module could not be read
    #[error("Cannot read '{}': {source}", path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Engine failure outside module code
    #[error("Engine error: {0}")]
    Engine(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// `process.exit()` was called
    #[error("Process exited with code {0}")]
    ProcessExit(i32),
}

impl LoaderError {
    /// Create a module not found error
    pub fn module_not_found(specifier: impl Into<String>, parent: impl Into<PathBuf>) -> Self {
        Self::ModuleNotFound {
            specifier: specifier.into(),
            parent: parent.into(),
        }
    }

    /// Path of the module this error is about, when known
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Transform { path, .. }
            | Self::Evaluation { path, .. }
            | Self::Io { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl From<rquickjs::Error> for LoaderError {
    fn from(err: rquickjs::Error) -> Self {
        LoaderError::Engine(err.to_string())
    }
}
