// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module registry metadata
//!
//! The exports themselves live in the JavaScript registry object
//! (`require.cache`); this side tracks what the loaders need to decide
//! whether an entry can be reused.

use crate::loader::classify::ExtensionClass;
use crate::loader::fingerprint::Fingerprint;
use dashmap::DashMap;
use std::path::{Path, PathBuf};

/// Cached module entry
#[derive(Debug, Clone)]
pub struct CachedModule {
    /// The module's filename
    pub filename: PathBuf,
    /// How it was loaded
    pub class: ExtensionClass,
    /// Whether the module has finished evaluating
    pub loaded: bool,
    /// Content digest at transform time (foreign modules under the content policy)
    pub fingerprint: Option<Fingerprint>,
    /// Module that first required this one
    pub parent: Option<PathBuf>,
}

/// Thread-safe module cache
pub struct ModuleCache {
    /// Cache mapping absolute paths to cached modules
    cache: DashMap<PathBuf, CachedModule>,
}

impl ModuleCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Get a cached module by path
    pub fn get(&self, path: &Path) -> Option<CachedModule> {
        self.cache.get(path).map(|entry| entry.clone())
    }

    /// Check if a module is cached
    pub fn has(&self, path: &Path) -> bool {
        self.cache.contains_key(path)
    }

    /// Add a module to the cache
    pub fn set(&self, module: CachedModule) {
        self.cache.insert(module.filename.clone(), module);
    }

    /// Flag a module as fully evaluated
    pub fn mark_loaded(&self, path: &Path) {
        if let Some(mut entry) = self.cache.get_mut(path) {
            entry.loaded = true;
        }
    }

    /// Remove a module from the cache
    pub fn delete(&self, path: &Path) -> Option<CachedModule> {
        self.cache.remove(path).map(|(_, v)| v)
    }

    /// Get the number of cached modules
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for ModuleCache {
    fn default() -> Self {
        Self::new()
    }
}
