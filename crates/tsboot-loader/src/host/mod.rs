// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CommonJS host module system
//!
//! The host owns everything a plain JavaScript runtime needs to satisfy
//! `require()`:
//!
//! - resolution ([`ModuleResolver`], Node.js algorithm)
//! - the module registry ([`ModuleCache`] plus the `require.cache` object)
//! - evaluation of module bodies in their own function scope
//! - a single [`DispatchSlot`] every `require()` call goes through
//!
//! The slot starts out holding [`NativeLoader`]. Replacing its occupant is
//! the only supported way to change how modules are loaded.

pub mod cache;
pub mod globals;
pub mod native;
pub mod resolver;
mod sandbox;

pub use cache::{CachedModule, ModuleCache};
pub use native::NativeLoader;
pub use resolver::ModuleResolver;
pub use sandbox::{ModuleUnit, REGISTRY_KEY};

use crate::error::{LoaderError, Result};
use crate::loader::classify::ExtensionClass;
use crate::loader::install::LoaderOverride;
use parking_lot::{Mutex, RwLock};
use rquickjs::{Ctx, FromJs, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// An absolute, canonical module path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    /// Canonicalize `path`, keeping it as-is if that fails
    pub fn new(path: &Path) -> Self {
        Self(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()))
    }

    /// Borrow the path
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Who asked for a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Referrer {
    /// A loaded module, by its path
    Module(PathBuf),
    /// The process entry, resolved against a base directory
    Entry(PathBuf),
}

impl Referrer {
    /// Directory relative specifiers are joined to
    pub fn directory(&self) -> &Path {
        match self {
            Referrer::Module(path) => path.parent().unwrap_or(path),
            Referrer::Entry(dir) => dir,
        }
    }

    /// Path reported in errors
    pub fn path(&self) -> &Path {
        match self {
            Referrer::Module(path) | Referrer::Entry(path) => path,
        }
    }
}

/// A single `require()` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequest {
    /// Specifier as written by the requesting code
    pub specifier: String,
    /// Requesting module
    pub referrer: Referrer,
}

impl ModuleRequest {
    /// Request made by the module at `parent`
    pub fn from_module(specifier: impl Into<String>, parent: &Path) -> Self {
        Self {
            specifier: specifier.into(),
            referrer: Referrer::Module(parent.to_path_buf()),
        }
    }

    /// Request for the process entry. Relative paths are joined to `base_dir`.
    pub fn entry(path: &Path, base_dir: &Path) -> Self {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        };
        Self {
            specifier: absolute.display().to_string(),
            referrer: Referrer::Entry(base_dir.to_path_buf()),
        }
    }

    /// Absolute request for an already resolved path, keeping the referrer
    pub fn for_resolved(path: &ResolvedPath, referrer: &Referrer) -> Self {
        Self {
            specifier: path.to_string(),
            referrer: referrer.clone(),
        }
    }

    /// Requesting module, or `None` for the process entry
    pub fn parent(&self) -> Option<&Path> {
        match &self.referrer {
            Referrer::Module(path) => Some(path),
            Referrer::Entry(_) => None,
        }
    }
}

/// A loaded module
#[derive(Debug, Clone)]
pub struct ModuleRecord<'js> {
    /// Where it was loaded from
    pub path: ResolvedPath,
    /// How it was loaded
    pub class: ExtensionClass,
    /// `module.exports`
    pub exports: Value<'js>,
}

impl<'js> ModuleRecord<'js> {
    /// Read a property of the exports object
    pub fn get<V: FromJs<'js>>(&self, key: &str) -> Result<V> {
        let object = self.exports.as_object().ok_or_else(|| {
            LoaderError::Engine(format!("exports of '{}' is not an object", self.path))
        })?;
        Ok(object.get(key)?)
    }
}

/// Something that can satisfy a module request.
///
/// Both the host's own loader and the interception loader implement this;
/// whichever sits in the [`DispatchSlot`] sees every request.
pub trait ModuleLoad: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Resolve and load `request`
    fn load<'js>(
        &self,
        host: &Arc<ModuleHost>,
        ctx: &Ctx<'js>,
        request: &ModuleRequest,
    ) -> Result<ModuleRecord<'js>>;
}

/// The host's replaceable load entry point
pub struct DispatchSlot {
    current: RwLock<Arc<dyn ModuleLoad>>,
}

impl DispatchSlot {
    fn new(loader: Arc<dyn ModuleLoad>) -> Self {
        Self {
            current: RwLock::new(loader),
        }
    }

    /// Loader currently receiving requests
    pub fn current(&self) -> Arc<dyn ModuleLoad> {
        Arc::clone(&self.current.read())
    }

    /// Put `loader` in the slot, returning the previous occupant
    pub fn replace(&self, loader: Arc<dyn ModuleLoad>) -> Arc<dyn ModuleLoad> {
        std::mem::replace(&mut *self.current.write(), loader)
    }
}

/// Host module system shared by every module of one runtime
pub struct ModuleHost {
    resolver: ModuleResolver,
    cache: ModuleCache,
    slot: DispatchSlot,
    overrides: Mutex<LoaderOverride>,
    /// Error raised by a nested `require()` while it crosses JavaScript
    /// frames, with the tag set on the exception that carries it
    pending: Mutex<Option<(u32, LoaderError)>>,
    next_tag: AtomicU32,
    exit_code: Mutex<Option<i32>>,
}

impl ModuleHost {
    /// Create a host probing `extensions` in order, with [`NativeLoader`] in the slot
    pub fn new<I, S>(extensions: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            resolver: ModuleResolver::new(extensions),
            cache: ModuleCache::new(),
            slot: DispatchSlot::new(Arc::new(NativeLoader)),
            overrides: Mutex::new(LoaderOverride::Uninstalled),
            pending: Mutex::new(None),
            next_tag: AtomicU32::new(1),
            exit_code: Mutex::new(None),
        })
    }

    /// The resolver
    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    /// Registry metadata
    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// The dispatch slot
    pub fn dispatch_slot(&self) -> &DispatchSlot {
        &self.slot
    }

    /// Install state of the interception loader
    pub fn loader_override(&self) -> &Mutex<LoaderOverride> {
        &self.overrides
    }

    /// Resolve a request with the host's algorithm
    pub fn resolve(&self, request: &ModuleRequest) -> Result<ResolvedPath> {
        self.resolver.resolve(&request.specifier, &request.referrer)
    }

    /// Hand `request` to whichever loader is in the slot.
    ///
    /// The slot lock is released before the loader runs, so nested
    /// requests made while the module evaluates dispatch again freely.
    pub fn dispatch<'js>(
        self: &Arc<Self>,
        ctx: &Ctx<'js>,
        request: &ModuleRequest,
    ) -> Result<ModuleRecord<'js>> {
        let loader = self.slot.current();
        tracing::trace!("{} <- {:?}", loader.name(), request.specifier);
        loader.load(self, ctx, request)
    }

    /// Record a `process.exit()` call
    pub fn request_exit(&self, code: i32) {
        *self.exit_code.lock() = Some(code);
    }

    /// Code passed to `process.exit()`, if it was called
    pub fn exit_requested(&self) -> Option<i32> {
        *self.exit_code.lock()
    }

    /// Keep `err` until the exception tagged with the returned value unwinds
    /// to a module boundary. Replaces whatever was kept before.
    fn stash_error(&self, err: LoaderError) -> u32 {
        let tag = self.next_tag.fetch_add(1, Ordering::Relaxed);
        *self.pending.lock() = Some((tag, err));
        tag
    }

    fn take_error(&self) -> Option<(u32, LoaderError)> {
        self.pending.lock().take()
    }
}
