// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module load interception
//!
//! Once installed, [`InterceptionLoader`] sits in the host's dispatch slot.
//! It resolves every request with the host's algorithm, hands native paths
//! back to the loader it replaced and sends foreign paths through the
//! transpiler before evaluating them as ordinary modules.

pub mod classify;
pub mod fingerprint;
pub mod install;

pub use classify::{Classifier, ExtensionClass};
pub use fingerprint::Fingerprint;
pub use install::{install, InstallOutcome, InterceptOptions, LoaderOverride};

use crate::config::CachePolicy;
use crate::error::{LoaderError, Result};
use crate::host::{ModuleHost, ModuleLoad, ModuleRecord, ModuleRequest, ModuleUnit, ResolvedPath};
use rquickjs::Ctx;
use std::sync::Arc;
use tsboot_bridge::Transform;

/// Routes requests by extension class
pub struct InterceptionLoader {
    /// Slot occupant at install time; receives every native request
    original: Arc<dyn ModuleLoad>,
    bridge: Arc<dyn Transform>,
    classifier: Classifier,
    policy: CachePolicy,
}

impl InterceptionLoader {
    pub(crate) fn new(
        original: Arc<dyn ModuleLoad>,
        bridge: Arc<dyn Transform>,
        options: InterceptOptions,
    ) -> Self {
        Self {
            original,
            bridge,
            classifier: options.classifier,
            policy: options.cache,
        }
    }

    /// The loader native requests are delegated to
    pub fn original(&self) -> &Arc<dyn ModuleLoad> {
        &self.original
    }

    fn load_foreign<'js>(
        &self,
        host: &Arc<ModuleHost>,
        ctx: &Ctx<'js>,
        request: &ModuleRequest,
        path: ResolvedPath,
    ) -> Result<ModuleRecord<'js>> {
        let fingerprint = match self.policy {
            CachePolicy::Content => {
                Some(Fingerprint::of_file(path.as_path()).map_err(|source| LoaderError::Io {
                    path: path.as_path().to_path_buf(),
                    source,
                })?)
            }
            CachePolicy::None => None,
        };

        if let Some(record) = host.cached(ctx, &path)? {
            // A module still initializing hands out its partial exports
            let entry = host.cache().get(path.as_path());
            let reusable = match &entry {
                Some(entry) if !entry.loaded => true,
                Some(entry) => {
                    self.policy == CachePolicy::Content && entry.fingerprint == fingerprint
                }
                None => true,
            };
            if reusable {
                return Ok(record);
            }
            tracing::debug!("{} changed, loading again", path);
            host.evict(ctx, &path);
        }

        let source = self.bridge.transform(path.as_path()).map_err(|source| {
            LoaderError::Transform {
                path: path.as_path().to_path_buf(),
                source,
            }
        })?;
        tracing::debug!("transformed {} ({} bytes)", path, source.len());

        host.evaluate_module(
            ctx,
            ModuleUnit {
                path,
                class: ExtensionClass::Foreign,
                source,
                fingerprint,
                parent: request.parent().map(|p| p.to_path_buf()),
            },
        )
    }
}

impl ModuleLoad for InterceptionLoader {
    fn name(&self) -> &'static str {
        "intercept"
    }

    fn load<'js>(
        &self,
        host: &Arc<ModuleHost>,
        ctx: &Ctx<'js>,
        request: &ModuleRequest,
    ) -> Result<ModuleRecord<'js>> {
        let path = host.resolve(request)?;
        let class = self.classifier.classify(path.as_path());
        tracing::debug!("{:?} -> {} ({})", request.specifier, path, class);

        match class {
            ExtensionClass::Native => self
                .original
                .load(host, ctx, &ModuleRequest::for_resolved(&path, &request.referrer)),
            ExtensionClass::Foreign => self.load_foreign(host, ctx, request, path),
        }
    }
}

impl std::fmt::Debug for InterceptionLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionLoader")
            .field("original", &self.original.name())
            .field("classifier", &self.classifier)
            .field("policy", &self.policy)
            .finish()
    }
}
