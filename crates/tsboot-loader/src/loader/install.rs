// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Installing the interception loader into the dispatch slot

use super::{Classifier, InterceptionLoader};
use crate::config::{CachePolicy, LoaderConfig};
use crate::error::{LoaderError, Result};
use crate::host::ModuleHost;
use std::sync::Arc;
use tsboot_bridge::Transform;

/// Install state of the interception loader.
///
/// The only transition is `Uninstalled -> Installed`; there is no uninstall.
#[derive(Debug, Default)]
pub enum LoaderOverride {
    /// The slot still holds the host's own loader
    #[default]
    Uninstalled,
    /// The interception loader is in the slot
    Installed(Arc<InterceptionLoader>),
}

impl LoaderOverride {
    /// Whether the interception loader is in place
    pub fn is_installed(&self) -> bool {
        matches!(self, LoaderOverride::Installed(_))
    }

    /// The installed loader
    pub fn loader(&self) -> Option<&Arc<InterceptionLoader>> {
        match self {
            LoaderOverride::Installed(loader) => Some(loader),
            LoaderOverride::Uninstalled => None,
        }
    }
}

/// What [`install`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The slot was patched by this call
    Installed,
    /// An earlier call already patched it; nothing changed
    AlreadyInstalled,
}

/// Options for the interception loader
#[derive(Debug, Clone, Default)]
pub struct InterceptOptions {
    /// Extension classification
    pub classifier: Classifier,
    /// Foreign module cache policy
    pub cache: CachePolicy,
}

impl InterceptOptions {
    /// Options from a loaded configuration
    pub fn from_config(config: &LoaderConfig) -> Self {
        Self {
            classifier: Classifier::new(&config.extensions.foreign),
            cache: config.cache.foreign,
        }
    }
}

/// Put an [`InterceptionLoader`] around the current slot occupant.
///
/// Safe to call any number of times: only the first call captures the
/// original loader, later calls return [`InstallOutcome::AlreadyInstalled`].
/// Installing after modules were already loaded is an error, since those
/// records were produced without interception.
pub fn install(
    host: &Arc<ModuleHost>,
    bridge: Arc<dyn Transform>,
    options: InterceptOptions,
) -> Result<InstallOutcome> {
    let mut state = host.loader_override().lock();

    if state.is_installed() {
        tracing::warn!("Loader already installed, ignoring repeated install");
        return Ok(InstallOutcome::AlreadyInstalled);
    }

    if !host.cache().is_empty() {
        return Err(LoaderError::Installation(format!(
            "{} module(s) were loaded before the loader was installed",
            host.cache().len()
        )));
    }

    let slot = host.dispatch_slot();
    let original = slot.current();
    let extensions = options.classifier.foreign_extensions();
    let loader = Arc::new(InterceptionLoader::new(original, bridge, options));

    for ext in &extensions {
        host.resolver().register_extension(ext);
    }
    slot.replace(loader.clone());
    *state = LoaderOverride::Installed(Arc::clone(&loader));

    tracing::info!(
        "Loader installed over '{}' for {}",
        loader.original().name(),
        extensions.join(", ")
    );
    Ok(InstallOutcome::Installed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tsboot_bridge::TransformError;

    fn host() -> Arc<ModuleHost> {
        ModuleHost::new([".js", ".json"])
    }

    fn bridge() -> Arc<dyn Transform> {
        Arc::new(|path: &Path| -> std::result::Result<String, TransformError> {
            Ok(std::fs::read_to_string(path).unwrap_or_default())
        })
    }

    #[test]
    fn test_install_is_idempotent() {
        let host = host();
        assert!(!host.loader_override().lock().is_installed());

        let first = install(&host, bridge(), InterceptOptions::default()).unwrap();
        let second = install(&host, bridge(), InterceptOptions::default()).unwrap();
        assert_eq!(first, InstallOutcome::Installed);
        assert_eq!(second, InstallOutcome::AlreadyInstalled);

        let state = host.loader_override().lock();
        let loader = state.loader().unwrap();
        assert_eq!(loader.original().name(), "native");
        assert_eq!(host.dispatch_slot().current().name(), "intercept");
    }

    #[test]
    fn test_install_registers_foreign_extensions_once() {
        let host = host();
        install(&host, bridge(), InterceptOptions::default()).unwrap();
        install(&host, bridge(), InterceptOptions::default()).unwrap();

        assert_eq!(
            host.resolver().extensions(),
            vec![".js", ".json", ".ts", ".tsx", ".mts", ".cts"]
        );
    }

    #[test]
    fn test_options_from_config() {
        let mut config = LoaderConfig::default();
        config.extensions.foreign = vec![".ts".to_string()];
        config.cache.foreign = CachePolicy::None;

        let options = InterceptOptions::from_config(&config);
        assert_eq!(options.classifier.foreign_extensions(), vec![".ts"]);
        assert_eq!(options.cache, CachePolicy::None);
    }
}
