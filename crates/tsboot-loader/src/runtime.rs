// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The boot runtime
//!
//! Owns the engine, one context and the module host, and runs an entry
//! module through the dispatch slot:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 BootRuntime                 │
//! │  ┌──────────┐  ┌───────────┐  ┌──────────┐  │
//! │  │ QuickJS  │  │ ModuleHost│  │ Globals  │  │
//! │  │ Context  │  │  + slot   │  │ console  │  │
//! │  │          │  │           │  │ process  │  │
//! │  └──────────┘  └───────────┘  └──────────┘  │
//! └─────────────────────────────────────────────┘
//! ```

use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use crate::host::{globals, ModuleHost, ModuleRecord, ModuleRequest};
use crate::loader::{install, InstallOutcome, InterceptOptions};
use rquickjs::{Context, Ctx, Runtime};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tsboot_bridge::{CommandTranspiler, LibraryTranspiler, Transform};

/// A JavaScript runtime whose module loads go through the dispatch slot
pub struct BootRuntime {
    context: Context,
    runtime: Runtime,
    host: Arc<ModuleHost>,
    config: LoaderConfig,
}

impl BootRuntime {
    /// Create a runtime. `args` are the entry script followed by its arguments.
    pub fn new(config: LoaderConfig, args: Vec<String>) -> Result<Self> {
        config.validate()?;

        let runtime = Runtime::new()?;
        let context = Context::full(&runtime)?;
        let host = ModuleHost::new(config.extensions.native.iter().cloned());
        globals::interrupt_on_exit(&runtime, &host);
        let cwd = std::env::current_dir().unwrap_or_else(|_| config.base_dir());

        context.with(|ctx| -> Result<()> {
            host.prepare(&ctx)?;
            globals::install(&host, &ctx, &args, &cwd)
        })?;

        Ok(Self {
            context,
            runtime,
            host,
            config,
        })
    }

    /// The module host
    pub fn host(&self) -> &Arc<ModuleHost> {
        &self.host
    }

    /// The configuration this runtime was built with
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Install the interception loader with `bridge`
    pub fn install(&self, bridge: Arc<dyn Transform>) -> Result<InstallOutcome> {
        install(&self.host, bridge, InterceptOptions::from_config(&self.config))
    }

    /// Load the entry module and drain pending jobs. Returns the exit status.
    pub fn run_main(&self, path: &Path) -> Result<i32> {
        let request = ModuleRequest::entry(path, &self.config.base_dir());
        tracing::info!("Running {}", request.specifier);

        let loaded = self
            .context
            .with(|ctx| self.host.dispatch(&ctx, &request).map(|_| ()));
        match loaded {
            Ok(()) => {}
            Err(LoaderError::ProcessExit(code)) => return Ok(code),
            Err(e) => return Err(e),
        }

        self.drain_jobs()?;
        if let Some(code) = self.host.exit_requested() {
            return Ok(code);
        }

        let code = self
            .context
            .with(|ctx| globals::exit_code(&ctx))?
            .unwrap_or(0);
        Ok(code)
    }

    /// Load `specifier` (a path, relative to the base directory) and hand the
    /// record to `f` while the context is entered
    pub fn load_with<T, F>(&self, specifier: &str, f: F) -> Result<T>
    where
        F: for<'js> FnOnce(&Ctx<'js>, ModuleRecord<'js>) -> Result<T>,
    {
        let request = ModuleRequest::entry(Path::new(specifier), &self.config.base_dir());
        self.context.with(|ctx| {
            let record = self.host.dispatch(&ctx, &request)?;
            f(&ctx, record)
        })
    }

    /// Run queued promise jobs until none are left
    fn drain_jobs(&self) -> Result<()> {
        while self.runtime.is_job_pending() {
            if let Err(job) = self.runtime.execute_pending_job() {
                if self.host.exit_requested().is_some() {
                    return Ok(());
                }
                let message = job.0.with(|ctx| globals::format_value(&ctx.catch()));
                return Err(LoaderError::Engine(format!(
                    "Uncaught exception in pending job: {}",
                    message
                )));
            }
        }
        Ok(())
    }
}

/// Build the transpiler selected by `config`.
///
/// A relative library path is taken from the base directory; without any
/// selection the default library name is looked up there.
pub fn transpiler_from_config(config: &LoaderConfig) -> Arc<dyn Transform> {
    let transpiler = &config.transpiler;

    if let Some(argv) = &transpiler.command {
        if let Some(command) = CommandTranspiler::from_argv(argv) {
            tracing::debug!("Using transpiler command '{}'", command.program());
            return Arc::new(command);
        }
    }

    let path = transpiler
        .library
        .clone()
        .unwrap_or_else(|| PathBuf::from(LibraryTranspiler::default_file_name()));
    let path = if path.is_absolute() {
        path
    } else {
        config.base_dir().join(path)
    };

    let mut library = LibraryTranspiler::new(path).with_symbol(transpiler.symbol.clone());
    if let Some(free) = &transpiler.free_symbol {
        library = library.with_free_symbol(free.clone());
    }
    tracing::debug!("Using transpiler library {}", library.path().display());
    Arc::new(library)
}
