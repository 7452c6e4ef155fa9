// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # tsboot-loader
//!
//! A CommonJS host module system on QuickJS, and a loader that intercepts
//! its module loads so TypeScript-family files run through an external
//! transpiler before they are evaluated.
//!
//! ## Architecture
//!
//! ```text
//! require(id)
//!     │
//!     ▼
//! DispatchSlot ──► InterceptionLoader ──► resolve ──► classify
//!                        │                              │
//!                        │ native                       │ foreign
//!                        ▼                              ▼
//!                  NativeLoader                  Transform bridge
//!                  (original)                           │
//!                        │                              ▼
//!                        └──────────► sandbox ◄─────────┘
//!                                 (module registry)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tsboot_loader::{BootRuntime, LoaderConfig};
//!
//! let config = LoaderConfig::default();
//! let runtime = BootRuntime::new(config, vec!["main.ts".to_string()]).unwrap();
//! runtime.install(tsboot_loader::transpiler_from_config(runtime.config())).unwrap();
//! let status = runtime.run_main(Path::new("main.ts")).unwrap();
//! std::process::exit(status);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod host;
pub mod loader;
pub mod runtime;

pub use config::{CachePolicy, LoaderConfig};
pub use error::{LoaderError, Result};
pub use host::{DispatchSlot, ModuleHost, ModuleLoad, ModuleRecord, ModuleRequest, ResolvedPath};
pub use loader::{install, InstallOutcome, InterceptOptions, InterceptionLoader};
pub use runtime::{transpiler_from_config, BootRuntime};

/// The engine crate, for implementing [`ModuleLoad`]
pub use rquickjs;

/// tsboot version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
