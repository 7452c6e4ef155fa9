// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module evaluation
//!
//! Every module body runs inside the CommonJS wrapper function with its own
//! `module`, `exports` and a `require` bound to the module's path. The
//! registry entry is created before the body runs (so circular requires see
//! the partial exports) and removed again if the body throws.

use super::cache::CachedModule;
use super::{ModuleHost, ModuleRecord, ModuleRequest, ResolvedPath};
use crate::error::{LoaderError, Result};
use crate::loader::classify::ExtensionClass;
use crate::loader::fingerprint::Fingerprint;
use rquickjs::function::This;
use rquickjs::{qjs, CatchResultExt, CaughtError, Ctx, Exception, Function, Object, Value};
use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Global holding the JavaScript side of the registry (`require.cache`)
pub const REGISTRY_KEY: &str = "__tsboot_registry__";

/// Property carrying the stash tag of an exception raised by a nested `require()`
const ERROR_TAG: &str = "__tsboot_error__";

/// Builds a module's `require` from the native callbacks.
///
/// Once `process.exit()` was called the spin keeps the caller from catching
/// the failure; the runtime's interrupt handler ends it.
const REQUIRE_FACTORY: &str = r#"(function (load, resolve, cache, exiting) {
    function require(id) {
        try {
            return load(String(id));
        } finally {
            if (exiting()) for (;;) {}
        }
    }
    require.resolve = function (id) {
        return resolve(String(id));
    };
    require.cache = cache;
    return require;
});"#;

/// Source text ready to be evaluated as a module
#[derive(Debug, Clone)]
pub struct ModuleUnit {
    /// Module path
    pub path: ResolvedPath,
    /// How it was loaded
    pub class: ExtensionClass,
    /// Native source text
    pub source: String,
    /// Content digest of the file the source came from
    pub fingerprint: Option<Fingerprint>,
    /// Requesting module
    pub parent: Option<PathBuf>,
}

impl ModuleHost {
    /// Create the JavaScript registry object if it does not exist yet
    pub fn prepare(&self, ctx: &Ctx<'_>) -> Result<()> {
        let script = format!(
            r#"if (!Object.prototype.hasOwnProperty.call(globalThis, "{key}")) {{
    Object.defineProperty(globalThis, "{key}", {{
        value: Object.create(null),
        enumerable: false,
        writable: false,
        configurable: false,
    }});
}}"#,
            key = REGISTRY_KEY
        );
        ctx.eval::<(), _>(script)?;
        Ok(())
    }

    /// Registered record for `path`, including modules still loading.
    ///
    /// An entry deleted from `require.cache` by user code counts as gone.
    pub fn cached<'js>(
        &self,
        ctx: &Ctx<'js>,
        path: &ResolvedPath,
    ) -> Result<Option<ModuleRecord<'js>>> {
        let key = path.to_string();
        let module: Option<Object<'js>> = registry(ctx)?.get(key.as_str())?;

        let Some(module) = module else {
            if self.cache.delete(path.as_path()).is_some() {
                tracing::debug!("{} was removed from require.cache", path);
            }
            return Ok(None);
        };

        let class = self
            .cache
            .get(path.as_path())
            .map(|entry| entry.class)
            .unwrap_or(ExtensionClass::Native);
        tracing::trace!("registry hit: {}", path);

        Ok(Some(ModuleRecord {
            path: path.clone(),
            class,
            exports: module.get("exports")?,
        }))
    }

    /// Evaluate `unit` as a CommonJS module and register it.
    ///
    /// On failure nothing stays registered for the path.
    pub fn evaluate_module<'js>(
        self: &Arc<Self>,
        ctx: &Ctx<'js>,
        unit: ModuleUnit,
    ) -> Result<ModuleRecord<'js>> {
        let ModuleUnit {
            path,
            class,
            source,
            fingerprint,
            parent,
        } = unit;

        let module = self.register(ctx, &path, class, fingerprint, parent.as_deref())?;
        let exports: Object<'js> = module.get("exports")?;
        let require = self.make_require(ctx, path.as_path())?;
        let filename = path.to_string();
        let dirname = path
            .as_path()
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        let run = eval_named(ctx, wrap_module(&source), &filename)
            .and_then(|wrapper| wrapper.get::<Function<'js>>())
            .and_then(|wrapper| {
                wrapper.call::<_, ()>((
                    This(exports.clone()),
                    exports,
                    require,
                    module.clone(),
                    filename,
                    dirname,
                ))
            })
            .catch(ctx);

        match run {
            Ok(()) => self.commit(&path, class, &module),
            Err(caught) => {
                self.evict(ctx, &path);
                Err(self.recover(&path, caught))
            }
        }
    }

    /// Parse `source` as JSON and register the value as the module's exports
    pub fn evaluate_json<'js>(
        &self,
        ctx: &Ctx<'js>,
        path: &ResolvedPath,
        source: &str,
        parent: Option<&Path>,
    ) -> Result<ModuleRecord<'js>> {
        let json: Object<'js> = ctx.globals().get("JSON")?;
        let parse: Function<'js> = json.get("parse")?;

        let value = match parse.call::<_, Value<'js>>((source,)).catch(ctx) {
            Ok(value) => value,
            Err(caught) => {
                return Err(LoaderError::Evaluation {
                    path: path.as_path().to_path_buf(),
                    message: caught_message(&caught),
                });
            }
        };

        let module = self.register(ctx, path, ExtensionClass::Native, None, parent)?;
        module.set("exports", value)?;
        self.commit(path, ExtensionClass::Native, &module)
    }

    /// Remove `path` from both registries
    pub fn evict(&self, ctx: &Ctx<'_>, path: &ResolvedPath) {
        if let Ok(registry) = registry(ctx) {
            if let Err(e) = registry.remove(path.to_string().as_str()) {
                tracing::warn!("Cannot remove {} from require.cache: {}", path, e);
            }
        }
        self.cache.delete(path.as_path());
    }

    /// Create the loading entry for `path`
    fn register<'js>(
        &self,
        ctx: &Ctx<'js>,
        path: &ResolvedPath,
        class: ExtensionClass,
        fingerprint: Option<Fingerprint>,
        parent: Option<&Path>,
    ) -> Result<Object<'js>> {
        let module = Object::new(ctx.clone())?;
        module.set("id", path.to_string())?;
        module.set("filename", path.to_string())?;
        module.set("exports", Object::new(ctx.clone())?)?;
        module.set("loaded", false)?;
        module.set("parent", parent.map(|p| p.display().to_string()))?;

        registry(ctx)?.set(path.to_string().as_str(), module.clone())?;
        self.cache.set(CachedModule {
            filename: path.as_path().to_path_buf(),
            class,
            loaded: false,
            fingerprint,
            parent: parent.map(Path::to_path_buf),
        });

        Ok(module)
    }

    fn commit<'js>(
        &self,
        path: &ResolvedPath,
        class: ExtensionClass,
        module: &Object<'js>,
    ) -> Result<ModuleRecord<'js>> {
        module.set("loaded", true)?;
        self.cache.mark_loaded(path.as_path());
        tracing::debug!("loaded {} module {}", class, path);

        Ok(ModuleRecord {
            path: path.clone(),
            class,
            exports: module.get("exports")?,
        })
    }

    /// `require` for the module at `parent`
    fn make_require<'js>(self: &Arc<Self>, ctx: &Ctx<'js>, parent: &Path) -> Result<Function<'js>> {
        let load = {
            let host = Arc::clone(self);
            let parent = parent.to_path_buf();
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, id: String| -> rquickjs::Result<Value<'js>> {
                    let request = ModuleRequest::from_module(id, &parent);
                    host.dispatch(&ctx, &request)
                        .map(|record| record.exports)
                        .map_err(|err| host.throw(&ctx, err))
                },
            )?
        };

        let resolve = {
            let host = Arc::clone(self);
            let parent = parent.to_path_buf();
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, id: String| -> rquickjs::Result<String> {
                    let request = ModuleRequest::from_module(id, &parent);
                    host.resolve(&request)
                        .map(|path| path.to_string())
                        .map_err(|err| host.throw(&ctx, err))
                },
            )?
        };

        let exiting = {
            let host = Arc::clone(self);
            Function::new(ctx.clone(), move || host.exit_requested().is_some())?
        };

        let factory: Function<'js> = ctx.eval(REQUIRE_FACTORY)?;
        Ok(factory.call::<_, Function<'js>>((load, resolve, registry(ctx)?, exiting))?)
    }

    /// Raise `err` as a JavaScript exception, keeping the typed error
    fn throw(&self, ctx: &Ctx<'_>, err: LoaderError) -> rquickjs::Error {
        let exception = match Exception::from_message(ctx.clone(), &err.to_string()) {
            Ok(exception) => exception,
            Err(e) => return e,
        };
        let tag = self.stash_error(err);
        if let Err(e) = exception.as_object().set(ERROR_TAG, tag) {
            return e;
        }
        exception.throw()
    }

    /// Turn an exception that escaped a module body back into a loader error
    fn recover(&self, path: &ResolvedPath, caught: CaughtError<'_>) -> LoaderError {
        let pending = self.take_error();

        if let Some(code) = self.exit_requested() {
            return LoaderError::ProcessExit(code);
        }

        // Only the exception the typed error was raised with gets it back; a
        // stashed error whose exception user code caught is dropped here
        match pending {
            Some((tag, err)) if error_tag(&caught) == Some(tag) => err,
            _ => LoaderError::Evaluation {
                path: path.as_path().to_path_buf(),
                message: with_stack(&caught, caught_message(&caught)),
            },
        }
    }
}

/// The JavaScript registry object
pub fn registry<'js>(ctx: &Ctx<'js>) -> Result<Object<'js>> {
    Ok(ctx.globals().get(REGISTRY_KEY)?)
}

/// Compile `source` as a global script, with `file_name` in its stack frames
fn eval_named<'js>(
    ctx: &Ctx<'js>,
    source: String,
    file_name: &str,
) -> rquickjs::Result<Value<'js>> {
    let len = source.len();
    let source = CString::new(source)?;
    let file_name = CString::new(file_name)?;

    // SAFETY: both strings outlive the call, and a non-exception result is
    // owned by us and belongs to this context's runtime.
    unsafe {
        let value = qjs::JS_Eval(
            ctx.as_raw().as_ptr(),
            source.as_ptr(),
            len as _,
            file_name.as_ptr(),
            qjs::JS_EVAL_TYPE_GLOBAL as _,
        );
        if qjs::JS_IsException(value) {
            return Err(rquickjs::Error::Exception);
        }
        Ok(Value::from_raw(ctx.clone(), value))
    }
}

fn error_tag(caught: &CaughtError<'_>) -> Option<u32> {
    match caught {
        CaughtError::Exception(e) => e
            .as_object()
            .get::<_, Option<u32>>(ERROR_TAG)
            .ok()
            .flatten(),
        _ => None,
    }
}

fn caught_message(caught: &CaughtError<'_>) -> String {
    match caught {
        CaughtError::Exception(e) => {
            let name: Option<String> = e.as_object().get("name").ok().flatten();
            let message = e.message().unwrap_or_default();
            match name {
                Some(name) if !name.is_empty() => format!("{}: {}", name, message),
                _ => message,
            }
        }
        CaughtError::Value(v) => super::globals::format_value(v),
        CaughtError::Error(e) => e.to_string(),
    }
}

fn with_stack(caught: &CaughtError<'_>, message: String) -> String {
    match caught {
        CaughtError::Exception(e) => match e.stack() {
            Some(stack) if !stack.trim().is_empty() => format!("{}\n{}", message, stack.trim_end()),
            _ => message,
        },
        _ => message,
    }
}

/// Wrap source code in the CommonJS module wrapper.
///
/// A leading shebang line is blanked so the body still parses. The body
/// starts on the wrapper's first line so stack line numbers match the file.
fn wrap_module(source: &str) -> String {
    let body = match source.strip_prefix("#!") {
        Some(rest) => format!("//{}", rest),
        None => source.to_string(),
    };
    format!(
        "(function (exports, require, module, __filename, __dirname) {{ {}\n}});",
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_module() {
        let wrapped = wrap_module("module.exports = 1;");
        assert!(
            wrapped.starts_with("(function (exports, require, module, __filename, __dirname) {")
        );
        assert!(wrapped.contains("{ module.exports = 1;\n"));
        assert_eq!(wrapped.lines().count(), 2);
        assert!(wrapped.ends_with("});"));
    }

    #[test]
    fn test_wrap_module_blanks_shebang() {
        let wrapped = wrap_module("#!/usr/bin/env tsboot\nexports.a = 1;");
        assert!(wrapped.contains("{ ///usr/bin/env tsboot\nexports.a = 1;"));
    }
}
