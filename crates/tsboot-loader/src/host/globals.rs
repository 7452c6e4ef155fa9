// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! `console`, `process` and `global`

use super::ModuleHost;
use crate::error::Result;
use rquickjs::function::{Opt, Rest};
use rquickjs::{Array, Coerced, Ctx, FromJs, Function, Object, Runtime, Value};
use std::path::Path;
use std::sync::Arc;

/// `process.exit` records the code, then spins until the runtime's
/// interrupt handler raises the uncatchable "interrupted" error
const EXIT_FACTORY: &str = r#"(function (record) {
    return function exit(code) {
        record(code);
        for (;;) {}
    };
});"#;

/// Stop all JavaScript execution on `runtime` once `process.exit()` was called
pub fn interrupt_on_exit(runtime: &Runtime, host: &Arc<ModuleHost>) {
    let host = Arc::clone(host);
    runtime.set_interrupt_handler(Some(Box::new(move || host.exit_requested().is_some())));
}

/// Install the globals scripts expect.
///
/// `argv` becomes `process.argv` after the executable name.
pub fn install<'js>(
    host: &Arc<ModuleHost>,
    ctx: &Ctx<'js>,
    argv: &[String],
    cwd: &Path,
) -> Result<()> {
    let globals = ctx.globals();
    globals.set("global", globals.clone())?;
    globals.set("console", create_console_object(ctx)?)?;
    globals.set("process", create_process_object(host, ctx, argv, cwd)?)?;
    Ok(())
}

/// Create the console object
fn create_console_object<'js>(ctx: &Ctx<'js>) -> Result<Object<'js>> {
    let console = Object::new(ctx.clone())?;

    for name in ["log", "info", "debug"] {
        console.set(
            name,
            Function::new(ctx.clone(), |args: Rest<Value<'js>>| {
                println!("{}", join_args(&args.0));
            })?,
        )?;
    }

    for name in ["warn", "error"] {
        console.set(
            name,
            Function::new(ctx.clone(), |args: Rest<Value<'js>>| {
                eprintln!("{}", join_args(&args.0));
            })?,
        )?;
    }

    Ok(console)
}

/// Create the process object
fn create_process_object<'js>(
    host: &Arc<ModuleHost>,
    ctx: &Ctx<'js>,
    args: &[String],
    cwd: &Path,
) -> Result<Object<'js>> {
    let process = Object::new(ctx.clone())?;

    // process.argv - executable first, then the entry script and its arguments
    let argv = Array::new(ctx.clone())?;
    for (i, arg) in std::iter::once("tsboot".to_string())
        .chain(args.iter().cloned())
        .enumerate()
    {
        argv.set(i, arg)?;
    }
    process.set("argv", argv)?;

    let env = Object::new(ctx.clone())?;
    for (key, value) in std::env::vars() {
        env.set(key.as_str(), value)?;
    }
    process.set("env", env)?;

    process.set("platform", get_platform())?;
    process.set("pid", std::process::id())?;

    let cwd = cwd.display().to_string();
    process.set("cwd", Function::new(ctx.clone(), move || cwd.clone())?)?;

    // process.exit([code]) - falls back to process.exitCode, then 0
    let record = {
        let host = Arc::clone(host);
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, code: Opt<Value<'js>>| -> rquickjs::Result<()> {
                let code = match code.0 {
                    Some(code) => coerce_code(&ctx, code)?,
                    None => None,
                };
                let code = match code {
                    Some(code) => code,
                    None => exit_code(&ctx)?.unwrap_or(0),
                };
                tracing::debug!("process.exit({})", code);
                host.request_exit(code);
                Ok(())
            },
        )?
    };
    let factory: Function<'js> = ctx.eval(EXIT_FACTORY)?;
    process.set("exit", factory.call::<_, Function<'js>>((record,))?)?;

    Ok(process)
}

/// Current `process.exitCode`, if a script set one
pub fn exit_code(ctx: &Ctx<'_>) -> rquickjs::Result<Option<i32>> {
    let process: Option<Object<'_>> = ctx.globals().get("process")?;
    match process {
        Some(process) => coerce_code(ctx, process.get("exitCode")?),
        None => Ok(None),
    }
}

/// Exit code as `Number()` would read it; `undefined` and `null` mean unset
fn coerce_code<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<Option<i32>> {
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    let Coerced(code) = Coerced::<i32>::from_js(ctx, value)?;
    Ok(Some(code))
}

/// Get the platform string
fn get_platform() -> &'static str {
    if cfg!(target_os = "windows") {
        "win32"
    } else if cfg!(target_os = "macos") {
        "darwin"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else if cfg!(target_os = "freebsd") {
        "freebsd"
    } else if cfg!(target_os = "openbsd") {
        "openbsd"
    } else {
        "unknown"
    }
}

fn join_args(args: &[Value<'_>]) -> String {
    args.iter().map(format_value).collect::<Vec<_>>().join(" ")
}

/// Format a value for console output
pub fn format_value(value: &Value<'_>) -> String {
    if value.is_undefined() {
        return "undefined".to_string();
    }
    if value.is_null() {
        return "null".to_string();
    }
    if let Some(b) = value.as_bool() {
        return b.to_string();
    }
    if let Some(n) = value.as_int() {
        return n.to_string();
    }
    if let Some(n) = value.as_float() {
        return format_number(n);
    }
    if let Some(s) = value.as_string() {
        return s.to_string().unwrap_or_default();
    }
    if value.is_function() {
        return "[Function]".to_string();
    }
    if let Some(e) = value.as_exception() {
        let name: Option<String> = e.as_object().get("name").ok().flatten();
        return format!(
            "{}: {}",
            name.as_deref().unwrap_or("Error"),
            e.message().unwrap_or_default()
        );
    }
    if value.is_object() {
        return stringify(value).unwrap_or_else(|| "[Object]".to_string());
    }
    format!("{:?}", value.type_of())
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        n.to_string()
    }
}

fn stringify(value: &Value<'_>) -> Option<String> {
    let json: Object<'_> = value.ctx().globals().get("JSON").ok()?;
    let stringify: Function<'_> = json.get("stringify").ok()?;
    stringify.call::<_, Option<String>>((value.clone(),)).ok().flatten()
}
