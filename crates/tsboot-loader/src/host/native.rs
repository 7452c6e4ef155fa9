// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The host's own loader

use super::{ModuleHost, ModuleLoad, ModuleRecord, ModuleRequest, ModuleUnit};
use crate::error::{LoaderError, Result};
use crate::loader::classify::ExtensionClass;
use rquickjs::Ctx;
use std::sync::Arc;

/// Loads files as the host understands them, without any transformation.
///
/// `.json` files become their parsed value; everything else is evaluated
/// as a CommonJS script.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLoader;

impl ModuleLoad for NativeLoader {
    fn name(&self) -> &'static str {
        "native"
    }

    fn load<'js>(
        &self,
        host: &Arc<ModuleHost>,
        ctx: &Ctx<'js>,
        request: &ModuleRequest,
    ) -> Result<ModuleRecord<'js>> {
        let path = host.resolve(request)?;

        if let Some(record) = host.cached(ctx, &path)? {
            return Ok(record);
        }

        let source = std::fs::read_to_string(path.as_path()).map_err(|source| LoaderError::Io {
            path: path.as_path().to_path_buf(),
            source,
        })?;

        let is_json = path
            .as_path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            return host.evaluate_json(ctx, &path, &source, request.parent());
        }

        host.evaluate_module(
            ctx,
            ModuleUnit {
                path,
                class: ExtensionClass::Native,
                source,
                fingerprint: None,
                parent: request.parent().map(|p| p.to_path_buf()),
            },
        )
    }
}
