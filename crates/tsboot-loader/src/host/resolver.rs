// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module path resolution (Node.js algorithm)

use crate::error::{LoaderError, Result};
use crate::host::{Referrer, ResolvedPath};
use parking_lot::RwLock;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Module resolver implementing the Node.js resolution algorithm.
///
/// The extension list is the host's probing order. Extra extensions can be
/// registered at runtime; they are tried after the existing ones.
pub struct ModuleResolver {
    /// File extensions to try, with leading dot
    extensions: RwLock<Vec<String>>,
}

impl ModuleResolver {
    /// Create a resolver probing `extensions` in order
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: RwLock::new(extensions.into_iter().map(Into::into).collect()),
        }
    }

    /// Current probing order
    pub fn extensions(&self) -> Vec<String> {
        self.extensions.read().clone()
    }

    /// Append `ext` to the probing order. Returns `false` if it was already there.
    pub fn register_extension(&self, ext: &str) -> bool {
        let mut extensions = self.extensions.write();
        if extensions.iter().any(|e| e == ext) {
            return false;
        }
        extensions.push(ext.to_string());
        true
    }

    /// Resolve a module specifier
    pub fn resolve(&self, specifier: &str, referrer: &Referrer) -> Result<ResolvedPath> {
        let base = referrer.directory();

        let found = if is_path_specifier(specifier) {
            self.resolve_file(&base.join(specifier))
        } else {
            self.resolve_node_modules(specifier, base)
        };

        found
            .map(|path| ResolvedPath::new(&path))
            .ok_or_else(|| LoaderError::module_not_found(specifier, referrer.path()))
    }

    /// Resolve a file path: exact, with an extension appended, then as a directory
    fn resolve_file(&self, path: &Path) -> Option<PathBuf> {
        self.probe_file(path).or_else(|| {
            if path.is_dir() {
                self.resolve_directory(path)
            } else {
                None
            }
        })
    }

    /// Try `path` as-is, then with each extension appended
    fn probe_file(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path.to_path_buf());
        }

        let file_name = path.file_name()?.to_string_lossy().to_string();
        self.extensions.read().iter().find_map(|ext| {
            let candidate = path.with_file_name(format!("{}{}", file_name, ext));
            candidate.is_file().then_some(candidate)
        })
    }

    /// Resolve a directory (look for package.json main or an index file)
    fn resolve_directory(&self, dir: &Path) -> Option<PathBuf> {
        if let Some(main) = read_package_main(dir) {
            let main_path = dir.join(&main);
            if let Some(found) = self.probe_file(&main_path) {
                return Some(found);
            }
            if main_path.is_dir() {
                if let Some(found) = self.resolve_index(&main_path) {
                    return Some(found);
                }
            }
            tracing::debug!(
                "package.json main '{}' in {} does not resolve, trying index",
                main,
                dir.display()
            );
        }

        self.resolve_index(dir)
    }

    fn resolve_index(&self, dir: &Path) -> Option<PathBuf> {
        self.extensions.read().iter().find_map(|ext| {
            let index = dir.join(format!("index{}", ext));
            index.is_file().then_some(index)
        })
    }

    /// Resolve a module from node_modules, walking up from `base`
    fn resolve_node_modules(&self, specifier: &str, base: &Path) -> Option<PathBuf> {
        let (package_name, subpath) = parse_package_specifier(specifier);

        let mut current = Some(base);
        while let Some(dir) = current {
            let package_dir = dir.join("node_modules").join(package_name);

            if package_dir.is_dir() {
                let found = match subpath {
                    Some(sub) => self.resolve_file(&package_dir.join(sub)),
                    None => self.resolve_directory(&package_dir),
                };
                if found.is_some() {
                    return found;
                }
            }

            current = dir.parent();
        }

        None
    }
}

/// Whether a specifier names a path rather than a package
fn is_path_specifier(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || Path::new(specifier).is_absolute()
}

/// Parse a package specifier into name and optional subpath
fn parse_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    if let Some(rest) = specifier.strip_prefix('@') {
        // Scoped package: @scope/name or @scope/name/subpath
        if let Some(slash_pos) = rest.find('/') {
            let after_scope = &rest[slash_pos + 1..];
            if let Some(subpath_pos) = after_scope.find('/') {
                let name_end = 1 + slash_pos + 1 + subpath_pos;
                return (&specifier[..name_end], Some(&specifier[name_end + 1..]));
            }
        }
        (specifier, None)
    } else {
        match specifier.split_once('/') {
            Some((name, sub)) => (name, Some(sub)),
            None => (specifier, None),
        }
    }
}

/// Minimal package.json structure for resolution
#[derive(Debug, Deserialize)]
struct PackageJson {
    main: Option<String>,
}

fn read_package_main(dir: &Path) -> Option<String> {
    let content = std::fs::read_to_string(dir.join("package.json")).ok()?;
    match serde_json::from_str::<PackageJson>(&content) {
        Ok(pkg) => pkg.main.filter(|m| !m.is_empty()),
        Err(e) => {
            tracing::warn!("Ignoring malformed package.json in {}: {}", dir.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn resolver() -> ModuleResolver {
        ModuleResolver::new([".js", ".json"])
    }

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "").unwrap();
        path.canonicalize().unwrap()
    }

    fn from(root: &Path) -> Referrer {
        Referrer::Module(root.join("main.js"))
    }

    #[test]
    fn test_parse_package_specifier() {
        assert_eq!(parse_package_specifier("lodash"), ("lodash", None));
        assert_eq!(parse_package_specifier("lodash/get"), ("lodash", Some("get")));
        assert_eq!(parse_package_specifier("@types/node"), ("@types/node", None));
        assert_eq!(
            parse_package_specifier("@babel/core/lib/index"),
            ("@babel/core", Some("lib/index"))
        );
    }

    #[test]
    fn test_relative_with_and_without_extension() {
        let dir = tempdir().unwrap();
        let util = touch(dir.path(), "lib/util.js");

        let r = resolver();
        assert_eq!(r.resolve("./lib/util.js", &from(dir.path())).unwrap().as_path(), util);
        assert_eq!(r.resolve("./lib/util", &from(dir.path())).unwrap().as_path(), util);
    }

    #[test]
    fn test_registered_extension_is_probed_last() {
        let dir = tempdir().unwrap();
        let ts = touch(dir.path(), "a.ts");

        let r = resolver();
        assert!(r.resolve("./a", &from(dir.path())).is_err());

        assert!(r.register_extension(".ts"));
        assert!(!r.register_extension(".ts"));
        assert_eq!(r.extensions(), vec![".js", ".json", ".ts"]);
        assert_eq!(r.resolve("./a", &from(dir.path())).unwrap().as_path(), ts);

        let js = touch(dir.path(), "a.js");
        assert_eq!(r.resolve("./a", &from(dir.path())).unwrap().as_path(), js);
    }

    #[test]
    fn test_directory_index_and_main() {
        let dir = tempdir().unwrap();
        let index = touch(dir.path(), "plain/index.js");
        let entry = touch(dir.path(), "pkg/lib/entry.js");
        std::fs::write(dir.path().join("pkg/package.json"), r#"{"main": "lib/entry"}"#).unwrap();

        let r = resolver();
        assert_eq!(r.resolve("./plain", &from(dir.path())).unwrap().as_path(), index);
        assert_eq!(r.resolve("./pkg", &from(dir.path())).unwrap().as_path(), entry);
    }

    #[test]
    fn test_node_modules_walks_up() {
        let dir = tempdir().unwrap();
        let main = touch(dir.path(), "node_modules/left-pad/index.js");
        let sub = touch(dir.path(), "node_modules/@scope/pkg/extra.js");
        let nested = Referrer::Module(dir.path().join("src/deep/mod.js"));
        std::fs::create_dir_all(dir.path().join("src/deep")).unwrap();

        let r = resolver();
        assert_eq!(r.resolve("left-pad", &nested).unwrap().as_path(), main);
        assert_eq!(r.resolve("@scope/pkg/extra", &nested).unwrap().as_path(), sub);
    }

    #[test]
    fn test_not_found_names_specifier_and_parent() {
        let dir = tempdir().unwrap();
        let referrer = from(dir.path());

        match resolver().resolve("./missing", &referrer).unwrap_err() {
            LoaderError::ModuleNotFound { specifier, parent } => {
                assert_eq!(specifier, "./missing");
                assert_eq!(parent, referrer.path());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
