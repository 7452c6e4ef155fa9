// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Configuration management for tsboot.
//!
//! Sources are layered, later ones winning key by key:
//!
//! 1. built-in defaults
//! 2. `<config dir>/tsboot/config.toml`
//! 3. `tsboot.toml` in the working directory
//! 4. an explicit `--config` file
//! 5. `TSBOOT_*` environment variables

use crate::error::{LoaderError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-project configuration file
pub const PROJECT_CONFIG_FILE: &str = "tsboot.toml";

/// Loader configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directory relative entry paths are joined to (defaults to the working directory)
    pub base_dir: Option<PathBuf>,

    /// Extension classification
    pub extensions: ExtensionConfig,

    /// External transpiler
    pub transpiler: TranspilerConfig,

    /// Module caching
    pub cache: CacheConfig,
}

/// Which extensions are native and which need the transpiler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionConfig {
    /// Extensions routed through the transpiler, in probing order
    pub foreign: Vec<String>,
    /// Extensions the host probes on its own, in probing order
    pub native: Vec<String>,
}

/// External transpiler selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranspilerConfig {
    /// Shared library exporting the transform symbol
    pub library: Option<PathBuf>,
    /// Program and arguments; the input path is appended
    pub command: Option<Vec<String>>,
    /// Entry symbol in `library`
    pub symbol: String,
    /// Optional symbol releasing returned strings
    pub free_symbol: Option<String>,
}

/// Module caching options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Policy for foreign modules
    pub foreign: CachePolicy,
}

/// How foreign module records are reused across requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Reuse a record while the file's content digest is unchanged
    #[default]
    Content,
    /// Transform and evaluate again on every request
    None,
}

impl std::str::FromStr for CachePolicy {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "content" => Ok(CachePolicy::Content),
            "none" => Ok(CachePolicy::None),
            other => Err(LoaderError::Config(format!(
                "unknown cache policy '{}' (expected 'content' or 'none')",
                other
            ))),
        }
    }
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            foreign: crate::loader::classify::FOREIGN_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            native: crate::loader::classify::NATIVE_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl Default for TranspilerConfig {
    fn default() -> Self {
        Self {
            library: None,
            command: None,
            symbol: tsboot_bridge::DEFAULT_SYMBOL.to_string(),
            free_symbol: None,
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            extensions: ExtensionConfig::default(),
            transpiler: TranspilerConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl LoaderConfig {
    /// Load configuration from the default locations plus an optional explicit file.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut table = toml::Table::new();

        if let Some(path) = user_config_path() {
            if path.is_file() {
                merge_tables(&mut table, read_table(&path)?);
            }
        }

        let project = PathBuf::from(PROJECT_CONFIG_FILE);
        if project.is_file() {
            merge_tables(&mut table, read_table(&project)?);
        }

        if let Some(path) = explicit {
            merge_tables(&mut table, read_table(path)?);
        }

        let mut config = Self::from_table(table)?;
        config.load_from_env(std::env::vars());
        config.validate()?;
        Ok(config)
    }

    /// Parse a single TOML document on top of the defaults.
    pub fn from_toml(source: &str) -> Result<Self> {
        let table: toml::Table = source
            .parse()
            .map_err(|e: toml::de::Error| LoaderError::Config(e.to_string()))?;
        let config = Self::from_table(table)?;
        config.validate()?;
        Ok(config)
    }

    fn from_table(table: toml::Table) -> Result<Self> {
        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| LoaderError::Config(e.to_string()))
    }

    /// Apply `TSBOOT_*` variables.
    pub fn load_from_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(key) = key.strip_prefix("TSBOOT_") else {
                continue;
            };
            match key {
                "BASE_DIR" => self.base_dir = Some(PathBuf::from(value)),
                "TRANSPILER_LIBRARY" => {
                    self.transpiler.library = Some(PathBuf::from(value));
                    self.transpiler.command = None;
                }
                "TRANSPILER_COMMAND" => {
                    self.transpiler.command =
                        Some(value.split_whitespace().map(str::to_string).collect());
                    self.transpiler.library = None;
                }
                "CACHE" => match value.parse() {
                    Ok(policy) => self.cache.foreign = policy,
                    Err(e) => tracing::warn!("Ignoring TSBOOT_CACHE: {}", e),
                },
                "FOREIGN_EXTENSIONS" => {
                    self.extensions.foreign = value
                        .split(',')
                        .map(str::trim)
                        .filter(|e| !e.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                _ => {}
            }
        }
    }

    /// Check invariants the loader relies on.
    pub fn validate(&self) -> Result<()> {
        for ext in self.extensions.foreign.iter().chain(&self.extensions.native) {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(LoaderError::Config(format!(
                    "extension '{}' must start with '.'",
                    ext
                )));
            }
        }

        if let Some(ext) = self
            .extensions
            .foreign
            .iter()
            .find(|e| self.extensions.native.contains(e))
        {
            return Err(LoaderError::Config(format!(
                "extension '{}' cannot be both native and foreign",
                ext
            )));
        }

        if self.transpiler.library.is_some() && self.transpiler.command.is_some() {
            return Err(LoaderError::Config(
                "set either transpiler.library or transpiler.command, not both".to_string(),
            ));
        }

        if matches!(&self.transpiler.command, Some(argv) if argv.is_empty()) {
            return Err(LoaderError::Config("transpiler.command is empty".to_string()));
        }

        Ok(())
    }

    /// Directory relative entry paths are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        match &self.base_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => cwd.join(dir),
            None => cwd,
        }
    }
}

/// User-level configuration file
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tsboot").join("config.toml"))
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        LoaderError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    content
        .parse()
        .map_err(|e: toml::de::Error| LoaderError::Config(format!("{}: {}", path.display(), e)))
}

/// Overlay `overlay` onto `base`, recursing into nested tables.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                merge_tables(existing, nested);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.extensions.native, vec![".js", ".json"]);
        assert!(config.extensions.foreign.contains(&".ts".to_string()));
        assert_eq!(config.transpiler.symbol, "require");
        assert_eq!(config.cache.foreign, CachePolicy::Content);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = LoaderConfig::from_toml(
            r#"
            [transpiler]
            library = "target/release/libtranspiler.so"

            [cache]
            foreign = "none"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.transpiler.library,
            Some(PathBuf::from("target/release/libtranspiler.so"))
        );
        assert_eq!(config.transpiler.symbol, "require");
        assert_eq!(config.cache.foreign, CachePolicy::None);
        assert_eq!(config.extensions, ExtensionConfig::default());
    }

    #[test]
    fn test_merge_tables_is_key_by_key() {
        let mut base: toml::Table = r#"
            [transpiler]
            symbol = "transform"
            free_symbol = "release"
        "#
        .parse()
        .unwrap();
        let overlay: toml::Table = r#"
            [transpiler]
            symbol = "require"
        "#
        .parse()
        .unwrap();

        merge_tables(&mut base, overlay);
        let config = LoaderConfig::from_table(base).unwrap();
        assert_eq!(config.transpiler.symbol, "require");
        assert_eq!(config.transpiler.free_symbol.as_deref(), Some("release"));
    }

    #[test]
    fn test_validation() {
        assert!(LoaderConfig::from_toml("[extensions]\nforeign = [\"ts\"]").is_err());
        assert!(LoaderConfig::from_toml("[extensions]\nforeign = [\".js\"]").is_err());
        assert!(LoaderConfig::from_toml(
            "[transpiler]\nlibrary = \"a.so\"\ncommand = [\"strip\"]"
        )
        .is_err());
        assert!(LoaderConfig::from_toml("[cache]\nforeign = \"sometimes\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = LoaderConfig::default();
        config.transpiler.library = Some(PathBuf::from("a.so"));
        config.load_from_env(vec![
            ("TSBOOT_TRANSPILER_COMMAND".to_string(), "strip --stdout".to_string()),
            ("TSBOOT_CACHE".to_string(), "none".to_string()),
            ("TSBOOT_FOREIGN_EXTENSIONS".to_string(), ".ts, .mts".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ]);

        assert_eq!(config.transpiler.library, None);
        assert_eq!(
            config.transpiler.command,
            Some(vec!["strip".to_string(), "--stdout".to_string()])
        );
        assert_eq!(config.cache.foreign, CachePolicy::None);
        assert_eq!(config.extensions.foreign, vec![".ts", ".mts"]);
        assert!(config.validate().is_ok());
    }
}
