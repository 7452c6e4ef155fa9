// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Input/expected-output fixtures for transpilers
//!
//! A fixture is a pair of files sharing a stem:
//!
//! ```text
//! test_fixtures/declarations/const.in.ts    input
//! test_fixtures/declarations/const.out.js   expected translation
//! ```
//!
//! A fixture passes when transforming the input yields the expected file's
//! contents, ignoring trailing whitespace on both sides.

use crate::{Transform, TransformError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while collecting fixtures
#[derive(Debug, Error)]
pub enum FixtureError {
    /// The fixture root could not be opened
    #[error("Cannot open fixture root '{}': {source}", root.display())]
    Root {
        /// Root directory
        root: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Invalid glob pattern built from the root
    #[error("Invalid fixture pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// A directory entry could not be read during discovery
    #[error("Cannot read fixture entry: {0}")]
    Entry(#[from] glob::GlobError),

    /// An input file has no expected output next to it
    #[error("Fixture '{}' has no expected output '{}'", input.display(), expected.display())]
    MissingExpected {
        /// Input file
        input: PathBuf,
        /// Path that was looked for
        expected: PathBuf,
    },
}

/// One input/expected pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    /// Path relative to the root, without the `.in.<ext>` suffix
    pub name: String,
    /// Absolute input path
    pub input: PathBuf,
    /// Absolute expected-output path
    pub expected: PathBuf,
}

/// Result of checking a single fixture
#[derive(Debug)]
pub enum Outcome {
    /// Output matched
    Passed,
    /// Output differed (both sides trimmed)
    Failed {
        /// Expected text
        expected: String,
        /// Transpiler output
        actual: String,
    },
    /// The transform or the expected-file read failed
    Errored(TransformError),
}

impl Outcome {
    /// Whether the fixture passed
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Passed)
    }
}

impl Fixture {
    /// Run the fixture against `transpiler`
    pub fn check(&self, transpiler: &dyn Transform) -> Outcome {
        let expected = match std::fs::read_to_string(&self.expected) {
            Ok(text) => text,
            Err(source) => {
                return Outcome::Errored(TransformError::Read {
                    path: self.expected.clone(),
                    source,
                })
            }
        };

        match transpiler.transform(&self.input) {
            Ok(actual) => {
                let expected = expected.trim_end();
                let actual = actual.trim_end();
                if actual == expected {
                    Outcome::Passed
                } else {
                    Outcome::Failed {
                        expected: expected.to_string(),
                        actual: actual.to_string(),
                    }
                }
            }
            Err(e) => Outcome::Errored(e),
        }
    }
}

/// All fixtures under a root directory
#[derive(Debug, Clone)]
pub struct FixtureSuite {
    root: PathBuf,
    fixtures: Vec<Fixture>,
}

impl FixtureSuite {
    /// Collect every `*.in.<input_ext>` file below `root` and pair it with
    /// its `*.out.<output_ext>` sibling.
    ///
    /// Extensions are given without the leading dot (`"ts"`, `"js"`).
    pub fn discover(root: &Path, input_ext: &str, output_ext: &str) -> Result<Self, FixtureError> {
        let root = root.canonicalize().map_err(|source| FixtureError::Root {
            root: root.to_path_buf(),
            source,
        })?;

        let input_suffix = format!(".in.{}", input_ext);
        let pattern = format!(
            "{}/**/*{}",
            glob::Pattern::escape(&root.to_string_lossy()),
            input_suffix
        );

        let mut fixtures = Vec::new();
        for entry in glob::glob(&pattern)? {
            let input = entry?;
            let Some(file_name) = input.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(stem) = file_name.strip_suffix(&input_suffix) else {
                continue;
            };

            let expected = input.with_file_name(format!("{}.out.{}", stem, output_ext));
            if !expected.is_file() {
                return Err(FixtureError::MissingExpected { input, expected });
            }

            let relative = input.strip_prefix(&root).unwrap_or(input.as_path());
            let name = relative.with_file_name(stem).display().to_string();

            fixtures.push(Fixture {
                name,
                input,
                expected,
            });
        }

        fixtures.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::debug!("Discovered {} fixtures under {}", fixtures.len(), root.display());

        Ok(Self { root, fixtures })
    }

    /// Root directory (canonical)
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Discovered fixtures, sorted by name
    pub fn fixtures(&self) -> &[Fixture] {
        &self.fixtures
    }

    /// Check every fixture in order
    pub fn run<'a>(&'a self, transpiler: &dyn Transform) -> Vec<(&'a Fixture, Outcome)> {
        self.fixtures
            .iter()
            .map(|fixture| (fixture, fixture.check(transpiler)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_discover_pairs_and_names() {
        let dir = tempdir().unwrap();
        write(dir.path(), "types/const.in.ts", "const a: number = 1;");
        write(dir.path(), "types/const.out.js", "const a = 1;");
        write(dir.path(), "fn.in.ts", "function f(): void {}");
        write(dir.path(), "fn.out.js", "function f() {}");
        write(dir.path(), "unrelated.ts", "");

        let suite = FixtureSuite::discover(dir.path(), "ts", "js").unwrap();
        let names: Vec<_> = suite.fixtures().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["fn", "types/const"]);
        assert!(suite.fixtures().iter().all(|f| f.input.is_absolute()));
    }

    #[test]
    fn test_missing_expected_is_an_error() {
        let dir = tempdir().unwrap();
        write(dir.path(), "lonely.in.ts", "let x: string;");

        let err = FixtureSuite::discover(dir.path(), "ts", "js").unwrap_err();
        assert!(matches!(err, FixtureError::MissingExpected { .. }));
    }

    #[test]
    fn test_trailing_whitespace_is_ignored() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.in.ts", "const a: number = 1;\n");
        write(dir.path(), "a.out.js", "const a = 1;\n\n");
        write(dir.path(), "b.in.ts", "const b: number = 2;\n");
        write(dir.path(), "b.out.js", "const b = 3;\n");

        let strip = |path: &Path| -> crate::Result<String> {
            let source = std::fs::read_to_string(path).unwrap();
            Ok(source.replace(": number", "") + "   ")
        };

        let suite = FixtureSuite::discover(dir.path(), "ts", "js").unwrap();
        let outcomes = suite.run(&strip);
        assert!(outcomes[0].1.is_pass());
        match &outcomes[1].1 {
            Outcome::Failed { expected, actual } => {
                assert_eq!(expected, "const b = 3;");
                assert_eq!(actual, "const b = 2;");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_transform_errors_are_reported() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.in.ts", "");
        write(dir.path(), "a.out.js", "");

        let broken = |path: &Path| -> crate::Result<String> {
            Err(TransformError::rejected(path, "parse error"))
        };

        let suite = FixtureSuite::discover(dir.path(), "ts", "js").unwrap();
        assert!(matches!(
            suite.fixtures()[0].check(&broken),
            Outcome::Errored(TransformError::Rejected { .. })
        ));
    }
}
