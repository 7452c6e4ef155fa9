// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! External program transpilers

use crate::error::{Result, TransformError};
use crate::{ensure_readable, Transform};
use std::path::Path;
use std::process::{Command, Stdio};

/// Transpiler that runs `program [args..] <path>` and reads stdout.
///
/// A non-zero exit status is a rejection carrying the program's stderr.
#[derive(Debug, Clone)]
pub struct CommandTranspiler {
    program: String,
    args: Vec<String>,
}

impl CommandTranspiler {
    /// Create a transpiler that runs `program`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Build from a `[program, args..]` list as written in configuration
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Add arguments placed before the input path
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program name
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Transform for CommandTranspiler {
    fn transform(&self, path: &Path) -> Result<String> {
        ensure_readable(path)?;

        tracing::debug!("Running {} {:?} {}", self.program, self.args, path.display());

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| TransformError::Unavailable {
                transpiler: self.program.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = match output.status.code() {
                Some(code) => format!("exit code {}: {}", code, stderr.trim_end()),
                None => format!("terminated by signal: {}", stderr.trim_end()),
            };
            return Err(TransformError::rejected(path, reason));
        }

        String::from_utf8(output.stdout).map_err(|e| {
            TransformError::rejected(path, format!("output is not valid UTF-8: {}", e))
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_stdout_is_the_result() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("a.ts");
        std::fs::write(&input, "const a = 1;\n").unwrap();

        let cat = CommandTranspiler::new("cat");
        assert_eq!(cat.transform(&input).unwrap(), "const a = 1;\n");
    }

    #[test]
    fn test_failure_is_rejection() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("a.ts");
        std::fs::write(&input, "").unwrap();

        let failing = CommandTranspiler::new("sh").args(["-c", "echo nope >&2; exit 3", "sh"]);
        match failing.transform(&input).unwrap_err() {
            TransformError::Rejected { path, reason } => {
                assert_eq!(path, input);
                assert!(reason.contains("exit code 3"));
                assert!(reason.contains("nope"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("a.ts");
        std::fs::write(&input, "").unwrap();

        let missing = CommandTranspiler::new("tsboot-no-such-transpiler");
        assert!(matches!(
            missing.transform(&input),
            Err(TransformError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_from_argv() {
        assert!(CommandTranspiler::from_argv(&[]).is_none());
        let t = CommandTranspiler::from_argv(&["strip".into(), "--stdout".into()]).unwrap();
        assert_eq!(t.program(), "strip");
        assert_eq!(t.args, vec!["--stdout".to_string()]);
    }
}
