//! Fixture suite integration tests
//!
//! The pairs under the workspace `test_fixtures/` directory describe what a
//! transpiler must produce. Discovery is always checked; running the pairs
//! needs a real transpiler library.

use std::path::{Path, PathBuf};
use tsboot_bridge::fixtures::{FixtureSuite, Outcome};
use tsboot_bridge::{LibraryTranspiler, Transform, TransformError};

fn fixture_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../test_fixtures")
}

#[test]
fn test_workspace_fixtures_are_paired() {
    let suite = FixtureSuite::discover(&fixture_root(), "ts", "js").unwrap();
    let names: Vec<&str> = suite.fixtures().iter().map(|f| f.name.as_str()).collect();

    assert_eq!(
        names,
        vec!["basic/annotations", "basic/interface", "modules/require"]
    );
    for fixture in suite.fixtures() {
        assert!(fixture.input.is_absolute());
        assert!(fixture.expected.is_file());
    }
}

#[test]
fn test_identity_transpiler_fails_typed_fixtures() {
    let suite = FixtureSuite::discover(&fixture_root(), "ts", "js").unwrap();
    let identity = |path: &Path| -> tsboot_bridge::Result<String> {
        std::fs::read_to_string(path).map_err(|source| TransformError::Read {
            path: path.to_path_buf(),
            source,
        })
    };

    let results = suite.run(&identity);
    assert_eq!(results.len(), 3);
    assert!(results
        .iter()
        .all(|(_, outcome)| matches!(outcome, Outcome::Failed { .. })));
}

#[test]
#[ignore = "requires a transpiler library (set TSBOOT_TRANSPILER_LIBRARY)"]
fn test_transpiler_library_passes_fixtures() {
    let library = std::env::var("TSBOOT_TRANSPILER_LIBRARY")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(LibraryTranspiler::default_file_name()));
    let transpiler = LibraryTranspiler::new(library);
    let suite = FixtureSuite::discover(&fixture_root(), "ts", "js").unwrap();

    let failures: Vec<String> = suite
        .run(&transpiler as &dyn Transform)
        .into_iter()
        .filter(|(_, outcome)| !outcome.is_pass())
        .map(|(fixture, outcome)| format!("{}: {:?}", fixture.name, outcome))
        .collect();

    assert!(failures.is_empty(), "failing fixtures:\n{}", failures.join("\n"));
}
