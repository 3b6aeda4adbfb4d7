//! Workspace manifest consistency: every member inherits the workspace
//! version and takes shared dependencies from `[workspace.dependencies]`.

use std::path::{Path, PathBuf};

const MEMBERS: [&str; 3] = [
    "crates/grading-state",
    "crates/grading-core",
    "crates/grading-cli",
];

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .unwrap()
        .to_path_buf()
}

fn manifest(dir: &Path) -> toml::Value {
    let text = std::fs::read_to_string(dir.join("Cargo.toml")).unwrap();
    text.parse().unwrap()
}

fn inherits_workspace(value: &toml::Value) -> bool {
    value
        .as_table()
        .and_then(|t| t.get("workspace"))
        .and_then(toml::Value::as_bool)
        == Some(true)
}

#[test]
fn members_match_workspace_list() {
    let root = manifest(&workspace_root());
    let listed: Vec<&str> = root["workspace"]["members"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(toml::Value::as_str)
        .collect();
    assert_eq!(listed, MEMBERS);
}

#[test]
fn members_inherit_workspace_version() {
    for member in MEMBERS {
        let doc = manifest(&workspace_root().join(member));
        assert!(
            inherits_workspace(&doc["package"]["version"]),
            "{member} should use version.workspace = true"
        );
    }
}

#[test]
fn internal_dependencies_come_from_the_workspace() {
    for member in MEMBERS {
        let doc = manifest(&workspace_root().join(member));
        let Some(deps) = doc.get("dependencies").and_then(toml::Value::as_table) else {
            continue;
        };
        for (name, spec) in deps.iter().filter(|(n, _)| n.starts_with("grading-")) {
            assert!(
                inherits_workspace(spec),
                "{member}: dependency {name} should use workspace = true"
            );
        }
    }
}

#[test]
fn workspace_version_matches_cargo_pkg() {
    let root = manifest(&workspace_root());
    let version = root["workspace"]["package"]["version"].as_str().unwrap();
    assert_eq!(version, env!("CARGO_PKG_VERSION"));
}
