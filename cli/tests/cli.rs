use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{TempDir, tempdir};

fn setup_project() -> TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/a.ts"), "const a = 1;").unwrap();
    fs::write(root.join("src/b.png"), "PNG").unwrap();
    fs::create_dir_all(root.join("node_modules/dep")).unwrap();
    fs::write(root.join("node_modules/dep/index.js"), "module.exports = {};").unwrap();
    fs::write(root.join("README.md"), "# demo").unwrap();
    dir
}

fn xbundle(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("xbundle").unwrap();
    cmd.env_remove("PROJECT_ROOT").env("NO_COLOR", "1");
    cmd.current_dir(root);
    cmd
}

#[test]
fn test_export_to_stdout_with_rules() {
    let dir = setup_project();
    xbundle(dir.path())
        .args(["export", "--project-root"])
        .arg(dir.path())
        .args(["-r", "Image Files", "-r", "Markdown", "-r", "Node Modules"])
        .assert()
        .success()
        .stdout("//--- File: src/a.ts ---\n\nconst a = 1;\n\n");
}

#[test]
fn test_export_without_rules_includes_every_code_file() {
    let dir = setup_project();
    xbundle(dir.path())
        .args(["export", "--project-root"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("//--- File: node_modules/dep/index.js ---"))
        .stdout(predicate::str::contains("//--- File: README.md ---"))
        .stdout(predicate::str::contains("src/b.png").not());
}

#[test]
fn test_export_only_selects_given_paths() {
    let dir = setup_project();
    fs::write(dir.path().join("src/c.ts"), "const c = 3;").unwrap();
    xbundle(dir.path())
        .args(["export", "--project-root"])
        .arg(dir.path())
        .args(["--only", "src/c.ts"])
        .assert()
        .success()
        .stdout("//--- File: src/c.ts ---\n\nconst c = 3;\n\n");
}

#[test]
fn test_checked_file_beats_rule() {
    let dir = setup_project();
    xbundle(dir.path())
        .args(["export", "--project-root"])
        .arg(dir.path())
        .args(["-r", "Markdown", "--only", "README.md"])
        .assert()
        .success()
        .stdout("//--- File: README.md ---\n\n# demo\n\n");
}

#[test]
fn test_export_wraps_prefix_and_suffix() {
    let dir = setup_project();
    xbundle(dir.path())
        .args(["export", "--project-root"])
        .arg(dir.path())
        .args(["--only", "src/a.ts", "--prefix", "Review this:", "--suffix", "Thanks"])
        .assert()
        .success()
        .stdout("Review this:\n\n//--- File: src/a.ts ---\n\nconst a = 1;\n\nThanks\n");
}

#[test]
fn test_export_save_writes_file() {
    let dir = setup_project();
    xbundle(dir.path())
        .args(["export", "--project-root"])
        .arg(dir.path())
        .args(["--only", "src", "--save", "out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("saved to:"));

    let saved: Vec<_> = fs::read_dir(dir.path().join("out"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].extension().unwrap(), "txt");
    let content = fs::read_to_string(&saved[0]).unwrap();
    assert_eq!(content, "//--- File: src/a.ts ---\n\nconst a = 1;\n\n");
}

#[test]
fn test_saved_artifacts_and_config_are_not_exported_again() {
    let dir = setup_project();
    xbundle(dir.path())
        .args(["rules", "--project-root"])
        .arg(dir.path())
        .args(["enable", "Markdown"])
        .assert()
        .success();

    for _ in 0..2 {
        xbundle(dir.path())
            .args(["export", "--project-root"])
            .arg(dir.path())
            .args(["-r", "Image Files", "-r", "Node Modules", "--save"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Bundled 1 file(s)"));
    }
    assert_eq!(
        fs::read_dir(dir.path().join(".xtools/xbundle/output"))
            .unwrap()
            .count(),
        1
    );

    xbundle(dir.path())
        .args(["export", "--project-root"])
        .arg(dir.path())
        .args(["-r", "Image Files", "-r", "Node Modules"])
        .assert()
        .success()
        .stdout("//--- File: src/a.ts ---\n\nconst a = 1;\n\n");

    xbundle(dir.path())
        .args(["tree", "--project-root"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("xbundle.toml").not())
        .stdout(predicate::str::contains("output/").not());
}

#[test]
fn test_save_with_stdout_prints_the_artifact_only() {
    let dir = setup_project();
    xbundle(dir.path())
        .args(["export", "--project-root"])
        .arg(dir.path())
        .args(["--only", "src/a.ts", "--save", "out", "--stdout"])
        .assert()
        .success()
        .stdout("//--- File: src/a.ts ---\n\nconst a = 1;\n\n")
        .stderr(predicate::str::contains("saved to:"));
    assert_eq!(fs::read_dir(dir.path().join("out")).unwrap().count(), 1);
}

#[test]
fn test_stdout_flag_requires_save() {
    let dir = setup_project();
    xbundle(dir.path())
        .args(["export", "--project-root"])
        .arg(dir.path())
        .arg("--stdout")
        .assert()
        .failure();
}

#[test]
fn test_oversized_file_becomes_error_banner() {
    let dir = setup_project();
    let config_dir = dir.path().join(".xtools/xbundle");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("xbundle.toml"),
        "[export]\nmax_file_size = \"5B\"\n",
    )
    .unwrap();

    xbundle(dir.path())
        .args(["export", "--project-root"])
        .arg(dir.path())
        .args(["--only", "src/a.ts"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "//--- File: src/a.ts ---\n\n--- ERROR: could not read this file",
        ))
        .stderr(predicate::str::contains("Warning:"));
}

#[test]
fn test_unknown_rule_fails_with_usage_code() {
    let dir = setup_project();
    xbundle(dir.path())
        .args(["export", "--project-root"])
        .arg(dir.path())
        .args(["-r", "No Such Rule"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("Unknown Rule"));
}

#[test]
fn test_unknown_path_fails() {
    let dir = setup_project();
    xbundle(dir.path())
        .args(["export", "--project-root"])
        .arg(dir.path())
        .args(["--select", "src/missing.ts"])
        .assert()
        .code(4);
}

#[test]
fn test_file_root_is_unsupported() {
    let dir = setup_project();
    xbundle(dir.path())
        .args(["export", "--project-root"])
        .arg(dir.path().join("README.md"))
        .assert()
        .code(3);
}

#[test]
fn test_tree_shows_tri_state_markers() {
    let dir = setup_project();
    xbundle(dir.path())
        .args(["tree", "--project-root"])
        .arg(dir.path())
        .args(["-r", "Node Modules", "-r", "Image Files"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ ] node_modules/"))
        .stdout(predicate::str::contains("[~] src/"))
        .stdout(predicate::str::contains("[x] a.ts"))
        .stdout(predicate::str::contains("[ ] b.png"));
}

#[test]
fn test_tree_json_output() {
    let dir = setup_project();
    let output = xbundle(dir.path())
        .args(["tree", "--project-root"])
        .arg(dir.path())
        .args(["--depth", "1", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<_> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["node_modules", "src", "README.md"]);
    assert_eq!(value[1]["selection"]["state"], "selected");
}

#[test]
fn test_explain_reports_reasons() {
    let dir = setup_project();
    xbundle(dir.path())
        .args(["explain", "--project-root"])
        .arg(dir.path())
        .args(["-r", "Node Modules"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Filtered by 'Node Modules'"))
        .stdout(predicate::str::contains("Not a code file (image)"))
        .stdout(predicate::str::contains("src/a.ts"));
}

#[test]
fn test_rules_enable_and_disable_persist() {
    let dir = setup_project();
    xbundle(dir.path())
        .args(["rules", "--project-root"])
        .arg(dir.path())
        .args(["enable", "Markdown"])
        .assert()
        .success();

    let config_path = dir.path().join(".xtools/xbundle/xbundle.toml");
    let saved = fs::read_to_string(&config_path).unwrap();
    assert!(saved.contains("Markdown"));

    xbundle(dir.path())
        .args(["export", "--project-root"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("README.md").not());

    let output = xbundle(dir.path())
        .args(["rules", "--project-root"])
        .arg(dir.path())
        .args(["list", "-f", "json"])
        .output()
        .unwrap();
    let rules: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let markdown = rules
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "Markdown")
        .unwrap();
    assert_eq!(markdown["active"], true);
    assert_eq!(markdown["origin"], "built-in");

    xbundle(dir.path())
        .args(["rules", "--project-root"])
        .arg(dir.path())
        .args(["disable", "Markdown"])
        .assert()
        .success();
    let saved = fs::read_to_string(&config_path).unwrap();
    assert!(!saved.contains("Markdown"));
}

#[test]
fn test_rules_enable_unknown_fails() {
    let dir = setup_project();
    xbundle(dir.path())
        .args(["rules", "--project-root"])
        .arg(dir.path())
        .args(["enable", "Nope"])
        .assert()
        .code(5);
}

#[test]
fn test_completion_script() {
    let dir = setup_project();
    xbundle(dir.path())
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("xbundle"));
}
