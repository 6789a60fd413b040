use std::fs;
use std::path::PathBuf;
use std::process::Output;

/// Helper to create a temp directory that is cleaned up on drop.
struct TempDir {
    path: PathBuf,
}

impl TempDir {
    fn new(name: &str) -> Self {
        let path =
            std::env::temp_dir().join(format!("dispatch_cli_test_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).expect("failed to create temp dir");
        Self { path }
    }

    fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

const CHAT_MANIFEST: &str = r#"
groups:
  - name: chat
    prefix: "!"
    commands:
      - id: single
        description: single command test
      - id: main
        description: sub command test
        exec_with_subcommands: true
        subcommands: [sub1, old]
      - id: sub1
        aliases: [s1, sub1]
      - id: old
        disabled: true
  - name: admin
    prefix: "?"
    commands:
      - id: kick
        usage: "?kick <user>"
"#;

fn write_manifest(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("failed to write manifest");
    path
}

fn run(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_cmd-dispatch"))
        .args(args)
        .output()
        .expect("failed to run cmd-dispatch")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[test]
fn validate_reports_counts() {
    let dir = TempDir::new("validate_counts");
    let manifest = write_manifest(&dir, "commands.yaml", CHAT_MANIFEST);

    let out = run(&["validate", manifest.to_str().unwrap()]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let text = stdout(&out);
    assert!(text.contains("5 command(s) in 2 group(s)"), "got: {text}");
    assert!(text.contains("3 root(s)"), "got: {text}");
    assert!(text.contains("2 prefix(es)"), "got: {text}");
    assert!(text.contains("1 inactive"), "got: {text}");
}

#[test]
fn validate_rejects_unknown_parent() {
    let dir = TempDir::new("validate_unknown_parent");
    let manifest = write_manifest(
        &dir,
        "commands.yaml",
        r#"
groups:
  - prefix: "!"
    commands:
      - id: sub1
        parent: mian
"#,
    );

    let out = run(&["validate", manifest.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.starts_with("error: "), "got: {err}");
    assert!(err.contains("sub1 -> mian"), "got: {err}");
}

#[test]
fn validate_honors_alias_scope_from_config() {
    let dir = TempDir::new("validate_scope");
    let manifest = write_manifest(
        &dir,
        "commands.json",
        r#"{
  "groups": [{
    "prefix": "!",
    "commands": [
      {"id": "user", "subcommands": ["user_list"]},
      {"id": "role", "subcommands": ["role_list"]},
      {"id": "user_list", "aliases": ["list"]},
      {"id": "role_list", "aliases": ["list"]}
    ]
  }]
}"#,
    );
    let config = write_manifest(&dir, "runtime.yaml", "alias_scope: per_prefix\n");

    let relaxed = run(&["validate", manifest.to_str().unwrap()]);
    assert!(relaxed.status.success(), "stderr: {}", stderr(&relaxed));

    let strict = run(&[
        "validate",
        manifest.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);
    assert_eq!(strict.status.code(), Some(1));
    assert!(stderr(&strict).contains("list"), "got: {}", stderr(&strict));
}

#[test]
fn validate_missing_manifest_fails() {
    let dir = TempDir::new("validate_missing");
    let out = run(&["validate", dir.join("absent.yaml").to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("absent.yaml"));
}

// ---------------------------------------------------------------------------
// tree
// ---------------------------------------------------------------------------

#[test]
fn tree_prints_outline() {
    let dir = TempDir::new("tree_outline");
    let manifest = write_manifest(&dir, "commands.yaml", CHAT_MANIFEST);

    let out = run(&["tree", manifest.to_str().unwrap()]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let text = stdout(&out);
    assert!(text.contains("single [!single] - single command test"), "got: {text}");
    assert!(text.contains("main [!main] (exec-with-subcommands)"), "got: {text}");
    assert!(text.contains("  main.sub1 [s1, sub1]"), "got: {text}");
    assert!(text.contains("  main.old [old] (disabled)"), "got: {text}");
    assert!(text.contains("kick [?kick] usage: ?kick <user>"), "got: {text}");
}

#[test]
fn tree_json_lists_every_node() {
    let dir = TempDir::new("tree_json");
    let manifest = write_manifest(&dir, "commands.yaml", CHAT_MANIFEST);

    let out = run(&["tree", manifest.to_str().unwrap(), "--json"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let nodes: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let nodes = nodes.as_array().unwrap();
    assert_eq!(nodes.len(), 5);

    let old = nodes
        .iter()
        .find(|node| node["fqid"] == "main.old")
        .unwrap();
    assert_eq!(old["parent"], "main");
    assert_eq!(old["depth"], 1);
    assert_eq!(old["active"], false);
    assert_eq!(old["spec"]["disabled"], true);
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

#[test]
fn resolve_prints_chain_and_args() {
    let dir = TempDir::new("resolve_chain");
    let manifest = write_manifest(&dir, "commands.yaml", CHAT_MANIFEST);

    let out = run(&["resolve", manifest.to_str().unwrap(), "!main s1 arg1 arg2"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let resolved: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(resolved["prefix"], "!");
    assert_eq!(resolved["command"], "main.sub1");
    assert_eq!(resolved["chain"], serde_json::json!(["main", "main.sub1"]));
    assert_eq!(resolved["executes"], serde_json::json!(["main", "main.sub1"]));
    assert_eq!(resolved["args"], serde_json::json!(["arg1", "arg2"]));
}

#[test]
fn resolve_disabled_child_becomes_argument() {
    let dir = TempDir::new("resolve_disabled");
    let manifest = write_manifest(&dir, "commands.yaml", CHAT_MANIFEST);

    let out = run(&["resolve", manifest.to_str().unwrap(), "!main old"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let resolved: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(resolved["command"], "main");
    assert_eq!(resolved["args"], serde_json::json!(["old"]));
}

#[test]
fn resolve_unknown_prefix_fails() {
    let dir = TempDir::new("resolve_no_prefix");
    let manifest = write_manifest(&dir, "commands.yaml", CHAT_MANIFEST);

    let out = run(&["resolve", manifest.to_str().unwrap(), "#main"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).starts_with("error: "));
}

#[test]
fn resolve_unknown_command_fails() {
    let dir = TempDir::new("resolve_not_found");
    let manifest = write_manifest(&dir, "commands.yaml", CHAT_MANIFEST);

    let out = run(&["resolve", manifest.to_str().unwrap(), "!nope"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("nope"), "got: {}", stderr(&out));
}

#[test]
fn verbose_flag_emits_debug_logs() {
    let dir = TempDir::new("verbose");
    let manifest = write_manifest(&dir, "commands.yaml", CHAT_MANIFEST);

    let out = run(&["--verbose", "validate", manifest.to_str().unwrap()]);
    assert!(out.status.success());
    assert!(stderr(&out).contains("manifest loaded"), "got: {}", stderr(&out));
}
