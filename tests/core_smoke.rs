use assert_cmd::Command;
use tempfile::TempDir;

fn rlm(storage_root: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("rlm-memory").unwrap();
    cmd.arg("--storage-root").arg(storage_root);
    cmd.env("RLM_EMBEDDING_PROVIDER", "none");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn chunk_then_search_then_status() {
    let dir = TempDir::new().unwrap();

    let out = stdout_of(rlm(dir.path()).args([
        "chunk",
        "Decided to paginate the widget API using cursor tokens",
        "--project",
        "widget",
        "--tags",
        "decision",
    ]));
    assert!(out.contains("chunked:"));

    let out = stdout_of(rlm(dir.path()).args(["search", "widget pagination", "--limit", "5"]));
    assert!(out.contains("widget"));

    let status = stdout_of(rlm(dir.path()).args(["status"]));
    assert!(status.contains("active chunks:     1"));
}

#[test]
fn remember_then_recall_then_forget() {
    let dir = TempDir::new().unwrap();

    let remembered = stdout_of(rlm(dir.path()).args([
        "remember",
        "prefer tabs over spaces",
        "--category",
        "preference",
    ]));
    let id = remembered
        .trim()
        .strip_prefix("remembered: ")
        .expect("remember output should report the new id")
        .to_string();

    let recalled = stdout_of(rlm(dir.path()).args(["recall", "tabs"]));
    assert!(recalled.contains(&id));

    rlm(dir.path()).args(["forget", &id]).assert().success();

    let recalled_after = stdout_of(rlm(dir.path()).args(["recall"]));
    assert!(!recalled_after.contains(&id));
}

#[test]
fn retention_preview_is_empty_for_fresh_chunks() {
    let dir = TempDir::new().unwrap();
    rlm(dir.path())
        .args(["chunk", "fresh content, too young to archive"])
        .assert()
        .success();

    let preview = stdout_of(rlm(dir.path()).args(["retention", "preview"]));
    assert!(preview.trim().is_empty());
}

#[test]
fn invalid_grep_pattern_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    rlm(dir.path())
        .args(["grep", "(unclosed"])
        .assert()
        .failure();
}

#[test]
fn version_flag_exits_zero() {
    Command::cargo_bin("rlm-memory").unwrap().arg("--version").assert().success();
}
