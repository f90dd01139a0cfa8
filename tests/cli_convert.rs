use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use tempfile::TempDir;

fn mdkv(workdir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mdkv"));
    cmd.current_dir(workdir.path())
        .env_remove("MDKV_CONFIG_FILE")
        .env("RUST_LOG", "error");
    cmd
}

#[test]
fn convert_file_with_stylesheet() {
    let dir = TempDir::new().expect("tmp dir");
    let input = dir.path().join("doc.md");
    let css = dir.path().join("theme.css");
    fs::write(&input, "# Title\n\n- one\n- two\n").expect("write markdown");
    fs::write(&css, "h1 { color: teal }").expect("write css");

    let assert = mdkv(&dir)
        .arg("convert")
        .arg("--css")
        .arg(&css)
        .arg(&input)
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(stdout.starts_with("<style>h1 { color: teal }</style>\n<div class=\"markdown-body\">"));
    assert!(stdout.contains("<h1>Title</h1>"));
    assert!(stdout.contains("<li>one</li>"));
    assert!(!dir.path().join("data").exists(), "convert must not persist");
}

#[test]
fn convert_reads_stdin_and_reverses() {
    let dir = TempDir::new().expect("tmp dir");

    mdkv(&dir)
        .arg("convert")
        .arg("--reverse")
        .write_stdin("<p>Plain <strong>bold</strong></p>")
        .assert()
        .success()
        .stdout(contains("**bold**"));
}

#[test]
fn empty_input_fails() {
    let dir = TempDir::new().expect("tmp dir");

    mdkv(&dir)
        .arg("convert")
        .write_stdin("")
        .assert()
        .failure()
        .stderr(contains("no markdown provided"));
}

#[test]
fn history_round_trip_on_file_store() {
    let dir = TempDir::new().expect("tmp dir");

    mdkv(&dir)
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(contains("[]"));

    mdkv(&dir).args(["history", "clear"]).assert().success();
}

#[test]
fn convert_rejects_input_over_limit() {
    let dir = TempDir::new().expect("tmp dir");

    mdkv(&dir)
        .env("MDKV__RENDER__MAX_INPUT_BYTES", "4")
        .arg("convert")
        .write_stdin("# more than four bytes")
        .assert()
        .failure()
        .stderr(contains("exceeds the 4 byte limit"));
}
