//! Integration tests for the `bbcodec` command-line tool.
//!
//! Covers standard input and file input, parallel conversion order, the
//! conversion switches and configuration files.

use tempfile::tempdir;

mod prelude;
use prelude::*;

#[test]
fn test_cli_version_flag() {
    bbcodec()
        .arg("--version")
        .assert()
        .success()
        .stdout(format!("bbcodec {}\n", env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_converts_stdin() {
    bbcodec()
        .write_stdin("[b]hi[/b]\n")
        .assert()
        .success()
        .stdout("<b>hi</b>\n");
}

#[test]
fn test_cli_empty_stdin() {
    bbcodec().write_stdin("").assert().success().stdout("\n");
}

#[test]
fn test_cli_unparse() {
    bbcodec()
        .arg("--unparse")
        .write_stdin(r#"<span style="font-style: italic">x</span>"#)
        .assert()
        .success()
        .stdout("[i]x[/i]\n");
}

#[test]
fn test_cli_escape() {
    bbcodec()
        .arg("--escape")
        .write_stdin("[b]a & <b>[/b]")
        .assert()
        .success()
        .stdout("<b>a &amp; &lt;b&gt;</b>\n");
}

#[rstest]
#[case(&["--disable", "b"], "[b]x[/b][i]y[/i]", "x<i>y</i>\n")]
#[case(&["--only", "b"], "[b]x[/b][i]y[/i]", "<b>x</b>[i]y[/i]\n")]
#[case(&["--no-smileys"], ":) hi", ":) hi\n")]
fn test_cli_switches(#[case] args: &[&str], #[case] input: &str, #[case] expected: &str) {
    bbcodec()
        .args(args)
        .write_stdin(input)
        .assert()
        .success()
        .stdout(expected.to_string());
}

#[test]
fn test_cli_smileys_by_default() {
    bbcodec()
        .write_stdin(":) hi")
        .assert()
        .success()
        .stdout(predicate::str::contains("smiley.gif"));
}

#[test]
fn test_cli_only_conflicts_with_unparse() {
    bbcodec()
        .args(["--unparse", "--only", "b"])
        .write_stdin("<b>x</b>")
        .assert()
        .failure();
}

#[test]
fn test_cli_files_keep_argument_order() {
    let dir = tempdir().expect("failed to create temporary directory");
    let mut cmd = bbcodec();
    let mut expected = String::new();
    for i in 0..4 {
        cmd.arg(write_file(dir.path(), &format!("post{i}.txt"), &format!("[b]{i}[/b]\n")));
        expected.push_str(&format!("<b>{i}</b>\n"));
    }
    cmd.assert().success().stdout(expected);
}

#[test]
fn test_cli_missing_file_fails() {
    let dir = tempdir().expect("failed to create temporary directory");
    bbcodec()
        .arg(dir.path().join("absent.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.txt"));
}

#[test]
fn test_cli_config_file() {
    let dir = tempdir().expect("failed to create temporary directory");
    let config = write_file(
        dir.path(),
        "bbcodec.json",
        r#"{"disabled_tags": ["i"], "smileys_url": "https://cdn.test/s"}"#,
    );
    bbcodec()
        .arg("--config")
        .arg(&config)
        .write_stdin("[i]x[/i] :)")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("x ").and(predicate::str::contains(
            r#"src="https://cdn.test/s/smiley.gif""#,
        )));
}

#[test]
fn test_cli_bad_config_fails() {
    let dir = tempdir().expect("failed to create temporary directory");
    let config = write_file(dir.path(), "bad.json", "{not json");
    bbcodec()
        .arg("--config")
        .arg(&config)
        .write_stdin("x")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config file"));
}
