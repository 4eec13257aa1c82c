use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn resolve_prints_the_settled_tree() {
    let tmp = tempdir().unwrap();
    write_file(
        tmp.path(),
        "pi/pi.yaml",
        r#"
general:
  valid_model_names: [echam]
  valid_setup_names: []
  expid: PI
include_models:
  - echam.default
"#,
    );
    write_file(
        tmp.path(),
        "echam/echam.default.yaml",
        r#"
model: echam
resolution: T63
outdir: "/work/${general.expid}"
choose_resolution:
  T63:
    levels: 47
"#,
    );

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("simconf"));
    cmd.args(["--root", tmp.path().to_str().unwrap(), "resolve", "pi/pi"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("levels: 47"))
        .stdout(predicate::str::contains("outdir: /work/PI"))
        .stdout(predicate::str::contains("choose_").not());
}

#[test]
fn user_file_overrides_the_setup() {
    let tmp = tempdir().unwrap();
    write_file(tmp.path(), "pi/pi.yaml", "general:\n  expid: PI\n  scenario: control\n");
    let user = tmp.path().join("user.yaml");
    fs::write(&user, "general:\n  expid: MINE\n").unwrap();

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("simconf"));
    cmd.args([
        "--root",
        tmp.path().to_str().unwrap(),
        "resolve",
        "pi/pi",
        "--user",
        user.to_str().unwrap(),
    ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("expid: MINE"))
        .stdout(predicate::str::contains("scenario: control"));
}

#[test]
fn noleap_calendar_is_selectable() {
    let tmp = tempdir().unwrap();
    write_file(
        tmp.path(),
        "pi/pi.yaml",
        "general:\n  initial_date: 18500101\n  final_date: \"$(( ${initial_date} + 00010000 ))\"\n",
    );

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("simconf"));
    cmd.args([
        "--root",
        tmp.path().to_str().unwrap(),
        "resolve",
        "pi/pi",
        "--calendar",
        "noleap",
    ]);
    cmd.assert().success().stdout(predicate::str::contains("final_date: '18510101'"));
}

#[test]
fn missing_setup_fails_with_a_report() {
    let tmp = tempdir().unwrap();
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("simconf"));
    cmd.args(["--root", tmp.path().to_str().unwrap(), "resolve", "ghost/ghost"]);
    cmd.assert().failure().stderr(predicate::str::contains("ghost"));
}

#[test]
fn unknown_calendar_is_rejected() {
    let tmp = tempdir().unwrap();
    write_file(tmp.path(), "pi/pi.yaml", "general: {}\n");
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("simconf"));
    cmd.args([
        "--root",
        tmp.path().to_str().unwrap(),
        "resolve",
        "pi/pi",
        "--calendar",
        "martian",
    ]);
    cmd.assert().failure().stderr(predicate::str::contains("unknown calendar"));
}
