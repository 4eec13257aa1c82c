use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn doctor_reports_components_and_documents() {
    let tmp = tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("echam")).unwrap();
    fs::write(tmp.path().join("echam/echam.default.yaml"), "model: echam\n").unwrap();
    fs::create_dir_all(tmp.path().join("fesom")).unwrap();
    fs::write(tmp.path().join("fesom/fesom.default.yaml"), "model: fesom\n").unwrap();

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("simconf"));
    cmd.args(["--root", tmp.path().to_str().unwrap(), "doctor"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("OK   simconf doctor"))
        .stdout(predicate::str::contains("components: 2"))
        .stdout(predicate::str::contains("documents: 2"));
}

#[test]
fn doctor_fails_on_a_missing_root() {
    let tmp = tempdir().unwrap();
    let missing = tmp.path().join("nope");
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("simconf"));
    cmd.args(["--root", missing.to_str().unwrap(), "doctor"]);
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("FAIL simconf doctor"));
}
