use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_describes_the_bot() {
    Command::cargo_bin("audiogram")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("YouTube"));
}

#[test]
fn version_flag_works() {
    Command::cargo_bin("audiogram")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("audiogram"));
}

#[test]
fn startup_without_token_is_fatal() {
    // An isolated working directory and config home so no real config or
    // .env file can leak a token into the test.
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("audiogram")
        .unwrap()
        .current_dir(dir.path())
        .env_remove("API_TOKEN")
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("API_TOKEN"));
}
