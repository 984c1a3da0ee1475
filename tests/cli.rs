use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn platforms_lists_every_supported_site() {
    Command::cargo_bin("clipscribe")
        .unwrap()
        .arg("platforms")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("youtube")
                .and(predicate::str::contains("facebook"))
                .and(predicate::str::contains("tiktok")),
        );
}

#[test]
fn download_without_input_reports_usage_error() {
    Command::cargo_bin("clipscribe")
        .unwrap()
        .arg("download")
        .assert()
        .failure()
        .stderr(predicate::str::contains("provide a URL"));
}

#[test]
fn url_and_file_are_mutually_exclusive() {
    Command::cargo_bin("clipscribe")
        .unwrap()
        .args([
            "download",
            "https://youtube.com/watch?v=abc",
            "--file",
            "urls.txt",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn help_mentions_all_subcommands() {
    Command::cargo_bin("clipscribe")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("download")
                .and(predicate::str::contains("transcribe"))
                .and(predicate::str::contains("platforms"))
                .and(predicate::str::contains("config")),
        );
}
