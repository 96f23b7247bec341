//! End-to-end tests that run the compiled `blobmirror` binary.
//!
//! Sync scenarios point the config at a fake `gsutil` script serving a
//! [`FakeBucket`], so they only run on Unix.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the blobmirror binary with no ambient config.
fn blobmirror_cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("blobmirror").expect("Failed to find blobmirror binary");
    cmd.env_remove("BLOBMIRROR_CONFIG")
        .env_remove("RUST_LOG")
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .current_dir(home);
    cmd
}

/// Write a TOML config with one catalog entry under `root`.
fn write_config(root: &Path, tool: &str, locator: &str) -> PathBuf {
    let config = format!(
        r#"
[paths]
base_root = '{base}'
backup_root = '{backup}'

[transfer]
tool = '{tool}'
workers = 2

[[catalog]]
locator = "{locator}"
destination = "02 - RETENCION"
"#,
        base = root.join("base").display(),
        backup = root.join("backup").display(),
    );
    let path = root.join("blobmirror.toml");
    fs::write(&path, config).expect("Should write config");
    path
}

fn parse_json(stdout: &[u8]) -> serde_json::Value {
    serde_json::from_slice(stdout).expect("Should print valid JSON")
}

// ============================================================================
// Argument handling
// ============================================================================

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    blobmirror_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("daily"))
        .stdout(predicate::str::contains("closure"));
}

#[test]
fn test_closure_rejects_year_out_of_range() {
    let home = TempDir::new().unwrap();
    blobmirror_cmd(home.path())
        .args(["closure", "--year", "2041", "--month", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("year must be between 2021 and 2039"));
}

#[test]
fn test_closure_rejects_month_out_of_range() {
    let home = TempDir::new().unwrap();
    blobmirror_cmd(home.path())
        .args(["closure", "--year", "2024", "--month", "13"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("month must be between 1 and 12"));
}

#[test]
fn test_missing_config_is_reported() {
    let home = TempDir::new().unwrap();
    blobmirror_cmd(home.path())
        .arg("daily")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration not found"));
}

#[test]
fn test_missing_transfer_tool_is_reported() {
    let home = TempDir::new().unwrap();
    let config = write_config(
        home.path(),
        "blobmirror-no-such-tool",
        "gs://test-bucket/CIERRES/REPORTE_MESACTUAL.csv",
    );

    blobmirror_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .arg("daily")
        .assert()
        .failure()
        .stderr(predicate::str::contains("blobmirror-no-such-tool"))
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_menu_fails_fast_without_transfer_tool() {
    let home = TempDir::new().unwrap();
    let config = write_config(
        home.path(),
        "blobmirror-no-such-tool",
        "gs://test-bucket/CIERRES/REPORTE_MESACTUAL.csv",
    );

    blobmirror_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .arg("menu")
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Transfer tool 'blobmirror-no-such-tool' not found"))
        .stderr(predicate::str::contains("What do you want to run?").not());
}

// ============================================================================
// Sync runs against a fake gsutil
// ============================================================================

#[cfg(unix)]
mod sync_runs {
    use super::*;
    use blobmirror_test_utils::FakeBucket;
    use blobmirror_test_utils::gsutil::install_fake_gsutil;

    struct Fixture {
        home: TempDir,
        bucket: FakeBucket,
        config: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let home = TempDir::new().unwrap();
            let bucket = FakeBucket::new();
            let tool = install_fake_gsutil(&home.path().join("bin"), bucket.root());
            let config = write_config(
                home.path(),
                &tool.to_string_lossy(),
                &bucket.locator("CIERRES/REPORTE_MESACTUAL.csv"),
            );
            Self {
                home,
                bucket,
                config,
            }
        }

        fn run(&self, args: &[&str]) -> assert_cmd::assert::Assert {
            blobmirror_cmd(self.home.path())
                .arg("--config")
                .arg(&self.config)
                .arg("--json")
                .args(args)
                .assert()
        }

        fn destination(&self, name: &str) -> PathBuf {
            self.home.path().join("base/02 - RETENCION").join(name)
        }
    }

    #[test]
    fn test_daily_publishes_then_reports_unchanged() {
        let fixture = Fixture::new();
        fixture
            .bucket
            .put("DIARIOS/REPORTE_MESACTUAL.csv", b"id,total\n1,10\n");

        let first = fixture.run(&["daily"]).success();
        let report = parse_json(&first.get_output().stdout);
        assert_eq!(report["counts"]["updated"], 1);
        assert_eq!(report["outcomes"][0]["status"], "updated");

        let published = fs::read(fixture.destination("DIARIOS_REPORTE_MESACTUAL.csv"))
            .expect("Should publish the daily file");
        assert_eq!(published, b"id,total\n1,10\n");

        let second = fixture.run(&["daily"]).success();
        let report = parse_json(&second.get_output().stdout);
        assert_eq!(report["counts"]["unchanged"], 1);
        assert_eq!(report["counts"]["updated"], 0);

        let journal = fs::read_to_string(fixture.home.path().join("backup/Logs/audit.csv"))
            .expect("Should write the audit journal");
        assert!(journal.starts_with("Timestamp,FileName,Action\r\n"));
        assert!(journal.contains("Updated"));
        assert!(journal.contains("No changes"));
    }

    #[test]
    fn test_daily_fails_when_an_object_fails() {
        let fixture = Fixture::new();
        fixture
            .bucket
            .put("DIARIOS/REPORTE_MESACTUAL.csv", b"id,total\n1,10\n");
        fs::write(fixture.bucket.root().join(".fail-cp"), b"").unwrap();

        let out = fixture
            .run(&["daily"])
            .failure()
            .stderr(predicate::str::contains("1 of 1 objects failed"));
        let report = parse_json(&out.get_output().stdout);
        assert_eq!(report["outcomes"][0]["status"], "failed");
        assert_eq!(report["outcomes"][0]["failure"], "transfer");
    }

    #[test]
    fn test_closure_without_matches_reports_none_found() {
        let fixture = Fixture::new();

        let out = fixture
            .run(&["closure", "--year", "2024", "--month", "3"])
            .success();
        let report = parse_json(&out.get_output().stdout);
        assert_eq!(report["none_found"], true);
        assert_eq!(report["tag"], "CIERRE_202403");
        assert_eq!(report["absent"], 1);
    }

    #[test]
    fn test_closure_publishes_into_month_folder() {
        let fixture = Fixture::new();
        fixture
            .bucket
            .put("CIERRES/REPORTE_CIERRE_202403.csv", b"closing\n");

        let out = fixture
            .run(&["closure", "--year", "2024", "--month", "3"])
            .success();
        let report = parse_json(&out.get_output().stdout);
        assert_eq!(report["found"], 1);
        assert_eq!(report["counts"]["updated"], 1);

        let published = fs::read(fixture.destination("03 - Marzo/REPORTE_CIERRE_202403.csv"))
            .expect("Should publish into the month folder");
        assert_eq!(published, b"closing\n");
    }
}
