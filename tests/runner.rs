use assert_cmd::Command;
use epiworld::ledger::LedgerRow;
use epiworld::PolicyOrder;
use tempfile::tempdir;

fn epiworld() -> Command {
    Command::cargo_bin("epiworld").unwrap()
}

#[test]
fn runs_fixture_scenario() {
    let output_dir = tempdir().unwrap();
    epiworld()
        .args([
            "--config",
            "tests/data/scenario.json",
            "--data-dir",
            "tests/data/reference",
            "--days",
            "20",
        ])
        .arg("--output-dir")
        .arg(output_dir.path())
        .assert()
        .success()
        .stdout("Simulated 20 days\n");

    let mut reader = csv::Reader::from_path(output_dir.path().join("ledger.csv")).unwrap();
    let rows: Vec<LedgerRow> = reader.deserialize().map(Result::unwrap).collect();
    // France and Germany; Italy has no bed data.
    assert_eq!(rows.len(), 40);
    assert_eq!(rows[0].day, 1);
    assert_eq!(rows[0].country, "France");
    assert_eq!(rows[1].country, "Germany");
    assert_eq!(rows[39].day, 20);
    assert!(rows.iter().all(|row| row.country != "Italy"));
    assert!(rows.iter().any(|row| row.policy != PolicyOrder::Free));
}

#[test]
fn existing_output_needs_force() {
    let output_dir = tempdir().unwrap();
    let run = |force: bool| {
        let mut command = epiworld();
        command
            .args([
                "--config",
                "tests/data/scenario.json",
                "--data-dir",
                "tests/data/reference",
                "--days",
                "3",
                "--file-prefix",
                "again_",
            ])
            .arg("--output-dir")
            .arg(output_dir.path());
        if force {
            command.arg("--force-overwrite");
        }
        command.assert()
    };
    run(false).success();
    run(false).failure();
    run(true).success();
    assert!(output_dir.path().join("again_ledger.csv").exists());
}

#[test]
fn unknown_seed_fails() {
    let output_dir = tempdir().unwrap();
    let assert = epiworld()
        .args([
            "--config",
            "tests/data/bad_seed.json",
            "--data-dir",
            "tests/data/reference",
        ])
        .arg("--output-dir")
        .arg(output_dir.path())
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("Atlantis"));
    assert!(!output_dir.path().join("ledger.csv").exists());
}

#[test]
fn missing_reference_data_fails() {
    let output_dir = tempdir().unwrap();
    epiworld()
        .args(["--config", "tests/data/scenario.json", "--data-dir"])
        .arg(output_dir.path().join("nothing-here"))
        .arg("--output-dir")
        .arg(output_dir.path())
        .assert()
        .failure();
}

#[test]
fn verbose_logging_goes_to_stderr() {
    let output_dir = tempdir().unwrap();
    let assert = epiworld()
        .args([
            "--config",
            "tests/data/scenario.json",
            "--data-dir",
            "tests/data/reference",
            "--days",
            "2",
            "-v",
        ])
        .arg("--output-dir")
        .arg(output_dir.path())
        .assert()
        .success()
        .stdout("Simulated 2 days\n");
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("built world of 2 countries"));
}
