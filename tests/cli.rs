use anyhow::Result;
use std::process::Command;
use taxi_ingest::io::parquet::read_partitioned;
use taxi_ingest::testing::*;

fn taxi_ingest() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_taxi-ingest"));
    for var in [
        "TAXI_TRIPS_PATH",
        "TAXI_ZONES_PATH",
        "OUTPUT_PATH",
        "FILTER_PICKUP",
        "FILTER_DROPOFF",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn unknown_mode_exits_with_status_2() -> Result<()> {
    let out = taxi_ingest().args(["pandas", "--not-even-an-option"]).output()?;
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("'pandas'"), "{stderr}");
    assert!(stderr.contains("local"), "{stderr}");
    Ok(())
}

#[test]
fn missing_mode_exits_with_status_2() -> Result<()> {
    let out = taxi_ingest().output()?;
    assert_eq!(out.status.code(), Some(2));
    Ok(())
}

#[test]
fn bad_filter_fails_before_reading_inputs() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let out = taxi_ingest()
        .args(["local", "--taxi-trips-path"])
        .arg(dir.path().join("missing.csv"))
        .arg("--taxi-zones-path")
        .arg(dir.path().join("missing-zones.csv"))
        .arg("--output-path")
        .arg(dir.path().join("out"))
        .args(["--filter-pickup", "2019-6"])
        .output()?;
    assert_eq!(out.status.code(), Some(1));
    let logs = String::from_utf8_lossy(&out.stdout);
    assert!(logs.contains("2019-6"), "{logs}");
    assert!(!logs.contains("missing.csv"), "{logs}");
    Ok(())
}

#[test]
fn shell_mode_is_a_dry_run() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let out = taxi_ingest()
        .args(["shell", "--taxi-trips-path", "nowhere.csv"])
        .args(["--taxi-zones-path", "nowhere-zones.csv"])
        .arg("--output-path")
        .arg(dir.path().join("out"))
        .args(["--filter-pickup", "2019-06"])
        .output()?;
    assert!(out.status.success());
    assert!(!dir.path().join("out").exists());
    let logs = String::from_utf8_lossy(&out.stdout);
    assert!(logs.contains("datetime_PU.dt.year == 2019"), "{logs}");
    Ok(())
}

#[test]
fn cluster_mode_end_to_end_from_environment() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let trips = dir.path().join("trips.csv");
    let zones = dir.path().join("zones.csv");
    let output = dir.path().join("out");
    write_trips_csv(&trips, &sample_trips())?;
    write_zones_csv(&zones, &sample_zones())?;

    let status = taxi_ingest()
        .args(["cluster", "--threads", "2", "--chunksize", "9"])
        .env("TAXI_TRIPS_PATH", &trips)
        .env("TAXI_ZONES_PATH", &zones)
        .env("OUTPUT_PATH", &output)
        .env("FILTER_DROPOFF", "2019")
        .status()?;
    assert!(status.success());

    let rows = read_partitioned(&output)?;
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|r| r.date_PU.starts_with("2019")));
    single_app_id(&rows);
    Ok(())
}
