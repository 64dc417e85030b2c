use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use std::fs::OpenOptions;
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use taxi_ingest::app_id::AppId;
use taxi_ingest::backend::LocalBackend;
use taxi_ingest::filter::FilterRules;
use taxi_ingest::io::parquet::{partition_files, read_partitioned};
use taxi_ingest::metrics::RunMetrics;
use taxi_ingest::pipeline::{PipelineConfig, run};
use taxi_ingest::record::{JoinedRecord, TripRecord, ZoneRecord};
use taxi_ingest::source::LoadMode;
use taxi_ingest::testing::*;
use tempfile::TempDir;

struct Inputs {
    dir: TempDir,
    trips: String,
    zones: PathBuf,
}

impl Inputs {
    fn new(trips: &[TripRecord], zones: &[ZoneRecord]) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let trips_path = dir.path().join("trips.csv");
        let zones_path = dir.path().join("zones.csv");
        write_trips_csv(&trips_path, trips)?;
        write_zones_csv(&zones_path, zones)?;
        Ok(Self {
            trips: trips_path.to_string_lossy().into_owned(),
            zones: zones_path,
            dir,
        })
    }

    fn fixtures() -> Result<Self> {
        Self::new(&sample_trips(), &sample_zones())
    }

    fn out(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn config(&self, out: &str) -> PipelineConfig {
        PipelineConfig::new(self.trips.clone(), self.zones.clone(), self.out(out))
    }
}

fn ingest(config: &PipelineConfig) -> Result<(RunMetrics, Vec<JoinedRecord>)> {
    let metrics = run(&mut LocalBackend::new(), config, &AppId::generate())?;
    let rows = read_partitioned(&config.output_path)?;
    Ok((metrics, rows))
}

fn nz(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

/// Partition directories relative to `root`, e.g. `date_PU=20191230/borough_PU=Bronx`.
fn partition_dirs(root: &Path) -> Result<BTreeSet<PathBuf>> {
    Ok(partition_files(root)?
        .iter()
        .filter_map(|f| f.parent()?.strip_prefix(root).ok().map(Path::to_path_buf))
        .collect())
}

#[test]
fn single_trip_lands_in_its_pickup_partition() -> Result<()> {
    let trips = vec![
        TripBuilder::new(1, 2).pickup_at("2019-06-15 08:30:00").build(),
        TripBuilder::new(1, 2)
            .pickup_at("2020-01-02 08:30:00")
            .dropoff_at("2020-01-02 08:50:00")
            .build(),
    ];
    let zones = vec![zone(1, "A", "Manhattan"), zone(2, "B", "Bronx")];
    let inputs = Inputs::new(&trips, &zones)?;
    let config = inputs
        .config("out")
        .with_filters(FilterRules::parse(Some("2019"), None)?);

    let (metrics, rows) = ingest(&config)?;
    assert_eq!(metrics.rows_read, 2);
    assert_eq!(metrics.rows_filtered_out, 1);
    assert_eq!(rows.len(), 1);

    let row = &rows[0];
    assert_eq!(row.zone_PU, "A");
    assert_eq!(row.borough_PU, "Manhattan");
    assert_eq!(row.zone_DO, "B");
    assert_eq!(row.borough_DO, "Bronx");
    assert_eq!(row.date_PU, "20190615");
    assert!(AppId::is_well_formed(&row.app_id));

    let dirs: Vec<_> = partition_dirs(&config.output_path)?.into_iter().collect();
    assert_eq!(
        dirs,
        vec![PathBuf::from("date_PU=20190615").join("borough_PU=Manhattan")]
    );
    Ok(())
}

#[test]
fn join_is_inner_and_keeps_the_sides_apart() -> Result<()> {
    let trips = sample_trips();
    let zones = sample_zones();
    let inputs = Inputs::new(&trips, &zones)?;
    let (metrics, rows) = ingest(&inputs.config("out"))?;

    let by_id: HashMap<u32, &ZoneRecord> = zones.iter().map(|z| (z.location_id, z)).collect();
    let matched: Vec<&TripRecord> = trips
        .iter()
        .filter(|t| {
            by_id.contains_key(&t.pickup_location_id) && by_id.contains_key(&t.dropoff_location_id)
        })
        .collect();
    assert!(matched.len() < trips.len());
    assert_eq!(rows.len(), matched.len());
    assert_eq!(metrics.rows_unmatched, trips.len() - matched.len());

    // Fares are unique in the fixture, so they identify the source trip.
    let by_fare: HashMap<_, _> = matched.iter().map(|t| (t.fare_amount, *t)).collect();
    for row in &rows {
        let trip = by_fare[&row.fare_amount];
        let pu = by_id[&trip.pickup_location_id];
        let dro = by_id[&trip.dropoff_location_id];
        assert_eq!((row.zone_PU.as_str(), row.borough_PU.as_str()), (pu.zone.as_str(), pu.borough.as_str()));
        assert_eq!((row.zone_DO.as_str(), row.borough_DO.as_str()), (dro.zone.as_str(), dro.borough.as_str()));
        assert_eq!(row.Shape_Leng_PU, pu.shape_leng);
        assert_eq!(row.Shape_Leng_DO, dro.shape_leng);
        assert_eq!(row.date_PU, trip.pickup_datetime.format("%Y%m%d").to_string());
    }
    Ok(())
}

#[test]
fn whole_runs_are_idempotent() -> Result<()> {
    let inputs = Inputs::fixtures()?;
    let first = inputs.config("first");
    let second = inputs.config("second");

    let (_, a) = ingest(&first)?;
    let (_, b) = ingest(&second)?;
    assert_ne!(single_app_id(&a), single_app_id(&b));
    assert_same_rows(&a, &b);
    assert_eq!(
        partition_dirs(&first.output_path)?,
        partition_dirs(&second.output_path)?
    );
    Ok(())
}

#[test]
fn chunked_output_matches_whole_output() -> Result<()> {
    let inputs = Inputs::fixtures()?;
    let (whole_metrics, whole) = ingest(&inputs.config("whole"))?;
    assert_eq!(whole_metrics.chunks, 1);

    for size in [1, 4, 5, 7, 30, 100] {
        let config = inputs
            .config(&format!("chunked-{size}"))
            .with_load_mode(LoadMode::Chunked(nz(size)));
        let (metrics, rows) = ingest(&config)?;
        assert_eq!(metrics.chunks, 30usize.div_ceil(size), "chunk size {size}");
        assert_eq!(metrics.rows_read, 30);
        assert_same_rows(&rows, &whole);
    }
    Ok(())
}

#[test]
fn chunked_output_matches_whole_output_with_filters() -> Result<()> {
    let inputs = Inputs::fixtures()?;
    let filters = FilterRules::parse(Some("2019-12-30:2019-12-31"), Some("2019"))?;
    let (_, whole) = ingest(&inputs.config("whole").with_filters(filters))?;
    assert!(!whole.is_empty());
    assert!(whole.iter().all(|r| r.date_PU.starts_with("201912")));

    let config = inputs
        .config("chunked")
        .with_filters(filters)
        .with_load_mode(LoadMode::Chunked(nz(4)));
    let (_, chunked) = ingest(&config)?;
    assert_same_rows(&chunked, &whole);
    Ok(())
}

#[test]
fn sample_reads_only_the_first_rows() -> Result<()> {
    let trips = sample_trips();
    let inputs = Inputs::new(&trips, &sample_zones())?;
    let (metrics, sampled) =
        ingest(&inputs.config("sample").with_load_mode(LoadMode::Sample(nz(10))))?;
    assert_eq!(metrics.rows_read, 10);

    let head = Inputs::new(&trips[..10], &sample_zones())?;
    let (_, expected) = ingest(&head.config("out"))?;
    assert_same_rows(&sampled, &expected);
    Ok(())
}

#[test]
fn globbed_inputs_match_a_single_file() -> Result<()> {
    let trips = sample_trips();
    let single = Inputs::new(&trips, &sample_zones())?;
    let (_, expected) = ingest(&single.config("out"))?;

    let dir = tempfile::tempdir()?;
    write_trips_csv(dir.path().join("trips_2019-12.csv"), &trips[..12])?;
    write_trips_csv(dir.path().join("trips_2020-01.csv"), &trips[12..])?;
    let config = PipelineConfig::new(
        format!("{}/trips_*.csv", dir.path().display()),
        single.zones.clone(),
        dir.path().join("out"),
    )
    .with_load_mode(LoadMode::Chunked(nz(5)));
    let (metrics, rows) = ingest(&config)?;
    // 12 rows -> 3 chunks, 18 rows -> 4 chunks; chunks never span files.
    assert_eq!(metrics.chunks, 7);
    assert_same_rows(&rows, &expected);
    Ok(())
}

#[test]
fn unmatched_zones_write_nothing() -> Result<()> {
    let inputs = Inputs::new(&sample_trips(), &[zone(500, "Nowhere", "Nowhere")])?;
    let config = inputs.config("out");
    let (metrics, rows) = ingest(&config)?;
    assert_eq!(metrics.rows_read, 30);
    assert_eq!(metrics.rows_written, 0);
    assert_eq!(metrics.files_written, 0);
    assert!(rows.is_empty());
    Ok(())
}

#[test]
fn failed_chunk_keeps_earlier_output() -> Result<()> {
    let trips: Vec<_> = (0..6)
        .map(|i| {
            TripBuilder::new(4, 7)
                .pickup_at(&format!("2019-06-{:02} 09:00:00", 10 + i))
                .dropoff_at(&format!("2019-06-{:02} 09:30:00", 10 + i))
                .build()
        })
        .collect();
    let inputs = Inputs::new(&trips, &sample_zones())?;
    let mut file = OpenOptions::new().append(true).open(&inputs.trips)?;
    writeln!(file, "this,is,not,a,trip")?;
    drop(file);

    let config = inputs
        .config("out")
        .with_load_mode(LoadMode::Chunked(nz(2)));
    let err = run(&mut LocalBackend::new(), &config, &AppId::generate()).unwrap_err();
    assert!(format!("{err:#}").contains("unit 4"), "{err:#}");

    let rows = read_partitioned(&config.output_path)?;
    assert_eq!(rows.len(), 6);
    assert_eq!(partition_dirs(&config.output_path)?.len(), 6);
    Ok(())
}

#[test]
fn bad_zones_file_fails_before_writing() -> Result<()> {
    let zones = vec![zone(4, "A", "Manhattan"), zone(4, "B", "Bronx")];
    let inputs = Inputs::new(&sample_trips(), &zones)?;
    let config = inputs.config("out");
    let err = run(&mut LocalBackend::new(), &config, &AppId::generate()).unwrap_err();
    assert!(format!("{err:#}").contains("duplicate LocationID 4"), "{err:#}");
    assert!(!config.output_path.exists());
    Ok(())
}

#[test]
fn metrics_are_saved_when_asked() -> Result<()> {
    let inputs = Inputs::fixtures()?;
    let metrics_path = inputs.out("metrics.json");
    let config = inputs.config("out").with_metrics_path(&metrics_path);
    let (metrics, rows) = ingest(&config)?;

    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&metrics_path)?)?;
    assert_eq!(saved["backend"], "local");
    assert_eq!(saved["rows_written"], rows.len());
    assert_eq!(saved["app_id"], metrics.app_id.as_str());
    assert_eq!(single_app_id(&rows), metrics.app_id);
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzipped_trips_are_read_transparently() -> Result<()> {
    let trips = sample_trips();
    let plain = Inputs::new(&trips, &sample_zones())?;
    let (_, expected) = ingest(&plain.config("out"))?;

    let gz = plain.out("trips.csv.gz");
    write_trips_csv(&gz, &trips)?;
    let config = PipelineConfig::new(
        gz.to_string_lossy().into_owned(),
        plain.zones.clone(),
        plain.out("from-gz"),
    )
    .with_load_mode(LoadMode::Chunked(nz(8)));
    let (_, rows) = ingest(&config)?;
    assert_same_rows(&rows, &expected);
    Ok(())
}
