//! Command-line surface: `taxi-ingest <mode> [options]`.
//!
//! The mode is taken from the first argument and resolved to a [`Mode`] before clap
//! sees anything, so an unknown mode never reaches option parsing. Each mode then
//! has its own clap parser sharing [`CommonArgs`].

use crate::app_id::AppId;
use crate::backend::{ClusterBackend, ClusterOptions, LocalBackend};
use crate::filter::{FilterError, FilterRules, NativeRenderer, SqlRenderer, compile};
use crate::pipeline::{PipelineConfig, run};
use crate::source::LoadMode;
use anyhow::Result;
use clap::{Args, Parser};
use std::ffi::OsString;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

pub const ENV_TAXI_TRIPS_PATH: &str = "TAXI_TRIPS_PATH";
pub const ENV_TAXI_ZONES_PATH: &str = "TAXI_ZONES_PATH";
pub const ENV_OUTPUT_PATH: &str = "OUTPUT_PATH";
pub const ENV_FILTER_PICKUP: &str = "FILTER_PICKUP";
pub const ENV_FILTER_DROPOFF: &str = "FILTER_DROPOFF";

/// Process exit status for an unknown or missing mode.
pub const EXIT_UNKNOWN_MODE: u8 = 2;

const FILTER_FORMATS: &str = "Available formats: [YYYY, YYYY-MM, YYYY-MM-DD, YYYY-MM-DD:YYYY-MM-DD]";

/// Execution backend selected by the first argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Local,
    Cluster,
    Sql,
    Shell,
}

pub const ALL_MODES: [Mode; 4] = [Mode::Shell, Mode::Local, Mode::Cluster, Mode::Sql];

impl Mode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Local => "local",
            Mode::Cluster => "cluster",
            Mode::Sql => "sql",
            Mode::Shell => "shell",
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown mode '{given}', available modes: {}", available_modes())]
pub struct UnknownMode {
    pub given: String,
}

fn available_modes() -> String {
    ALL_MODES
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_MODES
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMode { given: s.to_string() })
    }
}

/// Options shared by every mode.
#[derive(Args, Clone, Debug)]
pub struct CommonArgs {
    /// Taxi trips CSV file or glob (plain or compressed)
    #[arg(long, env = ENV_TAXI_TRIPS_PATH)]
    pub taxi_trips_path: String,

    /// Taxi zones CSV file
    #[arg(long, env = ENV_TAXI_ZONES_PATH)]
    pub taxi_zones_path: PathBuf,

    /// Root directory of the partitioned Parquet output
    #[arg(long, env = ENV_OUTPUT_PATH)]
    pub output_path: PathBuf,

    /// Filter by pickup date
    #[arg(long, env = ENV_FILTER_PICKUP, long_help = FILTER_FORMATS)]
    pub filter_pickup: Option<String>,

    /// Filter by drop-off date
    #[arg(long, env = ENV_FILTER_DROPOFF, long_help = FILTER_FORMATS)]
    pub filter_dropoff: Option<String>,

    /// Process the trips in chunks of this many rows
    #[arg(long, conflicts_with = "samplesize")]
    pub chunksize: Option<NonZeroUsize>,

    /// Process only the first N trips
    #[arg(long)]
    pub samplesize: Option<NonZeroUsize>,

    /// Save run metrics as JSON to this file
    #[arg(long)]
    pub metrics_path: Option<PathBuf>,
}

impl CommonArgs {
    /// Validate into the driver's configuration. Filters are parsed here, before any I/O.
    ///
    /// # Errors
    /// If a filter value is malformed.
    pub fn to_config(&self) -> Result<PipelineConfig, FilterError> {
        let filters =
            FilterRules::parse(self.filter_pickup.as_deref(), self.filter_dropoff.as_deref())?;
        let mut config = PipelineConfig::new(
            self.taxi_trips_path.clone(),
            self.taxi_zones_path.clone(),
            self.output_path.clone(),
        )
        .with_filters(filters)
        .with_load_mode(LoadMode::from_options(self.chunksize, self.samplesize));
        if let Some(path) = &self.metrics_path {
            config = config.with_metrics_path(path.clone());
        }
        Ok(config)
    }
}

/// In-process, single-threaded ingestion.
#[derive(Parser, Debug)]
pub struct LocalArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Partitioned ingestion on a rayon worker pool.
#[derive(Parser, Debug)]
pub struct ClusterArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Worker threads [default: number of CPUs]
    #[arg(long)]
    pub threads: Option<NonZeroUsize>,

    /// Partitions per unit [default: 2 x threads]
    #[arg(long)]
    pub partitions: Option<NonZeroUsize>,
}

impl ClusterArgs {
    #[must_use]
    pub fn options(&self) -> ClusterOptions {
        ClusterOptions {
            threads: self.threads.map(NonZeroUsize::get),
            partitions: self.partitions.map(NonZeroUsize::get),
        }
    }
}

/// Ingestion through SQL on SQLite.
#[derive(Parser, Debug)]
pub struct SqlArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// SQLite database URL
    #[arg(long, default_value = "sqlite::memory:")]
    pub database: String,
}

/// Dry run: parse the arguments and show every backend's compiled filter.
#[derive(Parser, Debug)]
pub struct ShellArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// A fully parsed command line.
#[derive(Debug)]
pub enum Invocation {
    Local(LocalArgs),
    Cluster(ClusterArgs),
    Sql(SqlArgs),
    Shell(ShellArgs),
}

impl Invocation {
    /// Parse the arguments following the mode.
    ///
    /// # Errors
    /// Clap's usage error, to be reported with [`clap::Error::exit`].
    pub fn try_parse<I, T>(mode: Mode, program: &str, rest: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let bin = format!("{program} {mode}");
        let argv = std::iter::once(OsString::from(bin)).chain(rest.into_iter().map(Into::into));
        Ok(match mode {
            Mode::Local => Invocation::Local(LocalArgs::try_parse_from(argv)?),
            Mode::Cluster => Invocation::Cluster(ClusterArgs::try_parse_from(argv)?),
            Mode::Sql => Invocation::Sql(SqlArgs::try_parse_from(argv)?),
            Mode::Shell => Invocation::Shell(ShellArgs::try_parse_from(argv)?),
        })
    }

    /// Run the selected mode to completion.
    ///
    /// # Errors
    /// Filter parse errors, then anything the pipeline reports.
    pub fn execute(self) -> Result<()> {
        match self {
            Invocation::Local(args) => {
                let config = args.common.to_config()?;
                let mut backend = LocalBackend::new();
                run(&mut backend, &config, &AppId::generate())?;
            }
            Invocation::Cluster(args) => {
                let config = args.common.to_config()?;
                let mut backend = ClusterBackend::new(args.options())?;
                run(&mut backend, &config, &AppId::generate())?;
            }
            Invocation::Sql(args) => execute_sql(&args)?,
            Invocation::Shell(args) => {
                for (backend, predicate) in dry_run(&args.common)? {
                    info!(backend, "filtering expression : {predicate}");
                }
            }
        }
        Ok(())
    }
}

#[cfg(feature = "sql-engine")]
fn execute_sql(args: &SqlArgs) -> Result<()> {
    use crate::backend::{SqlBackend, SqlOptions};

    let config = args.common.to_config()?;
    let mut backend = SqlBackend::connect(&SqlOptions {
        database: args.database.clone(),
    })?;
    run(&mut backend, &config, &AppId::generate())?;
    Ok(())
}

#[cfg(not(feature = "sql-engine"))]
fn execute_sql(_args: &SqlArgs) -> Result<()> {
    anyhow::bail!("the sql mode requires the `sql-engine` feature")
}

/// Log the parsed arguments and compile the filters for every backend, without I/O.
///
/// Returns `(backend, rendered predicate)` pairs.
///
/// # Errors
/// If a filter value is malformed.
pub fn dry_run(args: &CommonArgs) -> Result<Vec<(&'static str, String)>, FilterError> {
    info!(?args, "shell");
    let config = args.to_config()?;
    info!(load_mode = %config.load_mode, "resolved configuration");
    let native = compile(&config.filters, &NativeRenderer).to_string();
    let sql = compile(&config.filters, &SqlRenderer::default()).to_string();
    Ok(vec![
        (Mode::Local.as_str(), native.clone()),
        (Mode::Cluster.as_str(), native),
        (Mode::Sql.as_str(), sql),
    ])
}
