//! Embedded SQL engine backend (SQLite through `sqlx`).
//!
//! Each unit of trips becomes a `taxi_rides_<n>` table. Filtering and both join
//! passes are issued as views over it, so the engine does the work:
//!
//! ```sql
//! CREATE VIEW taxi_rides_0_filtered AS SELECT * FROM taxi_rides_0 AS t WHERE <predicate>;
//! CREATE VIEW taxi_rides_0_pu AS SELECT ..., zpu.zone AS zone_PU, ...
//!     FROM taxi_rides_0_filtered AS t INNER JOIN taxi_zones AS zpu ON t.PULocationID = zpu.LocationID;
//! CREATE VIEW taxi_rides_0_joined AS SELECT ..., zdo.zone AS zone_DO, ...
//!     FROM taxi_rides_0_pu AS t INNER JOIN taxi_zones AS zdo ON t.DOLocationID = zdo.LocationID;
//! ```
//!
//! Augmentation selects from the last view with `app_id` bound as a parameter and
//! `date_PU` computed by `strftime`, then drops the unit's table and views.
//! Timestamps are stored as `YYYY-MM-DD HH:MM:SS` text and amounts as decimal text,
//! so no precision is lost on the way through.

use crate::app_id::AppId;
use crate::backend::Backend;
use crate::filter::SqlRenderer;
use crate::record::{
    APP_ID_COLUMN, DATE_PU_COLUMN, JoinedRecord, LocationRole, PICKUP_TIME_COLUMN, TRIP_COLUMNS,
    TripRecord, ZONE_ATTRIBUTE_COLUMNS, money, tlc_timestamp,
};
use crate::zones::ZoneTable;
use anyhow::{Context, Result, anyhow, bail};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{ConnectOptions, Connection, Row};
use std::str::FromStr;
use tokio::runtime::Runtime;
use tracing::debug;

const ZONES_TABLE: &str = "taxi_zones";
const TRIP_ALIAS: &str = "t";
const ORDER_COLUMN: &str = "ride_seq";
/// Views derived from a unit's table, in creation order.
const DERIVED_VIEWS: [&str; 3] = ["filtered", "pu", "joined"];

/// Connection settings for [`SqlBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqlOptions {
    /// `sqlx` SQLite URL, e.g. `sqlite::memory:` or `sqlite://ingest.db`.
    pub database: String,
}

impl Default for SqlOptions {
    fn default() -> Self {
        Self {
            database: "sqlite::memory:".to_string(),
        }
    }
}

/// A unit of trips living inside the database.
#[derive(Debug)]
pub struct SqlRelation {
    table: String,
    views: Vec<String>,
}

impl SqlRelation {
    /// Name to select from: the newest view, or the base table.
    #[must_use]
    pub fn current(&self) -> &str {
        self.views.last().unwrap_or(&self.table)
    }

    fn derive(&mut self, suffix: &str) -> String {
        let name = format!("{}_{suffix}", self.table);
        self.views.push(name.clone());
        name
    }
}

/// Single-connection SQLite engine on a private current-thread runtime.
pub struct SqlBackend {
    rt: Runtime,
    conn: SqliteConnection,
    next_unit: u64,
}

fn sql_type(column: &str) -> &'static str {
    match column {
        "VendorID" | "passenger_count" | "RatecodeID" | "payment_type" | "store_and_fwd_flag" => {
            "INTEGER"
        }
        "trip_distance" => "REAL",
        _ => "TEXT",
    }
}

/// Trip columns that survive pass one: everything plus the drop-off key.
fn pass_one_trip_columns() -> Vec<String> {
    let mut cols = vec![ORDER_COLUMN.to_string()];
    cols.extend(TRIP_COLUMNS.iter().map(ToString::to_string));
    cols.push(LocationRole::Dropoff.location_column().to_string());
    cols
}

/// Zone columns attached for `role`, as `alias.col AS col_SUFFIX`.
fn zone_projection(role: LocationRole, alias: &str) -> Vec<String> {
    ZONE_ATTRIBUTE_COLUMNS
        .iter()
        .map(|c| format!("{alias}.{c} AS {}", role.suffixed(c)))
        .collect()
}

fn zone_alias(role: LocationRole) -> &'static str {
    match role {
        LocationRole::Pickup => "zpu",
        LocationRole::Dropoff => "zdo",
    }
}

fn join_pass_sql(view: &str, source: &str, role: LocationRole, carried: &[String]) -> String {
    let alias = zone_alias(role);
    let mut select: Vec<String> = carried.iter().map(|c| format!("{TRIP_ALIAS}.{c}")).collect();
    select.extend(zone_projection(role, alias));
    format!(
        "CREATE VIEW {view} AS SELECT {} FROM {source} AS {TRIP_ALIAS} \
         INNER JOIN {ZONES_TABLE} AS {alias} ON {TRIP_ALIAS}.{} = {alias}.LocationID",
        select.join(", "),
        role.location_column(),
    )
}

fn narrow<T: TryFrom<i64>>(value: Option<i64>, column: &str) -> Result<Option<T>> {
    value
        .map(|v| T::try_from(v).map_err(|_| anyhow!("{column} value {v} out of range")))
        .transpose()
}

fn decimal(row: &SqliteRow, column: &str) -> Result<Decimal> {
    let raw: String = row.try_get(column)?;
    money::parse(&raw).ok_or_else(|| anyhow!("{column} is not a decimal: '{raw}'"))
}

fn timestamp(row: &SqliteRow, column: &str) -> Result<chrono::NaiveDateTime> {
    let raw: String = row.try_get(column)?;
    tlc_timestamp::parse(&raw).ok_or_else(|| anyhow!("{column} is not a timestamp: '{raw}'"))
}

fn decode_joined(row: &SqliteRow) -> Result<JoinedRecord> {
    let pu = |c: &str| LocationRole::Pickup.suffixed(c);
    let dro = |c: &str| LocationRole::Dropoff.suffixed(c);
    Ok(JoinedRecord {
        vendor_id: narrow(row.try_get("VendorID")?, "VendorID")?,
        datetime_PU: timestamp(row, "datetime_PU")?,
        datetime_DO: timestamp(row, "datetime_DO")?,
        passenger_count: narrow(row.try_get("passenger_count")?, "passenger_count")?,
        trip_distance: row.try_get("trip_distance")?,
        ratecode_id: narrow(row.try_get("RatecodeID")?, "RatecodeID")?,
        store_and_fwd_flag: row.try_get("store_and_fwd_flag")?,
        payment_type: narrow(row.try_get("payment_type")?, "payment_type")?,
        fare_amount: decimal(row, "fare_amount")?,
        extra: decimal(row, "extra")?,
        mta_tax: decimal(row, "mta_tax")?,
        tip_amount: decimal(row, "tip_amount")?,
        tolls_amount: decimal(row, "tolls_amount")?,
        improvement_surcharge: decimal(row, "improvement_surcharge")?,
        total_amount: decimal(row, "total_amount")?,
        Shape_Leng_PU: row.try_get(pu("Shape_Leng").as_str())?,
        the_geom_PU: row.try_get(pu("the_geom").as_str())?,
        Shape_Area_PU: row.try_get(pu("Shape_Area").as_str())?,
        zone_PU: row.try_get(pu("zone").as_str())?,
        borough_PU: row.try_get(pu("borough").as_str())?,
        Shape_Leng_DO: row.try_get(dro("Shape_Leng").as_str())?,
        the_geom_DO: row.try_get(dro("the_geom").as_str())?,
        Shape_Area_DO: row.try_get(dro("Shape_Area").as_str())?,
        zone_DO: row.try_get(dro("zone").as_str())?,
        borough_DO: row.try_get(dro("borough").as_str())?,
        app_id: row.try_get(APP_ID_COLUMN)?,
        date_PU: row.try_get(DATE_PU_COLUMN)?,
    })
}

impl SqlBackend {
    /// Open the database named by `options`.
    ///
    /// # Errors
    /// If the runtime cannot start or the database cannot be opened.
    pub fn connect(options: &SqlOptions) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("start SQL runtime")?;
        let opts = SqliteConnectOptions::from_str(&options.database)
            .with_context(|| format!("parse database URL {}", options.database))?
            .create_if_missing(true);
        let conn = rt
            .block_on(opts.connect())
            .with_context(|| format!("open {}", options.database))?;
        debug!(database = %options.database, "SQL engine connected");
        Ok(Self {
            rt,
            conn,
            next_unit: 0,
        })
    }

    fn execute(&mut self, sql: &str) -> Result<()> {
        let Self { rt, conn, .. } = self;
        rt.block_on(sqlx::query(sql).execute(&mut *conn))
            .with_context(|| format!("execute: {sql}"))?;
        Ok(())
    }

    fn count_rows(&mut self, relation: &str) -> Result<usize> {
        let Self { rt, conn, .. } = self;
        let sql = format!("SELECT COUNT(*) FROM {relation}");
        let n: i64 = rt
            .block_on(sqlx::query_scalar(&sql).fetch_one(&mut *conn))
            .with_context(|| format!("count {relation}"))?;
        usize::try_from(n).map_err(|_| anyhow!("negative count from {relation}"))
    }

    /// Drop `table` and every view a unit can derive from it, whether or not
    /// they were created by this connection.
    fn drop_unit(&mut self, table: &str) -> Result<()> {
        for suffix in DERIVED_VIEWS.iter().rev() {
            self.execute(&format!("DROP VIEW IF EXISTS {table}_{suffix}"))?;
        }
        self.execute(&format!("DROP TABLE IF EXISTS {table}"))
    }
}

impl Backend for SqlBackend {
    type Renderer = SqlRenderer;
    type Trips = SqlRelation;
    type Joined = SqlRelation;

    fn name(&self) -> &'static str {
        "sql"
    }

    fn renderer(&self) -> SqlRenderer {
        SqlRenderer::qualified(TRIP_ALIAS)
    }

    fn load_zones(&mut self, zones: ZoneTable) -> Result<()> {
        self.execute(&format!("DROP TABLE IF EXISTS {ZONES_TABLE}"))?;
        self.execute(&format!(
            "CREATE TABLE {ZONES_TABLE} (LocationID INTEGER PRIMARY KEY, Shape_Leng REAL, \
             the_geom TEXT, Shape_Area REAL, zone TEXT NOT NULL, borough TEXT NOT NULL)"
        ))?;

        let insert = format!(
            "INSERT INTO {ZONES_TABLE} (LocationID, Shape_Leng, the_geom, Shape_Area, zone, borough) \
             VALUES (?, ?, ?, ?, ?, ?)"
        );
        let Self { rt, conn, .. } = self;
        rt.block_on(async {
            let mut tx = conn.begin().await?;
            for (id, z) in zones.sorted() {
                sqlx::query(&insert)
                    .bind(i64::from(id))
                    .bind(z.shape_leng)
                    .bind(z.the_geom.as_deref())
                    .bind(z.shape_area)
                    .bind(z.zone.as_str())
                    .bind(z.borough.as_str())
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await
        })
        .context("load zones into SQL engine")?;
        debug!(zones = zones.len(), "zones table ready");
        Ok(())
    }

    fn ingest(&mut self, trips: Vec<TripRecord>) -> Result<SqlRelation> {
        let table = format!("taxi_rides_{}", self.next_unit);
        self.next_unit += 1;

        let mut columns = vec![format!("{ORDER_COLUMN} INTEGER PRIMARY KEY")];
        columns.extend(TRIP_COLUMNS.iter().map(|c| format!("{c} {}", sql_type(c))));
        for role in LocationRole::ALL {
            columns.push(format!("{} INTEGER NOT NULL", role.location_column()));
        }
        self.drop_unit(&table)?;
        self.execute(&format!("CREATE TABLE {table} ({})", columns.join(", ")))?;

        let mut names = vec![ORDER_COLUMN.to_string()];
        names.extend(TRIP_COLUMNS.iter().map(ToString::to_string));
        names.extend(LocationRole::ALL.iter().map(|r| r.location_column().to_string()));
        let insert = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            names.join(", "),
            vec!["?"; names.len()].join(", ")
        );

        let Self { rt, conn, .. } = self;
        rt.block_on(async {
            let mut tx = conn.begin().await?;
            for (seq, t) in trips.iter().enumerate() {
                sqlx::query(&insert)
                    .bind(i64::try_from(seq).unwrap_or(i64::MAX))
                    .bind(t.vendor_id)
                    .bind(t.pickup_datetime.format(tlc_timestamp::ISO_FORMAT).to_string())
                    .bind(t.dropoff_datetime.format(tlc_timestamp::ISO_FORMAT).to_string())
                    .bind(t.passenger_count)
                    .bind(t.trip_distance)
                    .bind(t.ratecode_id)
                    .bind(t.store_and_fwd_flag)
                    .bind(t.payment_type)
                    .bind(money::to_cents(t.fare_amount).to_string())
                    .bind(money::to_cents(t.extra).to_string())
                    .bind(money::to_cents(t.mta_tax).to_string())
                    .bind(money::to_cents(t.tip_amount).to_string())
                    .bind(money::to_cents(t.tolls_amount).to_string())
                    .bind(money::to_cents(t.improvement_surcharge).to_string())
                    .bind(money::to_cents(t.total_amount).to_string())
                    .bind(i64::from(t.pickup_location_id))
                    .bind(i64::from(t.dropoff_location_id))
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await
        })
        .with_context(|| format!("insert trips into {table}"))?;

        Ok(SqlRelation {
            table,
            views: Vec::new(),
        })
    }

    fn count(&mut self, trips: &SqlRelation) -> Result<usize> {
        self.count_rows(trips.current())
    }

    fn filter(&mut self, mut trips: SqlRelation, predicate: &String) -> Result<SqlRelation> {
        let source = trips.current().to_string();
        let view = trips.derive("filtered");
        self.execute(&format!(
            "CREATE VIEW {view} AS SELECT * FROM {source} AS {TRIP_ALIAS} WHERE {predicate}"
        ))?;
        Ok(trips)
    }

    fn join_zones(&mut self, mut trips: SqlRelation) -> Result<SqlRelation> {
        let exists = self.count_rows(&format!(
            "sqlite_master WHERE type = 'table' AND name = '{ZONES_TABLE}'"
        ))?;
        if exists == 0 {
            bail!("zones not loaded");
        }

        let source = trips.current().to_string();
        let pickup_view = trips.derive("pu");
        let carried = pass_one_trip_columns();
        self.execute(&join_pass_sql(&pickup_view, &source, LocationRole::Pickup, &carried))?;

        let joined_view = trips.derive("joined");
        let mut carried: Vec<String> = carried
            .into_iter()
            .filter(|c| c != LocationRole::Dropoff.location_column())
            .collect();
        carried.extend(
            ZONE_ATTRIBUTE_COLUMNS
                .iter()
                .map(|c| LocationRole::Pickup.suffixed(c)),
        );
        self.execute(&join_pass_sql(&joined_view, &pickup_view, LocationRole::Dropoff, &carried))?;
        Ok(trips)
    }

    fn count_joined(&mut self, joined: &SqlRelation) -> Result<usize> {
        self.count_rows(joined.current())
    }

    fn augment(&mut self, joined: SqlRelation, app_id: &AppId) -> Result<Vec<JoinedRecord>> {
        let mut select: Vec<String> = TRIP_COLUMNS.iter().map(ToString::to_string).collect();
        for role in LocationRole::ALL {
            select.extend(ZONE_ATTRIBUTE_COLUMNS.iter().map(|c| role.suffixed(c)));
        }
        select.push(format!("? AS {APP_ID_COLUMN}"));
        select.push(format!(
            "strftime('%Y%m%d', {PICKUP_TIME_COLUMN}) AS {DATE_PU_COLUMN}"
        ));
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {ORDER_COLUMN}",
            select.join(", "),
            joined.current()
        );

        let out = {
            let Self { rt, conn, .. } = self;
            rt.block_on(sqlx::query(&sql).bind(app_id.as_str()).fetch_all(&mut *conn))
                .with_context(|| format!("select augmented rows from {}", joined.current()))
                .and_then(|rows| rows.iter().map(decode_joined).collect::<Result<Vec<_>>>())
        };
        let dropped = self.drop_unit(&joined.table);
        let out = out?;
        dropped?;
        Ok(out)
    }
}
