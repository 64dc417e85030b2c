//! Date filters: parsing, compilation and backend rendering.
//!
//! ```
//! use taxi_ingest::filter::{FilterRules, SqlRenderer, compile};
//!
//! let rules = FilterRules::parse(Some("2019-06"), None)?;
//! let sql = compile(&rules, &SqlRenderer::default());
//! assert_eq!(
//!     sql.to_string(),
//!     "CAST(strftime('%Y', datetime_PU) AS INTEGER) = 2019 AND \
//!      CAST(strftime('%m', datetime_PU) AS INTEGER) = 6"
//! );
//! # Ok::<(), taxi_ingest::filter::FilterError>(())
//! ```

pub mod compile;
pub mod render;
pub mod rule;

pub use compile::{CompiledPredicate, FragmentRenderer, compile, compile_rule};
pub use render::{NativeRenderer, SqlRenderer, TripExpr};
pub use rule::{FilterError, FilterKind, FilterRule, FilterRules};
