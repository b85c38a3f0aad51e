#![warn(missing_docs)]

//! Sandboxed rhai script execution producing typed tabular result sets.
//!
//! A caller hands [`ScriptExecutor::execute`] a short script; the script
//! declares a column schema and emits rows through the injected `resultset`
//! object, optionally calling out over HTTP through `helper.fetch`, and the
//! caller receives a [`ResultSet`] of coerced, typed cells. Executions are
//! one-shot and resource-bounded: a fresh interpreter per call with hard
//! caps on memory, wall-clock time, and evaluated statements.
//!
//! ```no_run
//! use rowscript::{EngineConfig, RowLimit, ScriptExecutor};
//!
//! let config = EngineConfig::parse("Engine=rhai;MaxStatements=500")?;
//! let set = ScriptExecutor::new(config).execute(
//!     r#"
//!     resultset.declare_schema(#{id: "integer", name: "string"});
//!     resultset.emit_row([1, "ada"]);
//!     resultset.emit_row(#{id: 2, name: "grace"});
//!     "#,
//!     RowLimit::All,
//! )?;
//! assert_eq!(set.rows.len(), 2);
//! # Ok::<(), rowscript::Error>(())
//! ```

mod coerce;
mod config;
mod engine;
mod error;
mod executor;
mod fetch;
mod resultset;

pub use coerce::{coerce, CellValue, ColumnType};
pub use config::EngineConfig;
pub use error::{Error, LimitKind, Result};
pub use executor::ScriptExecutor;
pub use fetch::HttpHelper;
pub use resultset::{Column, ResultSet, ResultSetBuilder, Row, RowLimit};
