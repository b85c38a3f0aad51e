//! Schema and row accumulation for one script execution.

use std::sync::{Arc, Mutex};

use rhai::Dynamic;
use serde::Serialize;
use tracing::debug;

use crate::{
    coerce::{coerce, CellValue, ColumnType},
    error::{Error, Result},
};

/// One declared result-set column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Column name as declared by the script. Names need not be unique.
    pub name: String,
    /// Target type every value in this column is coerced to.
    pub column_type: ColumnType,
}

/// One emitted row: a typed, nullable cell per schema column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row(Vec<Option<CellValue>>);

impl Row {
    /// Cell values in column order.
    pub fn values(&self) -> &[Option<CellValue>] {
        &self.0
    }
}

/// The finished output of one execution: an ordered schema plus ordered rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    /// Declared columns, in declaration order.
    pub columns: Vec<Column>,
    /// Emitted rows, in emission order.
    pub rows: Vec<Row>,
}

/// How many of the accumulated rows the caller wants back.
///
/// Applied only at finalization; the script always runs to completion and
/// never observes the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLimit {
    /// Every accumulated row.
    All,
    /// The schema only, zero rows.
    SchemaOnly,
    /// At most the first row.
    SingleRow,
    /// The first `n` rows (fewer if fewer were emitted).
    Exact(usize),
}

impl RowLimit {
    fn cap(self) -> Option<usize> {
        match self {
            Self::All => None,
            Self::SchemaOnly => Some(0),
            Self::SingleRow => Some(1),
            Self::Exact(n) => Some(n),
        }
    }
}

#[derive(Default)]
struct BuilderState {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

/// The `resultset` capability object handed to scripts.
///
/// Cloning shares the underlying state: rhai requires host objects to be
/// `Clone`, so the builder is a handle. Each execution constructs its own,
/// and execution is single-threaded, so the mutex is never contended.
#[derive(Clone, Default)]
pub struct ResultSetBuilder(Arc<Mutex<BuilderState>>);

impl ResultSetBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut BuilderState) -> T) -> T {
        let mut state = self.0.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Append columns from an object map of `name: type-tag`.
    ///
    /// Entries are appended in the map's iteration order (rhai maps iterate
    /// sorted by key). Unknown type tags fall back to `string`. Repeated
    /// calls append rather than replace.
    pub fn declare_schema(&self, fields: rhai::Map) {
        self.with_state(|state| {
            for (name, tag) in &fields {
                state.columns.push(Column {
                    name: name.to_string(),
                    column_type: ColumnType::from_tag(&tag.to_string()),
                });
            }
        });
    }

    /// Append columns from an array of `[name, type-tag]` pairs, preserving
    /// the array's order exactly.
    pub fn declare_schema_pairs(&self, fields: rhai::Array) -> Result<()> {
        self.with_state(|state| {
            for entry in &fields {
                let pair = entry.read_lock::<rhai::Array>().ok_or_else(|| {
                    Error::InvalidArgument(
                        "declare_schema() array entries must be [name, type] pairs".into(),
                    )
                })?;
                let (name, tag) = match pair.as_slice() {
                    [name, tag] => (name.to_string(), tag.to_string()),
                    _ => {
                        return Err(Error::InvalidArgument(
                            "declare_schema() array entries must be [name, type] pairs".into(),
                        ))
                    }
                };
                state.columns.push(Column {
                    name,
                    column_type: ColumnType::from_tag(&tag),
                });
            }
            Ok(())
        })
    }

    /// Append one row from a positional array or a keyed map.
    ///
    /// Arrays fill columns left to right; missing trailing values stay null
    /// and surplus values are ignored. Maps fill columns by name; a key
    /// holding a null still counts as present, but a map containing none of
    /// the declared column names is silently discarded. A unit value or an
    /// empty array is a no-op. Anything else is a fatal shape error.
    pub fn emit_row(&self, value: &Dynamic) -> Result<()> {
        if value.is_unit() {
            return Ok(());
        }
        if let Some(array) = value.read_lock::<rhai::Array>() {
            return self.emit_positional(&array);
        }
        if let Some(map) = value.read_lock::<rhai::Map>() {
            return self.emit_keyed(&map);
        }
        Err(Error::InvalidRowShape {
            type_name: value.type_name().to_string(),
        })
    }

    fn emit_positional(&self, values: &rhai::Array) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        self.with_state(|state| {
            let mut row = Vec::with_capacity(state.columns.len());
            for (i, column) in state.columns.iter().enumerate() {
                match values.get(i) {
                    Some(value) => row.push(coerce(value, column.column_type)?),
                    None => row.push(None),
                }
            }
            state.rows.push(Row(row));
            Ok(())
        })
    }

    fn emit_keyed(&self, values: &rhai::Map) -> Result<()> {
        self.with_state(|state| {
            let mut row = Vec::with_capacity(state.columns.len());
            let mut hit_any_column = false;
            for column in &state.columns {
                match values.get(column.name.as_str()) {
                    // Key presence is the match, even when the value is
                    // null; coercion turns a unit value into a null cell.
                    Some(value) => {
                        hit_any_column = true;
                        row.push(coerce(value, column.column_type)?);
                    }
                    None => row.push(None),
                }
            }
            if hit_any_column {
                state.rows.push(Row(row));
            } else {
                debug!("discarding row: no key matched a declared column");
            }
            Ok(())
        })
    }

    /// Consume the accumulated state into a `ResultSet`, applying the row
    /// limit. Fails if no column was ever declared, regardless of rows.
    pub fn finalize(&self, limit: RowLimit) -> Result<ResultSet> {
        let state = self.with_state(std::mem::take);
        if state.columns.is_empty() {
            return Err(Error::InvalidResultSet);
        }
        let mut rows = state.rows;
        if let Some(cap) = limit.cap() {
            rows.truncate(cap);
        }
        Ok(ResultSet {
            columns: state.columns,
            rows,
        })
    }
}
