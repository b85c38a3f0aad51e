//! End-to-end script executions through the public API.

use rowscript::{CellValue, ColumnType, EngineConfig, Error, LimitKind, RowLimit, ScriptExecutor};

fn executor() -> ScriptExecutor {
    ScriptExecutor::new(EngineConfig::parse("Engine=rhai").unwrap())
}

fn int_cell(n: i32) -> Option<CellValue> {
    Some(CellValue::Int(n))
}

fn text_cell(s: &str) -> Option<CellValue> {
    Some(CellValue::Text(s.into()))
}

#[test]
fn positional_row_produces_typed_cells() {
    let set = executor()
        .execute(
            r#"
            resultset.declare_schema(#{a: "integer", b: "string"});
            resultset.emit_row([1, "x"]);
            "#,
            RowLimit::All,
        )
        .unwrap();
    assert_eq!(
        set.columns
            .iter()
            .map(|c| (c.name.as_str(), c.column_type))
            .collect::<Vec<_>>(),
        [("a", ColumnType::Integer), ("b", ColumnType::String)]
    );
    assert_eq!(set.rows.len(), 1);
    assert_eq!(set.rows[0].values(), &[int_cell(1), text_cell("x")]);
}

#[test]
fn keyed_row_missing_a_column_leaves_it_null() {
    let set = executor()
        .execute(
            r#"
            resultset.declare_schema(#{a: "integer", b: "string"});
            resultset.emit_row(#{b: "x"});
            "#,
            RowLimit::All,
        )
        .unwrap();
    assert_eq!(set.rows.len(), 1);
    assert_eq!(set.rows[0].values(), &[None, text_cell("x")]);
}

#[test]
fn keyed_row_with_a_present_null_key_is_kept_as_nulls() {
    let set = executor()
        .execute(
            r#"
            resultset.declare_schema(#{a: "integer", b: "string"});
            resultset.emit_row(#{a: ()});
            "#,
            RowLimit::All,
        )
        .unwrap();
    assert_eq!(set.rows.len(), 1);
    assert_eq!(set.rows[0].values(), &[None, None]);
}

#[test]
fn keyed_row_matching_no_column_is_discarded() {
    let set = executor()
        .execute(
            r#"
            resultset.declare_schema(#{a: "integer", b: "string"});
            resultset.emit_row(#{c: 1, d: 2});
            "#,
            RowLimit::All,
        )
        .unwrap();
    assert!(set.rows.is_empty());
}

#[test]
fn script_without_schema_fails_regardless_of_rows() {
    let err = executor()
        .execute("resultset.emit_row([1, 2, 3]);", RowLimit::All)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidResultSet));
}

#[test]
fn pair_array_schema_preserves_declaration_order() {
    let set = executor()
        .execute(
            r#"
            resultset.declare_schema([["z", "integer"], ["a", "double"]]);
            "#,
            RowLimit::All,
        )
        .unwrap();
    assert_eq!(
        set.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        ["z", "a"]
    );
}

#[test]
fn map_schema_iterates_in_sorted_key_order() {
    let set = executor()
        .execute(
            r#"resultset.declare_schema(#{z: "integer", a: "double"});"#,
            RowLimit::All,
        )
        .unwrap();
    assert_eq!(
        set.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        ["a", "z"]
    );
}

#[test]
fn row_limits_are_applied_host_side_after_the_run() {
    let script = r#"
        resultset.declare_schema(#{n: "integer"});
        for i in 0..5 {
            resultset.emit_row([i]);
        }
    "#;
    for (limit, expect) in [
        (RowLimit::All, 5),
        (RowLimit::SchemaOnly, 0),
        (RowLimit::SingleRow, 1),
        (RowLimit::Exact(3), 3),
        (RowLimit::Exact(10), 5),
    ] {
        let set = executor().execute(script, limit).unwrap();
        assert_eq!(set.rows.len(), expect, "limit {limit:?}");
        assert_eq!(set.columns.len(), 1, "limit {limit:?}");
        if expect > 0 {
            assert_eq!(set.rows[0].values(), &[int_cell(0)]);
        }
    }
}

#[test]
fn infinite_loop_hits_the_statement_guard() {
    let config = EngineConfig::parse("Engine=rhai;MaxStatements=100").unwrap();
    let err = ScriptExecutor::new(config)
        .execute("let x = 0; loop { x += 1; }", RowLimit::All)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ResourceExceeded {
            kind: LimitKind::Statements
        }
    ));
}

#[test]
fn runaway_allocation_hits_the_memory_guard() {
    let config = EngineConfig::parse("Engine=rhai;LimitMemory=10").unwrap();
    let err = ScriptExecutor::new(config)
        .execute(
            r#"let s = "0123456789abcdef"; loop { s += s; }"#,
            RowLimit::All,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ResourceExceeded {
            kind: LimitKind::Memory
        }
    ));
}

#[test]
fn executions_share_no_state() {
    let executor = executor();
    executor
        .execute(
            r#"
            resultset.declare_schema(#{a: "integer"});
            resultset.emit_row([1]);
            "#,
            RowLimit::All,
        )
        .unwrap();
    // The second run starts from a blank builder: no schema, no rows.
    let err = executor
        .execute("resultset.emit_row([2]);", RowLimit::All)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidResultSet));
}

#[test]
fn null_values_stay_null_across_all_column_types() {
    let set = executor()
        .execute(
            r#"
            resultset.declare_schema(#{
                a: "string", b: "integer", c: "double",
                d: "decimal", e: "boolean", f: "datetime"
            });
            resultset.emit_row([(), (), (), (), (), ()]);
            "#,
            RowLimit::All,
        )
        .unwrap();
    assert_eq!(set.rows[0].values(), &[None, None, None, None, None, None]);
}

#[test]
fn coercion_runs_per_declared_column_type() {
    let set = executor()
        .execute(
            r#"
            resultset.declare_schema([
                ["s", "string"], ["i", "integer"], ["b", "boolean"], ["t", "datetime"]
            ]);
            resultset.emit_row([42, "7", "", "2024-05-01"]);
            "#,
            RowLimit::All,
        )
        .unwrap();
    let row = set.rows[0].values();
    assert_eq!(row[0], text_cell("42"));
    assert_eq!(row[1], int_cell(7));
    assert_eq!(row[2], Some(CellValue::Bool(false)));
    match &row[3] {
        Some(CellValue::DateTime(dt)) => assert_eq!(dt.to_string(), "2024-05-01 00:00:00"),
        other => panic!("unexpected cell: {other:?}"),
    }
}

#[test]
fn unconvertible_datetime_aborts_the_execution() {
    let err = executor()
        .execute(
            r#"
            resultset.declare_schema(#{t: "datetime"});
            resultset.emit_row(["soon"]);
            "#,
            RowLimit::All,
        )
        .unwrap_err();
    assert!(matches!(err, Error::Coercion { target: "datetime", .. }));
}

#[test]
fn unhandled_script_error_is_fatal_and_discards_rows() {
    let err = executor()
        .execute(
            r#"
            resultset.declare_schema(#{a: "integer"});
            resultset.emit_row([1]);
            throw "late failure";
            "#,
            RowLimit::All,
        )
        .unwrap_err();
    assert!(matches!(err, Error::ScriptRuntime { .. }));
}

#[test]
fn result_set_serializes_to_json() {
    let set = executor()
        .execute(
            r#"
            resultset.declare_schema(#{a: "integer", b: "string"});
            resultset.emit_row([1, "x"]);
            resultset.emit_row(#{a: 2});
            "#,
            RowLimit::All,
        )
        .unwrap();
    let json = serde_json::to_value(&set).unwrap();
    assert_eq!(
        json["columns"][0],
        serde_json::json!({"name": "a", "column_type": "integer"})
    );
    assert_eq!(json["rows"][0], serde_json::json!([1, "x"]));
    assert_eq!(json["rows"][1], serde_json::json!([2, null]));
}
