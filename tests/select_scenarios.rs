//! End-to-end statement scenarios: exact result-stream bytes and
//! diagnostic lines.

mod support;

use quarrydb::datum::{Type, Value};
use quarrydb::expr::{AggregateFunc, BinaryOperator, Expr};
use quarrydb::sql::{DeleteStmt, InsertStmt, Statement, UpdateStmt};
use quarrydb::table::{ColumnDef, TableSchema};
use support::*;

/// Table `t(a INT, b INT)` with rows (1,10), (2,20), (3,30).
fn setup_t(ts: &mut TestSession) {
    ts.run(&Statement::CreateTable(TableSchema::new(
        "t",
        vec![
            ColumnDef::new("a", Type::Int),
            ColumnDef::new("b", Type::Int),
        ],
    )));
    ts.run(&insert_ints("t", &[&[1, 10], &[2, 20], &[3, 30]]));
    ts.reset_streams();
}

#[test]
fn single_table_scan_with_filter() {
    let mut ts = TestSession::open();
    setup_t(&mut ts);

    ts.run(&select(
        &["t"],
        vec![col("a"), col("b")],
        Some(binary(col("b"), BinaryOperator::Gt, int(15))),
    ));

    assert_eq!(ts.out.contents(), "a,b\n2,20\n3,30\n\n");
    assert!(ts.info.contents().contains("[Info] 2 row(s) selected."));
    assert!(ts.errors.contents().is_empty());
}

#[test]
fn select_star_dumps_all_columns() {
    let mut ts = TestSession::open();
    setup_t(&mut ts);

    ts.run(&select(&["t"], vec![], None));

    assert_eq!(
        ts.out.contents(),
        "t.a,t.b\n1,10\n2,20\n3,30\n\n"
    );
    assert!(ts.info.contents().contains("[Info] 3 row(s) selected."));
}

#[test]
fn two_table_index_join_order() {
    let mut ts = TestSession::open();
    ts.run(&Statement::CreateTable(TableSchema::new(
        "users",
        vec![
            ColumnDef::new("id", Type::Int).primary_key(),
            ColumnDef::new("name", Type::Char(8)),
        ],
    )));
    ts.run(&Statement::CreateTable(TableSchema::new(
        "orders",
        vec![
            ColumnDef::new("uid", Type::Int).indexed(),
            ColumnDef::new("amt", Type::Int),
        ],
    )));
    ts.run(&Statement::Insert(InsertStmt {
        table: "users".into(),
        columns: None,
        rows: vec![
            vec![int(1), string("A")],
            vec![int(2), string("B")],
        ],
    }));
    ts.run(&insert_ints("orders", &[&[1, 100], &[2, 50], &[1, 30]]));
    ts.reset_streams();

    ts.run(&select(
        &["users", "orders"],
        vec![qcol("users", "name"), qcol("orders", "amt")],
        Some(eq(qcol("users", "id"), qcol("orders", "uid"))),
    ));

    // Outer scan of users in insertion order, index traversal of orders.
    assert_eq!(
        ts.out.contents(),
        "users.name,orders.amt\nA,100\nA,30\nB,50\n\n"
    );
    assert!(ts
        .info
        .contents()
        .contains("[Info] Join two tables using index."));
    assert!(ts.info.contents().contains("[Info] 3 row(s) selected."));
}

#[test]
fn two_table_join_without_index_enumerates() {
    let mut ts = TestSession::open();
    ts.run(&Statement::CreateTable(TableSchema::new(
        "l",
        vec![ColumnDef::new("x", Type::Int)],
    )));
    ts.run(&Statement::CreateTable(TableSchema::new(
        "r",
        vec![ColumnDef::new("x", Type::Int)],
    )));
    ts.run(&insert_ints("l", &[&[1], &[2]]));
    ts.run(&insert_ints("r", &[&[2], &[3]]));
    ts.reset_streams();

    ts.run(&select(
        &["l", "r"],
        vec![qcol("l", "x"), qcol("r", "x")],
        Some(eq(qcol("l", "x"), qcol("r", "x"))),
    ));

    assert_eq!(ts.out.contents(), "l.x,r.x\n2,2\n\n");
    let info = ts.info.contents();
    assert!(info.contains("[Info] No index for l.x and r.x"));
    assert!(info.contains("[Info] Join two tables by enumerating."));
}

#[test]
fn three_table_longest_path_planning() {
    let mut ts = TestSession::open();
    ts.run(&Statement::CreateTable(TableSchema::new(
        "A",
        vec![ColumnDef::new("x", Type::Int).indexed()],
    )));
    ts.run(&Statement::CreateTable(TableSchema::new(
        "B",
        vec![
            ColumnDef::new("y", Type::Int).indexed(),
            ColumnDef::new("x", Type::Int),
        ],
    )));
    ts.run(&Statement::CreateTable(TableSchema::new(
        "C",
        vec![
            ColumnDef::new("z", Type::Int),
            ColumnDef::new("y", Type::Int),
        ],
    )));
    ts.run(&insert_ints("A", &[&[1], &[2]]));
    ts.run(&insert_ints("B", &[&[10, 1], &[20, 2]]));
    ts.run(&insert_ints("C", &[&[7, 10], &[8, 20]]));
    ts.reset_streams();

    ts.run(&select(
        &["A", "B", "C"],
        vec![qcol("C", "z"), qcol("A", "x")],
        Some(and(
            eq(qcol("C", "y"), qcol("B", "y")),
            eq(qcol("B", "x"), qcol("A", "x")),
        )),
    ));

    let info = ts.info.contents();
    assert!(info.contains("[Info] Iteration order: C, B, A"));
    assert!(info.contains("[Info] Index use: B.y, A.x"));
    assert!(info.contains("[Info] Join many tables by enumerating."));
    assert_eq!(ts.out.contents(), "C.z,A.x\n7,1\n8,2\n\n");
}

#[test]
fn aggregate_count_star() {
    let mut ts = TestSession::open();
    setup_t(&mut ts);

    ts.run(&select(
        &["t"],
        vec![aggregate(AggregateFunc::Count, None)],
        Some(binary(col("a"), BinaryOperator::Neq, int(2))),
    ));

    assert_eq!(ts.out.contents(), "COUNT(*)\n2\n\n");
    assert!(ts.info.contents().contains("[Info] 2 row(s) selected."));
}

#[test]
fn aggregate_min_max_sum_avg() {
    let mut ts = TestSession::open();
    setup_t(&mut ts);

    for (func, expected) in [
        (AggregateFunc::Min, "MIN(b)\n10\n\n"),
        (AggregateFunc::Max, "MAX(b)\n30\n\n"),
        (AggregateFunc::Sum, "SUM(b)\n60\n\n"),
        (AggregateFunc::Avg, "AVG(b)\n20.000000\n\n"),
    ] {
        ts.reset_streams();
        ts.run(&select(&["t"], vec![aggregate(func, Some(col("b")))], None));
        assert_eq!(ts.out.contents(), expected, "{func:?}");
    }
}

#[test]
fn aggregate_over_empty_set() {
    let mut ts = TestSession::open();
    setup_t(&mut ts);

    let none = Some(binary(col("a"), BinaryOperator::Gt, int(100)));

    ts.run(&select(
        &["t"],
        vec![aggregate(AggregateFunc::Count, None)],
        none.clone(),
    ));
    assert_eq!(ts.out.contents(), "COUNT(*)\n0\n\n");

    ts.reset_streams();
    ts.run(&select(
        &["t"],
        vec![aggregate(AggregateFunc::Avg, Some(col("a")))],
        none,
    ));
    assert_eq!(ts.out.contents(), "AVG(a)\nNULL\n\n");
}

#[test]
fn aggregate_over_string_column_fails() {
    let mut ts = TestSession::open();
    ts.run(&Statement::CreateTable(TableSchema::new(
        "s",
        vec![ColumnDef::new("name", Type::Char(8))],
    )));
    ts.run(&Statement::Insert(InsertStmt {
        table: "s".into(),
        columns: None,
        rows: vec![vec![string("x")]],
    }));
    ts.reset_streams();

    let result = ts.session.execute(&select(
        &["s"],
        vec![aggregate(AggregateFunc::Sum, Some(col("name")))],
        None,
    ));
    assert!(result.is_err());
    assert!(ts.errors.contents().contains("[Error]"));
    // The summary line is not emitted after a failure.
    assert!(!ts.info.contents().contains("row(s) selected"));
}

#[test]
fn insert_with_arity_error_fails_tuple() {
    let mut ts = TestSession::open();
    setup_t(&mut ts);

    // INSERT INTO t(a) VALUES (1, 2): one tuple, wrong arity.
    ts.run(&Statement::Insert(InsertStmt {
        table: "t".into(),
        columns: Some(vec!["a".into()]),
        rows: vec![vec![int(1), int(2)]],
    }));

    assert!(ts
        .info
        .contents()
        .contains("[Info] 0 row(s) inserted, 1 row(s) failed."));
    assert!(ts.errors.contents().contains("column size not equal"));

    // Table unchanged.
    ts.reset_streams();
    ts.run(&select(
        &["t"],
        vec![aggregate(AggregateFunc::Count, None)],
        None,
    ));
    assert_eq!(ts.out.contents(), "COUNT(*)\n3\n\n");
}

#[test]
fn insert_mixed_tuples_reports_both_counts() {
    let mut ts = TestSession::open();
    setup_t(&mut ts);

    ts.run(&Statement::Insert(InsertStmt {
        table: "t".into(),
        columns: None,
        rows: vec![
            vec![int(4), int(40)],
            vec![string("bad"), int(50)],
            vec![int(6), int(60)],
        ],
    }));

    assert!(ts
        .info
        .contents()
        .contains("[Info] 2 row(s) inserted, 1 row(s) failed."));
    assert!(ts.errors.contents().contains("incompatible type"));
}

#[test]
fn delete_with_predicate() {
    let mut ts = TestSession::open();
    setup_t(&mut ts);

    ts.run(&Statement::Delete(DeleteStmt {
        table: "t".into(),
        filter: Some(eq(col("a"), int(2))),
    }));
    assert!(ts.info.contents().contains("[Info] 1 row(s) deleted."));

    ts.reset_streams();
    ts.run(&select(
        &["t"],
        vec![aggregate(AggregateFunc::Count, None)],
        None,
    ));
    assert_eq!(ts.out.contents(), "COUNT(*)\n2\n\n");
}

#[test]
fn update_reports_success_and_failure_counts() {
    let mut ts = TestSession::open();
    setup_t(&mut ts);

    // b := b + 1 for a <> 2.
    ts.run(&Statement::Update(UpdateStmt {
        table: "t".into(),
        column: "b".into(),
        value: binary(col("b"), BinaryOperator::Add, int(1)),
        filter: Some(binary(col("a"), BinaryOperator::Neq, int(2))),
    }));
    assert!(ts
        .info
        .contents()
        .contains("[Info] 2 row(s) updated, 0 row(s) failed."));

    ts.reset_streams();
    ts.run(&select(&["t"], vec![col("b")], None));
    assert_eq!(ts.out.contents(), "b\n11\n20\n31\n\n");

    // An incompatible value expression fails each matched row.
    ts.reset_streams();
    ts.run(&Statement::Update(UpdateStmt {
        table: "t".into(),
        column: "b".into(),
        value: string("nope"),
        filter: None,
    }));
    assert!(ts
        .info
        .contents()
        .contains("[Info] 0 row(s) updated, 3 row(s) failed."));
}

#[test]
fn like_and_is_null_filters() {
    let mut ts = TestSession::open();
    ts.run(&Statement::CreateTable(TableSchema::new(
        "people",
        vec![
            ColumnDef::new("name", Type::Char(16)),
            ColumnDef::new("nick", Type::Char(16)),
        ],
    )));
    ts.run(&Statement::Insert(InsertStmt {
        table: "people".into(),
        columns: None,
        rows: vec![
            vec![string("alice"), string("al")],
            vec![string("bob"), Expr::Literal(Value::Null)],
            vec![string("carol"), string("cc")],
        ],
    }));
    ts.reset_streams();

    ts.run(&select(
        &["people"],
        vec![col("name")],
        Some(binary(col("name"), BinaryOperator::Like, string("%o%"))),
    ));
    assert_eq!(ts.out.contents(), "name\nbob\ncarol\n\n");

    ts.reset_streams();
    ts.run(&select(
        &["people"],
        vec![col("name")],
        Some(Expr::Unary {
            op: quarrydb::expr::UnaryOperator::IsNull,
            operand: Box::new(col("nick")),
        }),
    ));
    assert_eq!(ts.out.contents(), "name\nbob\n\n");
}

#[test]
fn date_and_bool_rendering() {
    let mut ts = TestSession::open();
    ts.run(&Statement::CreateTable(TableSchema::new(
        "events",
        vec![
            ColumnDef::new("day", Type::Date),
            ColumnDef::new("done", Type::Bool),
        ],
    )));
    ts.run(&Statement::Insert(InsertStmt {
        table: "events".into(),
        columns: None,
        rows: vec![vec![
            string("2024-02-29"),
            Expr::Literal(Value::Bool(true)),
        ]],
    }));
    ts.reset_streams();

    ts.run(&select(&["events"], vec![col("day"), col("done")], None));
    assert_eq!(ts.out.contents(), "day,done\n2024-02-29,TRUE\n\n");
}

#[test]
fn select_missing_table_reports_error() {
    let mut ts = TestSession::open();
    let result = ts
        .session
        .execute(&select(&["ghost"], vec![col("a")], None));
    assert!(result.is_err());
    assert!(ts
        .errors
        .contents()
        .contains("[Error] table `ghost` doesn't exists."));
}

#[test]
fn statement_without_open_database_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = quarrydb::session::Session::with_root(dir.path());
    let errors = SharedBuf::new();
    session.set_errors(Box::new(errors.clone()));

    let result = session.execute(&select(&["t"], vec![col("a")], None));
    assert!(result.is_err());
    assert!(errors.contents().contains("database is not opened"));
}
