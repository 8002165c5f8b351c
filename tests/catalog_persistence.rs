//! Catalog and table persistence across sessions.

mod support;

use quarrydb::datum::Type;
use quarrydb::expr::AggregateFunc;
use quarrydb::session::Session;
use quarrydb::sql::{IndexTarget, Statement};
use quarrydb::table::{ColumnDef, TableSchema};
use support::*;

#[test]
fn database_survives_session_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mut session = Session::with_root(dir.path());
        let info = SharedBuf::new();
        session.set_info(Box::new(info));
        session.create_database("school").unwrap();
        session.use_database("school").unwrap();
        session
            .create_table(TableSchema::new(
                "students",
                vec![
                    ColumnDef::new("id", Type::Int).primary_key(),
                    ColumnDef::new("name", Type::Char(16)).not_null(),
                ],
            ))
            .unwrap();
        session
            .execute(&Statement::Insert(quarrydb::sql::InsertStmt {
                table: "students".into(),
                columns: None,
                rows: vec![
                    vec![int(1), string("amy")],
                    vec![int(2), string("ben")],
                ],
            }))
            .unwrap();
        session.close_database().unwrap();
    }

    assert!(dir.path().join("school.database").exists());
    assert!(dir.path().join("students.table").exists());

    {
        let mut session = Session::with_root(dir.path());
        let out = SharedBuf::new();
        let info = SharedBuf::new();
        session.set_output(Box::new(out.clone()));
        session.set_info(Box::new(info));
        session.use_database("school").unwrap();

        session
            .execute(&select(
                &["students"],
                vec![col("id"), col("name")],
                None,
            ))
            .unwrap();
        assert_eq!(out.contents(), "id,name\n1,amy\n2,ben\n\n");

        // The primary key index was rebuilt on open: a duplicate key must
        // still be rejected.
        session
            .execute(&Statement::Insert(quarrydb::sql::InsertStmt {
                table: "students".into(),
                columns: None,
                rows: vec![vec![int(1), string("dup")]],
            }))
            .unwrap();
        out.clear();
        session
            .execute(&select(
                &["students"],
                vec![aggregate(AggregateFunc::Count, None)],
                None,
            ))
            .unwrap();
        assert_eq!(out.contents(), "COUNT(*)\n2\n\n");
    }
}

#[test]
fn secondary_index_rebuilt_on_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mut session = Session::with_root(dir.path());
        let info = SharedBuf::new();
        session.set_info(Box::new(info));
        session.create_database("shop").unwrap();
        session.use_database("shop").unwrap();
        session
            .create_table(TableSchema::new(
                "orders",
                vec![
                    ColumnDef::new("uid", Type::Int),
                    ColumnDef::new("amt", Type::Int),
                ],
            ))
            .unwrap();
        session
            .execute(&insert_ints("orders", &[&[1, 100], &[2, 50], &[1, 30]]))
            .unwrap();
        session
            .execute(&Statement::CreateIndex(IndexTarget {
                table: "orders".into(),
                column: "uid".into(),
            }))
            .unwrap();
        session.close_database().unwrap();
    }

    {
        let mut session = Session::with_root(dir.path());
        let out = SharedBuf::new();
        let info = SharedBuf::new();
        session.set_output(Box::new(out.clone()));
        session.set_info(Box::new(info.clone()));
        session.use_database("shop").unwrap();
        session
            .create_table(TableSchema::new(
                "users",
                vec![ColumnDef::new("id", Type::Int)],
            ))
            .unwrap();
        session.execute(&insert_ints("users", &[&[1], &[2]])).unwrap();

        out.clear();
        info.clear();
        session
            .execute(&select(
                &["users", "orders"],
                vec![qcol("users", "id"), qcol("orders", "amt")],
                Some(eq(qcol("users", "id"), qcol("orders", "uid"))),
            ))
            .unwrap();

        // The persisted `indexed` flag drove an index rebuild on open, so
        // the two-table index strategy applies.
        assert!(info.contents().contains("Join two tables using index."));
        assert_eq!(
            out.contents(),
            "users.id,orders.amt\n1,100\n1,30\n2,50\n\n"
        );
    }
}

#[test]
fn create_database_collision_and_missing_open() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::with_root(dir.path());
    let errors = SharedBuf::new();
    session.set_errors(Box::new(errors.clone()));

    session.create_database("dup").unwrap();
    let result = session.execute(&Statement::CreateDatabase("dup".into()));
    assert!(result.is_err());
    assert!(errors.contents().contains("database `dup` already exists"));

    errors.clear();
    let result = session.execute(&Statement::UseDatabase("missing".into()));
    assert!(result.is_err());
    assert!(errors
        .contents()
        .contains("database `missing` doesn't exists"));
}

#[test]
fn show_database_lists_tables() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::with_root(dir.path());
    let info = SharedBuf::new();
    session.set_info(Box::new(info.clone()));

    session.create_database("inventory").unwrap();
    session.use_database("inventory").unwrap();
    session
        .create_table(TableSchema::new(
            "parts",
            vec![ColumnDef::new("sku", Type::Int)],
        ))
        .unwrap();

    info.clear();
    session
        .execute(&Statement::ShowDatabase("inventory".into()))
        .unwrap();
    let listing = info.contents();
    assert!(listing.contains("[Info] Database `inventory`, 1 table(s)."));
    assert!(listing.contains("[Info]   parts"));

    info.clear();
    session
        .execute(&Statement::ShowTable("parts".into()))
        .unwrap();
    let listing = info.contents();
    assert!(listing.contains("[Info] Table `parts` (1 columns, 0 records)"));
    assert!(listing.contains("[Info]   sku INT"));
}
