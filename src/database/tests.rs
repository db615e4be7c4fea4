use super::*;
use crate::record::{Attribute, DataType, SchemaViolation, Value};
use tempfile::TempDir;

fn setup_test_db() -> (TempDir, DatabaseConfig, Database) {
    let temp_dir = TempDir::new().unwrap();
    let config = DatabaseConfig::new(temp_dir.path().join("test.db"))
        .with_page_size(256)
        .with_buffer_capacity(4);
    let db = Database::open(&config).unwrap();
    (temp_dir, config, db)
}

fn users_schema() -> Schema {
    Schema::new(vec![
        Attribute::new("id", DataType::Int, true, true),
        Attribute::new("name", DataType::Varchar(16), false, false),
        Attribute::new("score", DataType::Float, false, false),
    ])
    .unwrap()
}

fn user(id: i32, name: &str) -> Record {
    Record::new(vec![Value::Int(id), Value::from(name), Value::Float(id as f64 * 1.5)])
}

#[test]
fn test_config_defaults() {
    let config = DatabaseConfig::new("data/app.db");
    assert_eq!(config.page_size, PAGE_SIZE);
    assert_eq!(config.buffer_capacity, BUFFER_POOL_SIZE);
    assert_eq!(config.path, PathBuf::from("data/app.db"));
}

#[test]
fn test_create_table_and_insert() {
    let (_temp, _config, mut db) = setup_test_db();

    db.create_table("users", users_schema()).unwrap();
    db.insert("users", user(1, "alice")).unwrap();
    db.insert("users", user(2, "bob")).unwrap();

    assert_eq!(db.scan("users").unwrap(), vec![user(1, "alice"), user(2, "bob")]);
    assert_eq!(db.table_names(), vec!["users".to_string()]);
    assert_eq!(db.page_size().unwrap(), 256);
}

#[test]
fn test_duplicate_table() {
    let (_temp, _config, mut db) = setup_test_db();

    db.create_table("users", users_schema()).unwrap();
    let result = db.create_table("USERS", users_schema());
    assert!(matches!(result, Err(DatabaseError::TableExists(_))));
}

#[test]
fn test_table_names_are_case_insensitive() {
    let (_temp, _config, mut db) = setup_test_db();

    db.create_table("Users", users_schema()).unwrap();
    db.insert("USERS", user(1, "a")).unwrap();
    assert_eq!(db.scan("users").unwrap().len(), 1);
    assert_eq!(db.table("uSeRs").unwrap().name(), "Users");
}

#[test]
fn test_unknown_table() {
    let (_temp, _config, mut db) = setup_test_db();

    assert!(matches!(
        db.insert("missing", user(1, "a")),
        Err(DatabaseError::TableNotFound(_))
    ));
    assert!(matches!(db.scan("missing"), Err(DatabaseError::TableNotFound(_))));
    assert!(matches!(
        db.drop_table("missing"),
        Err(DatabaseError::TableNotFound(_))
    ));
}

#[test]
fn test_duplicate_primary_key() {
    let (_temp, _config, mut db) = setup_test_db();
    let schema = Schema::new(vec![
        Attribute::new("id", DataType::Int, true, true),
        Attribute::new("name", DataType::Text, false, false),
    ])
    .unwrap();
    db.create_table("t", schema).unwrap();

    db.insert("t", Record::new(vec![Value::Int(1), Value::from("a")]))
        .unwrap();
    let result = db.insert("t", Record::new(vec![Value::Int(1), Value::from("b")]));
    assert!(matches!(
        result,
        Err(DatabaseError::RecordError(RecordError::DuplicateKey { .. }))
    ));
    assert_eq!(
        db.scan("t").unwrap(),
        vec![Record::new(vec![Value::Int(1), Value::from("a")])]
    );
}

#[test]
fn test_insert_batch_keeps_rows_before_failure() {
    let (_temp, _config, mut db) = setup_test_db();
    db.create_table("users", users_schema()).unwrap();

    let rows = vec![
        user(1, "a"),
        user(2, "b"),
        user(1, "dup"),
        user(3, "never"),
    ];
    let summary = db.insert_batch("users", rows).unwrap();
    assert_eq!(summary.inserted, 2);
    assert!(!summary.is_complete());
    assert!(matches!(
        summary.failure,
        Some(RecordError::DuplicateKey { .. })
    ));
    assert_eq!(db.scan("users").unwrap(), vec![user(1, "a"), user(2, "b")]);

    let summary = db.insert_batch("users", vec![user(3, "c"), user(4, "d")]).unwrap();
    assert_eq!(summary.inserted, 2);
    assert!(summary.is_complete());
}

#[test]
fn test_insert_batch_schema_violation() {
    let (_temp, _config, mut db) = setup_test_db();
    db.create_table("users", users_schema()).unwrap();

    let summary = db
        .insert_batch("users", vec![user(1, "a"), user(2, "a name that is far too long")])
        .unwrap();
    assert_eq!(summary.inserted, 1);
    assert!(matches!(
        summary.failure,
        Some(RecordError::SchemaViolation(SchemaViolation::TooLong { max: 16, .. }))
    ));
}

#[test]
fn test_rows_span_many_pages() {
    let (_temp, _config, mut db) = setup_test_db();
    db.create_table("users", users_schema()).unwrap();

    let rows: Vec<Record> = (0..200).map(|i| user(i, "someone")).collect();
    let summary = db.insert_batch("users", rows.clone()).unwrap();
    assert!(summary.is_complete());

    let table = db.table("users").unwrap();
    assert!(table.page_ids().len() > 4);
    assert_eq!(table.row_count().unwrap(), 200);
    assert_eq!(db.scan("users").unwrap(), rows);
}

#[test]
fn test_close_and_reopen_with_catalog() {
    let (_temp, config, mut db) = setup_test_db();
    db.create_table("users", users_schema()).unwrap();
    for i in 0..50 {
        db.insert("users", user(i, "n")).unwrap();
    }

    // The catalog stores table metadata in its own format
    let saved = serde_json::to_string(&db.table_metas()).unwrap();
    db.close().unwrap();

    let metas: Vec<TableMeta> = serde_json::from_str(&saved).unwrap();
    let mut db = Database::open_with_tables(&config, metas).unwrap();
    assert!(db.table("users").unwrap().is_bound());
    assert_eq!(db.scan("users").unwrap().len(), 50);

    assert!(matches!(
        db.insert("users", user(10, "dup")),
        Err(DatabaseError::RecordError(RecordError::DuplicateKey { .. }))
    ));
    db.insert("users", user(50, "new")).unwrap();
    assert_eq!(db.scan("users").unwrap().len(), 51);
}

#[test]
fn test_catalog_rejects_invalid_schema() {
    let json = r#"[{"name":"t","schema":[{"name":"a","data_type":"Int","not_null":true,"primary_key":false}],"page_ids":[]}]"#;
    let result: Result<Vec<TableMeta>, _> = serde_json::from_str(json);
    assert!(result.is_err());
}

#[test]
fn test_open_with_tables_rejects_bad_pages() {
    let (_temp, config, db) = setup_test_db();
    db.close().unwrap();

    let meta = TableMeta {
        name: "users".to_string(),
        schema: users_schema(),
        page_ids: vec![3],
    };
    let result = Database::open_with_tables(&config, vec![meta]);
    assert!(matches!(
        result,
        Err(DatabaseError::RecordError(RecordError::File(
            FileError::OutOfBounds { page_id: 3, .. }
        )))
    ));
}

#[test]
fn test_open_with_tables_rejects_duplicate_names() {
    let (_temp, config, db) = setup_test_db();
    db.close().unwrap();

    let meta = |name: &str| TableMeta {
        name: name.to_string(),
        schema: users_schema(),
        page_ids: Vec::new(),
    };
    let result = Database::open_with_tables(&config, vec![meta("users"), meta("Users")]);
    assert!(matches!(result, Err(DatabaseError::TableExists(_))));
}

#[test]
fn test_reopen_keeps_stored_page_size() {
    let (_temp, config, db) = setup_test_db();
    db.close().unwrap();

    let db = Database::open(&config.clone().with_page_size(4096)).unwrap();
    assert_eq!(db.page_size().unwrap(), 256);
}

#[test]
fn test_drop_table_reclaims_pages() {
    let (_temp, _config, mut db) = setup_test_db();
    db.create_table("old", users_schema()).unwrap();
    let rows: Vec<Record> = (0..60).map(|i| user(i, "row")).collect();
    db.insert_batch("old", rows.clone()).unwrap();

    let old_pages = db.table("old").unwrap().page_ids().to_vec();
    let page_count = db.page_count().unwrap();

    db.drop_table("old").unwrap();
    assert!(db.table("old").is_err());
    assert_eq!(db.free_pages().unwrap(), old_pages);

    // A new table reuses the freed pages instead of growing the file
    db.create_table("new", users_schema()).unwrap();
    db.insert_batch("new", rows.clone()).unwrap();
    assert_eq!(db.page_count().unwrap(), page_count);
    assert!(db.free_pages().unwrap().is_empty());
    assert_eq!(db.scan("new").unwrap(), rows);
}

#[test]
fn test_drop_then_recreate_same_name() {
    let (_temp, _config, mut db) = setup_test_db();
    db.create_table("users", users_schema()).unwrap();
    db.insert("users", user(1, "a")).unwrap();

    db.drop_table("users").unwrap();
    db.create_table("users", users_schema()).unwrap();
    assert!(db.scan("users").unwrap().is_empty());
    db.insert("users", user(1, "again")).unwrap();
}

#[test]
fn test_flush_persists_without_close() {
    let (_temp, config, mut db) = setup_test_db();
    db.create_table("users", users_schema()).unwrap();
    db.insert("users", user(7, "x")).unwrap();
    db.flush().unwrap();

    let page_id = db.table("users").unwrap().page_ids()[0];
    let mut storage = StorageManager::open(&config.path, config.page_size).unwrap();
    let bytes = storage.read_page_bytes(page_id).unwrap();
    let page = Page::decode(page_id, &bytes).unwrap();
    assert_eq!(page.records(), &[user(7, "x")]);
}

#[test]
fn test_page_inspection() {
    let (_temp, _config, mut db) = setup_test_db();
    db.create_table("users", users_schema()).unwrap();
    db.insert("users", user(1, "a")).unwrap();

    let page = db.page(1).unwrap();
    assert_eq!(page.len(), 1);
    assert!(matches!(
        db.page(0),
        Err(DatabaseError::FileError(FileError::ReservedPage(0)))
    ));
}

#[test]
fn test_select_orders_by_primary_key() {
    let (_temp, _config, mut db) = setup_test_db();
    let schema = Schema::new(vec![
        Attribute::new("name", DataType::Text, false, false),
        Attribute::new("code", DataType::Varchar(8), false, true),
    ])
    .unwrap();
    db.create_table("items", schema).unwrap();

    let row = |name: &str, code: Option<&str>| {
        Record::new(vec![Value::from(name), code.map_or(Value::Null, Value::from)])
    };
    let rows = vec![
        row("pear", Some("m")),
        row("first null", None),
        row("apple", Some("b")),
        row("second null", None),
        row("fig", Some("z")),
    ];
    db.insert_batch("items", rows.clone()).unwrap();

    // Storage order is untouched by select
    assert_eq!(db.scan("items").unwrap(), rows);
    assert_eq!(
        db.select("items").unwrap(),
        vec![
            row("first null", None),
            row("second null", None),
            row("apple", Some("b")),
            row("pear", Some("m")),
            row("fig", Some("z")),
        ]
    );
}

#[test]
fn test_select_spans_pages() {
    let (_temp, _config, mut db) = setup_test_db();
    db.create_table("users", users_schema()).unwrap();

    let ids: Vec<i32> = (0..60).map(|i| (i * 37) % 60 - 30).collect();
    db.insert_batch("users", ids.iter().map(|&i| user(i, "u"))).unwrap();
    assert!(db.table("users").unwrap().page_ids().len() > 1);

    let selected: Vec<i32> = db
        .select("users")
        .unwrap()
        .iter()
        .map(|r| match r.get(0) {
            Some(Value::Int(i)) => *i,
            other => panic!("unexpected key {:?}", other),
        })
        .collect();
    assert_eq!(selected, (-30..30).collect::<Vec<_>>());
    assert!(matches!(db.select("missing"), Err(DatabaseError::TableNotFound(_))));
}

#[test]
fn test_failed_drop_keeps_table() {
    let (_temp, config, mut db) = setup_test_db();
    db.create_table("users", users_schema()).unwrap();
    db.insert_batch("users", (0..30).map(|i| user(i, "row"))).unwrap();
    db.flush().unwrap();

    let pages = db.table("users").unwrap().page_ids().to_vec();
    let file_len = std::fs::metadata(&config.path).unwrap().len();
    let file = std::fs::OpenOptions::new()
        .write(true)
        .open(&config.path)
        .unwrap();

    // With the data pages cut off, freeing them fails
    file.set_len(config.page_size as u64).unwrap();
    assert!(matches!(
        db.drop_table("users"),
        Err(DatabaseError::FileError(FileError::OutOfBounds { .. }))
    ));
    assert!(db.table("users").is_ok());
    assert!(db.free_pages().unwrap().is_empty());

    file.set_len(file_len).unwrap();
    db.drop_table("users").unwrap();
    assert!(db.table("users").is_err());
    assert_eq!(db.free_pages().unwrap(), pages);
}
