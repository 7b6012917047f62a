use crate::silent_logs;
use keel::{AsValue, Connection, Database, DbError, Entity, KeyType, Statement, Value, db_error};
use std::sync::{Arc, Mutex};

#[derive(Entity, Debug, Clone, PartialEq)]
#[keel(table = "measurements")]
struct Measurement {
    #[keel(key = "assigned")]
    code: String,
    #[keel(column = "reading")]
    value: f64,
}

static MUTEX: Mutex<()> = Mutex::new(());

pub fn raw<C: Connection>(database: &mut Database<C>) {
    let _lock = MUTEX.lock().unwrap();

    // Mapping
    let mapping = database.get_map::<Measurement>();
    assert!(Arc::ptr_eq(&mapping, &database.get_map::<Measurement>()));
    assert_eq!(mapping.table.name, "measurements");
    let key = mapping.keys().collect::<Vec<_>>();
    assert_eq!(key.len(), 1);
    assert_eq!(key[0].column, "code");
    assert_eq!(key[0].key, KeyType::Assigned);
    assert_eq!(
        mapping.column("value").map(|v| v.column.as_str()),
        Some("reading")
    );
    assert_ne!(database.next_guid(), database.next_guid());

    // Setup
    database
        .drop_table::<Measurement>(true)
        .expect("Failed to drop Measurement table");
    database
        .create_table::<Measurement>(true)
        .expect("Failed to create Measurement table");

    // Statements written by hand
    let affected = database
        .execute(
            &Statement::new(
                "INSERT INTO measurements (code, reading) VALUES (?, ?), (?, ?)",
                vec!["a".into(), 1.5.into(), "b".into(), 2.5.into()],
            ),
            None,
        )
        .expect("Failed to insert the measurements");
    assert_eq!(affected.rows_affected, 2);
    let rows = database
        .query(
            &Statement::raw("SELECT SUM(reading) AS total, COUNT(*) AS n FROM measurements"),
            None,
        )
        .expect("Failed to query the total");
    assert_eq!(rows.len(), 1);
    let total = rows[0].get_column("total").cloned().unwrap_or_default();
    assert_eq!(f64::try_from_value(total).unwrap(), 4.0);
    assert_eq!(rows[0].get_column("n"), Some(&Value::Int64(Some(2))));
    let loaded = database
        .get::<Measurement>("b".to_string(), None)
        .expect("Failed to get the measurement")
        .expect("The measurement was not found");
    assert_eq!(loaded.value, 2.5);

    // Assigned keys are not returned
    let mut measurement = Measurement {
        code: "c".into(),
        value: 0.5,
    };
    assert_eq!(
        database
            .insert(&mut measurement, None)
            .expect("Failed to insert the measurement"),
        None
    );

    // The cache can be rebuilt
    database.clear_cache();
    let rebuilt = database.get_map::<Measurement>();
    assert!(!Arc::ptr_eq(&mapping, &rebuilt));
    assert_eq!(*mapping, *rebuilt);

    // Provider failures
    silent_logs! {
        let error = database
            .execute(&Statement::raw("INSERT INTO missing_table VALUES (1)"), None)
            .expect_err("The table does not exist");
        assert!(matches!(db_error(&error), Some(DbError::Provider { .. })));
        assert!(format!("{:#}", error).contains("missing_table"));
        let mut duplicate = measurement.clone();
        let error = database
            .insert(&mut duplicate, None)
            .expect_err("The key is already taken");
        assert!(matches!(db_error(&error), Some(DbError::Provider { .. })));
    }
}
