use keel::{Connection, Database, DbError, Entity, Operator, Predicate, Statement, db_error};
use std::sync::Mutex;
use time::{Date, Month};

#[derive(Entity, Debug, Clone, PartialEq)]
#[keel(table = "customers")]
struct Customer {
    id: i64,
    name: String,
    email: Option<String>,
    #[keel(column = "registered_on")]
    since: Date,
    #[keel(read_only)]
    note: Option<String>,
    #[keel(ignore)]
    cached: Option<String>,
}

static MUTEX: Mutex<()> = Mutex::new(());

fn customer(name: &str, email: Option<&str>) -> Customer {
    Customer {
        id: 0,
        name: name.into(),
        email: email.map(Into::into),
        since: Date::from_calendar_date(2023, Month::March, 14).unwrap(),
        note: None,
        cached: None,
    }
}

pub fn crud<C: Connection>(database: &mut Database<C>) {
    let _lock = MUTEX.lock().unwrap();

    // Setup
    database
        .drop_table::<Customer>(true)
        .expect("Failed to drop Customer table");
    database
        .create_table::<Customer>(true)
        .expect("Failed to create Customer table");

    // Insert
    let mut ada = customer("Ada", Some("ada@example.com"));
    ada.cached = Some("not stored".into());
    let id = database
        .insert(&mut ada, None)
        .expect("Failed to insert Ada")
        .expect("The identity was not returned");
    assert_eq!(ada.id, id);
    let mut grace = customer("Grace", None);
    database
        .insert(&mut grace, None)
        .expect("Failed to insert Grace");
    assert_ne!(grace.id, ada.id);

    // Get
    let loaded = database
        .get::<Customer>(ada.id, None)
        .expect("Failed to get Ada")
        .expect("Ada was not found");
    assert_eq!(loaded.name, "Ada");
    assert_eq!(loaded.email.as_deref(), Some("ada@example.com"));
    assert_eq!(loaded.since, ada.since);
    assert_eq!(loaded.cached, None, "Ignored fields are never read");
    assert!(
        database
            .get::<Customer>(ada.id + grace.id + 100, None)
            .expect("Failed to get a missing customer")
            .is_none()
    );

    // Update
    let mut changed = loaded.clone();
    changed.name = "Ada Lovelace".into();
    changed.note = Some("never written".into());
    assert!(database.update(&changed, None).expect("Failed to update Ada"));
    let loaded = database
        .get::<Customer>(ada.id, None)
        .expect("Failed to get Ada")
        .expect("Ada was not found");
    assert_eq!(loaded.name, "Ada Lovelace");
    assert_eq!(loaded.note, None, "Read only fields are never written");
    let mut missing = changed.clone();
    missing.id = ada.id + grace.id + 100;
    assert!(!database.update(&missing, None).expect("Failed to update"));

    // Read only columns are still read
    database
        .execute(
            &Statement::new(
                "UPDATE customers SET note = ? WHERE id = ?",
                vec!["vip".into(), ada.id.into()],
            ),
            None,
        )
        .expect("Failed to set the note");
    let loaded = database
        .get::<Customer>(ada.id, None)
        .expect("Failed to get Ada")
        .expect("Ada was not found");
    assert_eq!(loaded.note.as_deref(), Some("vip"));

    // Delete
    assert!(database.delete(&grace, None).expect("Failed to delete Grace"));
    assert!(!database.delete(&grace, None).expect("Failed to delete Grace"));
    assert!(
        database
            .get::<Customer>(grace.id, None)
            .expect("Failed to get Grace")
            .is_none()
    );
    assert!(
        !database
            .delete_where::<Customer>(&Predicate::eq("name", "Nobody"), None)
            .expect("Failed to delete by name")
    );
    assert!(
        database
            .delete_where::<Customer>(&Predicate::like("name", "Ada%"), None)
            .expect("Failed to delete by name")
    );
    assert_eq!(
        database
            .count::<Customer>(None, None)
            .expect("Failed to count"),
        0
    );

    // Validation happens before anything is sent
    let error = database
        .get_list::<Customer>(Some(&Predicate::eq("nickname", "Ada")), &[], None)
        .expect_err("Unknown properties must be rejected");
    assert!(matches!(db_error(&error), Some(DbError::Mapping { .. })));
    let predicate = Predicate::between("id", 1, 2)
        .not()
        .and(Predicate::field("name", Operator::In, vec![]));
    let error = database
        .delete_where::<Customer>(&predicate, None)
        .expect_err("An empty IN list must be rejected");
    assert!(matches!(db_error(&error), Some(DbError::Validation { .. })));
}
