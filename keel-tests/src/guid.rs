use keel::{Connection, Database, DbError, Entity, Predicate, Sort, db_error};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Entity, Debug, Clone, PartialEq)]
struct Document {
    id: Uuid,
    title: String,
    pages: i32,
}

#[derive(Entity, Debug, Clone, PartialEq)]
#[keel(table = "order_lines")]
struct OrderLine {
    #[keel(key)]
    order_id: i64,
    #[keel(key)]
    line: i32,
    product: String,
    quantity: u32,
}

#[derive(Entity, Debug, Clone, PartialEq)]
struct AuditEntry {
    actor: String,
    action: String,
}

static MUTEX: Mutex<()> = Mutex::new(());

pub fn guid<C: Connection>(database: &mut Database<C>) {
    let _lock = MUTEX.lock().unwrap();

    // Setup
    database
        .drop_table::<Document>(true)
        .expect("Failed to drop Document table");
    database
        .create_table::<Document>(false)
        .expect("Failed to create Document table");
    database
        .drop_table::<OrderLine>(true)
        .expect("Failed to drop OrderLine table");
    database
        .create_table::<OrderLine>(false)
        .expect("Failed to create OrderLine table");
    database
        .drop_table::<AuditEntry>(true)
        .expect("Failed to drop AuditEntry table");
    database
        .create_table::<AuditEntry>(false)
        .expect("Failed to create AuditEntry table");

    // Nil guid keys are generated
    let mut manual = Document {
        id: Uuid::nil(),
        title: "Manual".into(),
        pages: 120,
    };
    let key = database
        .insert(&mut manual, None)
        .expect("Failed to insert the manual")
        .expect("The generated guid was not returned");
    assert!(!manual.id.is_nil());
    assert_eq!(key, manual.id);
    let loaded = database
        .get::<Document>(manual.id, None)
        .expect("Failed to get the manual")
        .expect("The manual was not found");
    assert_eq!(loaded, manual);

    // Assigned guid keys are kept
    let id = Uuid::parse_str("0b1c8e0e-5d0a-4f3b-9a41-0f5c2b7e8d11").unwrap();
    let mut notes = Document {
        id,
        title: "Notes".into(),
        pages: 3,
    };
    assert_eq!(
        database
            .insert(&mut notes, None)
            .expect("Failed to insert the notes"),
        None
    );
    assert_eq!(notes.id, id);

    let mut drafts = vec![
        Document {
            id: Uuid::nil(),
            title: "Draft 1".into(),
            pages: 1,
        },
        Document {
            id: Uuid::nil(),
            title: "Draft 2".into(),
            pages: 2,
        },
    ];
    let inserted = database
        .insert_many(&mut drafts, None)
        .expect("Failed to insert the drafts");
    assert_eq!(inserted, 2);
    assert!(drafts.iter().all(|v| !v.id.is_nil()));
    assert_ne!(drafts[0].id, drafts[1].id);
    let titles = database
        .get_list::<Document>(
            Some(&Predicate::like("title", "Draft%")),
            &[Sort::desc("pages")],
            None,
        )
        .expect("Failed to list the drafts")
        .into_iter()
        .map(|v| v.title)
        .collect::<Vec<_>>();
    assert_eq!(titles, ["Draft 2", "Draft 1"]);

    // Composite keys
    let mut lines = (1..=3)
        .map(|line| OrderLine {
            order_id: 42,
            line,
            product: format!("product {}", line),
            quantity: line as u32 * 10,
        })
        .collect::<Vec<_>>();
    assert_eq!(
        database
            .insert_many(&mut lines, None)
            .expect("Failed to insert the order lines"),
        3
    );
    let second = database
        .get::<OrderLine>((42, 2), None)
        .expect("Failed to get the order line")
        .expect("The order line was not found");
    assert_eq!(second, lines[1]);
    let mut changed = second.clone();
    changed.quantity = 7;
    assert!(database.update(&changed, None).expect("Failed to update"));
    assert!(database.delete(&lines[0], None).expect("Failed to delete"));
    let remaining = database
        .get_list::<OrderLine>(None, &[Sort::asc("line")], None)
        .expect("Failed to list the order lines");
    assert_eq!(remaining, [changed, lines[2].clone()]);

    // Keyless entities can only be inserted and queried
    let mut entries = vec![
        AuditEntry {
            actor: "ada".into(),
            action: "login".into(),
        },
        AuditEntry {
            actor: "grace".into(),
            action: "logout".into(),
        },
    ];
    assert_eq!(
        database
            .insert_many(&mut entries, None)
            .expect("Failed to insert the audit entries"),
        2
    );
    let error = database
        .update(&entries[0], None)
        .expect_err("Keyless entities cannot be updated");
    assert!(matches!(db_error(&error), Some(DbError::Validation { .. })));
    let error = database
        .delete(&entries[0], None)
        .expect_err("Keyless entities cannot be deleted by key");
    assert!(matches!(db_error(&error), Some(DbError::Validation { .. })));
    assert!(
        database
            .delete_where::<AuditEntry>(&Predicate::eq("actor", "ada"), None)
            .expect("Failed to delete by actor")
    );
    assert_eq!(
        database
            .count::<AuditEntry>(None, None)
            .expect("Failed to count"),
        1
    );
}
