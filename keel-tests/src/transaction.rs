use crate::silent_logs;
use keel::{
    Connection, Database, DbError, Entity, IsolationLevel, Predicate, Transaction, db_error,
};
use std::sync::Mutex;

#[derive(Entity, Debug, Clone, PartialEq)]
struct Account {
    id: i64,
    owner: String,
    balance: i64,
}

static MUTEX: Mutex<()> = Mutex::new(());

fn account(owner: &str, balance: i64) -> Account {
    Account {
        id: 0,
        owner: owner.into(),
        balance,
    }
}

fn is_transaction_state(error: &keel::Error) -> bool {
    matches!(db_error(error), Some(DbError::TransactionState(..)))
}

pub fn transaction<C: Connection>(database: &mut Database<C>) {
    let _lock = MUTEX.lock().unwrap();

    // Setup
    database
        .drop_table::<Account>(true)
        .expect("Failed to drop Account table");
    database
        .create_table::<Account>(false)
        .expect("Failed to create Account table");

    // Rollback
    database
        .begin_transaction(IsolationLevel::default())
        .expect("Could not begin a transaction");
    assert!(database.has_active_transaction());
    let mut first = account("ada", 100);
    database
        .insert(&mut first, None)
        .expect("Failed to insert inside the transaction");
    assert_eq!(
        database
            .get::<Account>(first.id, None)
            .expect("Failed to get inside the transaction"),
        Some(first.clone())
    );
    database.rollback().expect("Failed to roll back");
    assert!(!database.has_active_transaction());
    assert!(
        database
            .get::<Account>(first.id, None)
            .expect("Failed to get after the rollback")
            .is_none()
    );

    // Commit
    database
        .begin_transaction(IsolationLevel::Serializable)
        .expect("Could not begin a transaction");
    let mut second = account("grace", 50);
    database
        .insert(&mut second, None)
        .expect("Failed to insert inside the transaction");
    let inside = database
        .get::<Account>(second.id, None)
        .expect("Failed to get inside the transaction");
    assert_eq!(inside, Some(second.clone()));
    database.commit().expect("Failed to commit");
    assert_eq!(
        database
            .get::<Account>(second.id, None)
            .expect("Failed to get after the commit"),
        inside
    );

    // Illegal transitions
    let error = database.commit().expect_err("Nothing to commit");
    assert!(is_transaction_state(&error));
    let error = database.rollback().expect_err("Nothing to roll back");
    assert!(is_transaction_state(&error));
    database
        .begin_transaction(IsolationLevel::default())
        .expect("Could not begin a transaction");
    let error = database
        .begin_transaction(IsolationLevel::default())
        .expect_err("Transactions do not nest");
    assert!(is_transaction_state(&error));
    assert!(database.has_active_transaction());
    database.rollback().expect("Failed to roll back");

    // Scoped transactions
    let moved = database
        .run_in_transaction(IsolationLevel::default(), |db| {
            let mut from = db
                .get::<Account>(second.id, None)?
                .expect("The account exists");
            from.balance -= 20;
            db.update(&from, None)?;
            let mut to = account("linus", 20);
            db.insert(&mut to, None)?;
            Ok(to.id)
        })
        .expect("The transfer failed");
    assert_eq!(
        database
            .get::<Account>(moved, None)
            .expect("Failed to get the new account")
            .map(|v| v.balance),
        Some(20)
    );
    silent_logs! {
        let error = database
            .run_in_transaction(IsolationLevel::default(), |db| {
                db.delete_where::<Account>(&Predicate::ge("balance", 0), None)?;
                Err::<(), _>(keel::Error::msg("transfer refused"))
            })
            .expect_err("The closure failed");
        assert_eq!(error.to_string(), "transfer refused");
    }
    assert!(!database.has_active_transaction());
    assert_eq!(
        database
            .count::<Account>(None, None)
            .expect("Failed to count"),
        2
    );

    // Explicit transactions
    let transaction = database
        .connection_mut()
        .begin(IsolationLevel::default())
        .expect("Could not begin a transaction");
    let mut third = account("ken", 5);
    database
        .insert_in(&transaction, &mut third, None)
        .expect("Failed to insert in the transaction");
    assert_eq!(
        database
            .count_in::<Account>(&transaction, None, None)
            .expect("Failed to count in the transaction"),
        3
    );
    let id = transaction.id();
    database
        .connection_mut()
        .commit(transaction)
        .expect("Failed to commit");
    let stale = Transaction::new(id, IsolationLevel::default());
    silent_logs! {
        let error = database
            .get_in::<Account>(&stale, third.id, None)
            .expect_err("The transaction is over");
        assert!(is_transaction_state(&error));
    }
    assert_eq!(
        database
            .count::<Account>(None, None)
            .expect("Failed to count"),
        3
    );
}
