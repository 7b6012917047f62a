#[cfg(test)]
mod tests {
    use keel::{
        Connection, Database, DbError, Driver, Entity, Executor, GenericSqlWriter,
        IsolationLevel, MultiplePredicate, MySqlSqlWriter, PostgresSqlWriter, Predicate,
        QueryResult, Result, ResultSets, RowLabeled, RowsAffected, Sort, SqlWriter, Statement,
        Transaction, Value, db_error,
    };
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
        time::Duration,
    };

    #[derive(Entity, Debug, Clone, PartialEq)]
    struct Customer {
        id: i64,
        name: String,
    }

    #[derive(Entity, Debug, Clone, PartialEq)]
    struct Tag {
        #[keel(key = "assigned")]
        label: String,
    }

    /// What the fake database received and what it answers next.
    #[derive(Default)]
    struct Script {
        log: Vec<String>,
        responses: VecDeque<Result<Vec<QueryResult>>>,
        batches: VecDeque<ResultSets>,
    }

    type Shared = Arc<Mutex<Script>>;

    #[derive(Default, Debug, Clone, Copy)]
    struct MockDriver<W>(W);

    impl<W: SqlWriter + Copy + Default> Driver for MockDriver<W> {
        type Connection = MockConnection<W>;
        type SqlWriter = W;

        const NAME: &'static str = "mock";

        fn sql_writer(&self) -> W {
            self.0
        }

        fn connect(&self, _url: &str) -> Result<MockConnection<W>> {
            let mut connection = MockConnection::new(Shared::default());
            connection.open()?;
            Ok(connection)
        }
    }

    struct MockConnection<W> {
        driver: MockDriver<W>,
        script: Shared,
        open: bool,
        transaction: Option<u64>,
        transactions: u64,
    }

    impl<W: SqlWriter + Copy + Default> MockConnection<W> {
        fn new(script: Shared) -> Self {
            Self {
                driver: MockDriver(W::default()),
                script,
                open: false,
                transaction: None,
                transactions: 0,
            }
        }

        fn log(&self, entry: impl Into<String>) {
            self.script.lock().unwrap().log.push(entry.into());
        }

        fn check(&self, transaction: Option<&Transaction>) -> Result<()> {
            match transaction {
                Some(t) if self.transaction != Some(t.id()) => {
                    Err(DbError::transaction_state("unknown transaction").into())
                }
                _ => Ok(()),
            }
        }
    }

    impl<W: SqlWriter + Copy + Default> Executor for MockConnection<W> {
        type Driver = MockDriver<W>;

        fn driver(&self) -> &MockDriver<W> {
            &self.driver
        }

        fn run(
            &mut self,
            statement: &Statement,
            transaction: Option<&Transaction>,
            _timeout: Option<Duration>,
        ) -> Result<Vec<QueryResult>> {
            self.check(transaction)?;
            self.log(format!("run {}", statement.sql));
            self.script
                .lock()
                .unwrap()
                .responses
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        fn run_batch(
            &mut self,
            statement: &Statement,
            transaction: Option<&Transaction>,
            _timeout: Option<Duration>,
        ) -> Result<ResultSets> {
            self.check(transaction)?;
            self.log(format!("batch {}", statement.sql));
            Ok(self
                .script
                .lock()
                .unwrap()
                .batches
                .pop_front()
                .unwrap_or_default())
        }
    }

    impl<W: SqlWriter + Copy + Default> Connection for MockConnection<W> {
        fn is_open(&self) -> bool {
            self.open
        }

        fn open(&mut self) -> Result<()> {
            self.log("open");
            self.open = true;
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.log("close");
            self.open = false;
            Ok(())
        }

        fn begin(&mut self, isolation: IsolationLevel) -> Result<Transaction> {
            if self.transaction.is_some() {
                return Err(DbError::transaction_state("already open").into());
            }
            self.log("begin");
            self.transactions += 1;
            self.transaction = Some(self.transactions);
            Ok(Transaction::new(self.transactions, isolation))
        }

        fn commit(&mut self, transaction: Transaction) -> Result<()> {
            self.check(Some(&transaction))?;
            self.log("commit");
            self.transaction = None;
            Ok(())
        }

        fn rollback(&mut self, transaction: Transaction) -> Result<()> {
            self.check(Some(&transaction))?;
            self.log("rollback");
            self.transaction = None;
            Ok(())
        }
    }

    fn scripted<W: SqlWriter + Copy + Default>(
        responses: Vec<Result<Vec<QueryResult>>>,
    ) -> (Database<MockConnection<W>>, Shared) {
        let script = Shared::default();
        script.lock().unwrap().responses = responses.into();
        let database = Database::new(MockConnection::new(script.clone()))
            .expect("Could not create the database");
        (database, script)
    }

    fn log(script: &Shared) -> Vec<String> {
        script.lock().unwrap().log.clone()
    }

    fn sent(script: &Shared) -> usize {
        log(script)
            .iter()
            .filter(|v| v.starts_with("run ") || v.starts_with("batch "))
            .count()
    }

    fn row(labels: &[&str], values: Vec<Value>) -> QueryResult {
        QueryResult::Row(RowLabeled::new(
            labels.iter().map(ToString::to_string).collect(),
            values.into_boxed_slice(),
        ))
    }

    fn customer_row(id: i64, name: &str) -> QueryResult {
        row(
            &["id", "name"],
            vec![Value::Int64(Some(id)), Value::Varchar(Some(name.into()))],
        )
    }

    fn affected(rows_affected: u64, last_affected_id: Option<i64>) -> QueryResult {
        QueryResult::Affected(RowsAffected {
            rows_affected,
            last_affected_id,
        })
    }

    #[test]
    fn opens_and_closes() {
        let (database, script) = scripted::<GenericSqlWriter>(vec![]);
        assert!(database.connection().is_open());
        drop(database);
        assert_eq!(log(&script), ["open", "close"]);

        let driver = MockDriver(GenericSqlWriter::new());
        let database = Database::<MockConnection<GenericSqlWriter>>::connect(&driver, "mock://")
            .expect("Could not connect");
        assert!(database.connection().is_open());
    }

    #[test]
    fn insert_reads_the_identity() {
        let (mut database, _) =
            scripted::<MySqlSqlWriter>(vec![Ok(vec![affected(1, Some(41))])]);
        let mut customer = Customer {
            id: 0,
            name: "Ada".into(),
        };
        let key = database
            .insert(&mut customer, None)
            .expect("Failed to insert");
        assert_eq!(key, Some(41));
        assert_eq!(customer.id, 41);

        let (mut database, _) = scripted::<PostgresSqlWriter>(vec![Ok(vec![
            row(&["id"], vec![Value::Int64(Some(7))]),
            affected(1, None),
        ])]);
        database
            .insert(&mut customer, None)
            .expect("Failed to insert");
        assert_eq!(customer.id, 7);

        let (mut database, _) =
            scripted::<MySqlSqlWriter>(vec![Ok(vec![affected(1, None)])]);
        let error = database
            .insert(&mut customer, None)
            .expect_err("The key was not reported");
        assert!(matches!(db_error(&error), Some(DbError::Provider { .. })));

        let (mut database, _) = scripted::<MySqlSqlWriter>(vec![]);
        let mut tag = Tag {
            label: "blue".into(),
        };
        assert_eq!(database.insert(&mut tag, None).expect("Failed to insert"), None);
    }

    #[test]
    fn results_are_interpreted() {
        let (mut database, script) = scripted::<GenericSqlWriter>(vec![
            Ok(vec![]),
            Ok(vec![customer_row(3, "Grace")]),
            Ok(vec![affected(0, None)]),
            Ok(vec![affected(2, None)]),
            Ok(vec![row(&["COUNT(*)"], vec![Value::Int64(Some(12))])]),
            Ok(vec![customer_row(1, "Ada"), customer_row(2, "Linus")]),
        ]);
        assert_eq!(database.get::<Customer>(1, None).unwrap(), None);
        assert_eq!(
            database.get::<Customer>(3, None).unwrap(),
            Some(Customer {
                id: 3,
                name: "Grace".into()
            })
        );
        let missing = Customer {
            id: 99,
            name: "Nobody".into(),
        };
        assert!(!database.update(&missing, None).unwrap());
        assert!(
            database
                .delete_where::<Customer>(&Predicate::like("name", "A%"), None)
                .unwrap()
        );
        assert_eq!(database.count::<Customer>(None, None).unwrap(), 12);
        let list = database
            .get_page::<Customer>(None, &[Sort::asc("name")], 1, 2, None)
            .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(sent(&script), 6);
    }

    #[test]
    fn validation_fails_before_sending() {
        let (mut database, script) = scripted::<GenericSqlWriter>(vec![]);
        assert!(
            database
                .get_list::<Customer>(Some(&Predicate::eq("email", "x")), &[], None)
                .is_err()
        );
        assert!(
            database
                .get_page::<Customer>(None, &[Sort::desc("age")], 1, 10, None)
                .is_err()
        );
        assert!(database.update(&Tag { label: "x".into() }, None).is_err());
        let queries = MultiplePredicate::new()
            .add::<Customer>(None, vec![])
            .add::<Tag>(Some(Predicate::eq("color", "red")), vec![]);
        assert!(database.get_multiple(&queries, None).is_err());
        assert_eq!(sent(&script), 0);
    }

    #[test]
    fn transaction_state_machine() {
        let (mut database, script) = scripted::<GenericSqlWriter>(vec![]);
        let error = database.commit().expect_err("Nothing to commit");
        assert!(matches!(db_error(&error), Some(DbError::TransactionState(..))));
        let error = database.rollback().expect_err("Nothing to roll back");
        assert!(matches!(db_error(&error), Some(DbError::TransactionState(..))));
        database
            .begin_transaction(IsolationLevel::Serializable)
            .unwrap();
        assert_eq!(
            database.transaction().map(Transaction::isolation),
            Some(IsolationLevel::Serializable)
        );
        let error = database
            .begin_transaction(IsolationLevel::default())
            .expect_err("Already open");
        assert!(matches!(db_error(&error), Some(DbError::TransactionState(..))));
        database.commit().unwrap();
        assert!(!database.has_active_transaction());
        assert_eq!(log(&script), ["open", "begin", "commit"]);
    }

    #[test]
    fn ambient_transaction_is_used() {
        let (mut database, script) =
            scripted::<GenericSqlWriter>(vec![Ok(vec![affected(1, None)])]);
        database
            .begin_transaction(IsolationLevel::default())
            .unwrap();
        let customer = Customer {
            id: 1,
            name: "Ada".into(),
        };
        assert!(database.update(&customer, None).unwrap());
        database.rollback().unwrap();

        // The connection rejects a transaction it does not know
        let stale = Transaction::new(1, IsolationLevel::default());
        let error = database
            .delete_in(&stale, &customer, None)
            .expect_err("The transaction is over");
        assert!(matches!(db_error(&error), Some(DbError::TransactionState(..))));
        assert_eq!(sent(&script), 1);
    }

    #[test]
    fn run_in_transaction() {
        let (mut database, script) = scripted::<GenericSqlWriter>(vec![
            Ok(vec![affected(1, None)]),
            Ok(vec![affected(1, None)]),
        ]);
        let result = database.run_in_transaction(IsolationLevel::default(), |db| {
            db.delete_where::<Customer>(&Predicate::eq("id", 1i64), None)
        });
        assert!(result.unwrap());
        let error = database
            .run_in_transaction(IsolationLevel::default(), |db| {
                db.delete_where::<Customer>(&Predicate::eq("id", 2i64), None)?;
                Err::<(), _>(keel::Error::msg("refused"))
            })
            .expect_err("The closure failed");
        assert_eq!(error.to_string(), "refused");
        assert!(!database.has_active_transaction());
        let log = log(&script);
        assert_eq!(
            log.iter()
                .filter(|v| !v.starts_with("run "))
                .collect::<Vec<_>>(),
            ["open", "begin", "commit", "begin", "rollback"]
        );
    }

    #[test]
    fn drop_rolls_back() {
        let (mut database, script) = scripted::<GenericSqlWriter>(vec![]);
        database
            .begin_transaction(IsolationLevel::default())
            .unwrap();
        drop(database);
        assert_eq!(log(&script), ["open", "begin", "rollback", "close"]);
    }

    #[test]
    fn provider_errors_carry_the_query() {
        let (mut database, _) = scripted::<GenericSqlWriter>(vec![Err(DbError::Timeout {
            timeout: Some(Duration::from_secs(1)),
        }
        .into())]);
        let error = database
            .get_list::<Customer>(None, &[], Some(Duration::from_secs(1)))
            .expect_err("The command timed out");
        assert!(db_error(&error).is_some_and(DbError::is_timeout));
        assert!(format!("{:#}", error).contains("SELECT"));
    }

    #[test]
    fn timeout_keeps_the_transaction() {
        let (mut database, script) = scripted::<GenericSqlWriter>(vec![Err(DbError::Timeout {
            timeout: Some(Duration::from_millis(200)),
        }
        .into())]);
        database
            .begin_transaction(IsolationLevel::default())
            .unwrap();
        let error = database
            .count::<Customer>(None, Some(Duration::from_millis(200)))
            .expect_err("The command timed out");
        assert!(db_error(&error).is_some_and(DbError::is_timeout));
        assert!(database.has_active_transaction());
        database.rollback().expect("The transaction is still open");
        assert!(!database.has_active_transaction());
        let log = log(&script);
        assert_eq!(log.len(), 4);
        assert_eq!(log[3], "rollback");
    }

    #[test]
    fn insert_many_sums_reported_rows() {
        let (mut database, script) = scripted::<MySqlSqlWriter>(vec![
            Ok(vec![affected(1, Some(5))]),
            Ok(vec![affected(0, Some(6))]),
            Ok(vec![affected(1, Some(7))]),
        ]);
        let mut customers = ["Ada", "Grace", "Linus"]
            .into_iter()
            .map(|name| Customer {
                id: 0,
                name: name.into(),
            })
            .collect::<Vec<_>>();
        let inserted = database
            .insert_many(&mut customers, None)
            .expect("Failed to insert");
        assert_eq!(inserted, 2);
        assert_eq!(
            customers.iter().map(|v| v.id).collect::<Vec<_>>(),
            [5, 6, 7]
        );
        assert_eq!(sent(&script), 3);

        let (mut database, _) = scripted::<GenericSqlWriter>(vec![Ok(vec![affected(3, None)])]);
        let mut tags = ["red", "green", "blue"]
            .into_iter()
            .map(|label| Tag {
                label: label.into(),
            })
            .collect::<Vec<_>>();
        assert_eq!(database.insert_many(&mut tags, None).unwrap(), 3);
    }

    #[test]
    fn batched_multiple() {
        let (mut database, script) = scripted::<MySqlSqlWriter>(vec![]);
        script.lock().unwrap().batches.push_back(vec![
            vec![customer_row(1, "Ada"), customer_row(2, "Grace")],
            vec![row(&["label"], vec![Value::Varchar(Some("red".into()))])],
        ]);
        let queries = MultiplePredicate::new()
            .add::<Customer>(None, vec![Sort::asc("id")])
            .add::<Tag>(Some(Predicate::ne("label", "blue")), vec![]);
        {
            let mut reader = database.get_multiple(&queries, None).unwrap();
            assert_eq!(reader.read::<Customer>().unwrap().len(), 2);
            assert_eq!(
                reader.read::<Tag>().unwrap(),
                [Tag {
                    label: "red".into()
                }]
            );
            assert!(reader.is_finished());
        }
        assert_eq!(sent(&script), 1);
        assert!(log(&script)[1].starts_with("batch SELECT `id`, `name`"));

        // The batch must answer every query
        script
            .lock()
            .unwrap()
            .batches
            .push_back(vec![vec![customer_row(1, "Ada")]]);
        let error = database
            .get_multiple(&queries, None)
            .err()
            .expect("A result set is missing");
        assert!(matches!(db_error(&error), Some(DbError::MultipleResult(..))));
    }

    #[test]
    fn lazy_multiple() {
        let (mut database, script) = scripted::<GenericSqlWriter>(vec![
            Ok(vec![customer_row(1, "Ada")]),
            Ok(vec![]),
        ]);
        let queries = MultiplePredicate::new()
            .add::<Customer>(None, vec![])
            .add::<Tag>(None, vec![Sort::desc("label")]);
        {
            let mut reader = database.get_multiple(&queries, None).unwrap();
            let error = reader.read::<Tag>().expect_err("Customers come first");
            assert!(matches!(db_error(&error), Some(DbError::MultipleResult(..))));
            assert_eq!(reader.remaining(), 2);
            assert_eq!(reader.read::<Customer>().unwrap().len(), 1);
            assert!(reader.read::<Tag>().unwrap().is_empty());
            assert!(reader.read::<Tag>().is_err());
        }
        let log = log(&script);
        assert_eq!(log.len(), 3);
        assert!(log[2].starts_with(r#"run SELECT "label""#));
        assert!(log[2].ends_with(r#"ORDER BY "label" DESC;"#));
    }

    #[test]
    fn lazy_multiple_errors_carry_the_query() {
        let (mut database, _) = scripted::<GenericSqlWriter>(vec![
            Ok(vec![customer_row(1, "Ada")]),
            Err(DbError::provider_msg("connection reset").into()),
        ]);
        let queries = MultiplePredicate::new()
            .add::<Customer>(None, vec![])
            .add::<Tag>(Some(Predicate::eq("label", "red")), vec![]);
        let mut reader = database.get_multiple(&queries, None).unwrap();
        assert_eq!(reader.read::<Customer>().unwrap().len(), 1);
        let error = reader.read::<Tag>().expect_err("The provider failed");
        assert!(matches!(db_error(&error), Some(DbError::Provider { .. })));
        let message = format!("{:#}", error);
        assert!(message.contains("While executing the query"));
        assert!(message.contains("SELECT \"label\"\nFROM \"tag\"\nWHERE"));
        assert!(message.contains("connection reset"));
    }
}
