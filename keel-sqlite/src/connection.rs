use crate::{
    Location, SqliteDriver,
    value::{SqliteValue, from_sql},
};
use keel_core::{
    Connection, DbError, Driver, Executor, IsolationLevel, QueryResult, Result, RowLabeled,
    RowsAffected, SqlWriter, Statement, Transaction,
};
use rusqlite::{ErrorCode, params_from_iter};
use std::{sync::Arc, time::Duration};

/// Busy timeout applied when an operation does not specify one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteConnection {
    location: Location,
    connection: Option<rusqlite::Connection>,
    transaction: Option<u64>,
    transactions: u64,
    driver: SqliteDriver,
}

impl SqliteConnection {
    /// A closed connection to `location`, see [`Connection::open`].
    pub fn new(location: Location) -> Self {
        Self {
            location,
            connection: None,
            transaction: None,
            transactions: 0,
            driver: SqliteDriver::new(),
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    fn handle(&self) -> Result<&rusqlite::Connection> {
        self.connection
            .as_ref()
            .ok_or_else(|| DbError::provider_msg("The sqlite connection is closed").into())
    }

    fn check_transaction(&self, transaction: Option<&Transaction>) -> Result<()> {
        match (transaction, self.transaction) {
            (None, _) => Ok(()),
            (Some(t), Some(current)) if t.id() == current => Ok(()),
            (Some(t), _) => Err(DbError::transaction_state(format!(
                "transaction {} is not open on this connection",
                t.id()
            ))
            .into()),
        }
    }

    fn execute_batch(&mut self, sql: &str) -> Result<()> {
        log::debug!("{}", sql);
        self.handle()?
            .execute_batch(sql)
            .map_err(|e| provider_error(e, Some(DEFAULT_TIMEOUT)))
    }

    fn end_transaction(&mut self, transaction: Transaction, commit: bool) -> Result<()> {
        self.check_transaction(Some(&transaction))?;
        let mut sql = String::new();
        let writer = self.driver.sql_writer();
        if commit {
            writer.write_transaction_commit(&mut sql);
        } else {
            writer.write_transaction_rollback(&mut sql);
        }
        let result = self.execute_batch(&sql);
        if result.is_err() && commit {
            let mut sql = String::new();
            writer.write_transaction_rollback(&mut sql);
            if let Err(e) = self.execute_batch(&sql) {
                log::error!("Could not roll back after a failed commit: {:#}", e);
            }
        }
        self.transaction = None;
        result
    }
}

impl Executor for SqliteConnection {
    type Driver = SqliteDriver;

    fn driver(&self) -> &Self::Driver {
        &self.driver
    }

    fn run(
        &mut self,
        statement: &Statement,
        transaction: Option<&Transaction>,
        timeout: Option<Duration>,
    ) -> Result<Vec<QueryResult>> {
        self.check_transaction(transaction)?;
        let connection = self.handle()?;
        connection
            .busy_timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .map_err(DbError::provider)?;
        let error = |e| provider_error(e, timeout);
        let mut prepared = connection.prepare(&statement.sql).map_err(error)?;
        let params = params_from_iter(statement.params.iter().map(SqliteValue));
        if prepared.column_count() == 0 {
            let rows_affected = prepared.execute(params).map_err(error)? as u64;
            let is_insert = statement
                .sql
                .trim_start()
                .get(..6)
                .is_some_and(|v| v.eq_ignore_ascii_case("INSERT"));
            return Ok(vec![QueryResult::Affected(RowsAffected {
                rows_affected,
                last_affected_id: (is_insert && rows_affected > 0)
                    .then(|| connection.last_insert_rowid()),
            })]);
        }
        let labels: Arc<[String]> = prepared
            .column_names()
            .into_iter()
            .map(ToString::to_string)
            .collect();
        let count = labels.len();
        let mut rows = prepared.query(params).map_err(error)?;
        let mut result = Vec::new();
        while let Some(row) = rows.next().map_err(error)? {
            let values = (0..count)
                .map(|i| row.get_ref(i).map(from_sql))
                .collect::<rusqlite::Result<Box<[_]>>>()
                .map_err(error)?;
            result.push(QueryResult::Row(RowLabeled::new(labels.clone(), values)));
        }
        drop(rows);
        if !prepared.readonly() {
            result.push(QueryResult::Affected(RowsAffected {
                rows_affected: connection.changes() as u64,
                last_affected_id: Some(connection.last_insert_rowid()),
            }));
        }
        Ok(result)
    }
}

impl Connection for SqliteConnection {
    fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    fn open(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }
        let connection = match &self.location {
            Location::Memory => rusqlite::Connection::open_in_memory(),
            Location::File { path, flags } => rusqlite::Connection::open_with_flags(path, *flags),
        }
        .map_err(|e| {
            let error = keel_core::Error::from(DbError::provider(e))
                .context(format!("While opening the sqlite database {:?}", self.location));
            log::error!("{:#}", error);
            error
        })?;
        self.connection = Some(connection);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.transaction = None;
        if let Some(connection) = self.connection.take() {
            connection
                .close()
                .map_err(|(_, e)| DbError::provider(e))?;
        }
        Ok(())
    }

    fn begin(&mut self, isolation: IsolationLevel) -> Result<Transaction> {
        if let Some(current) = self.transaction {
            return Err(DbError::transaction_state(format!(
                "transaction {} is still open on this connection",
                current
            ))
            .into());
        }
        let mut sql = String::new();
        self.driver
            .sql_writer()
            .write_transaction_begin(&mut sql, isolation);
        self.execute_batch(&sql)?;
        self.transactions += 1;
        self.transaction = Some(self.transactions);
        Ok(Transaction::new(self.transactions, isolation))
    }

    fn commit(&mut self, transaction: Transaction) -> Result<()> {
        self.end_transaction(transaction, true)
    }

    fn rollback(&mut self, transaction: Transaction) -> Result<()> {
        self.end_transaction(transaction, false)
    }
}

fn provider_error(error: rusqlite::Error, timeout: Option<Duration>) -> keel_core::Error {
    let timed_out = matches!(
        error.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    );
    if timed_out {
        DbError::Timeout { timeout }.into()
    } else {
        let error = DbError::provider(error);
        log::debug!("sqlite failure: {}", error);
        error.into()
    }
}
