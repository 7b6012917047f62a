use crate::{
    DbError, Driver, QueryResult, Result, ResultSets, RowLabeled, RowsAffected, SqlWriter,
    Statement, Transaction,
};
use std::time::Duration;

pub trait Executor: Sized {
    type Driver: Driver;

    fn driver(&self) -> &Self::Driver;

    /// General method to send any statement and return any result (rows or counts).
    ///
    /// `transaction` must be the one currently open on this connection, `timeout`
    /// falls back to the provider default when `None`.
    fn run(
        &mut self,
        statement: &Statement,
        transaction: Option<&Transaction>,
        timeout: Option<Duration>,
    ) -> Result<Vec<QueryResult>>;

    /// Sends a statement made of several statements and returns one result set per
    /// statement, in order.
    fn run_batch(
        &mut self,
        statement: &Statement,
        transaction: Option<&Transaction>,
        timeout: Option<Duration>,
    ) -> Result<ResultSets> {
        let _ = (statement, transaction, timeout);
        Err(DbError::provider_msg(format!(
            "{} does not support multiple statements in one command",
            <Self::Driver as Driver>::NAME
        ))
        .into())
    }

    /// Execute the statement and returns the rows.
    fn fetch(
        &mut self,
        statement: &Statement,
        transaction: Option<&Transaction>,
        timeout: Option<Duration>,
    ) -> Result<Vec<RowLabeled>> {
        Ok(self
            .run(statement, transaction, timeout)?
            .into_iter()
            .filter_map(|v| match v {
                QueryResult::Row(v) => Some(v),
                _ => None,
            })
            .collect())
    }

    /// Execute the statement and return the total number of rows affected.
    fn execute(
        &mut self,
        statement: &Statement,
        transaction: Option<&Transaction>,
        timeout: Option<Duration>,
    ) -> Result<RowsAffected> {
        let mut result = RowsAffected::default();
        result.extend(
            self.run(statement, transaction, timeout)?
                .into_iter()
                .filter_map(|v| match v {
                    QueryResult::Affected(v) => Some(v),
                    _ => None,
                }),
        );
        Ok(result)
    }

    fn supports_multiple_statements(&self) -> bool {
        self.driver().sql_writer().supports_multiple_statements()
    }
}
