use crate::{Executor, IsolationLevel, Result, Transaction};

/// A live session with the database.
///
/// Transactions are explicit handles: [`Connection::begin`] produces one and
/// [`Connection::commit`] or [`Connection::rollback`] consume it.
pub trait Connection: Executor {
    fn is_open(&self) -> bool;

    /// Opens the session, no-op when already open.
    fn open(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    fn begin(&mut self, isolation: IsolationLevel) -> Result<Transaction>;

    fn commit(&mut self, transaction: Transaction) -> Result<()>;

    fn rollback(&mut self, transaction: Transaction) -> Result<()>;
}
