use crate::{
    Configuration, Connection, DbError, Driver, Entity, IsolationLevel, Mapping,
    MultiplePredicate, MultipleResultReader, Orchestrator, Predicate, Result, RowLabeled,
    RowsAffected, Sort, Statement, Transaction,
};
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

type WriterOf<C> = <<C as crate::Executor>::Driver as Driver>::SqlWriter;

/// Unit of work over one connection with at most one ambient transaction.
///
/// Operations use the ambient transaction when one is open, the `*_in` variants use
/// the transaction passed by the caller. Dropping the database rolls back the ambient
/// transaction, if still open, and closes the connection.
///
/// ```ignore
/// let mut db = Database::new(connection)?;
/// let id = db.run_in_transaction(IsolationLevel::default(), |db| {
///     let mut customer = Customer { id: 0, name: "Ada".into() };
///     db.insert(&mut customer, None)?;
///     Ok(customer.id)
/// })?;
/// let customer = db.get::<Customer>(id, None)?;
/// ```
pub struct Database<C: Connection> {
    connection: C,
    transaction: Option<Transaction>,
    orchestrator: Orchestrator<WriterOf<C>>,
}

impl<C: Connection> Database<C> {
    /// Takes ownership of `connection`, opening it when needed.
    pub fn new(connection: C) -> Result<Self> {
        Self::with_configuration(connection, Configuration::default())
    }

    pub fn with_configuration(mut connection: C, configuration: Configuration) -> Result<Self> {
        if !connection.is_open() {
            connection.open()?;
        }
        let writer = connection.driver().sql_writer();
        Ok(Self {
            connection,
            transaction: None,
            orchestrator: Orchestrator::new(writer, configuration),
        })
    }

    /// Connects through `driver` and wraps the new connection.
    pub fn connect(driver: &C::Driver, url: &str) -> Result<Self>
    where
        C::Driver: Driver<Connection = C>,
    {
        Self::new(driver.connect(url)?)
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    pub fn orchestrator(&self) -> &Orchestrator<WriterOf<C>> {
        &self.orchestrator
    }

    pub fn configuration(&self) -> &Configuration {
        self.orchestrator.configuration()
    }

    pub fn has_active_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// The ambient transaction, if open.
    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    pub fn begin_transaction(&mut self, isolation: IsolationLevel) -> Result<()> {
        if self.transaction.is_some() {
            return Err(DbError::transaction_state("a transaction is already open").into());
        }
        self.transaction = Some(self.connection.begin(isolation)?);
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        let Some(transaction) = self.transaction.take() else {
            return Err(DbError::transaction_state("there is no transaction to commit").into());
        };
        self.connection.commit(transaction)
    }

    pub fn rollback(&mut self) -> Result<()> {
        let Some(transaction) = self.transaction.take() else {
            return Err(DbError::transaction_state("there is no transaction to roll back").into());
        };
        self.connection.rollback(transaction)
    }

    /// Runs `f` inside a new ambient transaction.
    ///
    /// Commits when `f` succeeds. When it fails the transaction is rolled back, if
    /// still open, and the error of `f` is returned as is.
    pub fn run_in_transaction<R>(
        &mut self,
        isolation: IsolationLevel,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.begin_transaction(isolation)?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(error) => {
                if let Some(transaction) = self.transaction.take() {
                    log::warn!("Rolling back the transaction: {:#}", error);
                    if let Err(e) = self.connection.rollback(transaction) {
                        log::error!("Could not roll back the transaction: {:#}", e);
                    }
                }
                Err(error)
            }
        }
    }

    pub fn get<E: Entity>(&mut self, key: E::Key, timeout: Option<Duration>) -> Result<Option<E>> {
        self.orchestrator
            .get(&mut self.connection, self.transaction.as_ref(), key, timeout)
    }

    pub fn get_in<E: Entity>(
        &mut self,
        transaction: &Transaction,
        key: E::Key,
        timeout: Option<Duration>,
    ) -> Result<Option<E>> {
        self.orchestrator
            .get(&mut self.connection, Some(transaction), key, timeout)
    }

    /// Inserts `entity`, returns its key when it was generated.
    pub fn insert<E: Entity>(
        &mut self,
        entity: &mut E,
        timeout: Option<Duration>,
    ) -> Result<Option<E::Key>> {
        self.orchestrator
            .insert(&mut self.connection, self.transaction.as_ref(), entity, timeout)
    }

    pub fn insert_in<E: Entity>(
        &mut self,
        transaction: &Transaction,
        entity: &mut E,
        timeout: Option<Duration>,
    ) -> Result<Option<E::Key>> {
        self.orchestrator
            .insert(&mut self.connection, Some(transaction), entity, timeout)
    }

    pub fn insert_many<E: Entity>(
        &mut self,
        entities: &mut [E],
        timeout: Option<Duration>,
    ) -> Result<u64> {
        self.orchestrator.insert_many(
            &mut self.connection,
            self.transaction.as_ref(),
            entities,
            timeout,
        )
    }

    pub fn insert_many_in<E: Entity>(
        &mut self,
        transaction: &Transaction,
        entities: &mut [E],
        timeout: Option<Duration>,
    ) -> Result<u64> {
        self.orchestrator
            .insert_many(&mut self.connection, Some(transaction), entities, timeout)
    }

    pub fn update<E: Entity>(&mut self, entity: &E, timeout: Option<Duration>) -> Result<bool> {
        self.orchestrator
            .update(&mut self.connection, self.transaction.as_ref(), entity, timeout)
    }

    pub fn update_in<E: Entity>(
        &mut self,
        transaction: &Transaction,
        entity: &E,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        self.orchestrator
            .update(&mut self.connection, Some(transaction), entity, timeout)
    }

    pub fn delete<E: Entity>(&mut self, entity: &E, timeout: Option<Duration>) -> Result<bool> {
        self.orchestrator
            .delete(&mut self.connection, self.transaction.as_ref(), entity, timeout)
    }

    pub fn delete_in<E: Entity>(
        &mut self,
        transaction: &Transaction,
        entity: &E,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        self.orchestrator
            .delete(&mut self.connection, Some(transaction), entity, timeout)
    }

    pub fn delete_where<E: Entity>(
        &mut self,
        predicate: &Predicate,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        self.orchestrator.delete_where::<E, C>(
            &mut self.connection,
            self.transaction.as_ref(),
            predicate,
            timeout,
        )
    }

    pub fn delete_where_in<E: Entity>(
        &mut self,
        transaction: &Transaction,
        predicate: &Predicate,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        self.orchestrator.delete_where::<E, C>(
            &mut self.connection,
            Some(transaction),
            predicate,
            timeout,
        )
    }

    pub fn get_list<E: Entity>(
        &mut self,
        predicate: Option<&Predicate>,
        sorts: &[Sort],
        timeout: Option<Duration>,
    ) -> Result<Vec<E>> {
        self.orchestrator.get_list(
            &mut self.connection,
            self.transaction.as_ref(),
            predicate,
            sorts,
            timeout,
        )
    }

    pub fn get_list_in<E: Entity>(
        &mut self,
        transaction: &Transaction,
        predicate: Option<&Predicate>,
        sorts: &[Sort],
        timeout: Option<Duration>,
    ) -> Result<Vec<E>> {
        self.orchestrator.get_list(
            &mut self.connection,
            Some(transaction),
            predicate,
            sorts,
            timeout,
        )
    }

    /// Page `page` (1 based) of `size` entities, every entity when either is zero.
    pub fn get_page<E: Entity>(
        &mut self,
        predicate: Option<&Predicate>,
        sorts: &[Sort],
        page: u64,
        size: u64,
        timeout: Option<Duration>,
    ) -> Result<Vec<E>> {
        self.orchestrator.get_page(
            &mut self.connection,
            self.transaction.as_ref(),
            predicate,
            sorts,
            page,
            size,
            timeout,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_page_in<E: Entity>(
        &mut self,
        transaction: &Transaction,
        predicate: Option<&Predicate>,
        sorts: &[Sort],
        page: u64,
        size: u64,
        timeout: Option<Duration>,
    ) -> Result<Vec<E>> {
        self.orchestrator.get_page(
            &mut self.connection,
            Some(transaction),
            predicate,
            sorts,
            page,
            size,
            timeout,
        )
    }

    pub fn get_set<E: Entity>(
        &mut self,
        predicate: Option<&Predicate>,
        sorts: &[Sort],
        first_result: u64,
        max_results: u64,
        timeout: Option<Duration>,
    ) -> Result<Vec<E>> {
        self.orchestrator.get_set(
            &mut self.connection,
            self.transaction.as_ref(),
            predicate,
            sorts,
            first_result,
            max_results,
            timeout,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_set_in<E: Entity>(
        &mut self,
        transaction: &Transaction,
        predicate: Option<&Predicate>,
        sorts: &[Sort],
        first_result: u64,
        max_results: u64,
        timeout: Option<Duration>,
    ) -> Result<Vec<E>> {
        self.orchestrator.get_set(
            &mut self.connection,
            Some(transaction),
            predicate,
            sorts,
            first_result,
            max_results,
            timeout,
        )
    }

    pub fn count<E: Entity>(
        &mut self,
        predicate: Option<&Predicate>,
        timeout: Option<Duration>,
    ) -> Result<u64> {
        self.orchestrator.count::<E, C>(
            &mut self.connection,
            self.transaction.as_ref(),
            predicate,
            timeout,
        )
    }

    pub fn count_in<E: Entity>(
        &mut self,
        transaction: &Transaction,
        predicate: Option<&Predicate>,
        timeout: Option<Duration>,
    ) -> Result<u64> {
        self.orchestrator.count::<E, C>(
            &mut self.connection,
            Some(transaction),
            predicate,
            timeout,
        )
    }

    /// Reader over the result sets of `queries`, see [`Orchestrator::get_multiple`].
    pub fn get_multiple(
        &mut self,
        queries: &MultiplePredicate,
        timeout: Option<Duration>,
    ) -> Result<MultipleResultReader<'_, C>> {
        self.orchestrator.get_multiple(
            &mut self.connection,
            self.transaction.as_ref(),
            queries,
            timeout,
        )
    }

    pub fn get_multiple_in<'a>(
        &'a mut self,
        transaction: &'a Transaction,
        queries: &MultiplePredicate,
        timeout: Option<Duration>,
    ) -> Result<MultipleResultReader<'a, C>> {
        self.orchestrator
            .get_multiple(&mut self.connection, Some(transaction), queries, timeout)
    }

    /// Sends a statement written by the caller, returns the affected rows.
    pub fn execute(
        &mut self,
        statement: &Statement,
        timeout: Option<Duration>,
    ) -> Result<RowsAffected> {
        self.orchestrator.execute(
            &mut self.connection,
            self.transaction.as_ref(),
            statement,
            timeout,
        )
    }

    pub fn execute_in(
        &mut self,
        transaction: &Transaction,
        statement: &Statement,
        timeout: Option<Duration>,
    ) -> Result<RowsAffected> {
        self.orchestrator
            .execute(&mut self.connection, Some(transaction), statement, timeout)
    }

    /// Sends a statement written by the caller, returns the rows.
    pub fn query(
        &mut self,
        statement: &Statement,
        timeout: Option<Duration>,
    ) -> Result<Vec<RowLabeled>> {
        self.orchestrator.query(
            &mut self.connection,
            self.transaction.as_ref(),
            statement,
            timeout,
        )
    }

    pub fn query_in(
        &mut self,
        transaction: &Transaction,
        statement: &Statement,
        timeout: Option<Duration>,
    ) -> Result<Vec<RowLabeled>> {
        self.orchestrator
            .query(&mut self.connection, Some(transaction), statement, timeout)
    }

    /// Creates the table of `E`. Meant for tests and tools, not for migrations.
    pub fn create_table<E: Entity>(&mut self, if_not_exists: bool) -> Result<()> {
        self.orchestrator.create_table::<E, C>(
            &mut self.connection,
            self.transaction.as_ref(),
            if_not_exists,
        )
    }

    pub fn drop_table<E: Entity>(&mut self, if_exists: bool) -> Result<()> {
        self.orchestrator.drop_table::<E, C>(
            &mut self.connection,
            self.transaction.as_ref(),
            if_exists,
        )
    }

    pub fn get_map<E: Entity>(&self) -> Arc<Mapping> {
        self.configuration().get_map::<E>()
    }

    pub fn clear_cache(&self) {
        self.configuration().clear_cache();
    }

    pub fn next_guid(&self) -> Uuid {
        self.configuration().next_guid()
    }
}

impl<C: Connection> Drop for Database<C> {
    fn drop(&mut self) {
        if let Some(transaction) = self.transaction.take() {
            log::warn!("Rolling back the transaction left open");
            if let Err(e) = self.connection.rollback(transaction) {
                log::error!("Could not roll back the transaction: {:#}", e);
            }
        }
        if self.connection.is_open() {
            if let Err(e) = self.connection.close() {
                log::error!("Could not close the connection: {:#}", e);
            }
        }
    }
}
