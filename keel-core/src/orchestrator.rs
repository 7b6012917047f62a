use crate::{
    Configuration, Connection, DbError, Entity, KeyType, MultiplePredicate,
    MultipleResultReader, Predicate, QueryResult, Result, RowLabeled, RowsAffected, Sort,
    SqlGenerator, SqlWriter, Statement, Transaction, Value, truncate_long,
};
use std::time::Duration;

/// Generates the statements of each operation, sends them through a borrowed
/// connection and turns the results into entities or scalars.
///
/// Every operation issues exactly one round trip, except `insert_many` (one per chunk
/// or per identity row) and lazy multiple reads (one per position read).
#[derive(Debug, Clone)]
pub struct Orchestrator<W: SqlWriter> {
    generator: SqlGenerator<W>,
    configuration: Configuration,
}

impl<W: SqlWriter> Orchestrator<W> {
    pub fn new(writer: W, configuration: Configuration) -> Self {
        Self {
            generator: SqlGenerator::new(writer, configuration.cache().clone()),
            configuration,
        }
    }

    pub fn generator(&self) -> &SqlGenerator<W> {
        &self.generator
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// The entity whose primary key is `key`, `None` when no row matches.
    pub fn get<E: Entity, C: Connection>(
        &self,
        connection: &mut C,
        transaction: Option<&Transaction>,
        key: E::Key,
        timeout: Option<Duration>,
    ) -> Result<Option<E>> {
        let statement = self.generator.select_by_key::<E>(key)?;
        let row = self
            .send(connection, &statement, transaction, timeout)?
            .into_iter()
            .find_map(|v| match v {
                QueryResult::Row(row) => Some(row),
                QueryResult::Affected(..) => None,
            });
        row.map(E::from_row).transpose()
    }

    /// Inserts `entity` and returns its key when keel or the database generated it.
    ///
    /// A nil guid key is replaced by a sequential guid before the statement is sent,
    /// an identity key is written back into `entity` after the insert.
    pub fn insert<E: Entity, C: Connection>(
        &self,
        connection: &mut C,
        transaction: Option<&Transaction>,
        entity: &mut E,
        timeout: Option<Duration>,
    ) -> Result<Option<E::Key>> {
        let assigned = self.assign_guid(entity)?;
        let statement = self.generator.insert(entity)?;
        let results = self.send(connection, &statement, transaction, timeout)?;
        let generated = self.write_back_identity(entity, results)?;
        Ok((assigned || generated).then(|| entity.key()))
    }

    /// Inserts every entity, returns the number of rows inserted.
    pub fn insert_many<E: Entity, C: Connection>(
        &self,
        connection: &mut C,
        transaction: Option<&Transaction>,
        entities: &mut [E],
        timeout: Option<Duration>,
    ) -> Result<u64> {
        for entity in entities.iter_mut() {
            self.assign_guid(entity)?;
        }
        let statements = self.generator.insert_many(entities)?;
        let mapping = self.generator.mapping::<E>();
        let mut total = 0;
        if mapping.identity().is_some() {
            for (entity, statement) in entities.iter_mut().zip(&statements) {
                let results = self.send(connection, statement, transaction, timeout)?;
                total += affected(&results).rows_affected;
                self.write_back_identity(entity, results)?;
            }
        } else {
            for statement in &statements {
                let results = self.send(connection, statement, transaction, timeout)?;
                total += affected(&results).rows_affected;
            }
        }
        Ok(total)
    }

    /// Updates the row of `entity`, `false` when no row has its key.
    pub fn update<E: Entity, C: Connection>(
        &self,
        connection: &mut C,
        transaction: Option<&Transaction>,
        entity: &E,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        let statement = self.generator.update(entity)?;
        let results = self.send(connection, &statement, transaction, timeout)?;
        Ok(affected(&results).rows_affected > 0)
    }

    /// Deletes the row of `entity`, `false` when no row has its key.
    pub fn delete<E: Entity, C: Connection>(
        &self,
        connection: &mut C,
        transaction: Option<&Transaction>,
        entity: &E,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        let statement = self.generator.delete(entity)?;
        let results = self.send(connection, &statement, transaction, timeout)?;
        Ok(affected(&results).rows_affected > 0)
    }

    /// Deletes every row matching `predicate`, `false` when none matched.
    pub fn delete_where<E: Entity, C: Connection>(
        &self,
        connection: &mut C,
        transaction: Option<&Transaction>,
        predicate: &Predicate,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        let statement = self.generator.delete_where::<E>(predicate)?;
        let results = self.send(connection, &statement, transaction, timeout)?;
        Ok(affected(&results).rows_affected > 0)
    }

    pub fn get_list<E: Entity, C: Connection>(
        &self,
        connection: &mut C,
        transaction: Option<&Transaction>,
        predicate: Option<&Predicate>,
        sorts: &[Sort],
        timeout: Option<Duration>,
    ) -> Result<Vec<E>> {
        let statement = self.generator.select::<E>(predicate, sorts)?;
        self.fetch_entities(connection, &statement, transaction, timeout)
    }

    /// Page `page` (1 based) of `size` entities, every entity when either is zero.
    #[allow(clippy::too_many_arguments)]
    pub fn get_page<E: Entity, C: Connection>(
        &self,
        connection: &mut C,
        transaction: Option<&Transaction>,
        predicate: Option<&Predicate>,
        sorts: &[Sort],
        page: u64,
        size: u64,
        timeout: Option<Duration>,
    ) -> Result<Vec<E>> {
        let statement = self
            .generator
            .select_paged::<E>(predicate, sorts, page, size)?;
        self.fetch_entities(connection, &statement, transaction, timeout)
    }

    /// At most `max_results` entities after skipping `first_result`.
    #[allow(clippy::too_many_arguments)]
    pub fn get_set<E: Entity, C: Connection>(
        &self,
        connection: &mut C,
        transaction: Option<&Transaction>,
        predicate: Option<&Predicate>,
        sorts: &[Sort],
        first_result: u64,
        max_results: u64,
        timeout: Option<Duration>,
    ) -> Result<Vec<E>> {
        let statement =
            self.generator
                .select_set::<E>(predicate, sorts, first_result, max_results)?;
        self.fetch_entities(connection, &statement, transaction, timeout)
    }

    pub fn count<E: Entity, C: Connection>(
        &self,
        connection: &mut C,
        transaction: Option<&Transaction>,
        predicate: Option<&Predicate>,
        timeout: Option<Duration>,
    ) -> Result<u64> {
        let statement = self.generator.count::<E>(predicate)?;
        let value = self
            .send(connection, &statement, transaction, timeout)?
            .into_iter()
            .find_map(|v| match v {
                QueryResult::Row(row) => row.values.into_vec().into_iter().next(),
                QueryResult::Affected(..) => None,
            })
            .ok_or_else(|| DbError::provider_msg("the count query returned no row"))?;
        <u64 as crate::AsValue>::try_from_value(value)
    }

    /// Reader over the result sets of `queries`.
    ///
    /// Every statement is generated before anything is sent. With a dialect accepting
    /// multiple statements the whole batch is sent now, otherwise each statement is
    /// sent when its position is read.
    pub fn get_multiple<'a, C: Connection>(
        &self,
        connection: &'a mut C,
        transaction: Option<&'a Transaction>,
        queries: &MultiplePredicate,
        timeout: Option<Duration>,
    ) -> Result<MultipleResultReader<'a, C>> {
        if self.generator.writer().supports_multiple_statements() {
            let statement = self.generator.multiple(queries)?;
            log::debug!("Sending batch: {}", truncate_long!(statement.sql));
            let results = connection
                .run_batch(&statement, transaction, timeout)
                .map_err(|e| provider_failure(e, &statement))?;
            MultipleResultReader::batched(connection, transaction, queries, results)
        } else {
            let statements = queries
                .queries()
                .iter()
                .map(|q| self.generator.multiple_query(q))
                .collect::<Result<Vec<_>>>()?;
            Ok(MultipleResultReader::lazy(
                connection,
                transaction,
                timeout,
                queries,
                statements,
            ))
        }
    }

    /// Sends a caller written statement, returns the affected rows.
    pub fn execute<C: Connection>(
        &self,
        connection: &mut C,
        transaction: Option<&Transaction>,
        statement: &Statement,
        timeout: Option<Duration>,
    ) -> Result<RowsAffected> {
        let results = self.send(connection, statement, transaction, timeout)?;
        Ok(affected(&results))
    }

    /// Sends a caller written statement, returns the rows.
    pub fn query<C: Connection>(
        &self,
        connection: &mut C,
        transaction: Option<&Transaction>,
        statement: &Statement,
        timeout: Option<Duration>,
    ) -> Result<Vec<RowLabeled>> {
        Ok(self
            .send(connection, statement, transaction, timeout)?
            .into_iter()
            .filter_map(|v| match v {
                QueryResult::Row(row) => Some(row),
                QueryResult::Affected(..) => None,
            })
            .collect())
    }

    pub fn create_table<E: Entity, C: Connection>(
        &self,
        connection: &mut C,
        transaction: Option<&Transaction>,
        if_not_exists: bool,
    ) -> Result<()> {
        let statement = self.generator.create_table::<E>(if_not_exists)?;
        self.send(connection, &statement, transaction, None)
            .map(|_| ())
    }

    pub fn drop_table<E: Entity, C: Connection>(
        &self,
        connection: &mut C,
        transaction: Option<&Transaction>,
        if_exists: bool,
    ) -> Result<()> {
        let statement = self.generator.drop_table::<E>(if_exists)?;
        self.send(connection, &statement, transaction, None)
            .map(|_| ())
    }

    fn fetch_entities<E: Entity, C: Connection>(
        &self,
        connection: &mut C,
        statement: &Statement,
        transaction: Option<&Transaction>,
        timeout: Option<Duration>,
    ) -> Result<Vec<E>> {
        self.send(connection, statement, transaction, timeout)?
            .into_iter()
            .filter_map(|v| match v {
                QueryResult::Row(row) => Some(E::from_row(row)),
                QueryResult::Affected(..) => None,
            })
            .collect()
    }

    fn send<C: Connection>(
        &self,
        connection: &mut C,
        statement: &Statement,
        transaction: Option<&Transaction>,
        timeout: Option<Duration>,
    ) -> Result<Vec<QueryResult>> {
        log::debug!("Sending: {}", statement);
        connection
            .run(statement, transaction, timeout)
            .map_err(|e| provider_failure(e, statement))
    }

    /// Replaces a nil guid key with a sequential guid, returns whether it did.
    fn assign_guid<E: Entity>(&self, entity: &mut E) -> Result<bool> {
        let mapping = self.generator.mapping::<E>();
        let Some(column) = mapping.keys().find(|c| c.key == KeyType::Guid) else {
            return Ok(false);
        };
        let current = entity
            .row()
            .into_iter()
            .find(|(property, _)| *property == column.property)
            .map(|(_, v)| v);
        let nil = match current {
            Some(Value::Uuid(Some(v))) => v.is_nil(),
            Some(Value::Uuid(None)) | Some(Value::Null) | None => true,
            Some(..) => false,
        };
        if nil {
            entity.set_property(
                column.property,
                Value::Uuid(Some(self.configuration.next_guid())),
            )?;
        }
        Ok(nil)
    }

    /// Writes the generated key reported by the insert into `entity`.
    fn write_back_identity<E: Entity>(
        &self,
        entity: &mut E,
        results: Vec<QueryResult>,
    ) -> Result<bool> {
        let mapping = self.generator.mapping::<E>();
        let Some(column) = mapping.identity() else {
            return Ok(false);
        };
        let mut last_affected_id = None;
        let mut returned = None;
        for result in results {
            match result {
                QueryResult::Row(row) if returned.is_none() => {
                    returned = row.values.into_vec().into_iter().next();
                }
                QueryResult::Affected(v) if v.last_affected_id.is_some() => {
                    last_affected_id = v.last_affected_id;
                }
                _ => {}
            }
        }
        let value = returned
            .filter(|v| !v.is_null())
            .or(last_affected_id.map(|v| Value::Int64(Some(v))))
            .ok_or_else(|| {
                DbError::provider_msg(format!(
                    "the database did not report the generated key of `{}`",
                    mapping.entity
                ))
            })?;
        entity.set_property(column.property, value)?;
        Ok(true)
    }
}

/// Attaches the failed query to a provider error and logs it.
pub(crate) fn provider_failure(error: crate::Error, statement: &Statement) -> crate::Error {
    let error = error.context(format!(
        "While executing the query:\n{}",
        truncate_long!(statement.sql)
    ));
    log::error!("{:#}", error);
    error
}

fn affected(results: &[QueryResult]) -> RowsAffected {
    let mut result = RowsAffected::default();
    result.extend(results.iter().filter_map(|v| match v {
        QueryResult::Affected(v) => Some(*v),
        QueryResult::Row(..) => None,
    }));
    result
}

