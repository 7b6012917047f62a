use crate::{
    Connection, DbError, Entity, Mapping, MappingCache, Predicate, QueryResult, Result, Sort,
    Statement, Transaction, orchestrator::provider_failure, truncate_long,
};
use std::{any::TypeId, collections::VecDeque, sync::Arc, time::Duration};

/// One position of a [`MultiplePredicate`]: the entity type and its filter.
#[derive(Debug, Clone)]
pub struct MultipleQuery {
    type_id: TypeId,
    type_name: &'static str,
    resolve: fn(&MappingCache) -> Arc<Mapping>,
    pub predicate: Option<Predicate>,
    pub sorts: Vec<Sort>,
}

impl MultipleQuery {
    pub fn new<E: Entity>(predicate: Option<Predicate>, sorts: Vec<Sort>) -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: E::descriptor().type_name,
            resolve: MappingCache::resolve::<E>,
            predicate,
            sorts,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn mapping(&self, cache: &MappingCache) -> Arc<Mapping> {
        (self.resolve)(cache)
    }
}

/// Ordered list of queries read back through one [`MultipleResultReader`].
///
/// ```ignore
/// let queries = MultiplePredicate::new()
///     .add::<Customer>(Some(Predicate::eq("country", "IT")), vec![Sort::asc("name")])
///     .add::<Order>(None, vec![]);
/// let mut reader = database.get_multiple(&queries, None)?;
/// let customers = reader.read::<Customer>()?;
/// let orders = reader.read::<Order>()?;
/// ```
#[derive(Default, Debug, Clone)]
pub struct MultiplePredicate {
    queries: Vec<MultipleQuery>,
}

impl MultiplePredicate {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add<E: Entity>(mut self, predicate: Option<Predicate>, sorts: Vec<Sort>) -> Self {
        self.push::<E>(predicate, sorts);
        self
    }

    pub fn push<E: Entity>(&mut self, predicate: Option<Predicate>, sorts: Vec<Sort>) {
        self.queries.push(MultipleQuery::new::<E>(predicate, sorts));
    }

    pub fn queries(&self) -> &[MultipleQuery] {
        &self.queries
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

enum Pending {
    /// Result sets already received, one per position.
    Batched(VecDeque<Vec<QueryResult>>),
    /// Statements still to be sent, one per position.
    Lazy(VecDeque<Statement>),
}

/// Typed sequences of a multiple query, read in declaration order, each exactly once.
///
/// The reader keeps the connection borrowed until it is dropped.
pub struct MultipleResultReader<'a, C: Connection> {
    connection: &'a mut C,
    transaction: Option<&'a Transaction>,
    timeout: Option<Duration>,
    positions: VecDeque<(TypeId, &'static str)>,
    pending: Pending,
    read: usize,
}

impl<'a, C: Connection> MultipleResultReader<'a, C> {
    /// Reader over result sets already fetched with one batch.
    pub fn batched(
        connection: &'a mut C,
        transaction: Option<&'a Transaction>,
        queries: &MultiplePredicate,
        results: Vec<Vec<QueryResult>>,
    ) -> Result<Self> {
        if results.len() != queries.len() {
            return Err(DbError::MultipleResult(format!(
                "expected {} result sets, the batch returned {}",
                queries.len(),
                results.len()
            ))
            .into());
        }
        Ok(Self {
            connection,
            transaction,
            timeout: None,
            positions: positions(queries),
            pending: Pending::Batched(results.into()),
            read: 0,
        })
    }

    /// Reader sending `statements` one at a time, when their position is read.
    pub fn lazy(
        connection: &'a mut C,
        transaction: Option<&'a Transaction>,
        timeout: Option<Duration>,
        queries: &MultiplePredicate,
        statements: Vec<Statement>,
    ) -> Self {
        Self {
            connection,
            transaction,
            timeout,
            positions: positions(queries),
            pending: Pending::Lazy(statements.into()),
            read: 0,
        }
    }

    /// Number of positions not read yet.
    pub fn remaining(&self) -> usize {
        self.positions.len()
    }

    pub fn is_finished(&self) -> bool {
        self.positions.is_empty()
    }

    /// Consumes the next position as a sequence of `E`.
    ///
    /// Fails without consuming it when the next position is of another type.
    pub fn read<E: Entity>(&mut self) -> Result<Vec<E>> {
        let Some(&(type_id, type_name)) = self.positions.front() else {
            return Err(DbError::MultipleResult(format!(
                "no result set left to read as `{}`, {} already read",
                E::descriptor().type_name,
                self.read
            ))
            .into());
        };
        if type_id != TypeId::of::<E>() {
            return Err(DbError::MultipleResult(format!(
                "result set {} holds `{}` rows, cannot read it as `{}`",
                self.read,
                type_name,
                E::descriptor().type_name
            ))
            .into());
        }
        self.positions.pop_front();
        self.read += 1;
        let results = match &mut self.pending {
            Pending::Batched(results) => results.pop_front().unwrap_or_default(),
            Pending::Lazy(statements) => {
                let Some(statement) = statements.pop_front() else {
                    return Err(DbError::MultipleResult(format!(
                        "missing the statement of result set {}",
                        self.read - 1
                    ))
                    .into());
                };
                log::debug!("Reading result set: {}", truncate_long!(statement.sql));
                self.connection
                    .run(&statement, self.transaction, self.timeout)
                    .map_err(|e| provider_failure(e, &statement))?
            }
        };
        results
            .into_iter()
            .filter_map(|v| match v {
                QueryResult::Row(row) => Some(E::from_row(row)),
                QueryResult::Affected(..) => None,
            })
            .collect()
    }
}

fn positions(queries: &MultiplePredicate) -> VecDeque<(TypeId, &'static str)> {
    queries
        .queries()
        .iter()
        .map(|q| (q.type_id, q.type_name))
        .collect()
}
