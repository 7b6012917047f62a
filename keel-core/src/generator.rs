use crate::{
    ColumnMap, DbError, Entity, KeyValues, Mapping, MappingCache, MultiplePredicate,
    MultipleQuery, Predicate, PredicateGroup, Result, Sort, SqlWriter, Statement, Value,
    writer::{Context, Fragment, Window},
};
use std::{collections::HashMap, sync::Arc};

/// Builds parameterized statements for one dialect.
///
/// Generation only reads the mapping cache, it never talks to a connection. Every
/// predicate and sort is validated against the mapping before any text is written.
#[derive(Debug, Clone)]
pub struct SqlGenerator<W: SqlWriter> {
    writer: W,
    cache: Arc<MappingCache>,
}

impl<W: SqlWriter> SqlGenerator<W> {
    pub fn new(writer: W, cache: Arc<MappingCache>) -> Self {
        Self { writer, cache }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn cache(&self) -> &Arc<MappingCache> {
        &self.cache
    }

    pub fn mapping<E: Entity>(&self) -> Arc<Mapping> {
        self.cache.resolve::<E>()
    }

    /// SELECT filtered by `predicate` (every row when `None`) ordered by `sorts`.
    pub fn select<E: Entity>(
        &self,
        predicate: Option<&Predicate>,
        sorts: &[Sort],
    ) -> Result<Statement> {
        let mapping = self.mapping::<E>();
        self.select_window(&mapping, predicate, sorts, None)
    }

    /// SELECT of page `page` (1 based) of `size` rows. Page or size zero selects every row.
    pub fn select_paged<E: Entity>(
        &self,
        predicate: Option<&Predicate>,
        sorts: &[Sort],
        page: u64,
        size: u64,
    ) -> Result<Statement> {
        let mapping = self.mapping::<E>();
        let window = (page >= 1 && size >= 1).then(|| Window {
            offset: (page - 1).saturating_mul(size),
            limit: size,
        });
        self.select_window(&mapping, predicate, sorts, window)
    }

    /// SELECT skipping `first_result` rows and returning at most `max_results` rows.
    ///
    /// Zero `max_results` means no upper bound, both zero selects every row.
    pub fn select_set<E: Entity>(
        &self,
        predicate: Option<&Predicate>,
        sorts: &[Sort],
        first_result: u64,
        max_results: u64,
    ) -> Result<Statement> {
        let mapping = self.mapping::<E>();
        let window = (first_result > 0 || max_results > 0).then(|| Window {
            offset: first_result,
            limit: if max_results > 0 {
                max_results
            } else {
                i64::MAX as u64
            },
        });
        self.select_window(&mapping, predicate, sorts, window)
    }

    pub fn count<E: Entity>(&self, predicate: Option<&Predicate>) -> Result<Statement> {
        let mapping = self.mapping::<E>();
        if let Some(predicate) = predicate {
            predicate.validate(&mapping)?;
        }
        let mut context = Context::new(Fragment::SqlCount, false);
        let mut sql = String::new();
        self.writer
            .write_count(&mut context, &mut sql, &mapping, predicate);
        self.finish(mapping.entity, context, sql)
    }

    /// SELECT of the row whose primary key equals `key`.
    pub fn select_by_key<E: Entity>(&self, key: E::Key) -> Result<Statement> {
        let mapping = self.mapping::<E>();
        let predicate = key_predicate(&mapping, key.into_values())?;
        self.select_window(&mapping, Some(&predicate), &[], None)
    }

    /// INSERT of one entity, followed by the retrieval of its generated key when it has one.
    pub fn insert<E: Entity>(&self, entity: &E) -> Result<Statement> {
        let mapping = self.mapping::<E>();
        let columns = mapping.insertable().collect::<Vec<_>>();
        let row = insert_row(&columns, entity.row());
        let mut context = Context::new(Fragment::SqlInsertInto, false);
        let mut sql = String::new();
        self.writer.write_insert(
            &mut context,
            &mut sql,
            &mapping,
            &columns,
            vec![row],
            mapping.identity(),
        );
        self.finish(mapping.entity, context, sql)
    }

    /// INSERT statements for `entities`.
    ///
    /// Entities with an identity key get one statement each so every generated key can
    /// be read back. The others are grouped into multi-row statements that stay within
    /// the parameter limit of the dialect.
    pub fn insert_many<E: Entity>(&self, entities: &[E]) -> Result<Vec<Statement>> {
        let mapping = self.mapping::<E>();
        if mapping.identity().is_some() {
            return entities.iter().map(|e| self.insert(e)).collect();
        }
        let columns = mapping.insertable().collect::<Vec<_>>();
        let per_statement = if columns.is_empty() {
            1
        } else {
            (self.writer.max_parameters() / columns.len()).max(1)
        };
        entities
            .chunks(per_statement)
            .map(|chunk| {
                let rows = chunk
                    .iter()
                    .map(|e| insert_row(&columns, e.row()))
                    .collect::<Vec<_>>();
                let mut context = Context::new(Fragment::SqlInsertInto, false);
                let mut sql = String::new();
                self.writer
                    .write_insert(&mut context, &mut sql, &mapping, &columns, rows, None);
                self.finish(mapping.entity, context, sql)
            })
            .collect()
    }

    /// UPDATE of every non key column, scoped by the primary key of `entity`.
    pub fn update<E: Entity>(&self, entity: &E) -> Result<Statement> {
        let mapping = self.mapping::<E>();
        let key = key_predicate(&mapping, entity.key().into_values())?;
        let mut row = entity.row().into_iter().collect::<HashMap<_, _>>();
        let values = mapping
            .updatable()
            .map(|c| (c, row.remove(c.property).unwrap_or_default()))
            .collect::<Vec<_>>();
        if values.is_empty() {
            return Err(DbError::validation(
                mapping.entity,
                "has no column that can be updated",
            )
            .into());
        }
        let mut context = Context::new(Fragment::SqlUpdate, false);
        let mut sql = String::new();
        self.writer
            .write_update(&mut context, &mut sql, &mapping, values, &key);
        self.finish(mapping.entity, context, sql)
    }

    /// DELETE of the row whose primary key equals the key of `entity`.
    pub fn delete<E: Entity>(&self, entity: &E) -> Result<Statement> {
        let mapping = self.mapping::<E>();
        let key = key_predicate(&mapping, entity.key().into_values())?;
        self.delete_statement(&mapping, &key)
    }

    /// DELETE of every row matching `predicate`.
    pub fn delete_where<E: Entity>(&self, predicate: &Predicate) -> Result<Statement> {
        let mapping = self.mapping::<E>();
        predicate.validate(&mapping)?;
        self.delete_statement(&mapping, predicate)
    }

    /// All the selects of `multiple` as one batch sharing one parameter list.
    pub fn multiple(&self, multiple: &MultiplePredicate) -> Result<Statement> {
        let mut context = Context::new(Fragment::SqlSelect, false);
        let mut sql = String::new();
        for query in multiple.queries() {
            let mapping = query.mapping(&self.cache);
            self.write_select(
                &mut context,
                &mut sql,
                &mapping,
                query.predicate.as_ref(),
                &query.sorts,
                None,
            )?;
        }
        self.finish("multiple", context, sql)
    }

    /// The select of a single position of a [`MultiplePredicate`].
    pub fn multiple_query(&self, query: &MultipleQuery) -> Result<Statement> {
        let mapping = query.mapping(&self.cache);
        self.select_window(&mapping, query.predicate.as_ref(), &query.sorts, None)
    }

    pub fn create_table<E: Entity>(&self, if_not_exists: bool) -> Result<Statement> {
        let mapping = self.mapping::<E>();
        let mut context = Context::new(Fragment::SqlCreateTable, false);
        let mut sql = String::new();
        self.writer
            .write_create_table(&mut context, &mut sql, &mapping, if_not_exists);
        Ok(context.into_statement(sql))
    }

    pub fn drop_table<E: Entity>(&self, if_exists: bool) -> Result<Statement> {
        let mapping = self.mapping::<E>();
        let mut context = Context::new(Fragment::SqlDropTable, false);
        let mut sql = String::new();
        self.writer
            .write_drop_table(&mut context, &mut sql, &mapping, if_exists);
        Ok(context.into_statement(sql))
    }

    fn select_window(
        &self,
        mapping: &Mapping,
        predicate: Option<&Predicate>,
        sorts: &[Sort],
        window: Option<Window>,
    ) -> Result<Statement> {
        let mut context = Context::new(Fragment::SqlSelect, false);
        let mut sql = String::new();
        self.write_select(&mut context, &mut sql, mapping, predicate, sorts, window)?;
        self.finish(mapping.entity, context, sql)
    }

    fn write_select(
        &self,
        context: &mut Context,
        sql: &mut String,
        mapping: &Mapping,
        predicate: Option<&Predicate>,
        sorts: &[Sort],
        window: Option<Window>,
    ) -> Result<()> {
        if let Some(predicate) = predicate {
            predicate.validate(mapping)?;
        }
        sorts.iter().try_for_each(|s| s.validate(mapping))?;
        let default_order;
        let sorts = if window.is_some() && sorts.is_empty() {
            default_order = deterministic_order(mapping);
            &default_order
        } else {
            sorts
        };
        self.writer
            .write_select(context, sql, mapping, predicate, sorts, window.as_ref());
        Ok(())
    }

    fn delete_statement(&self, mapping: &Mapping, predicate: &Predicate) -> Result<Statement> {
        let mut context = Context::new(Fragment::SqlDeleteFrom, false);
        let mut sql = String::new();
        self.writer
            .write_delete(&mut context, &mut sql, mapping, predicate);
        self.finish(mapping.entity, context, sql)
    }

    /// Rejects statements binding more parameters than the dialect accepts.
    fn finish(&self, owner: &str, context: Context, sql: String) -> Result<Statement> {
        let limit = self.writer.max_parameters();
        if context.params.len() > limit {
            return Err(DbError::validation(
                owner,
                format!(
                    "the statement binds {} parameters, the limit is {}",
                    context.params.len(),
                    limit
                ),
            )
            .into());
        }
        Ok(context.into_statement(sql))
    }
}

/// Equality on every key column, in key order.
pub fn key_predicate(mapping: &Mapping, values: Vec<Value>) -> Result<Predicate> {
    let keys = mapping.keys().collect::<Vec<_>>();
    if keys.is_empty() {
        return Err(DbError::validation(mapping.entity, "has no primary key").into());
    }
    if keys.len() != values.len() {
        return Err(DbError::validation(
            mapping.entity,
            format!(
                "the primary key has {} column(s), got {} value(s)",
                keys.len(),
                values.len()
            ),
        )
        .into());
    }
    if let Some(column) = keys.iter().zip(&values).find(|(_, v)| v.is_null()) {
        return Err(DbError::validation(column.0.property, "primary key value is NULL").into());
    }
    let mut predicates = keys
        .into_iter()
        .zip(values)
        .map(|(c, v)| Predicate::eq(c.property, v))
        .collect::<Vec<_>>();
    Ok(if predicates.len() == 1 {
        predicates.remove(0)
    } else {
        PredicateGroup::all(predicates).into()
    })
}

fn deterministic_order(mapping: &Mapping) -> Vec<Sort> {
    if mapping.has_key() {
        mapping.keys().map(|c| Sort::asc(c.property)).collect()
    } else {
        mapping.columns.iter().map(|c| Sort::asc(c.property)).collect()
    }
}

fn insert_row(columns: &[&ColumnMap], row: Vec<(&'static str, Value)>) -> Vec<Value> {
    let mut row = row.into_iter().collect::<HashMap<_, _>>();
    columns
        .iter()
        .map(|c| row.remove(c.property).unwrap_or_default())
        .collect()
}
