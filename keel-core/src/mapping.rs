use crate::{
    DbError, Entity, EntityDescriptor, KeyType, Result, Value, conventional_key, table_name_for,
};
use std::{
    any::TypeId,
    collections::HashMap,
    sync::{Arc, LazyLock, OnceLock, PoisonError, RwLock},
};

/// Schema qualified table name.
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub name: String,
    pub schema: String,
}

/// One mapped column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMap {
    /// Rust field name, also the label used when reading rows.
    pub property: &'static str,
    /// Column name in the table.
    pub column: String,
    /// Prototype (typed NULL).
    pub value: Value,
    pub nullable: bool,
    pub key: KeyType,
    pub read_only: bool,
}

impl ColumnMap {
    pub fn is_key(&self) -> bool {
        self.key != KeyType::NotAKey
    }
}

/// Table and column metadata of one entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    pub entity: &'static str,
    pub table: TableRef,
    pub columns: Vec<ColumnMap>,
}

impl Mapping {
    /// Derives the mapping from the static descriptor, applying the naming conventions.
    pub fn derive(descriptor: &EntityDescriptor) -> Mapping {
        let fields = descriptor
            .fields
            .iter()
            .filter(|f| !f.ignored)
            .collect::<Vec<_>>();
        let explicit = fields.iter().any(|f| f.key.is_some());
        let conventional = if explicit {
            None
        } else {
            conventional_key(descriptor.type_name, fields.iter().map(|f| f.property))
        };
        let columns = fields
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let marked = if explicit {
                    f.key
                } else if conventional == Some(i) {
                    Some(KeyType::NotAKey)
                } else {
                    None
                };
                let key = match marked {
                    None => KeyType::NotAKey,
                    Some(KeyType::NotAKey) => infer_key_type(&f.value),
                    Some(key) => key,
                };
                ColumnMap {
                    property: f.property,
                    column: f.column.unwrap_or(f.property).to_string(),
                    value: f.value.clone(),
                    nullable: f.nullable && key == KeyType::NotAKey,
                    key,
                    read_only: f.read_only,
                }
            })
            .collect::<Vec<_>>();
        // Composite keys are never generated by the database
        let composite = columns.iter().filter(|c| c.is_key()).count() > 1;
        let columns = columns
            .into_iter()
            .map(|mut c| {
                if composite && c.key == KeyType::Identity {
                    c.key = KeyType::Assigned;
                }
                c
            })
            .collect();
        Mapping {
            entity: descriptor.type_name,
            table: TableRef {
                name: descriptor
                    .table
                    .map(ToString::to_string)
                    .unwrap_or_else(|| table_name_for(descriptor.type_name)),
                schema: descriptor.schema.unwrap_or_default().to_string(),
            },
            columns,
        }
    }

    pub fn column(&self, property: &str) -> Option<&ColumnMap> {
        self.columns.iter().find(|c| c.property == property)
    }

    /// Like [`Mapping::column`] but fails with a mapping error naming the property.
    pub fn require(&self, property: &str) -> Result<&ColumnMap> {
        self.column(property).ok_or_else(|| {
            DbError::mapping(self.entity, property, "does not exist in the mapping").into()
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &ColumnMap> + Clone {
        self.columns.iter().filter(|c| c.is_key())
    }

    pub fn has_key(&self) -> bool {
        self.keys().next().is_some()
    }

    /// The column generated by the database, if any.
    pub fn identity(&self) -> Option<&ColumnMap> {
        self.columns.iter().find(|c| c.key == KeyType::Identity)
    }

    /// Columns written by an INSERT.
    pub fn insertable(&self) -> impl Iterator<Item = &ColumnMap> + Clone {
        self.columns
            .iter()
            .filter(|c| c.key != KeyType::Identity && !c.read_only)
    }

    /// Columns written by an UPDATE.
    pub fn updatable(&self) -> impl Iterator<Item = &ColumnMap> + Clone {
        self.columns.iter().filter(|c| !c.is_key() && !c.read_only)
    }
}

fn infer_key_type(value: &Value) -> KeyType {
    match value {
        v if v.is_integer() => KeyType::Identity,
        Value::Uuid(..) => KeyType::Guid,
        _ => KeyType::Assigned,
    }
}

static GLOBAL: LazyLock<Arc<MappingCache>> = LazyLock::new(|| Arc::new(MappingCache::new()));

/// Process wide memo of entity mappings keyed by type.
///
/// The first resolution of a type derives its mapping exactly once, concurrent
/// callers wait on the same cell and observe the same `Arc`.
#[derive(Default, Debug)]
pub struct MappingCache {
    entries: RwLock<HashMap<TypeId, Arc<OnceLock<Arc<Mapping>>>>>,
}

impl MappingCache {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn global() -> &'static Arc<MappingCache> {
        &GLOBAL
    }

    pub fn resolve<E: Entity>(&self) -> Arc<Mapping> {
        let id = TypeId::of::<E>();
        let cell = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned();
        let cell = match cell {
            Some(cell) => cell,
            None => self
                .entries
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(id)
                .or_default()
                .clone(),
        };
        cell.get_or_init(|| {
            let mapping = Mapping::derive(E::descriptor());
            log::debug!(
                "Derived the mapping of `{}` on table `{}`",
                mapping.entity,
                mapping.table.name
            );
            Arc::new(mapping)
        })
        .clone()
    }

    /// Forgets every cached mapping, the next resolution derives them again.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|v| v.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldDescriptor;

    fn field(property: &'static str, value: Value) -> FieldDescriptor {
        FieldDescriptor {
            property,
            column: None,
            value,
            nullable: false,
            key: None,
            ignored: false,
            read_only: false,
        }
    }

    #[test]
    fn conventional_id_is_identity() {
        let mapping = Mapping::derive(&EntityDescriptor {
            type_name: "OrderLine",
            table: None,
            schema: None,
            fields: vec![
                field("id", Value::Int64(None)),
                field("product", Value::Varchar(None)),
            ],
        });
        assert_eq!(mapping.table.name, "order_line");
        assert_eq!(mapping.identity().map(|c| c.property), Some("id"));
        assert_eq!(mapping.insertable().count(), 1);
    }

    #[test]
    fn type_prefixed_key() {
        let mapping = Mapping::derive(&EntityDescriptor {
            type_name: "Customer",
            table: Some("clients"),
            schema: Some("sales"),
            fields: vec![
                field("name", Value::Varchar(None)),
                field("customer_id", Value::Uuid(None)),
            ],
        });
        assert_eq!(mapping.table.name, "clients");
        assert_eq!(mapping.table.schema, "sales");
        let keys = mapping.keys().map(|c| (c.property, c.key)).collect::<Vec<_>>();
        assert_eq!(keys, [("customer_id", KeyType::Guid)]);
    }

    #[test]
    fn explicit_keys_win() {
        let mut code = field("code", Value::Varchar(None));
        code.key = Some(KeyType::NotAKey);
        let mut year = field("year", Value::Int32(None));
        year.key = Some(KeyType::NotAKey);
        let mut ignored = field("cache", Value::Varchar(None));
        ignored.ignored = true;
        let mapping = Mapping::derive(&EntityDescriptor {
            type_name: "Edition",
            table: None,
            schema: None,
            fields: vec![field("id", Value::Int64(None)), code, year, ignored],
        });
        let keys = mapping.keys().map(|c| (c.property, c.key)).collect::<Vec<_>>();
        assert_eq!(
            keys,
            [("code", KeyType::Assigned), ("year", KeyType::Assigned)]
        );
        assert!(mapping.identity().is_none());
        assert!(mapping.column("cache").is_none());
        assert_eq!(mapping.columns.len(), 3);
    }

    #[test]
    fn keyless() {
        let mapping = Mapping::derive(&EntityDescriptor {
            type_name: "LogLine",
            table: None,
            schema: None,
            fields: vec![field("message", Value::Varchar(None))],
        });
        assert!(!mapping.has_key());
        let error = mapping.require("missing").unwrap_err();
        assert!(matches!(
            error.downcast_ref::<DbError>(),
            Some(DbError::Mapping { .. })
        ));
    }
}
