use crate::{AsValue, DbError, Result, RowLabeled, Value};
use convert_case::{Case, Casing};

/// How the value of a primary key column comes into existence.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    #[default]
    NotAKey,
    /// Generated by the database, read back after the insert.
    Identity,
    /// Sequential guid generated by keel before the insert when the field is nil.
    Guid,
    /// Supplied by the caller.
    Assigned,
}

/// Static description of one entity field, emitted by `#[derive(Entity)]`.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Rust field name.
    pub property: &'static str,
    /// Column name override, the property name is used otherwise.
    pub column: Option<&'static str>,
    /// Prototype value (typed NULL) describing the field type.
    pub value: Value,
    pub nullable: bool,
    /// Explicit key marker, `Some(KeyType::NotAKey)` when marked without a kind.
    pub key: Option<KeyType>,
    /// Not mapped: never selected nor written, default initialized on read.
    pub ignored: bool,
    /// Selected but never inserted or updated.
    pub read_only: bool,
}

/// Static description of an entity type, the input of the mapping derivation.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    /// Type identifier as written in the source.
    pub type_name: &'static str,
    /// Table name override.
    pub table: Option<&'static str>,
    pub schema: Option<&'static str>,
    pub fields: Vec<FieldDescriptor>,
}

/// A type persisted as one row of one table.
///
/// Normally implemented through `#[derive(Entity)]`:
/// ```ignore
/// #[derive(Entity, Default, Clone)]
/// #[keel(table = "customers")]
/// struct Customer {
///     id: i64,
///     #[keel(column = "full_name")]
///     name: String,
///     email: Option<String>,
/// }
/// ```
pub trait Entity: Sized + 'static {
    /// Primary key value(s): a single value, a tuple for composite keys, `()` when keyless.
    type Key: KeyValues;

    fn descriptor() -> &'static EntityDescriptor;

    fn key(&self) -> Self::Key;

    /// Mapped (non ignored) field values by property name, in declaration order.
    fn row(&self) -> Vec<(&'static str, Value)>;

    /// Builds the entity from a row labeled by property names.
    fn from_row(row: RowLabeled) -> Result<Self>;

    /// Assigns one field from a dynamic value (used to write back generated keys).
    fn set_property(&mut self, property: &str, value: Value) -> Result<()>;
}

/// Flattens a key into its ordered parameter values.
pub trait KeyValues {
    fn into_values(self) -> Vec<Value>;
}

impl<T: AsValue> KeyValues for T {
    fn into_values(self) -> Vec<Value> {
        vec![self.as_value()]
    }
}

impl KeyValues for () {
    fn into_values(self) -> Vec<Value> {
        Vec::new()
    }
}

macro_rules! impl_key_values {
    ($($name:ident),+) => {
        impl<$($name: AsValue),+> KeyValues for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_values(self) -> Vec<Value> {
                let ($($name,)+) = self;
                vec![$($name.as_value()),+]
            }
        }
    };
}
impl_key_values!(A, B);
impl_key_values!(A, B, C);
impl_key_values!(A, B, C, D);

/// Default table name of a type: its snake case identifier.
pub fn table_name_for(type_name: &str) -> String {
    type_name.to_case(Case::Snake)
}

/// Index of the conventional key property: `id`, otherwise `<snake_type>_id`.
pub fn conventional_key<'a>(
    type_name: &str,
    properties: impl IntoIterator<Item = &'a str>,
) -> Option<usize> {
    let properties = properties.into_iter().collect::<Vec<_>>();
    properties
        .iter()
        .position(|v| v.eq_ignore_ascii_case("id"))
        .or_else(|| {
            let name = format!("{}_id", table_name_for(type_name));
            properties.iter().position(|v| v.eq_ignore_ascii_case(&name))
        })
}

/// Moves the value labeled `property` out of the row and converts it into the field type.
pub fn decode_property<E: Entity, T: AsValue>(
    row: &mut RowLabeled,
    property: &str,
) -> Result<T> {
    let value = row.take_column(property).unwrap_or_default();
    T::try_from_value(value).map_err(|e| {
        DbError::Decode {
            entity: E::descriptor().type_name,
            property: property.into(),
            message: format!("{e:#}"),
        }
        .into()
    })
}

/// Converts a dynamic value for [`Entity::set_property`], reporting the property on failure.
pub fn assign_property<E: Entity, T: AsValue>(
    target: &mut T,
    property: &str,
    value: Value,
) -> Result<()> {
    *target = T::try_from_value(value).map_err(|e| {
        crate::Error::from(DbError::Decode {
            entity: E::descriptor().type_name,
            property: property.into(),
            message: format!("{e:#}"),
        })
    })?;
    Ok(())
}

/// The error returned by [`Entity::set_property`] for an unknown property.
pub fn unknown_property<E: Entity>(property: &str) -> crate::Error {
    DbError::mapping(E::descriptor().type_name, property, "is not a mapped property").into()
}
