use crate::decode_field::{FieldMetadata, decode_field};
use syn::{Fields, ItemStruct, LitStr, parse::ParseBuffer};

pub(crate) struct EntityMetadata {
    pub(crate) item: ItemStruct,
    pub(crate) table: Option<String>,
    pub(crate) schema: Option<String>,
    pub(crate) fields: Vec<FieldMetadata>,
}

impl EntityMetadata {
    /// Mapped fields, in declaration order.
    pub(crate) fn mapped(&self) -> impl Iterator<Item = &FieldMetadata> + Clone {
        self.fields.iter().filter(|f| !f.ignored)
    }
}

pub(crate) fn decode_entity(item: ItemStruct) -> EntityMetadata {
    if !item.generics.params.is_empty() {
        panic!("Entity cannot be derived for `{}`, generic structs are not supported", item.ident);
    }
    let Fields::Named(named) = &item.fields else {
        panic!("Entity can be derived only for structs with named fields");
    };
    let fields = named.named.iter().map(decode_field).collect::<Vec<_>>();
    let mut table = None;
    let mut schema = None;
    for attr in &item.attrs {
        let meta = &attr.meta;
        if !meta.path().is_ident("keel") {
            continue;
        }
        let Ok(list) = meta.require_list() else {
            panic!("Error while parsing `keel`, use it like: `#[keel(table = \"name\")]`");
        };
        let _ = list.parse_nested_meta(|arg| {
            if arg.path.is_ident("table") {
                let Ok(v) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                    panic!(
                        "Error while parsing `table`, use it like: `#[keel(table = \"my_table\")]`"
                    );
                };
                table = Some(v.value());
            } else if arg.path.is_ident("schema") {
                let Ok(v) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                    panic!(
                        "Error while parsing `schema`, use it like: `#[keel(schema = \"my_schema\")]`"
                    );
                };
                schema = Some(v.value());
            } else {
                panic!(
                    "Unknown attribute `{}` inside `keel`",
                    arg.path
                        .get_ident()
                        .map(ToString::to_string)
                        .unwrap_or_default()
                );
            }
            Ok(())
        });
    }
    EntityMetadata {
        item,
        table,
        schema,
        fields,
    }
}
