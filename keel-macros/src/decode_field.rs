use keel_core::KeyType;
use syn::{Field, Ident, LitStr, Token, Type, ext::IdentExt, parse::ParseBuffer};

pub(crate) struct FieldMetadata {
    pub(crate) ident: Ident,
    pub(crate) ty: Type,
    /// Field name without the raw identifier prefix.
    pub(crate) property: String,
    pub(crate) column: Option<String>,
    /// `Some(KeyType::NotAKey)` when marked as key without a kind.
    pub(crate) key: Option<KeyType>,
    pub(crate) ignored: bool,
    pub(crate) read_only: bool,
}

pub(crate) fn decode_field(field: &Field) -> FieldMetadata {
    let ident = field
        .ident
        .clone()
        .expect("Field is expected to have a name");
    let mut metadata = FieldMetadata {
        property: ident.unraw().to_string(),
        ident,
        ty: field.ty.clone(),
        column: None,
        key: None,
        ignored: false,
        read_only: false,
    };
    for attr in &field.attrs {
        let meta = &attr.meta;
        if !meta.path().is_ident("keel") {
            continue;
        }
        let Ok(list) = meta.require_list() else {
            panic!("Error while parsing `keel`, use it like: `#[keel(attribute = value, ...)]`");
        };
        let _ = list.parse_nested_meta(|arg| {
            if arg.path.is_ident("column") {
                let Ok(v) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                    panic!(
                        "Error while parsing `column`, use it like: `#[keel(column = \"my_column\")]`"
                    );
                };
                metadata.column = Some(v.value());
            } else if arg.path.is_ident("key") {
                if arg.input.peek(Token![=]) {
                    let Ok(v) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                        panic!(
                            "Error while parsing `key`, use it like: `#[keel(key = \"identity\")]`"
                        );
                    };
                    metadata.key = Some(match v.value().as_str() {
                        "identity" => KeyType::Identity,
                        "guid" => KeyType::Guid,
                        "assigned" => KeyType::Assigned,
                        other => panic!(
                            "Unknown key kind `{}`, expected one of: \"identity\", \"guid\", \"assigned\"",
                            other
                        ),
                    });
                } else {
                    metadata.key = Some(KeyType::NotAKey);
                }
            } else if arg.path.is_ident("ignore") {
                let Err(..) = arg.value() else {
                    // value() is Err for Meta::Path
                    panic!("Error while parsing `ignore`, use it like: `#[keel(ignore)]`");
                };
                metadata.ignored = true;
            } else if arg.path.is_ident("read_only") {
                let Err(..) = arg.value() else {
                    panic!("Error while parsing `read_only`, use it like: `#[keel(read_only)]`");
                };
                metadata.read_only = true;
            } else {
                panic!(
                    "Unknown attribute `{}` inside `keel` on field `{}`",
                    arg.path.get_ident().map(ToString::to_string).unwrap_or_default(),
                    metadata.property
                );
            }
            Ok(())
        });
    }
    if metadata.ignored && (metadata.key.is_some() || metadata.column.is_some()) {
        panic!(
            "Field `{}` is ignored, it cannot also be a key or have a column name",
            metadata.property
        );
    }
    metadata
}
