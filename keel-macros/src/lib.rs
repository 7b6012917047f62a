mod decode_entity;
mod decode_field;

use decode_entity::{EntityMetadata, decode_entity};
use keel_core::{KeyType, conventional_key};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{ItemStruct, parse_macro_input};

#[proc_macro_derive(Entity, attributes(keel))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let item: ItemStruct = parse_macro_input!(input as ItemStruct);
    let entity = decode_entity(item);
    let name = &entity.item.ident;
    let type_name = name.to_string();
    let identities = entity
        .mapped()
        .filter(|f| f.key == Some(KeyType::Identity))
        .count();
    if identities > 1 {
        panic!(
            "Entity `{}` declares {} identity keys, at most one is allowed",
            type_name, identities
        );
    }
    let descriptor = descriptor(&entity);
    let keys = key_fields(&entity);
    let key_types = keys.iter().map(|f| &f.ty);
    let key_values = keys.iter().map(|f| {
        let ident = &f.ident;
        quote!(::std::clone::Clone::clone(&self.#ident))
    });
    let (key_type, key_value) = if keys.len() == 1 {
        (quote!(#(#key_types)*), quote!(#(#key_values)*))
    } else {
        (quote!((#(#key_types,)*)), quote!((#(#key_values,)*)))
    };
    let row = entity.mapped().map(|f| {
        let ident = &f.ident;
        let property = &f.property;
        let ty = &f.ty;
        quote! {
            (#property, <#ty as ::keel::AsValue>::as_value(
                ::std::clone::Clone::clone(&self.#ident)
            ))
        }
    });
    let from_row = entity.fields.iter().map(|f| {
        let ident = &f.ident;
        let property = &f.property;
        let ty = &f.ty;
        if f.ignored {
            quote!(#ident: ::std::default::Default::default())
        } else {
            quote!(#ident: ::keel::decode_property::<Self, #ty>(&mut row, #property)?)
        }
    });
    let set_property = entity.mapped().map(|f| {
        let ident = &f.ident;
        let property = &f.property;
        let ty = &f.ty;
        quote!(#property => ::keel::assign_property::<Self, #ty>(&mut self.#ident, property, value))
    });
    quote! {
        impl ::keel::Entity for #name {
            type Key = #key_type;

            fn descriptor() -> &'static ::keel::EntityDescriptor {
                static DESCRIPTOR: ::std::sync::LazyLock<::keel::EntityDescriptor> =
                    ::std::sync::LazyLock::new(|| #descriptor);
                &DESCRIPTOR
            }

            fn key(&self) -> Self::Key {
                #key_value
            }

            fn row(&self) -> ::std::vec::Vec<(&'static str, ::keel::Value)> {
                vec![#(#row),*]
            }

            fn from_row(mut row: ::keel::RowLabeled) -> ::keel::Result<Self> {
                Ok(Self {
                    #(#from_row,)*
                })
            }

            fn set_property(&mut self, property: &str, value: ::keel::Value) -> ::keel::Result<()> {
                match property {
                    #(#set_property,)*
                    _ => Err(::keel::unknown_property::<Self>(property)),
                }
            }
        }
    }
    .into()
}

fn descriptor(entity: &EntityMetadata) -> TokenStream2 {
    let type_name = entity.item.ident.to_string();
    let table = optional_str(entity.table.as_deref());
    let schema = optional_str(entity.schema.as_deref());
    let fields = entity.fields.iter().map(|f| {
        let property = &f.property;
        let column = optional_str(f.column.as_deref());
        let key = match f.key {
            None => quote!(None),
            Some(KeyType::NotAKey) => quote!(Some(::keel::KeyType::NotAKey)),
            Some(KeyType::Identity) => quote!(Some(::keel::KeyType::Identity)),
            Some(KeyType::Guid) => quote!(Some(::keel::KeyType::Guid)),
            Some(KeyType::Assigned) => quote!(Some(::keel::KeyType::Assigned)),
        };
        let ignored = f.ignored;
        let read_only = f.read_only;
        let (value, nullable) = if f.ignored {
            (quote!(::keel::Value::Null), quote!(true))
        } else {
            let ty = &f.ty;
            (
                quote!(<#ty as ::keel::AsValue>::as_empty_value()),
                quote!(<#ty as ::keel::AsValue>::nullable()),
            )
        };
        quote! {
            ::keel::FieldDescriptor {
                property: #property,
                column: #column,
                value: #value,
                nullable: #nullable,
                key: #key,
                ignored: #ignored,
                read_only: #read_only,
            }
        }
    });
    quote! {
        ::keel::EntityDescriptor {
            type_name: #type_name,
            table: #table,
            schema: #schema,
            fields: vec![#(#fields),*],
        }
    }
}

/// Key fields: the explicitly marked ones, otherwise the conventional one.
fn key_fields(entity: &EntityMetadata) -> Vec<&decode_field::FieldMetadata> {
    let explicit = entity
        .mapped()
        .filter(|f| f.key.is_some())
        .collect::<Vec<_>>();
    if !explicit.is_empty() {
        return explicit;
    }
    let type_name = entity.item.ident.to_string();
    conventional_key(&type_name, entity.mapped().map(|f| f.property.as_str()))
        .and_then(|i| entity.mapped().nth(i))
        .into_iter()
        .collect()
}

fn optional_str(value: Option<&str>) -> TokenStream2 {
    match value {
        Some(v) => quote!(Some(#v)),
        None => quote!(None),
    }
}
