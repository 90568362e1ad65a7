//! Procedural macros for the mockrest project.
//!
//! `#[derive(Resource)]` binds a Rust type to a collection:
//!
//! ```ignore
//! use mockrest::prelude::*;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Resource)]
//! #[resource(collection = "people")]
//! pub struct Person {
//!     pub id: Option<i64>,
//!     pub name: String,
//! }
//! ```
//!
//! Without the attribute the collection is the snake_case type name plus `s`
//! (`OrderLine` becomes `order_lines`).

#[allow(unused_extern_crates)]
extern crate self as mockrest_macros;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, LitStr, parse_macro_input};

#[proc_macro_derive(Resource, attributes(resource))]
pub fn derive_resource(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_resource(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_resource(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let collection = collection_name(input)?;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::mockrest::entity::Resource for #name #ty_generics #where_clause {
            fn collection_name() -> &'static str {
                #collection
            }
        }
    })
}

fn collection_name(input: &DeriveInput) -> syn::Result<String> {
    let mut collection = None;

    for attr in &input.attrs {
        if !attr.path().is_ident("resource") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().is_empty() {
                    return Err(meta.error("collection name must not be empty"));
                }
                collection = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `collection = \"...\"`"))
            }
        })?;
    }

    Ok(collection.unwrap_or_else(|| default_collection(&input.ident.to_string())))
}

fn default_collection(type_name: &str) -> String {
    let mut snake = String::with_capacity(type_name.len() + 4);

    for (i, ch) in type_name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                snake.push('_');
            }
            snake.extend(ch.to_lowercase());
        } else {
            snake.push(ch);
        }
    }

    snake.push('s');
    snake
}
