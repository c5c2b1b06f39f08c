//! Procedural macros for the mongodbr project.
//!
//! This crate provides the `Entity` derive, which implements `mongodbr::entity::Entity`
//! for structs with named fields.

#[allow(unused_extern_crates)]
extern crate self as mongodbr_macros;

mod entity;

use proc_macro::TokenStream;
use syn::{Data, DeriveInput, parse_macro_input};

/// Derives `mongodbr::entity::Entity`.
///
/// The identifier is the field marked `#[entity(id)]`. Without that attribute, a field
/// named `id` or `_id` is used. The field must be an `ObjectId`.
///
/// # Examples
///
/// ```rust,ignore
/// use mongodbr::{Entity, bson::oid::ObjectId};
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Serialize, Deserialize, Entity)]
/// pub struct Order {
///     #[entity(id)]
///     #[serde(rename = "_id")]
///     pub order_id: ObjectId,
///     pub total: i64,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    let result = match ast.data {
        Data::Struct(ref data) => entity::generate_entity_for_struct(&ast, data),
        Data::Enum(_) => Err(syn::Error::new_spanned(
            &ast,
            "Cannot derive Entity for enums. Only structs with named fields are supported.",
        )),
        Data::Union(_) => Err(syn::Error::new_spanned(
            &ast,
            "Cannot derive Entity for unions. Only structs with named fields are supported.",
        )),
    };

    result
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
