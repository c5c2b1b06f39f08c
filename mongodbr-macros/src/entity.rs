use proc_macro2::TokenStream;
use quote::quote;
use syn::{DataStruct, DeriveInput, Field, Fields, Result};

/// Returns whether the field carries `#[entity(id)]`.
fn is_marked_id(field: &Field) -> Result<bool> {
    let mut marked = false;

    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                marked = true;
                Ok(())
            } else {
                Err(meta.error("Unknown entity attribute, expected `id`"))
            }
        })?;
    }

    Ok(marked)
}

fn find_id_field<'a>(ast: &DeriveInput, data: &'a DataStruct) -> Result<&'a Field> {
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            ast,
            "Entity can only be derived for structs with named fields",
        ));
    };

    let mut marked = Vec::new();
    for field in &fields.named {
        if is_marked_id(field)? {
            marked.push(field);
        }
    }

    match marked.as_slice() {
        [field] => return Ok(field),
        [_, second, ..] => {
            return Err(syn::Error::new_spanned(
                second,
                "Multiple #[entity(id)] fields are not allowed",
            ));
        }
        [] => {}
    }

    fields
        .named
        .iter()
        .find(|field| {
            field
                .ident
                .as_ref()
                .is_some_and(|ident| ident == "id" || ident == "_id")
        })
        .ok_or_else(|| {
            syn::Error::new_spanned(
                ast,
                format!(
                    "No identifier found for '{}'. Mark an ObjectId field with #[entity(id)] \
                     or name it `id`.",
                    ast.ident
                ),
            )
        })
}

pub(crate) fn generate_entity_for_struct(ast: &DeriveInput, data: &DataStruct) -> Result<TokenStream> {
    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let id_field = find_id_field(ast, data)?;
    let id_ident = &id_field.ident;
    let id_type = &id_field.ty;

    Ok(quote! {
        impl #impl_generics ::mongodbr::entity::Entity for #name #ty_generics #where_clause {
            fn object_id(&self) -> ::mongodbr::bson::oid::ObjectId {
                let id: &#id_type = &self.#id_ident;
                ::core::clone::Clone::clone(id)
            }
        }
    })
}
