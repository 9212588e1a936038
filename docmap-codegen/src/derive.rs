//! Implementation of the `#[derive(Record)]` macro.

use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Type};

/// Parse and generate code for the `#[derive(Record)]` macro.
pub fn derive_record_impl(input: &DeriveInput) -> Result<TokenStream, syn::Error> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record derive does not support generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Record derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Record derive only supports structs",
            ));
        }
    };

    let struct_attrs = parse_struct_attrs(input)?;
    let field_infos: Vec<FieldInfo> = fields.iter().map(parse_field).collect::<Result<_, _>>()?;

    let type_name = name.unraw().to_string();
    let model_name = struct_attrs.model.unwrap_or_else(|| type_name.clone());
    let collection = optional_str(struct_attrs.collection);
    let database = optional_str(struct_attrs.database);

    let specs = field_infos.iter().map(field_spec);

    let accessors = field_infos
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.skip)
        .map(|(index, f)| {
            let ident = &f.name;
            quote! {
                #index => ::std::option::Option::Some(&self.#ident as &dyn ::docmap::value::FieldValue),
            }
        });

    let mut_accessors = field_infos
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.skip)
        .map(|(index, f)| {
            let ident = &f.name;
            quote! {
                #index => ::std::option::Option::Some(&mut self.#ident as &mut dyn ::docmap::value::FieldValue),
            }
        });

    let zero_fields = field_infos.iter().map(|f| {
        let ident = &f.name;
        let ty = &f.ty;
        if f.skip {
            quote! { #ident: ::std::default::Default::default() }
        } else {
            quote! { #ident: <#ty as ::docmap::value::ZeroValue>::zero() }
        }
    });

    Ok(quote! {
        impl ::docmap::record::Record for #name {
            fn layout() -> ::docmap::OdmResult<&'static ::docmap::naming::RecordLayout> {
                static LAYOUT: ::std::sync::OnceLock<
                    ::std::result::Result<::docmap::naming::RecordLayout, ::std::string::String>,
                > = ::std::sync::OnceLock::new();
                const FIELDS: &[::docmap::naming::FieldSpec] = &[#(#specs),*];
                ::docmap::record::cached_layout(&LAYOUT, #type_name, FIELDS)
            }

            fn model_options() -> ::docmap::record::ModelOptions {
                ::docmap::record::ModelOptions {
                    name: #model_name,
                    collection: #collection,
                    database: #database,
                }
            }

            fn field(&self, index: usize) -> ::std::option::Option<&dyn ::docmap::value::FieldValue> {
                match index {
                    #(#accessors)*
                    _ => ::std::option::Option::None,
                }
            }

            fn field_mut(
                &mut self,
                index: usize,
            ) -> ::std::option::Option<&mut dyn ::docmap::value::FieldValue> {
                match index {
                    #(#mut_accessors)*
                    _ => ::std::option::Option::None,
                }
            }
        }

        impl ::docmap::value::ZeroValue for #name {
            fn zero() -> Self {
                Self {
                    #(#zero_fields),*
                }
            }
        }

        impl ::docmap::value::FieldValue for #name {
            fn shape(&self) -> ::docmap::value::FieldShape {
                ::docmap::value::FieldShape::Record
            }

            fn is_zero(&self) -> bool {
                ::docmap::mapping::is_zero_record(self)
            }

            fn to_bson(&self) -> ::docmap::OdmResult<::docmap::bson::Bson> {
                ::docmap::mapping::embed_record(self)
            }

            fn apply_bson(&mut self, value: &::docmap::bson::Bson) -> ::docmap::OdmResult<bool> {
                ::docmap::mapping::apply_embedded(self, value)
            }

            fn apply_inline(&mut self, parent: &::docmap::bson::Document) -> ::docmap::OdmResult<bool> {
                ::docmap::mapping::apply_inlined(self, parent)
            }

            fn as_record(&self) -> ::std::option::Option<&dyn ::docmap::record::RecordFields> {
                ::std::option::Option::Some(self as &dyn ::docmap::record::RecordFields)
            }

            fn as_record_mut(
                &mut self,
            ) -> ::std::option::Option<&mut dyn ::docmap::record::RecordFields> {
                ::std::option::Option::Some(self as &mut dyn ::docmap::record::RecordFields)
            }

            fn reset(&mut self) {
                *self = <Self as ::docmap::value::ZeroValue>::zero();
            }
        }
    })
}

fn optional_str(value: Option<String>) -> TokenStream {
    match value {
        Some(value) => quote! { ::std::option::Option::Some(#value) },
        None => quote! { ::std::option::Option::None },
    }
}

/// Struct-level attributes parsed from `#[docmap(...)]`.
#[derive(Debug, Default)]
struct StructAttrs {
    model: Option<String>,
    collection: Option<String>,
    database: Option<String>,
}

/// Parse struct-level `#[docmap(...)]` attributes.
fn parse_struct_attrs(input: &DeriveInput) -> Result<StructAttrs, syn::Error> {
    let mut attrs = StructAttrs::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("docmap") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("model") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.model = Some(value.value());
            } else if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.collection = Some(value.value());
            } else if meta.path.is_ident("database") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.database = Some(value.value());
            } else {
                return Err(meta.error("unknown docmap struct attribute"));
            }
            Ok(())
        })?;
    }

    Ok(attrs)
}

/// Information about a field.
#[derive(Debug)]
struct FieldInfo {
    name: Ident,
    ty: Type,
    rename: Option<String>,
    skip: bool,
    inline: bool,
    omit_empty: bool,
    null_on_zero: bool,
    is_id: bool,
    is_optional: bool,
}

/// Parse a field and its `#[docmap(...)]` attributes.
fn parse_field(field: &syn::Field) -> Result<FieldInfo, syn::Error> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| syn::Error::new_spanned(field, "Fields must be named"))?;

    let mut info = FieldInfo {
        name,
        ty: field.ty.clone(),
        rename: None,
        skip: false,
        inline: false,
        omit_empty: false,
        null_on_zero: false,
        is_id: false,
        is_optional: is_option_type(&field.ty),
    };

    for attr in &field.attrs {
        if !attr.path().is_ident("docmap") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                info.is_id = true;
            } else if meta.path.is_ident("name") || meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                info.rename = Some(value.value());
            } else if meta.path.is_ident("skip") {
                info.skip = true;
            } else if meta.path.is_ident("inline") {
                info.inline = true;
            } else if meta.path.is_ident("omit_empty") {
                info.omit_empty = true;
            } else if meta.path.is_ident("null") {
                info.null_on_zero = true;
            } else {
                return Err(meta.error("unknown docmap field attribute"));
            }
            Ok(())
        })?;
    }

    if info.is_id && info.skip {
        return Err(syn::Error::new_spanned(
            field,
            "an identity field cannot be skipped",
        ));
    }
    if info.is_id && info.rename.is_some() {
        return Err(syn::Error::new_spanned(
            field,
            "an identity field is always stored as `_id` and cannot be renamed",
        ));
    }
    if info.omit_empty && info.null_on_zero {
        return Err(syn::Error::new_spanned(
            field,
            "omit_empty and null cannot be combined",
        ));
    }
    if info.inline && info.rename.is_some() {
        return Err(syn::Error::new_spanned(
            field,
            "an inline field has no key of its own to rename",
        ));
    }

    Ok(info)
}

/// Build the `FieldSpec` constant expression for a field.
fn field_spec(field: &FieldInfo) -> TokenStream {
    let ident = field.name.unraw().to_string();
    let mut spec = quote! { ::docmap::naming::FieldSpec::new(#ident) };

    if let Some(rename) = &field.rename {
        spec = quote! { #spec.rename(#rename) };
    }
    if field.is_id {
        spec = quote! { #spec.identity() };
    }
    if field.skip {
        spec = quote! { #spec.skip() };
    }
    if field.inline {
        spec = quote! { #spec.inline() };
    }
    if field.omit_empty {
        spec = quote! { #spec.omit_empty() };
    }
    if field.null_on_zero {
        spec = quote! { #spec.null_on_zero() };
    }
    if field.is_optional {
        spec = quote! { #spec.nullable() };
    }
    spec
}

/// Check if a type is `Option<T>`.
fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}
