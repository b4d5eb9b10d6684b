use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use syn::{
    Data, DeriveInput, Expr, Fields, GenericArgument, Ident, LitStr, Path, PathArguments, Type,
    parse_macro_input,
};

/// Registers a struct as a stored entity.
///
/// ```ignore
/// #[derive(kv_odm::Entity)]
/// #[entity(kind = "Book")]
/// pub struct Book {
///     #[key]
///     pub key: Option<kv_odm::Key>,
///     #[field(enforce_type)]
///     pub title: String,
///     #[field(default_fn = now)]
///     pub created: chrono::NaiveDateTime,
///     #[field(kind = "json")]
///     pub extra: serde_json::Value,
/// }
/// ```
///
/// Field kinds are inferred from the Rust type unless `kind` is given. A
/// bare `Value` maps to the `any` kind; `serde_json::Value` to `json`.
#[proc_macro_derive(Entity, attributes(entity, key, field))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct FieldSpec {
    ident: Ident,
    stored_name: String,
    kind: Ident,
    enforce_type: bool,
    default: Option<Expr>,
    default_fn: Option<Path>,
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Entity cannot be derived for generic structs",
        ));
    }

    let mut kind = struct_name.to_string();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("kind") {
                kind = meta.value()?.parse::<LitStr>()?.value();
                Ok(())
            } else {
                Err(meta.error("unsupported entity attribute"))
            }
        })?;
    }

    let named = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    struct_name,
                    "Entity requires a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "Entity can only be derived for structs",
            ));
        }
    };

    let mut key_field = None;
    let mut specs = Vec::new();

    for field in named {
        let Some(ident) = field.ident.clone() else {
            continue;
        };

        if field.attrs.iter().any(|attr| attr.path().is_ident("key")) {
            if key_field.is_some() {
                return Err(syn::Error::new_spanned(field, "only one #[key] field is allowed"));
            }
            key_field = Some(ident);
            continue;
        }

        let mut stored_name = ident.to_string();
        let mut kind_override = None;
        let mut enforce_type = false;
        let mut default = None;
        let mut default_fn = None;

        for attr in field.attrs.iter().filter(|a| a.path().is_ident("field")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("enforce_type") {
                    enforce_type = true;
                } else if meta.path.is_ident("name") {
                    stored_name = meta.value()?.parse::<LitStr>()?.value();
                } else if meta.path.is_ident("kind") {
                    let lit = meta.value()?.parse::<LitStr>()?;
                    kind_override = Some(
                        kind_variant(&lit.value())
                            .ok_or_else(|| syn::Error::new_spanned(&lit, "unknown field kind"))?,
                    );
                } else if meta.path.is_ident("default") {
                    default = Some(meta.value()?.parse::<Expr>()?);
                } else if meta.path.is_ident("default_fn") {
                    default_fn = Some(meta.value()?.parse::<Path>()?);
                } else {
                    return Err(meta.error("unsupported field attribute"));
                }
                Ok(())
            })?;
        }

        if default.is_some() && default_fn.is_some() {
            return Err(syn::Error::new_spanned(
                field,
                "`default` and `default_fn` are mutually exclusive",
            ));
        }

        let kind = match kind_override.or_else(|| infer_kind(&field.ty)) {
            Some(kind) => kind,
            None => {
                let ty = &field.ty;
                return Err(syn::Error::new_spanned(
                    ty,
                    format!(
                        "Field '{}' has type '{}' with no known field kind; add #[field(kind = \"...\")]",
                        ident,
                        quote!(#ty)
                    ),
                ));
            }
        };

        specs.push(FieldSpec {
            ident,
            stored_name,
            kind: Ident::new(kind, Span::call_site()),
            enforce_type,
            default,
            default_fn,
        });
    }

    let Some(key_field) = key_field else {
        return Err(syn::Error::new_spanned(
            struct_name,
            "Entity requires a `#[key] key: Option<kv_odm::Key>` field",
        ));
    };

    let builders = specs.iter().map(|spec| {
        let stored_name = &spec.stored_name;
        let kind = &spec.kind;
        let mut builder = quote! { ::kv_odm::Field::new(#stored_name, ::kv_odm::FieldKind::#kind) };
        if spec.enforce_type {
            builder = quote! { #builder.enforce_type(true) };
        }
        if let Some(default) = &spec.default {
            builder = quote! { #builder.default_value(#default) };
        }
        if let Some(default_fn) = &spec.default_fn {
            builder = quote! { #builder.default_with(#default_fn) };
        }
        builder
    });

    let accessors = specs.iter().enumerate().map(|(index, spec)| {
        let ident = &spec.ident;
        let doc = format!("Descriptor of the `{}` field.", spec.stored_name);
        quote! {
            #[doc = #doc]
            pub fn #ident() -> &'static ::kv_odm::Field {
                &<Self as ::kv_odm::Entity>::fields()[#index]
            }
        }
    });

    let value_arms = specs.iter().map(|spec| {
        let ident = &spec.ident;
        let stored_name = &spec.stored_name;
        quote! {
            #stored_name => ::core::option::Option::Some(::kv_odm::FieldValue::to_value(&self.#ident)),
        }
    });

    let bindings = specs.iter().enumerate().map(|(index, spec)| {
        let ident = &spec.ident;
        quote! {
            #ident: ::kv_odm::__private::bind_value(&mut values, &fields[#index])?,
        }
    });

    let stored_names: Vec<_> = specs.iter().map(|spec| spec.stored_name.as_str()).collect();
    let fields_static = format_ident!("__{}_FIELDS__", struct_name.to_string().to_uppercase());

    Ok(quote! {
        impl ::kv_odm::Entity for #struct_name {
            const KIND: &'static str = #kind;

            fn fields() -> &'static [::kv_odm::Field] {
                static #fields_static: ::std::sync::LazyLock<::std::vec::Vec<::kv_odm::Field>> =
                    ::std::sync::LazyLock::new(|| ::std::vec![#(#builders),*]);
                &#fields_static
            }

            fn key(&self) -> ::core::option::Option<&::kv_odm::Key> {
                self.#key_field.as_ref()
            }

            fn set_key(&mut self, key: ::kv_odm::Key) {
                self.#key_field = ::core::option::Option::Some(key);
            }

            fn value_of(&self, field_name: &str) -> ::core::option::Option<::kv_odm::Value> {
                match field_name {
                    #(#value_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            #[allow(unused_mut, unused_variables)]
            fn from_values(
                key: ::core::option::Option<::kv_odm::Key>,
                mut values: ::kv_odm::Document,
            ) -> ::core::result::Result<Self, ::kv_odm::Error> {
                let fields = <Self as ::kv_odm::Entity>::fields();
                ::core::result::Result::Ok(Self {
                    #key_field: key,
                    #(#bindings)*
                })
            }
        }

        impl #struct_name {
            #(#accessors)*
        }

        ::kv_odm::__private::inventory::submit! {
            ::kv_odm::EntityMeta {
                kind: #kind,
                field_names: || ::std::vec![#(#stored_names),*],
            }
        }
    })
}

fn kind_variant(name: &str) -> Option<&'static str> {
    Some(match name {
        "any" => "Any",
        "bool" => "Bool",
        "int" => "Int",
        "float" => "Float",
        "string" => "String",
        "timestamp" => "Timestamp",
        "json" => "Json",
        "list" => "List",
        "map" => "Map",
        _ => return None,
    })
}

// Field kind for a Rust type, looking through `Option<T>`.
fn infer_kind(ty: &Type) -> Option<&'static str> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    let name = segment.ident.to_string();

    if name == "Option" {
        let PathArguments::AngleBracketed(args) = &segment.arguments else {
            return None;
        };
        return args.args.iter().find_map(|arg| match arg {
            GenericArgument::Type(inner) => infer_kind(inner),
            _ => None,
        });
    }

    let from_serde_json = type_path
        .path
        .segments
        .iter()
        .any(|s| s.ident == "serde_json");

    Some(match name.as_str() {
        "bool" => "Bool",
        "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" => "Int",
        "f32" | "f64" => "Float",
        "String" | "Key" => "String",
        "NaiveDateTime" | "DateTime" => "Timestamp",
        "Vec" => "List",
        "BTreeMap" | "HashMap" | "Map" => "Map",
        "Value" if from_serde_json => "Json",
        "Value" => "Any",
        _ => return None,
    })
}
