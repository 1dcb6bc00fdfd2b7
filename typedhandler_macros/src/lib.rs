//! Derive support for `typedhandler::RequestSchema`.
//!
//! The derive only records what the source declares: field positions, binding
//! tags, visibility and the capabilities the struct opts into. All invariant
//! checks (header fields must be strings, body field compatibility, settable
//! fields, conflicting body modes) run once at runtime in the schema analyzer,
//! so hand-written impls and derived impls fail the same way.
//!
//! ```rust,ignore
//! #[derive(Default, Deserialize, Validate, RequestSchema)]
//! #[serde(default)]
//! pub struct Request {
//!     #[request(json)]
//!     pub name: String,
//!     #[request(query = "city")]
//!     pub city: String,
//!     #[request(header = "state")]
//!     pub state: String,
//!     #[request(path = "country")]
//!     pub country: String,
//!     #[validate(email)]
//!     pub email: String,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, spanned::Spanned, Data, DeriveInput, Fields, LitStr, Type, Visibility,
};

/// Type names that map onto a `FieldSlot` variant through `From<&mut T>`.
const SCALAR_TYPES: &[&str] = &[
    "String", "bool", "i8", "i16", "i32", "i64", "isize", "u8", "u16", "u32", "u64", "usize",
    "f32", "f64", "DateTime", "Timestamp", "Duration",
];

#[derive(Default)]
struct StructAttrs {
    resettable: bool,
    validatable: bool,
    body_field_getter: bool,
}

#[derive(Default)]
struct FieldAttrs {
    query: Option<LitStr>,
    path: Option<LitStr>,
    header: Option<LitStr>,
    json: bool,
    body: bool,
    validate: bool,
}

impl FieldAttrs {
    fn is_bound(&self) -> bool {
        self.query.is_some() || self.path.is_some() || self.header.is_some()
    }
}

fn parse_struct_attrs(input: &DeriveInput) -> syn::Result<StructAttrs> {
    let mut attrs = StructAttrs::default();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("request")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("resettable") {
                attrs.resettable = true;
            } else if meta.path.is_ident("validatable") {
                attrs.validatable = true;
            } else if meta.path.is_ident("body_field_getter") {
                attrs.body_field_getter = true;
            } else {
                return Err(meta.error(
                    "expected one of `resettable`, `validatable`, `body_field_getter`",
                ));
            }
            Ok(())
        })?;
    }
    Ok(attrs)
}

fn parse_field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();
    for attr in &field.attrs {
        if attr.path().is_ident("validate") {
            attrs.validate = true;
            continue;
        }
        if !attr.path().is_ident("request") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("query") || meta.path.is_ident("form") {
                // `form` and `query` feed the same map; the later one wins.
                attrs.query = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("path") {
                attrs.path = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("header") {
                attrs.header = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("json") {
                if meta.input.peek(syn::Token![=]) {
                    let _: LitStr = meta.value()?.parse()?;
                }
                attrs.json = true;
            } else if meta.path.is_ident("body") {
                if meta.input.peek(syn::Token![=]) {
                    let _: LitStr = meta.value()?.parse()?;
                }
                attrs.body = true;
            } else {
                return Err(meta.error(
                    "expected one of `query`, `form`, `path`, `header`, `json`, `body`",
                ));
            }
            Ok(())
        })?;
    }
    Ok(attrs)
}

fn is_scalar(ty: &Type) -> bool {
    match ty {
        Type::Path(p) if p.qself.is_none() => p
            .path
            .segments
            .last()
            .map(|seg| SCALAR_TYPES.iter().any(|name| seg.ident == name))
            .unwrap_or(false),
        _ => false,
    }
}

#[proc_macro_derive(RequestSchema, attributes(request))]
pub fn derive_request_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "RequestSchema cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new(
                    input.span(),
                    "RequestSchema requires a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "RequestSchema can only be derived for structs",
            ))
        }
    };

    let struct_attrs = parse_struct_attrs(input)?;

    let mut descriptors = Vec::with_capacity(fields.len());
    let mut slot_arms = Vec::new();
    let mut has_json = false;
    let mut has_validate = false;

    for (index, field) in fields.iter().enumerate() {
        let attrs = parse_field_attrs(field)?;
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new(field.span(), "expected a named field"))?;
        let ty = &field.ty;
        let field_name = ident.to_string();

        has_json |= attrs.json;
        has_validate |= attrs.validate;

        let query = attrs.query.as_ref().map(|k| quote! { .query(#k) });
        let path = attrs.path.as_ref().map(|k| quote! { .path(#k) });
        let header = attrs.header.as_ref().map(|k| quote! { .header(#k) });
        let json = attrs.json.then(|| quote! { .json() });
        let body = attrs.body.then(|| quote! { .body() });
        let validate = attrs.validate.then(|| quote! { .validate() });
        let private = matches!(field.vis, Visibility::Inherited).then(|| quote! { .private() });

        descriptors.push(quote! {
            ::typedhandler::FieldDescriptor::new(
                #index,
                #field_name,
                ::typedhandler::TypeTag::of::<#ty>(),
            )
            #query #path #header #json #body #validate #private
        });

        if attrs.is_bound() {
            let slot = if is_scalar(ty) {
                quote! { ::typedhandler::FieldSlot::from(&mut self.#ident) }
            } else {
                quote! { ::typedhandler::FieldSlot::Unsupported(::std::any::type_name::<#ty>()) }
            };
            slot_arms.push(quote! { #index => ::std::option::Option::Some(#slot), });
        }
    }

    let decoder = has_json.then(|| {
        quote! {
            fn whole_body_decoder() -> ::std::option::Option<::typedhandler::WholeBodyDecoder<Self>> {
                ::std::option::Option::Some(::typedhandler::decode_whole_body::<Self>)
            }
        }
    });

    let resettable = struct_attrs.resettable.then(|| quote! { .resettable() });
    let validatable = struct_attrs.validatable.then(|| quote! { .validatable() });
    let body_field_getter = struct_attrs
        .body_field_getter
        .then(|| quote! { .body_field_getter() });
    let struct_validation = has_validate.then(|| quote! { .struct_validation() });

    Ok(quote! {
        impl ::typedhandler::RequestSchema for #name {
            fn fields() -> ::std::vec::Vec<::typedhandler::FieldDescriptor> {
                ::std::vec![#(#descriptors),*]
            }

            #[allow(unused_variables)]
            fn field_slot(&mut self, index: usize) -> ::std::option::Option<::typedhandler::FieldSlot<'_>> {
                match index {
                    #(#slot_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            #decoder

            fn capabilities() -> ::typedhandler::Capabilities<Self> {
                ::typedhandler::Capabilities::<Self>::none()
                    #resettable #validatable #body_field_getter #struct_validation
            }
        }
    })
}
