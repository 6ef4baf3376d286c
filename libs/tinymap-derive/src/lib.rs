use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields, Visibility};

/// Derive macro for mappable structs.
///
/// Generates two impls on the annotated struct:
///
/// - `tinymap::Shape`: the field table the copier matches against.
/// - `tinymap::FieldType`: kind `Struct`; the value is zero when every
///   described field is zero.
///
/// A field is exported (visible to the copier) when it is declared `pub`.
///
/// Field attributes:
///
/// - `#[shape(embed)]`: the field is itself a `Shape`. As a source its fields
///   are matched as if declared on the containing struct.
/// - `#[shape(skip)]`: leave the field out of the table entirely. Use it for
///   field types that do not implement `FieldType`. A skipped field also does
///   not count towards the zero test: a value whose described fields are all
///   zero is "unset", whatever its skipped fields hold.
///
/// The struct must be `Clone` and must not be generic.
///
/// # Example
///
/// ```ignore
/// #[derive(Clone, Default, Shape)]
/// pub struct UserDto {
///     pub id: u64,
///     pub display_name: String,
///     #[shape(embed)]
///     pub audit: Audit,
///     #[shape(skip)]
///     pub handle: Handle,
/// }
/// ```
#[proc_macro_derive(Shape, attributes(shape))]
pub fn derive_shape(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match shape_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// Derive macro for enums and tuple structs used as field types.
///
/// The value is zero when it equals `Default::default()`, so the type must
/// implement `Default` and `PartialEq`. Kind is `Enum` for enums; a
/// single-field tuple struct takes the kind of its field.
///
/// ```ignore
/// #[derive(Clone, Default, PartialEq, FieldType)]
/// pub struct UserId(pub u64);
/// ```
#[proc_macro_derive(FieldType)]
pub fn derive_field_type(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match field_type_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn shape_impl(input: &DeriveInput) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;
    reject_generics(input, "Shape")?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Shape only supports structs with named fields; use FieldType for tuple structs",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Shape only supports structs; use FieldType for enums",
            ))
        }
    };

    let mut descriptor_tokens: Vec<TokenStream2> = Vec::new();
    let mut zero_tokens: Vec<TokenStream2> = Vec::new();

    for field in fields {
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected named field"))?;
        let field_name_str = field_name.unraw().to_string();
        let field_ty = &field.ty;

        let attrs = FieldAttrs::parse(field)?;
        if attrs.skip {
            continue;
        }

        let exported = matches!(field.vis, Visibility::Public(_));
        let constructor = if attrs.embed {
            quote! { embedded }
        } else {
            quote! { new }
        };

        descriptor_tokens.push(quote! {
            ::tinymap::FieldDescriptor::#constructor::<Self, #field_ty>(
                #field_name_str,
                #exported,
                |s| &s.#field_name,
                |s| &mut s.#field_name,
            )
        });

        zero_tokens.push(quote! {
            ::tinymap::FieldType::is_zero(&self.#field_name)
        });
    }

    let expanded = quote! {
        impl ::tinymap::Shape for #name {
            fn describe() -> ::tinymap::ShapeDescriptor {
                ::tinymap::ShapeDescriptor::new::<Self>(::std::vec![
                    #(#descriptor_tokens),*
                ])
            }
        }

        impl ::tinymap::FieldType for #name {
            const KIND: ::tinymap::Kind = ::tinymap::Kind::Struct;

            fn is_zero(&self) -> bool {
                true #(&& #zero_tokens)*
            }
        }
    };

    Ok(expanded)
}

fn field_type_impl(input: &DeriveInput) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;
    reject_generics(input, "FieldType")?;

    let kind_expr = match &input.data {
        Data::Enum(_) => quote! { ::tinymap::Kind::Enum },
        Data::Struct(data) => match &data.fields {
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                let inner = &fields.unnamed[0].ty;
                quote! { <#inner as ::tinymap::FieldType>::KIND }
            }
            Fields::Unnamed(_) => quote! { ::tinymap::Kind::Struct },
            Fields::Unit => quote! { ::tinymap::Kind::Unit },
            Fields::Named(_) => {
                return Err(syn::Error::new_spanned(
                    name,
                    "use #[derive(Shape)] for structs with named fields",
                ))
            }
        },
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                name,
                "FieldType does not support unions",
            ))
        }
    };

    let expanded = quote! {
        impl ::tinymap::FieldType for #name {
            const KIND: ::tinymap::Kind = #kind_expr;

            fn is_zero(&self) -> bool {
                *self == <Self as ::core::default::Default>::default()
            }
        }
    };

    Ok(expanded)
}

#[derive(Default)]
struct FieldAttrs {
    embed: bool,
    skip: bool,
}

impl FieldAttrs {
    /// Parse `#[shape(...)]` attributes on a field.
    fn parse(field: &Field) -> Result<Self, syn::Error> {
        let mut attrs = Self::default();
        for attr in &field.attrs {
            if !attr.path().is_ident("shape") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("embed") {
                    attrs.embed = true;
                } else if meta.path.is_ident("skip") {
                    attrs.skip = true;
                } else {
                    return Err(meta.error("unknown shape attribute (expected 'embed' or 'skip')"));
                }
                Ok(())
            })?;
        }
        if attrs.embed && attrs.skip {
            return Err(syn::Error::new_spanned(
                field,
                "a field cannot be both embedded and skipped",
            ));
        }
        Ok(attrs)
    }
}

/// Descriptors are built from `'static` type ids, so shapes cannot borrow or
/// be generic.
fn reject_generics(input: &DeriveInput, derive: &str) -> Result<(), syn::Error> {
    if input.generics.params.is_empty() {
        Ok(())
    } else {
        Err(syn::Error::new_spanned(
            &input.generics,
            format!("{derive} cannot be derived for generic types"),
        ))
    }
}
