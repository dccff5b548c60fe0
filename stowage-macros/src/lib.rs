//! Procedural macros for stowage
//!
//! Provides `#[derive(Accessible)]`, which builds the property accessor
//! table that path expressions such as `{this.title}` resolve against.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Ident, LitStr, Visibility};

/// Derives `stowage::value::Accessible` for a struct with named fields
///
/// Public fields are readable by name. Zero-argument methods listed in
/// `#[accessible(methods(...))]` are callable; their return types must
/// implement `stowage::value::ToValue`. With `#[accessible(display)]` the
/// struct's `Display` impl becomes its string form.
///
/// Field attributes:
/// - `#[accessible(skip)]` hides a public field
/// - `#[accessible(expose)]` makes a private field readable
/// - `#[accessible(rename = "name")]` reads the field under another name
///
/// # Example
///
/// ```rust,ignore
/// use stowage::Accessible;
///
/// #[derive(Accessible)]
/// #[accessible(methods(slug))]
/// pub struct Article {
///     pub id: u32,
///     pub title: String,
/// }
///
/// impl Article {
///     fn slug(&self) -> String {
///         self.title.to_lowercase().replace(' ', "-")
///     }
/// }
/// ```
#[proc_macro_derive(Accessible, attributes(accessible))]
pub fn derive_accessible(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct ContainerOptions {
    methods: Vec<Ident>,
    display: bool,
}

struct ExposedField {
    ident: Ident,
    name: String,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let options = container_options(input)?;
    let fields = exposed_fields(input)?;

    let type_name = name.to_string();

    let method_arms = options.methods.iter().map(|method| {
        let key = method.to_string();
        quote! {
            #key => ::std::option::Option::Some(::std::result::Result::Ok(
                ::stowage::value::ToValue::to_value(&self.#method()),
            )),
        }
    });

    let field_arms = fields.iter().map(|field| {
        let ident = &field.ident;
        let key = &field.name;
        quote! {
            #key => ::std::option::Option::Some(::stowage::value::ToValue::to_value(&self.#ident)),
        }
    });

    let display = if options.display {
        quote! {
            fn display(&self) -> ::std::option::Option<::std::string::String> {
                ::std::option::Option::Some(::std::string::ToString::to_string(self))
            }
        }
    } else {
        TokenStream2::new()
    };

    Ok(quote! {
        impl #impl_generics ::stowage::value::Accessible for #name #ty_generics #where_clause {
            fn type_name(&self) -> &'static str {
                #type_name
            }

            fn call(
                &self,
                name: &str,
                _args: &[::std::string::String],
            ) -> ::std::option::Option<::stowage::StowageResult<::stowage::value::Value>> {
                match name {
                    #(#method_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn field(&self, name: &str) -> ::std::option::Option<::stowage::value::Value> {
                match name {
                    #(#field_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            #display
        }
    })
}

fn container_options(input: &DeriveInput) -> syn::Result<ContainerOptions> {
    let mut options = ContainerOptions::default();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("accessible")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("methods") {
                meta.parse_nested_meta(|method| {
                    let ident = method
                        .path
                        .get_ident()
                        .cloned()
                        .ok_or_else(|| method.error("expected a method name"))?;
                    options.methods.push(ident);
                    Ok(())
                })
            } else if meta.path.is_ident("display") {
                options.display = true;
                Ok(())
            } else {
                Err(meta.error("unsupported container attribute, expected `methods(...)` or `display`"))
            }
        })?;
    }
    Ok(options)
}

fn exposed_fields(input: &DeriveInput) -> syn::Result<Vec<ExposedField>> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Accessible can only be derived for structs",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Accessible requires named fields",
        ));
    };

    let mut exposed = Vec::new();
    for field in &named.named {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let mut skip = false;
        let mut expose = !matches!(field.vis, Visibility::Inherited);
        let mut name = ident.to_string();

        for attr in field.attrs.iter().filter(|a| a.path().is_ident("accessible")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    skip = true;
                    Ok(())
                } else if meta.path.is_ident("expose") {
                    expose = true;
                    Ok(())
                } else if meta.path.is_ident("rename") {
                    let renamed: LitStr = meta.value()?.parse()?;
                    name = renamed.value();
                    Ok(())
                } else {
                    Err(meta.error("unsupported field attribute, expected `skip`, `expose` or `rename`"))
                }
            })?;
        }

        if expose && !skip {
            exposed.push(ExposedField { ident, name });
        }
    }
    Ok(exposed)
}
