//! Shared utilities for lrumemo procedural macros
//!
//! Attribute parsing, signature inspection and key generation used by
//! `lrumemo-macros`.

use proc_macro2::{Ident, TokenStream as TokenStream2};
use quote::quote;
use syn::{
    punctuated::Punctuated, Expr, FnArg, GenericArgument, MetaNameValue, Pat, PathArguments,
    Signature, Token, Type,
};

/// Parsed `#[lru_cache(...)]` attributes
pub struct CacheAttributes {
    pub maxsize: TokenStream2,
    pub typed: bool,
    pub weak_self: bool,
    pub custom_name: Option<String>,
}

impl Default for CacheAttributes {
    fn default() -> Self {
        Self {
            maxsize: quote! { ::lrumemo::Capacity::default() },
            typed: false,
            weak_self: true,
            custom_name: None,
        }
    }
}

fn compile_error(msg: &str) -> TokenStream2 {
    quote! { compile_error!(#msg); }
}

/// Parse the `maxsize` attribute: an integer literal or `None`
pub fn parse_maxsize_attribute(nv: &MetaNameValue) -> Result<TokenStream2, TokenStream2> {
    match &nv.value {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            syn::Lit::Int(lit_int) => match lit_int.base10_parse::<usize>() {
                Ok(val) => Ok(quote! { ::lrumemo::Capacity::from(#val) }),
                Err(_) => Err(compile_error(
                    "Invalid value for `maxsize`: expected a non-negative integer",
                )),
            },
            _ => Err(compile_error(
                "Invalid literal for `maxsize`: expected integer or `None`",
            )),
        },
        Expr::Path(expr_path) if expr_path.path.is_ident("None") => {
            Ok(quote! { ::lrumemo::Capacity::Unbounded })
        }
        _ => Err(compile_error(
            "Invalid syntax for `maxsize`: expected `maxsize = <integer>` or `maxsize = None`",
        )),
    }
}

/// Parse a boolean attribute such as `typed = true`
pub fn parse_bool_attribute(nv: &MetaNameValue, name: &str) -> Result<bool, TokenStream2> {
    match &nv.value {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            syn::Lit::Bool(b) => Ok(b.value),
            _ => Err(compile_error(&format!(
                "Invalid literal for `{}`: expected `true` or `false`",
                name
            ))),
        },
        _ => Err(compile_error(&format!(
            "Invalid syntax for `{}`: expected `{} = true|false`",
            name, name
        ))),
    }
}

/// Parse the `name` attribute
pub fn parse_name_attribute(nv: &MetaNameValue) -> Result<String, TokenStream2> {
    match &nv.value {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            syn::Lit::Str(s) => Ok(s.value()),
            _ => Err(compile_error("Invalid literal for `name`: expected string")),
        },
        _ => Err(compile_error("Invalid syntax for `name`: expected `name = \"...\"`")),
    }
}

/// Parse cache attributes from a token stream
pub fn parse_cache_attributes(attr: TokenStream2) -> Result<CacheAttributes, TokenStream2> {
    use syn::parse::Parser;

    let parser = Punctuated::<MetaNameValue, Token![,]>::parse_terminated;
    let parsed_args = parser.parse2(attr).map_err(|e| {
        let msg = format!("Failed to parse attributes: {}", e);
        quote! { compile_error!(#msg); }
    })?;

    let mut attrs = CacheAttributes::default();

    for nv in parsed_args {
        if nv.path.is_ident("maxsize") {
            attrs.maxsize = parse_maxsize_attribute(&nv)?;
        } else if nv.path.is_ident("typed") {
            attrs.typed = parse_bool_attribute(&nv, "typed")?;
        } else if nv.path.is_ident("weak_self") {
            attrs.weak_self = parse_bool_attribute(&nv, "weak_self")?;
        } else if nv.path.is_ident("name") {
            attrs.custom_name = Some(parse_name_attribute(&nv)?);
        } else {
            return Err(compile_error(
                "Unknown attribute: expected `maxsize`, `typed`, `weak_self` or `name`",
            ));
        }
    }

    Ok(attrs)
}

/// How a cached function receives `self`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverKind {
    /// Free function or associated function without `self`
    None,
    /// `self: &Arc<Self>`, can be referenced without owning it
    SharedArc,
    /// `&self`
    Borrowed,
    /// `self`, `&mut self` or any other receiver type
    Unsupported,
}

/// Classify the receiver of a function signature
pub fn classify_receiver(sig: &Signature) -> ReceiverKind {
    let Some(FnArg::Receiver(receiver)) = sig.inputs.first() else {
        return ReceiverKind::None;
    };

    if receiver.colon_token.is_some() {
        return if is_ref_to_arc(&receiver.ty) {
            ReceiverKind::SharedArc
        } else {
            ReceiverKind::Unsupported
        };
    }

    match (&receiver.reference, &receiver.mutability) {
        (Some(_), None) => ReceiverKind::Borrowed,
        _ => ReceiverKind::Unsupported,
    }
}

fn is_ref_to_arc(ty: &Type) -> bool {
    let Type::Reference(reference) = ty else {
        return false;
    };
    if reference.mutability.is_some() {
        return false;
    }
    match &*reference.elem {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident == "Arc")
            .unwrap_or(false),
        _ => false,
    }
}

/// Collect the identifiers of all typed arguments
///
/// Destructuring patterns are rejected with a compile error because the
/// arguments must be referenced by name when building the key.
pub fn collect_arg_idents(sig: &Signature) -> Result<Vec<Ident>, TokenStream2> {
    let mut idents = Vec::new();
    for arg in &sig.inputs {
        if let FnArg::Typed(pat_type) = arg {
            match &*pat_type.pat {
                Pat::Ident(pat_ident) => idents.push(pat_ident.ident.clone()),
                _ => {
                    return Err(compile_error(
                        "#[lru_cache] arguments must be plain identifiers, not patterns",
                    ))
                }
            }
        }
    }
    Ok(idents)
}

/// Returns `T` when `ty` is `Result<T, ..>` (including aliases such as `io::Result<T>`)
pub fn result_ok_type(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Result" {
        return None;
    }
    let PathArguments::AngleBracketed(generics) = &segment.arguments else {
        return None;
    };
    generics.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}

/// Generate the `Args` expression for the key (self first when it is keyed by value)
pub fn generate_args_expr(key_self: bool, arg_idents: &[Ident]) -> TokenStream2 {
    let self_arg = if key_self {
        quote! { .arg(self) }
    } else {
        quote! {}
    };
    quote! {
        ::lrumemo::Args::new() #self_arg #( .arg(&#arg_idents) )*
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::{parse_quote, ItemFn};

    fn sig(item: ItemFn) -> Signature {
        item.sig
    }

    #[test]
    fn test_default_attributes() {
        let attrs = parse_cache_attributes(quote! {}).ok().unwrap();
        assert!(!attrs.typed);
        assert!(attrs.weak_self);
        assert!(attrs.custom_name.is_none());
        assert_eq!(
            attrs.maxsize.to_string(),
            quote! { ::lrumemo::Capacity::default() }.to_string()
        );
    }

    #[test]
    fn test_parse_all_attributes() {
        let attrs = parse_cache_attributes(
            quote! { maxsize = None, typed = true, weak_self = false, name = "users" },
        )
        .ok()
        .unwrap();
        assert!(attrs.typed);
        assert!(!attrs.weak_self);
        assert_eq!(attrs.custom_name.as_deref(), Some("users"));
        assert_eq!(
            attrs.maxsize.to_string(),
            quote! { ::lrumemo::Capacity::Unbounded }.to_string()
        );
    }

    #[test]
    fn test_invalid_attributes() {
        assert!(parse_cache_attributes(quote! { maxsize = "ten" }).is_err());
        assert!(parse_cache_attributes(quote! { typed = 1 }).is_err());
        assert!(parse_cache_attributes(quote! { ttl = 5 }).is_err());
    }

    #[test]
    fn test_classify_receiver() {
        assert_eq!(
            classify_receiver(&sig(parse_quote! { fn f(x: u32) -> u32 { x } })),
            ReceiverKind::None
        );
        assert_eq!(
            classify_receiver(&sig(parse_quote! { fn f(&self) -> u32 { 1 } })),
            ReceiverKind::Borrowed
        );
        assert_eq!(
            classify_receiver(&sig(parse_quote! { fn f(self: &Arc<Self>) -> u32 { 1 } })),
            ReceiverKind::SharedArc
        );
        assert_eq!(
            classify_receiver(&sig(parse_quote! { fn f(&mut self) -> u32 { 1 } })),
            ReceiverKind::Unsupported
        );
        assert_eq!(
            classify_receiver(&sig(parse_quote! { fn f(self) -> u32 { 1 } })),
            ReceiverKind::Unsupported
        );
    }

    #[test]
    fn test_result_ok_type() {
        let ty: Type = parse_quote! { Result<u64, String> };
        let ok: Type = parse_quote! { u64 };
        assert_eq!(result_ok_type(&ty), Some(&ok));

        let ty: Type = parse_quote! { std::io::Result<Vec<u8>> };
        let ok: Type = parse_quote! { Vec<u8> };
        assert_eq!(result_ok_type(&ty), Some(&ok));

        let ty: Type = parse_quote! { Option<u64> };
        assert_eq!(result_ok_type(&ty), None);
    }

    #[test]
    fn test_collect_arg_idents() {
        let idents =
            collect_arg_idents(&sig(parse_quote! { fn f(a: u32, mut b: String) {} })).ok().unwrap();
        assert_eq!(idents.len(), 2);
        assert_eq!(idents[1].to_string(), "b");

        assert!(collect_arg_idents(&sig(parse_quote! { fn f((a, b): (u32, u32)) {} })).is_err());
    }
}
