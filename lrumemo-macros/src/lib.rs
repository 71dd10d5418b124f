use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, parse_quote, ItemFn, ReturnType, Type};

use lrumemo_macro_utils::{
    classify_receiver, collect_arg_idents, generate_args_expr, parse_cache_attributes,
    result_ok_type, CacheAttributes, ReceiverKind,
};

/// Generate the call into the cache for a function without an `Arc` receiver
fn generate_plain_call(
    ret_type: &Type,
    block: &syn::Block,
    is_async: bool,
    is_result: bool,
) -> TokenStream2 {
    match (is_async, is_result) {
        (false, false) => quote! {
            __cache.get_or_compute(__key, move || -> #ret_type #block)
        },
        (false, true) => quote! {
            __cache.try_get_or_compute(__key, move || -> #ret_type #block)
        },
        (true, false) => quote! {
            __cache
                .get_or_compute_async(__key, move || async move {
                    let __output: #ret_type = #block;
                    __output
                })
                .await
        },
        (true, true) => quote! {
            __cache
                .try_get_or_compute_async(__key, move || async move {
                    let __output: #ret_type = #block;
                    __output
                })
                .await
        },
    }
}

/// Generate the call into the cache for a `self: &Arc<Self>` method
fn generate_method_call(
    ret_type: &Type,
    block: &syn::Block,
    is_async: bool,
    is_result: bool,
) -> TokenStream2 {
    match (is_async, is_result) {
        (false, false) => quote! {
            __cache.invoke_method(self, __args, move |_| -> #ret_type #block)
        },
        (false, true) => quote! {
            __cache.try_invoke_method(self, __args, move |_| -> #ret_type #block)
        },
        (true, false) => quote! {
            __cache
                .invoke_method_async(self, __args, move |_| async move {
                    let __output: #ret_type = #block;
                    __output
                })
                .await
        },
        (true, true) => quote! {
            __cache
                .try_invoke_method_async(self, __args, move |_| async move {
                    let __output: #ret_type = #block;
                    __output
                })
                .await
        },
    }
}

fn generate_config(attrs: &CacheAttributes, cache_name: &str) -> TokenStream2 {
    let maxsize = &attrs.maxsize;
    let typed = attrs.typed;
    let weak_self = attrs.weak_self;
    quote! {
        ::lrumemo::CacheConfig::new(#maxsize)
            .type_sensitive(#typed)
            .bind_receiver_non_owning(#weak_self)
            .named(#cache_name)
    }
}

/// Memoizes a function or method in a bounded LRU cache.
///
/// Each annotated function owns one cache, stored in a hidden static and
/// registered in [`lrumemo::registry`] under the function name. Calls whose
/// arguments compare equal share one entry; the least recently used entry is
/// evicted once `maxsize` entries are stored.
///
/// # Requirements
///
/// - **Arguments**: Must implement `KeyArg` (use `DebugArg` for other `Debug` types)
/// - **Return type**: Must implement `Clone` and be `Send + Sync + 'static`
/// - **Receiver**: `self: &Arc<Self>` methods need `Self: Send + Sync + 'static`;
///   `&self` methods need `Self: KeyArg`
/// - **Function purity**: Concurrent misses on the same key both run the body,
///   so the body should be safe to run more than once
///
/// # Macro Parameters
///
/// - `maxsize` (optional): Maximum number of entries. `0` disables caching and
///   `None` removes the bound. Default: 128.
/// - `typed` (optional): When `true`, arguments of different types are cached
///   separately even if their values compare equal (`1_i32` and `1_i64`).
///   Default: `false`.
/// - `weak_self` (optional): For `self: &Arc<Self>` methods, whether the cache
///   identifies the receiver without keeping it alive. Default: `true`. Must be
///   `false` for `&self` methods, which are keyed by the receiver's value.
/// - `name` (optional): Identifier in the cache registry. Default: the function name.
///
/// # Cache Behavior
///
/// - **Regular functions**: All results are cached
/// - **Result-returning functions**: Only `Ok` values are cached, `Err` values are returned
///   unchanged and leave the cache untouched
/// - **Async functions**: The future's output is cached; a future dropped before
///   completion stores nothing
/// - **Methods**: `self: &Arc<Self>` receivers are keyed by identity, `&self`
///   receivers (with `weak_self = false`) by value
///
/// # Examples
///
/// ```ignore
/// use lrumemo::lru_cache;
///
/// #[lru_cache(maxsize = 2)]
/// fn square(n: u64) -> u64 {
///     n * n
/// }
///
/// assert_eq!(square(3), 9);
/// assert_eq!(square(3), 9);
///
/// let info = lrumemo::registry::stats("square").unwrap();
/// assert_eq!((info.hits, info.misses), (1, 1));
/// ```
///
/// ## Async Methods
///
/// ```ignore
/// use lrumemo::lru_cache;
/// use std::sync::Arc;
///
/// struct Repository {
///     base_url: String,
/// }
///
/// impl Repository {
///     #[lru_cache(maxsize = 64)]
///     async fn fetch(self: &Arc<Self>, id: u64) -> Result<String, String> {
///         Ok(format!("{}/{}", self.base_url, id))
///     }
/// }
/// ```
///
/// # Limitations
///
/// The cache lives in a static, so the return type cannot mention `Self`,
/// generic parameters or non-`'static` lifetimes.
#[proc_macro_attribute]
pub fn lru_cache(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attrs = match parse_cache_attributes(attr.into()) {
        Ok(attrs) => attrs,
        Err(err) => return err.into(),
    };
    let input = parse_macro_input!(item as ItemFn);

    let fn_attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;
    let fn_name = &sig.ident;
    let cache_name = attrs
        .custom_name
        .clone()
        .unwrap_or_else(|| fn_name.to_string());

    let ret_type: Type = match &sig.output {
        ReturnType::Default => parse_quote!(()),
        ReturnType::Type(_, ty) => (**ty).clone(),
    };
    let ok_type = result_ok_type(&ret_type);
    let is_result = ok_type.is_some();
    let value_type = ok_type.unwrap_or(&ret_type);
    let is_async = sig.asyncness.is_some();

    let receiver = classify_receiver(sig);
    match receiver {
        ReceiverKind::Unsupported => {
            return quote! {
                compile_error!("#[lru_cache] methods must take `&self` or `self: &Arc<Self>`");
            }
            .into();
        }
        ReceiverKind::Borrowed if attrs.weak_self => {
            return quote! {
                compile_error!(
                    "#[lru_cache] on `&self` cannot reference the receiver weakly: \
                     take `self: &Arc<Self>` or set `weak_self = false`"
                );
            }
            .into();
        }
        _ => {}
    }

    let arg_idents = match collect_arg_idents(sig) {
        Ok(idents) => idents,
        Err(err) => return err.into(),
    };
    let args_expr = generate_args_expr(receiver == ReceiverKind::Borrowed, &arg_idents);
    let config = generate_config(&attrs, &cache_name);

    let call = if receiver == ReceiverKind::SharedArc {
        generate_method_call(&ret_type, block, is_async, is_result)
    } else {
        let call = generate_plain_call(&ret_type, block, is_async, is_result);
        quote! {
            let __key = __cache.make_key(&__args);
            #call
        }
    };

    let output = if is_result {
        quote! { __result.map(|__value| (*__value).clone()) }
    } else {
        quote! { (*__result).clone() }
    };

    let expanded = quote! {
        #(#fn_attrs)*
        #vis #sig {
            static __LRUMEMO_CACHE: ::lrumemo::once_cell::sync::Lazy<::lrumemo::MemoCache<#value_type>> =
                ::lrumemo::once_cell::sync::Lazy::new(|| ::lrumemo::MemoCache::new(#config));
            static __LRUMEMO_REGISTERED: ::std::sync::Once = ::std::sync::Once::new();

            __LRUMEMO_REGISTERED.call_once(|| {
                ::lrumemo::registry::register(#cache_name, &*__LRUMEMO_CACHE);
            });

            let __cache: &'static ::lrumemo::MemoCache<#value_type> = &__LRUMEMO_CACHE;
            let __args = #args_expr;
            let __result = { #call };
            #output
        }
    };

    TokenStream::from(expanded)
}
