//! Procedural macros for the `coil` runtime.
//!
//! - `#[coil::main]` and `#[coil::test]` run an `async fn` on a fresh
//!   runtime,
//! - `join!` and `select!` expand to the tuple combinators `coil::join` and
//!   `coil::race`.

mod args;

use args::RuntimeArgs;

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Error, Expr, ItemFn, Token, parse_macro_input};

/// Most branches accepted by `join!` and `select!`.
const MAX_BRANCHES: usize = 8;

/// Runs an `async fn main` to completion on a new runtime.
///
/// ```rust,ignore
/// #[coil::main(max_poll_wait_ms = 100)]
/// async fn main() {
///     coil::time::sleep_for(std::time::Duration::from_millis(10)).await;
/// }
/// ```
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as RuntimeArgs);
    let input = parse_macro_input!(item as ItemFn);

    if input.sig.asyncness.is_none() {
        return Error::new_spanned(
            input.sig.fn_token,
            "#[coil::main] must be used on an async function",
        )
        .to_compile_error()
        .into();
    }

    if input.sig.ident != "main" {
        return Error::new_spanned(&input.sig.ident, "#[coil::main] must be used on fn main")
            .to_compile_error()
            .into();
    }

    expand_entry(args, input, None)
}

/// Runs an `async fn` test on a new runtime.
///
/// ```rust,ignore
/// #[coil::test]
/// async fn sleeps() {
///     coil::time::sleep_for(std::time::Duration::from_millis(1)).await;
/// }
/// ```
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as RuntimeArgs);
    let input = parse_macro_input!(item as ItemFn);

    if input.sig.asyncness.is_none() {
        return Error::new_spanned(
            input.sig.fn_token,
            "#[coil::test] must be used on an async function",
        )
        .to_compile_error()
        .into();
    }

    expand_entry(args, input, Some(quote! { #[::core::prelude::v1::test] }))
}

fn expand_entry(args: RuntimeArgs, input: ItemFn, marker: Option<proc_macro2::TokenStream>) -> TokenStream {
    let attrs = &input.attrs;
    let vis = &input.vis;
    let block = &input.block;

    let mut sig = input.sig.clone();
    sig.asyncness = None;

    let runtime = args.runtime();

    quote! {
        #marker
        #(#attrs)*
        #vis #sig {
            #runtime.block_on(async move #block)
        }
    }
    .into()
}

/// Awaits every future concurrently and evaluates to the tuple of their
/// outputs.
///
/// ```rust,ignore
/// let (a, b) = coil::join!(async { 1 }, async { 2 });
/// ```
#[proc_macro]
pub fn join(input: TokenStream) -> TokenStream {
    let futures = parse_macro_input!(input with Punctuated::<Expr, Token![,]>::parse_terminated);
    let futures: Vec<_> = futures.into_iter().collect();

    if futures.len() > MAX_BRANCHES {
        return too_many("join!");
    }

    match futures.as_slice() {
        [] => quote! { () },
        [single] => quote! { (#single).await },
        many => quote! { ::coil::join((#(#many,)*)).await },
    }
    .into()
}

/// One `future => handler` arm of `select!`.
struct Branch {
    future: Expr,
    handler: Expr,
}

struct Branches(Vec<Branch>);

impl Parse for Branches {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut branches = Vec::new();

        while !input.is_empty() {
            let future: Expr = input.parse()?;
            input.parse::<Token![=>]>()?;
            let handler: Expr = input.parse()?;

            branches.push(Branch { future, handler });

            if input.is_empty() {
                break;
            }
            input.parse::<Token![,]>()?;
        }

        Ok(Branches(branches))
    }
}

/// Awaits the first future to complete and passes its output to the
/// matching handler.
///
/// The other branches keep running in the background and their outputs
/// are discarded.
///
/// ```rust,ignore
/// let winner = coil::select! {
///     sleep_for(Duration::from_millis(50)) => |_| "slow",
///     async { 7 } => |v| if v == 7 { "fast" } else { "?" },
/// };
/// ```
#[proc_macro]
pub fn select(input: TokenStream) -> TokenStream {
    let Branches(branches) = parse_macro_input!(input as Branches);

    if branches.is_empty() {
        return Error::new(Span::call_site(), "select! needs at least one branch")
            .to_compile_error()
            .into();
    }

    if branches.len() > MAX_BRANCHES {
        return too_many("select!");
    }

    let futures = branches.iter().map(|b| &b.future);
    let one_of = format_ident!("OneOf{}", branches.len());

    let arms = branches.iter().enumerate().map(|(i, branch)| {
        let variant = format_ident!("V{}", i);
        let handler = &branch.handler;
        quote! {
            ::coil::join::#one_of::#variant(__value) => (#handler)(__value),
        }
    });

    quote! {
        match ::coil::race((#(#futures,)*)).await {
            #(#arms)*
        }
    }
    .into()
}

fn too_many(name: &str) -> TokenStream {
    Error::new(
        Span::call_site(),
        format!("{name} supports at most {MAX_BRANCHES} branches"),
    )
    .to_compile_error()
    .into()
}
