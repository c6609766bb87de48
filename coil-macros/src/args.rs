use proc_macro2::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Error, Expr, ExprLit, Lit, LitInt, MetaNameValue, Result, Token};

/// Arguments of `#[coil::main(...)]` and `#[coil::test(...)]`.
///
/// ```text
/// #[coil::main(max_poll_wait_ms = 100, event_capacity = 256)]
/// ```
#[derive(Default)]
pub(crate) struct RuntimeArgs {
    max_poll_wait_ms: Option<u64>,
    event_capacity: Option<usize>,
}

impl Parse for RuntimeArgs {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut args = RuntimeArgs::default();
        let pairs = Punctuated::<MetaNameValue, Token![,]>::parse_terminated(input)?;

        for pair in pairs {
            let value = int_literal(&pair)?;

            if pair.path.is_ident("max_poll_wait_ms") {
                let ms: u64 = value.base10_parse()?;
                if ms == 0 {
                    return Err(Error::new_spanned(value, "max_poll_wait_ms must be > 0"));
                }
                args.max_poll_wait_ms = Some(ms);
            } else if pair.path.is_ident("event_capacity") {
                let n: usize = value.base10_parse()?;
                if n == 0 {
                    return Err(Error::new_spanned(value, "event_capacity must be > 0"));
                }
                args.event_capacity = Some(n);
            } else {
                return Err(Error::new_spanned(
                    &pair.path,
                    "unknown argument, expected `max_poll_wait_ms` or `event_capacity`",
                ));
            }
        }

        Ok(args)
    }
}

impl RuntimeArgs {
    /// Expression building the runtime described by these arguments.
    pub(crate) fn runtime(&self) -> TokenStream {
        let max_poll_wait = self.max_poll_wait_ms.map(|ms| {
            quote! { .max_poll_wait(::std::time::Duration::from_millis(#ms)) }
        });
        let event_capacity = self.event_capacity.map(|n| quote! { .event_capacity(#n) });

        quote! {
            ::coil::RuntimeBuilder::new()
                #max_poll_wait
                #event_capacity
                .build()
                .expect("failed to build runtime")
        }
    }
}

fn int_literal(pair: &MetaNameValue) -> Result<&LitInt> {
    match &pair.value {
        Expr::Lit(ExprLit {
            lit: Lit::Int(value),
            ..
        }) => Ok(value),
        other => Err(Error::new_spanned(other, "expected an integer literal")),
    }
}
