use proc_macro::TokenStream;
use quote::quote_spanned;
use syn::{Expr, ItemFn, LitInt, parse_macro_input, spanned::Spanned};

#[proc_macro_attribute]
pub fn assert_exit_code(attr: TokenStream, item: TokenStream) -> TokenStream {
    let code = parse_macro_input!(attr as Expr);
    let mut input_fn = parse_macro_input!(item as ItemFn);
    let block = *input_fn.block;
    *input_fn.block = syn::parse_quote! {
        {
            fn _f() {}
            fn _get_name<T>(_: T) -> &'static str {
                let n = core::any::type_name::<T>();
                &n[..n.len() - 4]
            }
            assert_eq!(
                kernel::thread::ThreadBuilder::new(_get_name(_f))
                    .spawn(move || { #block })
                    .join(),
            #code);
        }
    };
    TokenStream::from(quote_spanned! { input_fn.span() =>
        #input_fn
    })
}

#[proc_macro_attribute]
pub fn repeat(attr: TokenStream, item: TokenStream) -> TokenStream {
    let times = parse_macro_input!(attr as LitInt);
    let mut input_fn = parse_macro_input!(item as ItemFn);
    let block = *input_fn.block;
    *input_fn.block = syn::parse_quote! {
        {
            for _round in 0..#times {
                (move || { #block })();
            }
        }
    };
    TokenStream::from(quote_spanned! { input_fn.span() =>
        #input_fn
    })
}
