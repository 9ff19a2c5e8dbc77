/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */
#![forbid(unsafe_code)]

//! Cinder Macro Library
//!
//! Attribute macros that remove the boilerplate from declaring messages and
//! actors for the Cinder runtime.
//!
//! ```ignore
//! #[cinder_message]
//! pub struct Ping;
//!
//! #[cinder_message(remote)]
//! pub struct Transfer {
//!     pub amount: u64,
//! }
//!
//! #[cinder_actor]
//! pub struct Counter {
//!     count: u64,
//! }
//! ```

use proc_macro::TokenStream;

use quote::{format_ident, quote};
use syn::{parse_macro_input, DeriveInput};

fn has_derive(input: &DeriveInput, trait_name: &str) -> bool {
    input.attrs.iter().any(|attr| {
        if !attr.path().is_ident("derive") {
            return false;
        }
        let mut found = false;
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.segments.last().is_some_and(|segment| segment.ident == trait_name) {
                found = true;
            }
            Ok(())
        });
        found
    })
}

/// Flags accepted by the attribute macros, e.g. `#[cinder_message(remote)]`.
#[derive(Default)]
struct Flags {
    remote: bool,
    no_default: bool,
}

impl Flags {
    fn parse(attr: TokenStream) -> syn::Result<Self> {
        let mut flags = Self::default();
        let parser = syn::meta::parser(|meta| {
            if meta.path.is_ident("remote") {
                flags.remote = true;
                Ok(())
            } else if meta.path.is_ident("no_default") {
                flags.no_default = true;
                Ok(())
            } else {
                Err(meta.error("unsupported cinder attribute option"))
            }
        });
        syn::parse::Parser::parse(parser, attr)?;
        Ok(flags)
    }
}

/// Turns a struct or enum into a Cinder message.
///
/// Adds `#[derive(Clone, Debug)]` for whichever of the two is missing and
/// asserts at compile time that the type is `Send + Sync + 'static`, which is
/// what the runtime needs to share one message between mailboxes.
///
/// `#[cinder_message(remote)]` additionally derives `serde::Serialize` and
/// `serde::Deserialize` so a transport codec can put the message on the wire.
#[proc_macro_attribute]
pub fn cinder_message(attr: TokenStream, item: TokenStream) -> TokenStream {
    let flags = match Flags::parse(attr) {
        Ok(flags) => flags,
        Err(err) => return err.to_compile_error().into(),
    };
    let input = parse_macro_input!(item as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut traits = Vec::new();
    if !has_derive(&input, "Clone") {
        traits.push(quote!(Clone));
    }
    if !has_derive(&input, "Debug") {
        traits.push(quote!(Debug));
    }
    if flags.remote {
        if !has_derive(&input, "Serialize") {
            traits.push(quote!(serde::Serialize));
        }
        if !has_derive(&input, "Deserialize") {
            traits.push(quote!(serde::Deserialize));
        }
    }
    let derives = if traits.is_empty() {
        quote!()
    } else {
        quote!(#[derive(#(#traits),*)])
    };

    let assert_ident = format_ident!("_assert_cinder_message_{}", name);
    let expanded = quote! {
        #derives
        #input

        #[doc(hidden)]
        #[allow(dead_code, non_snake_case, clippy::needless_lifetimes)]
        const _: () = {
            fn #assert_ident #impl_generics () #where_clause {
                fn assert_bounds<T: Send + Sync + 'static>() {}
                assert_bounds::<#name #ty_generics>();
            }
        };
    };
    TokenStream::from(expanded)
}

/// Prepares a type to be spawned as an actor with `Props::of::<T>()`.
///
/// Derives `Default` (skipped with `#[cinder_actor(no_default)]`) and `Debug`,
/// and asserts the type is `Send + 'static` since actor instances move between
/// worker threads.
#[proc_macro_attribute]
pub fn cinder_actor(attr: TokenStream, item: TokenStream) -> TokenStream {
    let flags = match Flags::parse(attr) {
        Ok(flags) => flags,
        Err(err) => return err.to_compile_error().into(),
    };
    let input = parse_macro_input!(item as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut traits = Vec::new();
    if !flags.no_default && !has_derive(&input, "Default") {
        traits.push(quote!(Default));
    }
    if !has_derive(&input, "Debug") {
        traits.push(quote!(Debug));
    }
    let derives = if traits.is_empty() {
        quote!()
    } else {
        quote!(#[derive(#(#traits),*)])
    };

    let assert_ident = format_ident!("_assert_cinder_actor_{}", name);
    let expanded = quote! {
        #derives
        #input

        #[doc(hidden)]
        #[allow(dead_code, non_snake_case, clippy::needless_lifetimes)]
        const _: () = {
            fn #assert_ident #impl_generics () #where_clause {
                fn assert_bounds<T: Send + 'static>() {}
                assert_bounds::<#name #ty_generics>();
            }
        };
    };
    TokenStream::from(expanded)
}
