use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::{
    Attribute, DeriveInput, FnArg, GenericParam, ItemTrait, LitStr, Meta, Signature, TraitItem,
    TraitItemFn, parse_macro_input, parse_quote, spanned::Spanned,
};

const TARGET_PARAM: &str = "__MemotxTarget";

#[proc_macro_derive(Transactional, attributes(transaction))]
pub fn derive_transactional(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_transactional_derive(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Implements the annotated trait for `memotx::TransactionProxy<T>` wherever
/// `T` implements it. Goes above `#[async_trait]`.
#[proc_macro_attribute]
pub fn transactional(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(
            Span::call_site(),
            "#[transactional] does not accept arguments on a trait; the manager is chosen with #[transaction(manager = \"...\")] on the implementing type",
        )
        .to_compile_error()
        .into();
    }

    let input = parse_macro_input!(item as ItemTrait);
    match expand_transactional_trait(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_transactional_derive(input: DeriveInput) -> syn::Result<TokenStream2> {
    let manager = parse_transaction_options(&input.attrs)?;
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let manager_const = manager.map(|manager| {
        quote!(const MANAGER: &'static str = #manager;)
    });

    Ok(quote! {
        impl #impl_generics ::memotx::Transactional for #name #ty_generics #where_clause {
            #manager_const
        }
    })
}

fn parse_transaction_options(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut manager = None;

    for attr in attrs {
        if !attr.path().is_ident("transaction") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("manager") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                if lit.value().trim().is_empty() {
                    return Err(syn::Error::new(
                        lit.span(),
                        "transaction manager name cannot be empty",
                    ));
                }
                manager = Some(lit);
                return Ok(());
            }

            Err(meta.error("Unsupported #[transaction(...)] option. Supported: manager = \"...\""))
        })?;
    }

    Ok(manager)
}

fn expand_transactional_trait(mut item_trait: ItemTrait) -> syn::Result<TokenStream2> {
    let async_trait_args = find_async_trait(&item_trait.attrs);
    let trait_ident = item_trait.ident.clone();
    let target = format_ident!("{}", TARGET_PARAM);

    let mut impl_items = Vec::new();
    let mut has_async = false;

    for item in &mut item_trait.items {
        match item {
            TraitItem::Fn(method) => {
                let skip = take_skip_marker(&mut method.attrs)?;
                check_signature(&method.sig)?;
                has_async |= method.sig.asyncness.is_some();
                impl_items.push(forward_method(method, skip)?);
            }
            TraitItem::Type(assoc) => {
                if !assoc.generics.params.is_empty() {
                    return Err(syn::Error::new(
                        assoc.generics.span(),
                        "#[transactional] does not support generic associated types",
                    ));
                }
                let ident = &assoc.ident;
                let (_, ty_generics, _) = item_trait.generics.split_for_impl();
                impl_items.push(quote! {
                    type #ident = <#target as #trait_ident #ty_generics>::#ident;
                });
            }
            TraitItem::Const(constant) => {
                let ident = &constant.ident;
                let ty = &constant.ty;
                let (_, ty_generics, _) = item_trait.generics.split_for_impl();
                impl_items.push(quote! {
                    const #ident: #ty = <#target as #trait_ident #ty_generics>::#ident;
                });
            }
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    "#[transactional] traits may only contain methods, associated types and constants",
                ));
            }
        }
    }

    let impl_attr = match (&async_trait_args, has_async) {
        (Some(Some(args)), _) => quote!(#[::memotx::async_trait(#args)]),
        (Some(None), _) => quote!(#[::memotx::async_trait]),
        (None, true) => {
            return Err(syn::Error::new(
                item_trait.ident.span(),
                "#[transactional] traits with async methods need #[async_trait] below #[transactional]",
            ));
        }
        (None, false) => quote!(),
    };

    let (_, ty_generics, _) = item_trait.generics.split_for_impl();
    let mut impl_generics = item_trait.generics.clone();
    impl_generics.params.push(GenericParam::Type(parse_quote! {
        #target: ?Sized + #trait_ident #ty_generics + ::core::marker::Send + ::core::marker::Sync + 'static
    }));
    let (impl_generics, _, where_clause) = impl_generics.split_for_impl();

    Ok(quote! {
        #item_trait

        #impl_attr
        impl #impl_generics #trait_ident #ty_generics for ::memotx::TransactionProxy<#target> #where_clause {
            #(#impl_items)*
        }
    })
}

/// `Some(args)` when an `#[async_trait]` attribute is present.
fn find_async_trait(attrs: &[Attribute]) -> Option<Option<TokenStream2>> {
    attrs.iter().find_map(|attr| {
        let is_async_trait = attr
            .path()
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "async_trait");
        if !is_async_trait {
            return None;
        }
        match &attr.meta {
            Meta::List(list) => Some(Some(list.tokens.clone())),
            _ => Some(None),
        }
    })
}

/// Removes `#[transactional(skip)]` from a trait method, reporting whether it
/// was present.
fn take_skip_marker(attrs: &mut Vec<Attribute>) -> syn::Result<bool> {
    let mut skip = false;
    let mut kept = Vec::with_capacity(attrs.len());

    for attr in attrs.drain(..) {
        if !attr.path().is_ident("transactional") {
            kept.push(attr);
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                return Ok(());
            }
            Err(meta.error("Unsupported #[transactional(...)] method option. Supported: skip"))
        })?;
    }

    *attrs = kept;
    Ok(skip)
}

fn check_signature(sig: &Signature) -> syn::Result<()> {
    if sig
        .generics
        .lifetimes()
        .any(|param| param.lifetime.ident == "async_trait")
    {
        return Err(syn::Error::new(
            sig.span(),
            "#[transactional] must be placed above #[async_trait]",
        ));
    }

    match sig.receiver() {
        Some(receiver)
            if receiver.reference.is_some()
                && receiver.mutability.is_none()
                && receiver.colon_token.is_none() =>
        {
            Ok(())
        }
        Some(receiver) => Err(syn::Error::new(
            receiver.span(),
            "#[transactional] methods must take `&self`",
        )),
        None => Err(syn::Error::new(
            sig.ident.span(),
            "#[transactional] traits cannot declare associated functions without `&self`",
        )),
    }
}

fn forward_method(method: &TraitItemFn, skip: bool) -> syn::Result<TokenStream2> {
    let mut sig = method.sig.clone();
    let mut args = Vec::new();

    for (index, input) in sig.inputs.iter_mut().enumerate() {
        if let FnArg::Typed(pat_type) = input {
            let ident = format_ident!("__memotx_arg{}", index);
            pat_type.pat = Box::new(parse_quote!(#ident));
            args.push(ident);
        }
    }

    let name = &sig.ident;
    let call = quote!(self.target().#name(#(#args),*));
    let body = match (sig.asyncness.is_some(), skip) {
        (true, false) => quote!(self.interceptor().invoke(#call).await),
        (true, true) => quote!(#call.await),
        (false, _) => call,
    };

    Ok(quote! {
        #sig {
            #body
        }
    })
}
