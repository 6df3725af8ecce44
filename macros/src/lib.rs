use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, Expr, ExprLit, ItemFn, Lit, MetaNameValue};

/// Test attribute used across rxflow.
///
/// Installs a `tracing-subscriber` test writer so lane, timer and limiter
/// events show up in failing test output. With `timeout_ms = N` the body runs
/// on a watchdog thread and the test fails instead of hanging when a pipeline
/// never reaches its terminal signal.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let input = parse_macro_input!(item as ItemFn);

  if input.sig.asyncness.is_some() {
    return TokenStream::from(
      syn::Error::new(
        input.sig.span(),
        "rxflow_macro::test does not support async tests, await an `AsyncResult` with \
         `futures::executor::block_on` instead",
      )
      .to_compile_error(),
    );
  }

  let raw_args = proc_macro2::TokenStream::from(attr);
  let timeout_ms = if raw_args.is_empty() {
    None
  } else {
    match syn::parse2::<MetaNameValue>(raw_args.clone()) {
      Ok(arg) if arg.path.is_ident("timeout_ms") => match arg.value {
        Expr::Lit(ExprLit { lit: Lit::Int(ms), .. }) => Some(ms),
        other => {
          return TokenStream::from(
            syn::Error::new(other.span(), "`timeout_ms` expects an integer literal")
              .to_compile_error(),
          );
        }
      },
      _ => {
        return TokenStream::from(
          syn::Error::new(
            raw_args.span(),
            "rxflow_macro::test only accepts: #[rxflow_macro::test] or \
             #[rxflow_macro::test(timeout_ms = N)]",
          )
          .to_compile_error(),
        );
      }
    }
  };

  let attrs = &input.attrs;
  let vis = &input.vis;
  let sig = &input.sig;
  let name = &sig.ident;
  let body = &input.block;

  let init_tracing = quote! {
    let _ = ::tracing_subscriber::fmt()
      .with_env_filter(::tracing_subscriber::EnvFilter::from_default_env())
      .with_thread_names(true)
      .with_test_writer()
      .try_init();
  };

  let run = match timeout_ms {
    None => quote! {
      #init_tracing
      #body
    },
    Some(ms) => quote! {
      #init_tracing
      let (done_tx, done_rx) = ::std::sync::mpsc::channel::<()>();
      let watched = ::std::thread::Builder::new()
        .name(::std::string::String::from(stringify!(#name)))
        .spawn(move || {
          #body;
          let _ = done_tx.send(());
        })
        .expect("spawn test thread");
      match done_rx.recv_timeout(::std::time::Duration::from_millis(#ms)) {
        Err(::std::sync::mpsc::RecvTimeoutError::Timeout) => {
          panic!("test `{}` did not finish within {} ms", stringify!(#name), #ms);
        }
        _ => {
          if let Err(payload) = watched.join() {
            ::std::panic::resume_unwind(payload);
          }
        }
      }
    },
  };

  let expanded = quote! {
    #[test]
    #(#attrs)*
    #vis #sig {
      #run
    }
  };

  TokenStream::from(expanded)
}
