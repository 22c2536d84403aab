//! Routes an incoming call's selector string to a handler (§4.6): exact
//! match, then longest-prefix match among patterns registered with a
//! trailing separator, then recursive sub-mux dispatch at ordinary paths.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_std::sync::RwLock;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::call::Call;
use crate::codec::Codec;
use crate::responder::Responder;

/// The handler contract a selector dispatches to (§4.9 step 6, §9 "handler
/// adapter" — only this contract is part of the core; a reflection-based
/// adapter from native functions is out of scope).
#[async_trait]
pub trait Handler<C: Codec>: Send + Sync + 'static {
    async fn respond(&self, call: Call<C>, responder: Responder<C>);

    /// Lets `SelectorMux` recognize a registered handler as itself a
    /// sub-mux (match rule 3) without a dedicated registration API.
    fn as_any(&self) -> &dyn Any;
}

/// Adapts a plain async closure to a `Handler`.
pub struct HandlerFn<F>(pub F);

#[async_trait]
impl<C, F, Fut> Handler<C> for HandlerFn<F>
where
    C: Codec,
    F: Fn(Call<C>, Responder<C>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    async fn respond(&self, call: Call<C>, responder: Responder<C>) {
        (self.0)(call, responder).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Normalizes a selector: prepends `/` if the first character isn't one,
/// then replaces every `.` with `/`. Empty becomes `/`. Idempotent.
pub fn normalize(selector: &str) -> String {
    let prefixed = if selector.starts_with('/') {
        selector.to_string()
    } else {
        format!("/{}", selector)
    };
    prefixed.replace('.', "/")
}

pub struct SelectorMux<C: Codec> {
    exact: RwLock<HashMap<String, Arc<dyn Handler<C>>>>,
    /// Patterns registered with a trailing `/` (from a trailing-dot
    /// registration like `foo.bar.`), kept sorted descending by length so
    /// longer prefixes win; a stable sort preserves insertion order among
    /// ties.
    prefixes: RwLock<Vec<(String, Arc<dyn Handler<C>>)>>,
}

impl<C: Codec> SelectorMux<C> {
    pub fn new() -> Self {
        SelectorMux {
            exact: RwLock::new(HashMap::new()),
            prefixes: RwLock::new(Vec::new()),
        }
    }

    /// Registers `handler` at `pattern`. Duplicate registration, or an
    /// empty pattern, is a programmer error and panics rather than failing
    /// silently.
    pub async fn handle<H: Handler<C>>(&self, pattern: &str, handler: H) {
        assert!(
            !pattern.is_empty(),
            "rpc: selector mux pattern must not be empty"
        );
        let normalized = normalize(pattern);
        let handler: Arc<dyn Handler<C>> = Arc::new(handler);

        if normalized.len() > 1 && normalized.ends_with('/') {
            let mut prefixes = self.prefixes.write().await;
            assert!(
                !prefixes.iter().any(|(p, _)| p == &normalized),
                "rpc: selector {} already registered",
                normalized
            );
            prefixes.push((normalized, handler));
            prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        } else {
            let mut exact = self.exact.write().await;
            assert!(
                !exact.contains_key(&normalized),
                "rpc: selector {} already registered",
                normalized
            );
            exact.insert(normalized, handler);
        }
    }

    /// Finds the handler that should respond to `selector` (already
    /// normalized), per the match precedence in §4.6.
    pub fn route<'a>(&'a self, selector: &'a str) -> BoxFuture<'a, Option<Arc<dyn Handler<C>>>> {
        async move {
            if let Some(h) = self.exact.read().await.get(selector) {
                return Some(h.clone());
            }

            for (pattern, handler) in self.prefixes.read().await.iter() {
                if selector.starts_with(pattern.as_str()) {
                    return Some(handler.clone());
                }
            }

            let exact = self.exact.read().await;
            for (pattern, handler) in exact.iter() {
                if pattern != selector && selector.starts_with(pattern.as_str()) {
                    if let Some(submux) = handler.as_any().downcast_ref::<SelectorMux<C>>() {
                        let remainder = &selector[pattern.len()..];
                        if let Some(inner) = submux.route(remainder).await {
                            return Some(inner);
                        }
                    }
                }
            }

            None
        }
        .boxed()
    }
}

#[async_trait]
impl<C: Codec> Handler<C> for SelectorMux<C> {
    async fn respond(&self, call: Call<C>, responder: Responder<C>) {
        match self.route(&call.selector).await {
            Some(handler) => handler.respond(call, responder).await,
            None => {
                let message = format!("not found: {}", call.selector);
                let _ = responder.r#return::<()>(Err(message)).await;
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        for s in ["", "foo", "/foo", "foo.bar", "foo.bar.", "/foo/bar/"] {
            let once = normalize(s);
            let twice = normalize(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn normalize_prepends_slash_and_splits_dots() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("foo.bar"), "/foo/bar");
        assert_eq!(normalize("foo.bar."), "/foo/bar/");
        assert_eq!(normalize("/already/slashed"), "/already/slashed");
    }

    #[async_std::test]
    async fn longer_prefix_wins_over_shorter() {
        use crate::codec::JsonCodec;

        let mux: SelectorMux<JsonCodec> = SelectorMux::new();
        mux.handle("foo.", HandlerFn(|_, _| async {})).await;
        mux.handle("foo.bar.", HandlerFn(|_, _| async {})).await;

        let short = mux.route("/foo/baz").await.unwrap();
        let long = mux.route("/foo/bar/baz").await.unwrap();
        assert!(!Arc::ptr_eq(
            &(short as Arc<dyn Handler<JsonCodec>>),
            &(long as Arc<dyn Handler<JsonCodec>>)
        ));
    }

    #[async_std::test]
    async fn duplicate_registration_panics() {
        use crate::codec::JsonCodec;
        use std::panic::AssertUnwindSafe;
        use futures::FutureExt;

        let mux: SelectorMux<JsonCodec> = SelectorMux::new();
        mux.handle("dup", HandlerFn(|_, _| async {})).await;

        let result = AssertUnwindSafe(mux.handle("dup", HandlerFn(|_, _| async {})))
            .catch_unwind()
            .await;
        assert!(result.is_err());
    }
}
