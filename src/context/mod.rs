//! Per-request context — path parameters, a value store, response helpers,
//! and the chain controls (`next`/`abort`).
//!
//! One [`Context`] is built per dispatched request and dropped when the
//! response is handed back to the transport. Nothing in it is shared across
//! requests, so no method here needs synchronization.

use std::any::Any;
use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::http::{Request, Response, StatusCode};
use crate::middleware::{Chain, ChainState};

/// Path parameters bound by the router, in left-to-right order.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    /// Creates an empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `value`.
    ///
    /// A name that is already bound keeps its position and takes the new value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.pairs.push((name, value)),
        }
    }

    /// Returns the value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates `(name, value)` pairs in binding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// String-keyed store for handler-to-handler communication.
///
/// Values are type-erased; the reader names the type it expects and gets
/// `None` on a mismatch. This is an escape hatch, not a typed channel: two
/// handlers that disagree on a key's type fail quietly at the read site.
#[derive(Default)]
pub struct Values {
    map: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn insert<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.map.insert(key.into(), Box::new(value));
    }

    /// Returns the value under `key` if it exists and is a `T`.
    pub fn get<T>(&self, key: &str) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut<T>(&mut self, key: &str) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get_mut(key)
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// Removes and returns the value under `key` if it is a `T`.
    ///
    /// A value of another type is left in place.
    pub fn remove<T>(&mut self, key: &str) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        if !self.map.get(key)?.is::<T>() {
            return None;
        }
        self.map
            .remove(key)
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }
}

/// Per-request context handed to every middleware and handler.
pub struct Context {
    request: Request,
    response: Response,
    chain: Chain,
    params: Params,
    values: Values,
}

impl Context {
    /// Creates a context for `request` that will walk `chain`.
    pub fn new(request: Request, chain: Chain) -> Self {
        Self {
            request,
            response: Response::default(),
            chain,
            params: Params::new(),
            values: Values::new(),
        }
    }

    /// Creates a context with path parameters already bound.
    pub fn with_params(request: Request, chain: Chain, params: Params) -> Self {
        Self {
            params,
            ..Self::new(request, chain)
        }
    }

    // ── chain control ────────────────────────────────────────────────────────

    /// Runs the next handler in the chain, if any.
    ///
    /// Returns after that handler (and whatever it chained into) returns.
    /// Once the chain is exhausted or aborted this is a no-op.
    pub fn next(&mut self) {
        if let Some(handler) = self.chain.advance() {
            handler(self);
        }
    }

    /// Stops the chain: no handler after the current one will run.
    ///
    /// Handlers already on the stack finish normally.
    pub fn abort(&mut self) {
        self.chain.abort();
    }

    /// Sets `status` on the response, then aborts.
    pub fn abort_with_status(&mut self, status: StatusCode) {
        self.send_status(status);
        self.abort();
    }

    /// Writes `body` as JSON with `status`, then aborts.
    pub fn abort_with_status_json<T>(&mut self, status: StatusCode, body: &T)
    where
        T: Serialize + ?Sized,
    {
        self.json(status, body);
        self.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.chain.is_aborted()
    }

    pub fn chain_state(&self) -> ChainState {
        self.chain.state()
    }

    pub(crate) fn finish(&mut self) {
        self.chain.finish();
    }

    // ── request side ─────────────────────────────────────────────────────────

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns the path parameter `name`, or `""` if the route has none by that name.
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name).unwrap_or_default()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Returns the query parameter `key`, or `""`.
    pub fn query(&self, key: &str) -> &str {
        self.request.query_param(key).unwrap_or_default()
    }

    /// Returns the request header `name`, or `""`.
    pub fn header(&self, name: &str) -> &str {
        self.request.headers().get(name).unwrap_or_default()
    }

    /// Deserializes the request body as JSON.
    pub fn bind_json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }

    /// Returns the value of cookie `name` from the `Cookie` header, or `""`.
    pub fn cookie(&self, name: &str) -> &str {
        self.request
            .headers()
            .get_all("cookie")
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
            .unwrap_or_default()
    }

    // ── per-request values ───────────────────────────────────────────────────

    /// Stores `value` under `key` for handlers later in the chain.
    pub fn set<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.values.insert(key, value);
    }

    /// Reads the value under `key` as a `T`.
    pub fn get<T>(&self, key: &str) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.values.get(key)
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Values {
        &mut self.values
    }

    // ── response side ────────────────────────────────────────────────────────

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub(crate) fn into_response(self) -> Response {
        self.response
    }

    /// Sets a response header, replacing earlier values of the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.response.set_header(name, value);
    }

    /// Sets the response status without touching the body.
    pub fn send_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    /// Writes a `200 OK` plain-text body.
    pub fn send(&mut self, body: impl Into<String>) {
        self.response.set_header("Content-Type", "text/plain");
        self.response.set_status(StatusCode::Ok);
        self.response.set_body(body.into());
    }

    /// Writes `value` as a JSON body with `status`.
    ///
    /// A value that fails to serialize turns into a `500` with no body.
    pub fn json<T>(&mut self, status: StatusCode, value: &T)
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.response.set_header("Content-Type", "application/json");
                self.response.set_status(status);
                self.response.set_body(body);
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to encode JSON response");
                self.response.set_status(StatusCode::InternalServerError);
                self.response.set_body(Vec::new());
            }
        }
    }

    /// Appends a `Set-Cookie` header. `max_age` is in seconds.
    pub fn set_cookie(&mut self, name: &str, value: &str, max_age: i64, secure: bool) {
        let mut cookie = format!("{name}={value}; Max-Age={max_age}; HttpOnly");
        if secure {
            cookie.push_str("; Secure");
        }
        self.response.add_header("Set-Cookie", cookie);
    }

    /// Appends a `Set-Cookie` header that expires `name` immediately.
    pub fn delete_cookie(&mut self, name: &str) {
        self.response
            .add_header("Set-Cookie", format!("{name}=; Max-Age=0"));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::http::Method;
    use crate::middleware::{Handler, handler};

    fn context(handlers: Vec<Handler>) -> Context {
        Context::new(Request::new(Method::Get, "/"), Chain::new(handlers.into()))
    }

    #[test]
    fn param_is_empty_when_absent() {
        let mut params = Params::new();
        params.insert("id", "42");
        let ctx = Context::with_params(Request::new(Method::Get, "/u/42"), Chain::default(), params);
        assert_eq!(ctx.param("id"), "42");
        assert_eq!(ctx.param("missing"), "");
    }

    #[test]
    fn params_keep_binding_order() {
        let mut params = Params::new();
        params.insert("b", "1");
        params.insert("a", "2");
        params.insert("b", "3");
        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(pairs, vec![("b", "3"), ("a", "2")]);
    }

    #[test]
    fn values_are_typed_at_the_read_site() {
        let mut ctx = context(vec![]);
        ctx.set("user", String::from("ada"));
        ctx.set("hits", 3u32);
        assert_eq!(ctx.get::<String>("user").map(String::as_str), Some("ada"));
        assert_eq!(ctx.get::<u32>("hits"), Some(&3));
        assert_eq!(ctx.get::<u64>("hits"), None);
        assert_eq!(ctx.get::<u32>("nope"), None);

        *ctx.values_mut().get_mut::<u32>("hits").unwrap() += 1;
        assert_eq!(ctx.values_mut().remove::<String>("hits"), None);
        assert_eq!(ctx.values_mut().remove::<u32>("hits"), Some(4));
        assert!(!ctx.values().contains_key("hits"));
    }

    #[test]
    fn values_flow_down_the_chain() {
        let mut ctx = context(vec![
            handler(|ctx| {
                ctx.set("hello", "world");
                ctx.next();
            }),
            handler(|ctx| {
                let greeting = ctx.get::<&str>("hello").copied().unwrap_or_default();
                ctx.send(greeting);
            }),
        ]);
        ctx.next();
        assert_eq!(ctx.response().body_bytes(), b"world");
    }

    #[test]
    fn abort_stops_later_handlers() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let mut ctx = context(vec![
            handler(|ctx| ctx.abort_with_status(StatusCode::Unauthorized)),
            handler(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        ]);
        ctx.next();
        ctx.next();
        ctx.next();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.response().status(), StatusCode::Unauthorized);
        assert_eq!(ctx.chain_state(), ChainState::Aborted);
    }

    #[test]
    fn next_after_abort_inside_a_handler_is_a_no_op() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let mut ctx = context(vec![
            handler(|ctx| {
                ctx.abort();
                ctx.next();
            }),
            handler(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        ]);
        ctx.next();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_without_next_short_circuits() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let mut ctx = context(vec![
            handler(|ctx| ctx.send("stop here")),
            handler(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        ]);
        ctx.next();
        ctx.finish();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert!(!ctx.is_aborted());
        assert_eq!(ctx.chain_state(), ChainState::Completed);
        ctx.next();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn abort_with_unnamed_status_code() {
        let Some(unavailable_for_legal_reasons) = StatusCode::from_u16(451) else {
            panic!("451 is a valid status code");
        };
        let mut ctx = context(vec![handler(move |ctx| {
            ctx.abort_with_status(unavailable_for_legal_reasons);
        })]);
        ctx.next();
        assert_eq!(ctx.response().status().as_u16(), 451);
        assert!(ctx.is_aborted());
    }

    #[test]
    fn abort_with_status_json_writes_body() {
        let mut ctx = context(vec![handler(|ctx| {
            ctx.abort_with_status_json(StatusCode::Forbidden, &serde_json::json!({"error": "nope"}))
        })]);
        ctx.next();
        let response = ctx.into_response();
        assert_eq!(response.status(), StatusCode::Forbidden);
        assert_eq!(response.headers().get("content-type"), Some("application/json"));
        assert_eq!(response.body_bytes(), br#"{"error":"nope"}"#);
    }

    #[test]
    fn request_helpers() {
        let request = Request::new(Method::Post, "/items?sort=asc")
            .with_header("Cookie", "theme=dark; session=abc")
            .with_header("X-Trace", "t-1")
            .with_body(r#"{"name":"lamp"}"#);
        let ctx = Context::new(request, Chain::default());
        assert_eq!(ctx.query("sort"), "asc");
        assert_eq!(ctx.query("page"), "");
        assert_eq!(ctx.header("x-trace"), "t-1");
        assert_eq!(ctx.cookie("session"), "abc");
        assert_eq!(ctx.cookie("missing"), "");

        #[derive(serde::Deserialize)]
        struct Item {
            name: String,
        }
        let item: Item = ctx.bind_json().unwrap();
        assert_eq!(item.name, "lamp");
    }

    #[test]
    fn cookie_writers() {
        let mut ctx = context(vec![]);
        ctx.set_cookie("session", "abc", 3600, true);
        ctx.delete_cookie("theme");
        let cookies: Vec<_> = ctx.response().headers().get_all("set-cookie").collect();
        assert_eq!(
            cookies,
            vec![
                "session=abc; Max-Age=3600; HttpOnly; Secure",
                "theme=; Max-Age=0"
            ]
        );
    }
}
