//! Request routing — map a method and path to a handler chain.
//!
//! Two matchers sit behind [`Router`]:
//!
//! | Route template        | Stored in                       | Lookup                  |
//! |-----------------------|---------------------------------|-------------------------|
//! | `/about`              | static table, keyed method+path | exact string, O(1)      |
//! | `/users/:id`          | per-method [`Node`] trie        | one pass, O(depth)      |
//! | `/static/*filepath`   | per-method [`Node`] trie        | same as `:name`         |
//!
//! A template is dynamic if it contains `:` or `*` anywhere. Requests always
//! check the static table first and fall back to the trie; no trailing-slash
//! canonicalization happens on the static side, so `/a` and `/a/` are distinct
//! static keys. In the trie empty segments are skipped.
//!
//! Registering the same method and path twice replaces the first route
//! without an error.
//!
//! The router is built once and then shared read-only between connection
//! tasks; it has no interior locking and is not meant to change while serving.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::context::{Context, Params};
use crate::http::{Method, Request, Response, StatusCode};
use crate::middleware::{Chain, Handler};

pub mod path;
pub mod tree;

pub use path::is_dynamic;
pub use tree::Node;

/// Body of the default not-found response.
pub const DEFAULT_NOT_FOUND_BODY: &str = "404 page not found";

/// Errors raised while registering a route.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("route path must start with '/': {path:?}")]
    MissingLeadingSlash { path: String },

    #[error("empty parameter name in route {path:?}")]
    EmptyParamName { path: String },
}

/// A registered route: its template and the fully composed handler chain.
#[derive(Clone)]
pub struct Route {
    method: Method,
    path: String,
    param_names: Vec<String>,
    handlers: Arc<[Handler]>,
}

impl Route {
    /// Builds a route, validating the template.
    ///
    /// # Errors
    ///
    /// - [`RouteError::MissingLeadingSlash`] — `path` does not start with `/`.
    /// - [`RouteError::EmptyParamName`] — a segment is a bare `:` or `*`.
    pub fn new(method: Method, path: &str, handlers: Vec<Handler>) -> Result<Self, RouteError> {
        if !path.starts_with('/') {
            return Err(RouteError::MissingLeadingSlash {
                path: path.to_owned(),
            });
        }

        let mut param_names = Vec::new();
        for segment in path::segments(path) {
            if let Some(name) = path::capture_name(segment) {
                if name.is_empty() {
                    return Err(RouteError::EmptyParamName {
                        path: path.to_owned(),
                    });
                }
                param_names.push(name.to_owned());
            }
        }

        Ok(Self {
            method,
            path: path.to_owned(),
            param_names,
            handlers: handlers.into(),
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The template as registered.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Capture names in template order; empty for static routes.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Number of handlers in the composed chain.
    pub fn chain_len(&self) -> usize {
        self.handlers.len()
    }

    fn chain(&self) -> Chain {
        Chain::new(Arc::clone(&self.handlers))
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("param_names", &self.param_names)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// The result of resolving a request against the router.
#[derive(Debug)]
pub struct Match<'r> {
    pub route: &'r Route,
    pub params: Params,
}

/// HTTP request router: a static table plus one segment trie per method.
///
/// # Examples
///
/// ```rust
/// use rapidroute::http::{Method, Request, StatusCode};
/// use rapidroute::middleware::handler;
/// use rapidroute::router::Router;
///
/// let mut router = Router::new();
/// router
///     .add_route(Method::Get, "/users/:id", vec![handler(|ctx| {
///         let id = ctx.param("id").to_owned();
///         ctx.send(id);
///     })])
///     .unwrap();
///
/// let response = router.dispatch(Request::new(Method::Get, "/users/42"));
/// assert_eq!(response.status(), StatusCode::Ok);
/// assert_eq!(response.body_bytes(), b"42");
/// ```
#[derive(Default)]
pub struct Router {
    static_routes: HashMap<Method, HashMap<String, Route>>,
    dynamic_routes: HashMap<Method, Node<Route>>,
    not_found_message: Option<String>,
}

impl Router {
    /// Creates a router with no routes and the default not-found response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the body of not-found responses. `None` restores the default.
    pub fn set_not_found_message(&mut self, message: Option<String>) {
        self.not_found_message = message;
    }

    /// Registers `handlers` as the chain for `method` + `path`.
    ///
    /// `handlers` must already be composed in execution order. Static paths
    /// go to the exact-match table, dynamic ones into the method's trie. A
    /// previous route with the same method and path is replaced.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteError`] if the template is malformed; the router is
    /// left unchanged.
    pub fn add_route(
        &mut self,
        method: Method,
        path: &str,
        handlers: Vec<Handler>,
    ) -> Result<(), RouteError> {
        let route = Route::new(method.clone(), path, handlers)?;

        let replaced = if is_dynamic(path) {
            debug!(%method, path, params = ?route.param_names, "registering dynamic route");
            self.dynamic_routes
                .entry(method)
                .or_default()
                .insert(path, route)
                .is_some()
        } else {
            debug!(%method, path, "registering static route");
            self.static_routes
                .entry(method)
                .or_default()
                .insert(path.to_owned(), route)
                .is_some()
        };

        if replaced {
            debug!(path, "route replaced an earlier registration");
        }
        Ok(())
    }

    /// Resolves `method` + `path` without running anything.
    ///
    /// The static table is searched first with the percent-decoded path; on a
    /// miss the method's trie is searched and its captures returned in
    /// [`Match::params`].
    pub fn lookup(&self, method: &Method, path: &str) -> Option<Match<'_>> {
        if let Some(route) = self
            .static_routes
            .get(method)
            .and_then(|table| table.get(path::decode(path).as_ref()))
        {
            return Some(Match {
                route,
                params: Params::new(),
            });
        }

        let root = self.dynamic_routes.get(method)?;
        let mut params = Params::new();
        let route = root.search(path, &mut params)?;
        Some(Match { route, params })
    }

    /// Runs the chain registered for `request` and returns its response.
    ///
    /// Unmatched requests get a `404` whose body is the configured
    /// not-found message or [`DEFAULT_NOT_FOUND_BODY`].
    pub fn dispatch(&self, request: Request) -> Response {
        let Some(Match { route, params }) = self.lookup(request.method(), request.path()) else {
            debug!(method = %request.method(), path = %request.path(), "no route matched");
            return self.not_found();
        };

        debug!(
            method = %request.method(),
            path = %request.path(),
            route = route.path(),
            "dispatching request"
        );

        let mut ctx = Context::with_params(request, route.chain(), params);
        ctx.next();
        ctx.finish();
        ctx.into_response()
    }

    fn not_found(&self) -> Response {
        let body = self
            .not_found_message
            .as_deref()
            .unwrap_or(DEFAULT_NOT_FOUND_BODY);
        Response::new(StatusCode::NotFound).body(body)
    }

    /// Iterates every registered `(method, path)` pair, sorted.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        let statics = self.static_routes.values().flat_map(HashMap::values);
        let dynamics = self.dynamic_routes.values().flat_map(Node::values);
        statics
            .chain(dynamics)
            .map(|route| (&route.method, route.path.as_str()))
            .collect::<BTreeSet<_>>()
            .into_iter()
    }

    /// Returns the number of registered routes.
    pub fn len(&self) -> usize {
        let statics: usize = self.static_routes.values().map(HashMap::len).sum();
        let dynamics: usize = self
            .dynamic_routes
            .values()
            .map(|root| root.values().len())
            .sum();
        statics + dynamics
    }

    /// Returns `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.static_routes.values().all(HashMap::is_empty)
            && self.dynamic_routes.values().all(Node::is_empty)
    }
}
