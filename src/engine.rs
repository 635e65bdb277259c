//! Route registration front-end: global middleware, groups, and serving.
//!
//! [`Engine`] owns the [`Router`] and the global middleware list.
//! [`RouterGroup`] adds a base path and middleware of its own. Every call to
//! `handle` freezes the handler list as
//!
//! ```text
//! engine middleware ++ group middleware (outermost group first) ++ route handler
//! ```
//!
//! Middleware added afterwards does not reach routes registered earlier.

use std::future::Future;
use std::sync::Arc;

use crate::config::Config;
use crate::context::Context;
use crate::http::Method;
use crate::middleware::Handler;
use crate::router::{RouteError, Router};
use crate::server::{Server, ServerError};

/// The application: a router plus global middleware.
///
/// # Examples
///
/// ```rust
/// use rapidroute::{Engine, Method};
/// use rapidroute::middleware::{Logger, from_middleware};
///
/// # fn main() -> Result<(), rapidroute::router::RouteError> {
/// let mut app = Engine::new();
/// app.use_middleware([from_middleware(Logger)]);
/// app.handle(Method::Get, "/", |ctx| ctx.send("home"))?;
///
/// let mut api = app.group("/api");
/// api.handle(Method::Get, "/users/:id", |ctx| {
///     let id = ctx.param("id").to_owned();
///     ctx.send(id);
/// })?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Engine {
    router: Router,
    middleware: Vec<Handler>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends global middleware, run first on every route registered afterwards.
    pub fn use_middleware<I>(&mut self, middleware: I) -> &mut Self
    where
        I: IntoIterator<Item = Handler>,
    {
        self.middleware.extend(middleware);
        self
    }

    /// Registers `handler` for `method` + `path` behind the global middleware.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteError`] if `path` is malformed.
    pub fn handle<H>(&mut self, method: Method, path: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.register(method, path, &[], Arc::new(handler))?;
        Ok(self)
    }

    /// Opens a group whose routes are prefixed with `base_path`.
    pub fn group(&mut self, base_path: &str) -> RouterGroup<'_> {
        RouterGroup {
            engine: self,
            base_path: base_path.to_owned(),
            middleware: Vec::new(),
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Finishes registration and hands back the router.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serves the registered routes until the process exits.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if the listener cannot be bound or fails.
    pub async fn listen(self, config: Config) -> Result<(), ServerError> {
        let (server, router) = self.bind(config).await?;
        server.run(router).await
    }

    /// Serves the registered routes until `shutdown` resolves, then drains
    /// open connections for at most the config's shutdown timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if the listener cannot be bound or fails.
    pub async fn listen_with_shutdown<S>(self, config: Config, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()>,
    {
        let (server, router) = self.bind(config).await?;
        server.run_until(router, shutdown).await
    }

    async fn bind(mut self, config: Config) -> Result<(Server, Arc<Router>), ServerError> {
        self.router.set_not_found_message(config.not_found_message.clone());
        for (method, path) in self.router.routes() {
            tracing::debug!(%method, path, "route");
        }
        let server = Server::bind(config.address())
            .await?
            .shutdown_timeout(config.shutdown_timeout_duration());
        Ok((server, Arc::new(self.router)))
    }

    fn register(
        &mut self,
        method: Method,
        path: &str,
        group_middleware: &[Handler],
        handler: Handler,
    ) -> Result<(), RouteError> {
        let handlers: Vec<Handler> = self
            .middleware
            .iter()
            .chain(group_middleware)
            .cloned()
            .chain(std::iter::once(handler))
            .collect();
        self.router.add_route(method, path, handlers)
    }
}

/// A set of routes sharing a base path and middleware.
///
/// Groups borrow the engine mutably, so one group is open at a time; nested
/// groups inherit the parent's base path and middleware.
pub struct RouterGroup<'e> {
    engine: &'e mut Engine,
    base_path: String,
    middleware: Vec<Handler>,
}

impl RouterGroup<'_> {
    /// Appends middleware that runs after global middleware for this group's routes.
    pub fn use_middleware<I>(&mut self, middleware: I) -> &mut Self
    where
        I: IntoIterator<Item = Handler>,
    {
        self.middleware.extend(middleware);
        self
    }

    /// Registers `handler` at `base_path + path`.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteError`] if the joined path is malformed.
    pub fn handle<H>(&mut self, method: Method, path: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        let full_path = join_paths(&self.base_path, path);
        self.engine
            .register(method, &full_path, &self.middleware, Arc::new(handler))?;
        Ok(self)
    }

    /// Opens a nested group under this one.
    pub fn group(&mut self, base_path: &str) -> RouterGroup<'_> {
        RouterGroup {
            base_path: join_paths(&self.base_path, base_path),
            middleware: self.middleware.clone(),
            engine: &mut *self.engine,
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}

// A base of "/" adds nothing; otherwise the two parts are concatenated as given.
fn join_paths(base: &str, path: &str) -> String {
    if base == "/" || base.is_empty() {
        path.to_owned()
    } else {
        format!("{base}{path}")
    }
}
