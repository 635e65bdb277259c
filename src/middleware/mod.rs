//! Middleware pipeline — the cooperative handler chain every request runs through.
//!
//! Middleware and route handlers share one shape: a function of `&mut Context`.
//! A route's handler list is fixed at registration time as
//! `global middleware ++ group middleware ++ route handler`, and each request
//! walks it with a [`Chain`] cursor owned by its [`Context`].
//!
//! ## Core types
//!
//! - [`Handler`] — type-erased, cheaply-cloneable handler function.
//! - [`handler`] — erases a closure or `fn` item into a [`Handler`].
//! - [`Middleware`] — trait for middleware that carries its own configuration.
//! - [`Chain`] / [`ChainState`] — the cursor and its observable state.
//! - [`Logger`] — built-in request/response logger.
//!
//! ## Control flow
//!
//! Nothing advances automatically. A middleware that wants the rest of the
//! chain to run calls [`Context::next`]; code after that call runs once the
//! downstream handlers have returned. A middleware that returns without
//! calling `next` ends the chain silently. [`Context::abort`] additionally
//! turns every later `next` into a no-op.

use std::sync::Arc;
use std::time::Instant;

use crate::context::Context;

pub mod chain;

pub use chain::{Chain, ChainState};

/// A type-erased, reference-counted handler or middleware function.
///
/// The [`Arc`] wrapper makes handlers cheap to clone so a [`Chain`] can hand
/// one out while the context that owns the chain is mutably borrowed.
///
/// ```rust
/// use std::sync::Arc;
/// use rapidroute::{context::Context, middleware::Handler};
///
/// let handler: Handler = Arc::new(|ctx: &mut Context| ctx.next());
/// ```
pub type Handler = Arc<dyn Fn(&mut Context) + Send + Sync + 'static>;

/// Erases a closure or `fn` item into a [`Handler`].
///
/// Taking the `Fn(&mut Context)` bound directly lets closure arguments go
/// unannotated at the call site.
///
/// ```rust
/// use rapidroute::middleware::handler;
///
/// let stamp = handler(|ctx| {
///     ctx.set("started", true);
///     ctx.next();
/// });
/// ```
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The trait for middleware with state of its own.
///
/// Implementors receive the per-request [`Context`]. They may:
///
/// - **Pass through** — call `ctx.next()` and return.
/// - **Short-circuit** — write a response and return without calling `next`,
///   or call one of the `abort*` methods.
/// - **Decorate** — call `ctx.next()`, then inspect or amend `ctx.response_mut()`.
///
/// Middleware is shared by every request that hits its routes, hence the
/// `Send + Sync` bound.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the rest of the chain.
    fn handle(&self, ctx: &mut Context);
}

/// Converts a [`Middleware`] implementation into a [`Handler`].
///
/// ```rust
/// use rapidroute::middleware::{Logger, from_middleware};
///
/// let handler = from_middleware(Logger);
/// ```
pub fn from_middleware<M>(middleware: M) -> Handler
where
    M: Middleware + 'static,
{
    let middleware = Arc::new(middleware);
    Arc::new(move |ctx: &mut Context| middleware.handle(ctx))
}

/// Built-in middleware that logs each request's method, path, status, and duration.
///
/// Emits a single `tracing::info!` record after the downstream chain returns:
///
/// ```text
/// METHOD /path - STATUS (duration)
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger;

impl Middleware for Logger {
    fn handle(&self, ctx: &mut Context) {
        let start = Instant::now();

        ctx.next();

        let status = ctx.response().status().as_u16();
        tracing::info!(
            method = %ctx.request().method(),
            path = %ctx.request().path(),
            status,
            aborted = ctx.is_aborted(),
            "{} {} - {} ({:?})",
            ctx.request().method(),
            ctx.request().path(),
            status,
            start.elapsed()
        );
    }
}
