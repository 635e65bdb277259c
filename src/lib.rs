//! # rapidroute
//!
//! A small HTTP/1.1 routing framework on Tokio: O(1) static routes, a
//! per-method trie for `:param` routes, and a cooperative middleware chain
//! driven by [`Context::next`] and [`Context::abort`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rapidroute::{Config, Engine, Method};
//! use rapidroute::middleware::{Logger, from_middleware};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut app = Engine::new();
//!     app.use_middleware([from_middleware(Logger)]);
//!     app.handle(Method::Get, "/", |ctx| ctx.send("Hello, World!"))?;
//!     app.handle(Method::Get, "/users/:id", |ctx| {
//!         let id = ctx.param("id").to_owned();
//!         ctx.send(format!("user {id}"));
//!     })?;
//!
//!     app.listen(Config::from_env()?).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
mod engine;
pub mod http;
pub mod middleware;
pub mod router;
pub mod security;
pub mod server;

pub use config::Config;
pub use context::Context;
pub use engine::{Engine, RouterGroup};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::{RouteError, Router};
pub use server::{Server, ServerError};
