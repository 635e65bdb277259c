//! Sample application exercising static, parameterized and nested routes.
//!
//! ```text
//! PORT=3000 RUST_LOG=debug cargo run --example blog
//! curl localhost:3000/users/42/orders/7
//! ```

use rapidroute::middleware::{Handler, Logger, from_middleware, handler};
use rapidroute::security::Cors;
use rapidroute::{Config, Context, Engine, Method, StatusCode, server};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn header_middleware(name: &'static str, value: &'static str) -> Handler {
    handler(move |ctx| {
        ctx.set_header(name, value);
        ctx.next();
    })
}

fn greeting(ctx: &mut Context) {
    ctx.set("hello", "world");
    ctx.next();
}

fn home(ctx: &mut Context) {
    let hello = ctx.get::<&str>("hello").copied().unwrap_or_default();
    ctx.json(StatusCode::Ok, &json!({ "message": "Home Page", "hello": hello }));
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let mut app = Engine::new();
    app.use_middleware([
        handler(greeting),
        header_middleware("Custom-Header-1", "SampleMiddleware 1"),
        header_middleware("Custom-Header-2", "SampleMiddleware 2"),
        from_middleware(Logger),
    ]);

    app.handle(Method::Get, "/", home)?;
    app.handle(Method::Get, "/about", |ctx| {
        ctx.json(StatusCode::Ok, &json!({ "message": "About Page" }));
    })?;

    app.handle(Method::Get, "/users/:id", |ctx| {
        let body = json!({ "message": "User Profile", "id": ctx.param("id") });
        ctx.json(StatusCode::Ok, &body);
    })?;
    app.handle(Method::Get, "/products/:sku", |ctx| {
        let body = json!({ "message": "Product Details", "sku": ctx.param("sku") });
        ctx.json(StatusCode::Ok, &body);
    })?;

    app.handle(Method::Get, "/users/:id/profile", |ctx| {
        let body = json!({ "message": "User Profile Page", "id": ctx.param("id") });
        ctx.json(StatusCode::Ok, &body);
    })?;
    app.handle(Method::Get, "/users/:id/orders/:orderID", |ctx| {
        let body = json!({
            "message": "User Order Details",
            "id": ctx.param("id"),
            "orderID": ctx.param("orderID"),
        });
        ctx.json(StatusCode::Ok, &body);
    })?;

    app.handle(Method::Get, "/blog/:category/:postID", |ctx| {
        let body = json!({
            "message": "Blog Post",
            "category": ctx.param("category"),
            "postID": ctx.param("postID"),
        });
        ctx.json(StatusCode::Ok, &body);
    })?;

    // Matches exactly one segment: /static/app.css, not /static/css/app.css.
    app.handle(Method::Get, "/static/*filepath", |ctx| {
        let body = json!({ "message": "Serving Static File", "filepath": ctx.param("filepath") });
        ctx.json(StatusCode::Ok, &body);
    })?;

    app.handle(Method::Get, "/users/wow", |ctx| {
        ctx.json(StatusCode::Ok, &json!({ "message": "Special Route" }));
    })?;
    app.handle(Method::Get, "/users/:id/settings", |ctx| {
        let body = json!({ "message": "User Settings", "id": ctx.param("id") });
        ctx.json(StatusCode::Ok, &body);
    })?;

    let mut api = app.group("/api");
    api.use_middleware([from_middleware(Cors::permissive())]);
    api.handle(Method::Get, "/health", |ctx| ctx.send("ok"))?;
    api.handle(Method::Options, "/health", |ctx| {
        ctx.send_status(StatusCode::NoContent);
    })?;
    api.handle(Method::Post, "/echo", |ctx| match ctx.bind_json::<serde_json::Value>() {
        Ok(value) => ctx.json(StatusCode::Ok, &value),
        Err(e) => ctx.abort_with_status_json(
            StatusCode::BadRequest,
            &json!({ "error": e.to_string() }),
        ),
    })?;

    app.listen_with_shutdown(config, server::shutdown_signal()).await?;
    Ok(())
}
