//! CORS middleware built on the cooperative chain.

use crate::{
    context::Context,
    http::{Method, StatusCode},
    middleware::Middleware,
};

/// CORS middleware — validates the `Origin` header, answers preflight requests,
/// and adds `Access-Control-*` headers to actual responses.
///
/// # Behavior
///
/// - No `Origin` header, or an origin outside the allow-list: the chain
///   continues untouched.
/// - `OPTIONS` preflight: the CORS headers are written and the chain is
///   aborted with `204 No Content`; later middleware and the route handler
///   do **not** run.
/// - Anything else: the CORS headers are written and the chain continues.
/// - A `Vary: Origin` header is added when a specific origin is echoed back,
///   not for the wildcard `*`.
///
/// Preflight only reaches this middleware if an `OPTIONS` route exists for
/// the path, since the router answers unmatched requests with `404` before
/// any middleware runs.
///
/// # Examples
///
/// ```rust
/// use rapidroute::Engine;
/// use rapidroute::middleware::from_middleware;
/// use rapidroute::security::Cors;
///
/// let cors = Cors::new()
///     .allow_origin("https://example.com")
///     .allow_method("PATCH")
///     .allow_header("X-Custom-Header");
///
/// let mut app = Engine::new();
/// app.use_middleware([from_middleware(cors)]);
/// ```
#[derive(Debug, Clone)]
pub struct Cors {
    allowed_origins: Vec<String>,
    allowed_methods: Vec<String>,
    allowed_headers: Vec<String>,
    max_age_secs: u32,
}

impl Default for Cors {
    fn default() -> Self {
        Self::new()
    }
}

impl Cors {
    /// Creates a policy that accepts no origin yet, the common methods
    /// (`GET`, `POST`, `PUT`, `DELETE`) and headers (`Content-Type`,
    /// `Authorization`), and a one-hour preflight cache.
    pub fn new() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: ["GET", "POST", "PUT", "DELETE"].map(String::from).to_vec(),
            allowed_headers: ["Content-Type", "Authorization"].map(String::from).to_vec(),
            max_age_secs: 3600,
        }
    }

    /// Creates a policy that accepts every origin (`*`).
    pub fn permissive() -> Self {
        Self::new().allow_origin("*")
    }

    /// Adds an allowed origin; `"*"` accepts every origin.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origins.push(origin.into());
        self
    }

    /// Adds an allowed HTTP method, sent verbatim in `Access-Control-Allow-Methods`.
    #[must_use]
    pub fn allow_method(mut self, method: impl Into<String>) -> Self {
        self.allowed_methods.push(method.into());
        self
    }

    /// Adds an allowed request header, sent verbatim in `Access-Control-Allow-Headers`.
    #[must_use]
    pub fn allow_header(mut self, header: impl Into<String>) -> Self {
        self.allowed_headers.push(header.into());
        self
    }

    /// Sets `Access-Control-Max-Age` for preflight responses.
    #[must_use]
    pub fn max_age(mut self, secs: u32) -> Self {
        self.max_age_secs = secs;
        self
    }

    // The value for `Access-Control-Allow-Origin`, or `None` if `origin` is refused.
    fn resolve_origin(&self, origin: &str) -> Option<String> {
        if self.allowed_origins.iter().any(|o| o == "*") {
            Some("*".to_owned())
        } else if self.allowed_origins.iter().any(|o| o == origin) {
            Some(origin.to_owned())
        } else {
            None
        }
    }
}

impl Middleware for Cors {
    fn handle(&self, ctx: &mut Context) {
        let origin = ctx.header("origin");
        if origin.is_empty() {
            return ctx.next();
        }
        let Some(allow_origin) = self.resolve_origin(origin) else {
            return ctx.next();
        };
        let is_wildcard = allow_origin == "*";
        let is_preflight = ctx.request().method() == &Method::Options;

        let response = ctx.response_mut();
        response.set_header("Access-Control-Allow-Origin", allow_origin);
        response.set_header("Access-Control-Allow-Methods", self.allowed_methods.join(", "));
        response.set_header("Access-Control-Allow-Headers", self.allowed_headers.join(", "));
        if !is_wildcard {
            response.add_header("Vary", "Origin");
        }

        if is_preflight {
            ctx.response_mut()
                .set_header("Access-Control-Max-Age", self.max_age_secs.to_string());
            ctx.abort_with_status(StatusCode::NoContent);
        } else {
            ctx.next();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::http::{Request, Response};
    use crate::middleware::{from_middleware, handler};
    use crate::router::Router;

    fn router(cors: Cors, reached: Arc<AtomicBool>) -> Router {
        let mut router = Router::new();
        for method in [Method::Get, Method::Options] {
            let reached = Arc::clone(&reached);
            router
                .add_route(
                    method,
                    "/items",
                    vec![
                        from_middleware(cors.clone()),
                        handler(move |ctx| {
                            reached.store(true, Ordering::SeqCst);
                            ctx.send("items");
                        }),
                    ],
                )
                .unwrap();
        }
        router
    }

    fn send(router: &Router, method: Method, origin: Option<&str>) -> Response {
        let mut request = Request::new(method, "/items");
        if let Some(origin) = origin {
            request = request.with_header("Origin", origin);
        }
        router.dispatch(request)
    }

    #[test]
    fn no_origin_passes_through() {
        let reached = Arc::new(AtomicBool::new(false));
        let router = router(Cors::permissive(), Arc::clone(&reached));
        let res = send(&router, Method::Get, None);
        assert!(reached.load(Ordering::SeqCst));
        assert!(!res.headers().contains("access-control-allow-origin"));
    }

    #[test]
    fn preflight_aborts_with_204() {
        let reached = Arc::new(AtomicBool::new(false));
        let router = router(Cors::permissive(), Arc::clone(&reached));
        let res = send(&router, Method::Options, Some("https://a.example"));
        assert_eq!(res.status(), StatusCode::NoContent);
        assert_eq!(res.headers().get("access-control-allow-origin"), Some("*"));
        assert_eq!(res.headers().get("access-control-max-age"), Some("3600"));
        assert!(!res.headers().contains("vary"));
        assert!(!reached.load(Ordering::SeqCst));
    }

    #[test]
    fn specific_origin_is_echoed_with_vary() {
        let reached = Arc::new(AtomicBool::new(false));
        let cors = Cors::new().allow_origin("https://app.example");
        let router = router(cors, Arc::clone(&reached));
        let res = send(&router, Method::Get, Some("https://app.example"));
        assert!(reached.load(Ordering::SeqCst));
        assert_eq!(
            res.headers().get("access-control-allow-origin"),
            Some("https://app.example")
        );
        assert_eq!(res.headers().get("vary"), Some("Origin"));
        assert_eq!(res.body_bytes(), b"items");
    }

    #[test]
    fn unknown_origin_gets_no_headers() {
        let reached = Arc::new(AtomicBool::new(false));
        let cors = Cors::new().allow_origin("https://app.example");
        let router = router(cors, Arc::clone(&reached));
        let res = send(&router, Method::Options, Some("https://evil.example"));
        assert!(reached.load(Ordering::SeqCst));
        assert!(!res.headers().contains("access-control-allow-origin"));
    }
}
