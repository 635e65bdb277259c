use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rapidroute::{Engine, Method, Server, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Notify, oneshot};

async fn spawn_app(app: Engine) -> (SocketAddr, oneshot::Sender<()>) {
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    let (tx, rx) = oneshot::channel::<()>();
    let router = Arc::new(app.into_router());
    tokio::spawn(async move {
        server
            .run_until(router, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });
    (addr, tx)
}

async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

fn blog() -> Engine {
    let mut app = Engine::new();
    app.use_middleware([rapidroute::middleware::handler(|ctx| {
        ctx.set_header("X-Served-By", "rapidroute");
        ctx.next();
    })]);
    app.handle(Method::Get, "/", |ctx| ctx.send("home")).unwrap();
    app.handle(Method::Get, "/blog/:category/:postID", |ctx| {
        let body = format!("{}/{}", ctx.param("category"), ctx.param("postID"));
        ctx.send(body);
    })
    .unwrap();
    app.handle(Method::Post, "/echo", |ctx| {
        let body = ctx.request().body().to_vec();
        ctx.send_status(StatusCode::Created);
        ctx.response_mut().set_body(body);
    })
    .unwrap();
    app
}

#[tokio::test]
async fn serves_static_and_param_routes() {
    let (addr, _shutdown) = spawn_app(blog()).await;

    let res = roundtrip(addr, "GET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"), "{res}");
    assert!(res.contains("X-Served-By: rapidroute\r\n"), "{res}");
    assert!(res.ends_with("\r\n\r\nhome"), "{res}");

    let res = roundtrip(
        addr,
        "GET /blog/tech/42 HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"), "{res}");
    assert!(res.ends_with("tech/42"), "{res}");
}

#[tokio::test]
async fn unknown_path_is_404_without_middleware() {
    let (addr, _shutdown) = spawn_app(blog()).await;

    let res = roundtrip(addr, "GET /missing HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 404 Not Found\r\n"), "{res}");
    assert!(res.ends_with("404 page not found"), "{res}");
    assert!(!res.contains("X-Served-By"), "{res}");
}

#[tokio::test]
async fn pipelined_requests_on_one_connection() {
    let (addr, _shutdown) = spawn_app(blog()).await;

    let raw = "POST /echo HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello\
               GET /blog/go/1 HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n";
    let res = roundtrip(addr, raw).await;
    assert!(res.starts_with("HTTP/1.1 201 Created\r\n"), "{res}");
    assert!(res.contains("\r\n\r\nhello"), "{res}");
    assert!(res.ends_with("go/1"), "{res}");
}

#[tokio::test]
async fn malformed_request_gets_400() {
    let (addr, _shutdown) = spawn_app(blog()).await;

    let res = roundtrip(addr, "NOT A REQUEST\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{res}");
}

#[tokio::test]
async fn overflowing_content_length_gets_413() {
    let (addr, _shutdown) = spawn_app(blog()).await;

    let raw = "POST /echo HTTP/1.1\r\nHost: x\r\nContent-Length: 18446744073709551615\r\n\r\n";
    let res = roundtrip(addr, raw).await;
    assert!(res.starts_with("HTTP/1.1 413 Payload Too Large\r\n"), "{res}");
    assert!(res.contains("Connection: close\r\n"), "{res}");
}

#[tokio::test]
async fn oversized_declared_body_is_rejected_before_it_arrives() {
    let (addr, _shutdown) = spawn_app(blog()).await;

    let raw = "POST /echo HTTP/1.1\r\nHost: x\r\nContent-Length: 9000000\r\n\r\n";
    let res = roundtrip(addr, raw).await;
    assert!(res.starts_with("HTTP/1.1 413 Payload Too Large\r\n"), "{res}");
}

#[tokio::test]
async fn percent_encoded_params_and_query_are_decoded() {
    let mut app = Engine::new();
    app.handle(Method::Get, "/users/:id", |ctx| {
        let body = format!("{}|{}", ctx.param("id"), ctx.query("q"));
        ctx.send(body);
    })
    .unwrap();
    let (addr, _shutdown) = spawn_app(app).await;

    let res = roundtrip(
        addr,
        "GET /users/john%20doe?q=a%26b HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(res.ends_with("john doe|a&b"), "{res}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_finishes_in_flight_request() {
    let started = Arc::new(Notify::new());
    let mut app = Engine::new();
    let signal = Arc::clone(&started);
    app.handle(Method::Get, "/slow", move |ctx| {
        signal.notify_one();
        std::thread::sleep(Duration::from_millis(200));
        ctx.send("done");
    })
    .unwrap();

    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serving = tokio::spawn(server.run_until(Arc::new(app.into_router()), async {
        let _ = stop_rx.await;
    }));

    // Keep-alive request: only shutdown makes the server close the connection.
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /slow HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();
    started.notified().await;
    stop_tx.send(()).unwrap();

    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(3), stream.read_to_end(&mut out))
        .await
        .unwrap()
        .unwrap();
    let res = String::from_utf8(out).unwrap();
    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"), "{res}");
    assert!(res.contains("Connection: close\r\n"), "{res}");
    assert!(res.ends_with("done"), "{res}");

    let finished = tokio::time::timeout(Duration::from_secs(3), serving).await;
    assert!(matches!(finished, Ok(Ok(Ok(())))));
}
