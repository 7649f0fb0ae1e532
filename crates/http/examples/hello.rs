use bytes::Bytes;
use http::{Method, Response, StatusCode};
use http_body_util::Full;
use oneshot_http::handler::make_handler;
use oneshot_http::protocol::SharedRequest;
use oneshot_http::server::Server;
use std::error::Error;
use std::time::Duration;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let server = match Server::builder()
        .address("127.0.0.1")
        .port(8080)
        .read_timeout(Duration::from_secs(10))
        .handler(make_handler(hello_world))
        .build()
    {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "invalid server configuration");
            return;
        }
    };

    if let Err(e) = server.start().await {
        error!(cause = %e, "server failed to start");
    }
}

async fn hello_world(request: SharedRequest) -> Result<Option<Response<Full<Bytes>>>, Box<dyn Error + Send + Sync>> {
    info!(method = %request.method(), path = request.uri().path(), body_size = request.body().len(), "receiving request");

    match (request.method(), request.uri().path()) {
        (&Method::GET, "/") | (&Method::HEAD, "/") => {
            let response = Response::builder().status(StatusCode::OK).body(Full::new(Bytes::from_static(b"Hello World!\r\n")))?;
            Ok(Some(response))
        }
        (&Method::POST, "/echo") => Ok(Some(Response::new(Full::new(request.body().clone())))),
        // nobody answers, the server replies 500
        _ => Ok(None),
    }
}
