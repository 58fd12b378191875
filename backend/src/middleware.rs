use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Client address: `X-Real-IP`, then the first `X-Forwarded-For` hop, then
/// the peer of the connection.
pub fn remote_addr(request: &Request) -> String {
    let headers = request.headers();
    header_str(headers, "x-real-ip")
        .or_else(|| {
            header_str(headers, "x-forwarded-for")
                .and_then(|hops| hops.split(',').next())
                .map(str::trim)
        })
        .map(str::to_string)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(peer)| peer.to_string())
        })
        .unwrap_or_default()
}

/// One log event per request, levelled by response status.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = header_str(request.headers(), REQUEST_ID_HEADER)
        .unwrap_or_default()
        .to_string();
    let user_agent = header_str(request.headers(), header::USER_AGENT.as_str())
        .unwrap_or_default()
        .to_string();
    let remote_addr = remote_addr(&request);

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration_ms = started.elapsed().as_millis() as u64;
    macro_rules! log_request {
        ($level:ident) => {
            tracing::$level!(
                request_id = %request_id,
                method = %method,
                path = %path,
                remote_addr = %remote_addr,
                status,
                duration_ms,
                user_agent = %user_agent,
                "HTTP request"
            )
        };
    }

    if response.status().is_server_error() {
        log_request!(error);
    } else if response.status().is_client_error() {
        log_request!(warn);
    } else {
        log_request!(info);
    }
    response
}
