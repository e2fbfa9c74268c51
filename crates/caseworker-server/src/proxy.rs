use crate::upstream_client::UpstreamClient;
use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use tracing::{debug, warn};

/// Forward one inbound request to the upstream and stream the answer back.
///
/// Status and headers are committed as soon as the upstream responds. Any
/// failure before that point becomes a `500`; a failure after it can only
/// abort the body, which closes the client connection.
pub async fn relay(upstream: &UpstreamClient, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(parts.uri.path())
        .to_string();
    let headers = filter_request_headers(&parts.headers);
    let body = reqwest::Body::wrap_stream(body.into_data_stream());

    debug!(
        method = %parts.method,
        path = %path_and_query,
        upstream = %upstream.base_url(),
        "relaying request"
    );

    match upstream
        .forward(parts.method, &path_and_query, headers, body)
        .await
    {
        Ok(response) => build_response(response, path_and_query),
        Err(err) => {
            warn!(path = %path_and_query, error = %err, "Proxy request error");
            err.into_response()
        }
    }
}

fn build_response(response: reqwest::Response, path: String) -> Response {
    let status = response.status();
    let headers = filter_response_headers(response.headers());

    debug!(path = %path, status = status.as_u16(), "upstream responded");

    let stream = response.bytes_stream().inspect_err(move |err| {
        warn!(path = %path, error = %err, "Upstream stream failed after response started");
    });

    let mut builder = Response::builder().status(status);
    if let Some(header_map) = builder.headers_mut() {
        *header_map = headers;
    }

    builder.body(Body::from_stream(stream)).unwrap_or_else(|_| {
        (StatusCode::INTERNAL_SERVER_ERROR, "Proxy request failed").into_response()
    })
}

/// Inbound headers minus `host` (the upstream routes on its own authority)
/// and connection-scoped headers that each hop sets for itself.
pub fn filter_request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::new();
    for (name, value) in headers.iter() {
        if is_hop_by_hop(name.as_str()) || name == header::HOST {
            continue;
        }
        filtered.append(name, value.clone());
    }
    filtered
}

pub fn filter_response_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::new();
    for (name, value) in headers.iter() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        filtered.append(name, value.clone());
    }
    filtered
}

fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}
