//! In-process injection into an axum `Router`.
//!
//! # Responsibilities
//! - Convert canonical requests into `http::Request<Body>`
//! - Drive the router with `oneshot`, no network round trip
//! - Collect the response body and fold repeated headers
//!
//! # Design Decisions
//! - String payloads are sent verbatim, other JSON values serialized
//! - `set-cookie` is always reported as a list
//! - Requests that cannot be represented over HTTP become 400 responses

use axum::{
    body::Body,
    http::{self, header, HeaderName, HeaderValue},
    Router,
};
use futures_util::future::BoxFuture;
use serde_json::Value;
use tower::ServiceExt;

use crate::pipeline::Pipeline;
use crate::protocol::{HeaderValues, Request, Response, ResponseHeaders};

/// Pipeline that serves requests from an axum router.
#[derive(Clone)]
pub struct RouterPipeline {
    router: Router,
    max_body_bytes: usize,
}

impl RouterPipeline {
    pub fn new(router: Router, max_body_bytes: usize) -> Self {
        Self {
            router,
            max_body_bytes,
        }
    }
}

impl Pipeline for RouterPipeline {
    fn inject(&self, request: Request) -> BoxFuture<'static, Response> {
        let router = self.router.clone();
        let limit = self.max_body_bytes;

        Box::pin(async move {
            let http_request = match into_http(request) {
                Ok(r) => r,
                Err(reason) => {
                    tracing::debug!(reason = %reason, "Request cannot be injected");
                    return Response::bad_request(&reason);
                }
            };

            let response = match router.oneshot(http_request).await {
                Ok(response) => response,
                Err(never) => match never {},
            };

            from_http(response, limit).await
        })
    }
}

fn into_http(request: Request) -> Result<http::Request<Body>, String> {
    let uri: http::Uri = request
        .url
        .parse()
        .map_err(|e| format!("Invalid URL: {e}"))?;

    let mut builder = http::Request::builder()
        .method(request.method.as_str())
        .uri(uri);

    let headers = builder
        .headers_mut()
        .ok_or_else(|| "Invalid request".to_string())?;
    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| format!("Invalid header name: {name}"))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| format!("Invalid value for header {name}"))?;
        headers.insert(name, value);
    }

    let body = match request.payload {
        None => Body::empty(),
        Some(Value::String(text)) => Body::from(text),
        Some(json) => {
            if !headers.contains_key(header::CONTENT_TYPE) {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
            Body::from(json.to_string())
        }
    };

    builder.body(body).map_err(|e| e.to_string())
}

async fn from_http(response: http::Response<Body>, limit: usize) -> Response {
    let (parts, body) = response.into_parts();

    let raw_body = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, limit, "Failed to collect response body");
            return Response::error(500, "Internal Server Error", "Response body could not be read");
        }
    };

    let mut headers = ResponseHeaders::new();
    for name in parts.headers.keys() {
        let values: Vec<String> = parts
            .headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();

        let folded = if values.len() == 1 && *name != header::SET_COOKIE {
            HeaderValues::One(values.into_iter().next().unwrap_or_default())
        } else if values.is_empty() {
            continue;
        } else {
            HeaderValues::Many(values)
        };
        headers.insert(name.as_str().to_string(), folded);
    }

    Response {
        status_code: parts.status.as_u16(),
        headers,
        raw_body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Headers, Method};
    use axum::{
        http::{HeaderMap, StatusCode},
        response::{AppendHeaders, IntoResponse},
        routing::{get, post},
        Json,
    };
    use serde_json::json;

    fn request(method: Method, url: &str, payload: Option<Value>) -> Request {
        Request {
            method,
            url: url.to_string(),
            headers: Headers::new(),
            payload,
        }
    }

    fn app() -> Router {
        Router::new()
            .route("/hello", get(|| async { "hello" }))
            .route(
                "/echo",
                post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                    let tag = headers
                        .get("x-tag")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    Json(json!({"tag": tag, "body": body}))
                }),
            )
            .route(
                "/login",
                post(|| async {
                    (
                        StatusCode::CREATED,
                        AppendHeaders([
                            (header::SET_COOKIE, "sid=1; Path=/"),
                            (header::SET_COOKIE, "theme=dark"),
                        ]),
                        "ok",
                    )
                        .into_response()
                }),
            )
    }

    #[tokio::test]
    async fn test_injects_get_requests() {
        let pipeline = RouterPipeline::new(app(), 1024);
        let response = pipeline.inject(request(Method::Get, "/hello", None)).await;
        assert_eq!(response.status_code, 200);
        assert_eq!(&response.raw_body[..], b"hello");
    }

    #[tokio::test]
    async fn test_sends_json_payload_and_headers() {
        let pipeline = RouterPipeline::new(app(), 1024);
        let mut req = request(Method::Post, "/echo", Some(json!({"a": 1})));
        req.headers.insert("x-tag".into(), "t1".into());

        let response = pipeline.inject(req).await;
        assert_eq!(response.status_code, 200);
        let body: Value = serde_json::from_slice(&response.raw_body).unwrap();
        assert_eq!(body, json!({"tag": "t1", "body": {"a": 1}}));
    }

    #[tokio::test]
    async fn test_collects_set_cookie_as_list() {
        let pipeline = RouterPipeline::new(app(), 1024);
        let response = pipeline.inject(request(Method::Post, "/login", None)).await;
        assert_eq!(response.status_code, 201);
        assert_eq!(
            response.headers.get("set-cookie"),
            Some(&HeaderValues::Many(vec!["sid=1; Path=/".into(), "theme=dark".into()]))
        );
    }

    #[tokio::test]
    async fn test_unknown_routes_fall_through_to_404() {
        let pipeline = RouterPipeline::new(app(), 1024);
        let response = pipeline.inject(request(Method::Get, "/missing", None)).await;
        assert_eq!(response.status_code, 404);
    }

    #[tokio::test]
    async fn test_bad_header_becomes_400() {
        let pipeline = RouterPipeline::new(app(), 1024);
        let mut req = request(Method::Get, "/hello", None);
        req.headers.insert("bad header".into(), "x".into());
        let response = pipeline.inject(req).await;
        assert_eq!(response.status_code, 400);
    }

    #[tokio::test]
    async fn test_oversized_body_becomes_500() {
        let pipeline = RouterPipeline::new(app(), 2);
        let response = pipeline.inject(request(Method::Get, "/hello", None)).await;
        assert_eq!(response.status_code, 500);
    }
}
