//! Axum router for the segment origin.
//!
//! Static files come from [`ServeDir`]; a middleware pins the HLS content
//! types and disables caching on every response, and CORS admits any origin
//! for `GET`/`OPTIONS`.

use std::path::Path;

use axum::extract::Request;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA};
use axum::http::{HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

/// Build the router serving `dir`.
pub fn build_router(dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .fallback_service(ServeDir::new(dir))
        .layer(cors)
        .layer(middleware::from_fn(hls_headers))
        .layer(TraceLayer::new_for_http())
}

/// Content type for a request path, by extension.
fn content_type_for(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("m3u8") {
        Some(PLAYLIST_CONTENT_TYPE)
    } else if ext.eq_ignore_ascii_case("ts") {
        Some(SEGMENT_CONTENT_TYPE)
    } else {
        None
    }
}

async fn hls_headers(req: Request, next: Next) -> Response {
    let content_type = match *req.method() {
        Method::GET | Method::HEAD => content_type_for(req.uri().path()),
        _ => None,
    };
    let mut resp = next.run(req).await;

    let ok = resp.status().is_success();
    let headers = resp.headers_mut();
    if let (true, Some(ct)) = (ok, content_type) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
    }
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("0"));

    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("stream.m3u8"),
            b"#EXTM3U\n#EXT-X-VERSION:3\n#EXTINF:1.0,\nstream0.ts\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("stream0.ts"), [0x47u8; 188]).unwrap();
        dir
    }

    fn request(method: Method, uri: &str) -> axum::http::request::Builder {
        axum::http::Request::builder().method(method).uri(uri)
    }

    async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(request(Method::GET, uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for("/stream.m3u8"), Some(PLAYLIST_CONTENT_TYPE));
        assert_eq!(content_type_for("/stream12.ts"), Some(SEGMENT_CONTENT_TYPE));
        assert_eq!(content_type_for("/STREAM.M3U8"), Some(PLAYLIST_CONTENT_TYPE));
        assert_eq!(content_type_for("/index.html"), None);
        assert_eq!(content_type_for("/"), None);
    }

    #[tokio::test]
    async fn playlist_served_with_hls_type() {
        let dir = fixture();
        let resp = get(build_router(dir.path()), "/stream.m3u8").await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], PLAYLIST_CONTENT_TYPE);
        assert_eq!(resp.headers()[CACHE_CONTROL], NO_CACHE);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(body.starts_with(b"#EXTM3U"));
    }

    #[tokio::test]
    async fn segment_served_with_ts_type() {
        let dir = fixture();
        let resp = get(build_router(dir.path()), "/stream0.ts").await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], SEGMENT_CONTENT_TYPE);
        assert_eq!(resp.headers()[PRAGMA], "no-cache");
        assert_eq!(resp.headers()[EXPIRES], "0");
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.len(), 188);
    }

    #[tokio::test]
    async fn missing_file_is_404_without_hls_type() {
        let dir = fixture();
        let resp = get(build_router(dir.path()), "/stream99.ts").await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_ne!(
            resp.headers().get(CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(SEGMENT_CONTENT_TYPE.as_bytes())
        );
        assert_eq!(resp.headers()[CACHE_CONTROL], NO_CACHE);
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let dir = fixture();
        let req = request(Method::GET, "/stream.m3u8")
            .header("origin", "http://player.example")
            .body(Body::empty())
            .unwrap();
        let resp = build_router(dir.path()).oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn cors_preflight_lists_get() {
        let dir = fixture();
        let req = request(Method::OPTIONS, "/stream.m3u8")
            .header("origin", "http://player.example")
            .header("access-control-request-method", "GET")
            .body(Body::empty())
            .unwrap();
        let resp = build_router(dir.path()).oneshot(req).await.unwrap();

        assert!(resp.status().is_success());
        let methods = resp.headers()["access-control-allow-methods"]
            .to_str()
            .unwrap()
            .to_string();
        assert!(methods.contains("GET"), "methods: {methods}");
        assert!(methods.contains("OPTIONS"), "methods: {methods}");
    }

    #[tokio::test]
    async fn post_is_rejected() {
        let dir = fixture();
        let req = request(Method::POST, "/stream.m3u8")
            .body(Body::empty())
            .unwrap();
        let resp = build_router(dir.path()).oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
    }
}
