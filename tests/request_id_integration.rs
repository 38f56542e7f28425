use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
    routing::get,
};
use cutout_backend::request_id::{REQUEST_ID_HEADER, request_id_middleware};
use tower::ServiceExt;

async fn ok_handler() -> &'static str {
    "ok"
}

async fn fail_handler() -> Result<&'static str, cutout_backend::AppError> {
    Err(cutout_backend::AppError::Validation("bad request".into()))
}

fn build_app() -> Router {
    Router::new()
        .route("/ok", get(ok_handler))
        .route("/fail", get(fail_handler))
        .layer(axum::middleware::from_fn(request_id_middleware))
}

async fn response_request_id(req: Request<Body>) -> (StatusCode, String) {
    let resp = build_app().oneshot(req).await.expect("request");
    let status = resp.status();
    let id = resp
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    (status, id)
}

#[tokio::test]
async fn request_id_is_generated_when_header_missing() {
    let req = Request::builder().uri("/ok").body(Body::empty()).unwrap();
    let (status, id) = response_request_id(req).await;

    assert_eq!(status, StatusCode::OK);
    assert!(id.starts_with("req_"), "generated id, got: {id}");
}

#[tokio::test]
async fn valid_client_id_is_echoed_and_invalid_is_replaced() {
    let req = Request::builder()
        .uri("/ok")
        .header(REQUEST_ID_HEADER, "client.req-001")
        .body(Body::empty())
        .unwrap();
    let (_, id) = response_request_id(req).await;
    assert_eq!(id, "client.req-001");

    let req = Request::builder()
        .uri("/ok")
        .header(REQUEST_ID_HEADER, "bad id with spaces")
        .body(Body::empty())
        .unwrap();
    let (_, id) = response_request_id(req).await;
    assert_ne!(id, "bad id with spaces");
    assert!(id.starts_with("req_"), "replaced by generated id, got: {id}");
}

#[tokio::test]
async fn problem_body_carries_the_request_id() {
    let resp = build_app()
        .oneshot(
            Request::builder()
                .uri("/fail")
                .header(REQUEST_ID_HEADER, "err.req-001")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request /fail");

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json: serde_json::Value = serde_json::from_slice(&body).expect("parse json");
    assert_eq!(json["requestId"].as_str(), Some("err.req-001"));
    assert_eq!(json["code"].as_str(), Some("VALIDATION_FAILED"));
}
