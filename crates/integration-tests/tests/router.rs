//! HTTP surface tests driving the full router with fakes.
//!
//! The pool is lazily connected and never used, so only routes that go
//! through the injected collaborators are exercised here.
//!
//! Run with: cargo test -p widget-store-integration-tests --test router

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use widget_store_api::gateway::GatewayError;
use widget_store_api::hub::Hub;
use widget_store_api::routes;
use widget_store_integration_tests::{GatewayCall, StubGateway, TestApp, staff_user};

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> Reply {
    let response = routes::router(app.state.clone())
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    Reply {
        status,
        headers,
        body,
    }
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_json_as(uri: &str, token: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn login(app: &TestApp) -> String {
    let user = staff_user(1, "admin@example.com");
    app.state.tokens().issue(&user).await.unwrap().plain_text
}

fn signup_body() -> Value {
    json!({
        "currency": "cad",
        "amount": "2000",
        "payment_method": "pm_card_visa",
        "email": "jo@example.com",
        "plan": "price_bronze",
        "product_id": "1",
        "first_name": "Jo",
        "last_name": "Buyer",
        "last_four": "4242",
        "card_brand": "visa",
        "exp_month": 12,
        "exp_year": 2030
    })
}

// ============================================================================
// Health and plumbing
// ============================================================================

#[tokio::test]
async fn test_health() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::new(hub);

    let reply = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, b"ok");
}

#[tokio::test]
async fn test_request_id_is_generated_or_echoed() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::new(hub);

    let reply = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    let generated = reply.headers.get("x-request-id").unwrap().to_str().unwrap();
    assert_eq!(generated.len(), 36);

    let request = Request::get("/health")
        .header("x-request-id", "web-abc-123")
        .body(Body::empty())
        .unwrap();
    let reply = send(&app, request).await;
    assert_eq!(reply.headers.get("x-request-id").unwrap(), "web-abc-123");
}

#[tokio::test]
async fn test_cors_preflight_allows_http_origins() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::new(hub);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/payment-intent")
        .header(header::ORIGIN, "http://localhost:4000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let reply = send(&app, request).await;

    assert!(reply.status.is_success());
    assert_eq!(
        reply.headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:4000"
    );
    assert_eq!(
        reply.headers.get(header::ACCESS_CONTROL_MAX_AGE).unwrap(),
        "300"
    );
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::new(hub);

    let padding = "x".repeat(1_048_577);
    let request = Request::post("/api/payment-intent")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(padding))
        .unwrap();
    let reply = send(&app, request).await;

    assert_eq!(reply.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_json_uses_error_envelope() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::new(hub);

    let request = Request::post("/api/payment-intent")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"currency":"cad","amount":"10"} {"again":1}"#))
        .unwrap();
    let reply = send(&app, request).await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["error"], true);
    assert!(app.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_missing_content_type_is_rejected() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::new(hub);

    let request = Request::post("/api/payment-intent")
        .body(Body::from(r#"{"currency":"cad","amount":"10"}"#))
        .unwrap();
    let reply = send(&app, request).await;

    assert_eq!(reply.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

// ============================================================================
// Storefront
// ============================================================================

#[tokio::test]
async fn test_payment_intent_returns_gateway_intent() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::new(hub);

    let reply = send(
        &app,
        post_json("/api/payment-intent", &json!({"currency": "cad", "amount": 2500})),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["id"], "pi_test");
    assert_eq!(body["amount"], 2500);
    assert_eq!(body["client_secret"], "pi_test_secret");
}

#[tokio::test]
async fn test_payment_intent_decline_is_ok_false() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::with_gateway(
        hub,
        StubGateway::new().failing(
            GatewayCall::Charge,
            GatewayError::Declined("Your card was declined.".into()),
        ),
    );

    let reply = send(
        &app,
        post_json("/api/payment-intent", &json!({"currency": "cad", "amount": "2500"})),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.json(),
        json!({"ok": false, "message": "Your card was declined."})
    );
}

#[tokio::test]
async fn test_payment_intent_rejects_bad_amount() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::new(hub);

    let reply = send(
        &app,
        post_json("/api/payment-intent", &json!({"currency": "cad", "amount": "-1"})),
    )
    .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["error"], true);
}

#[tokio::test]
async fn test_subscription_plan_books_order() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::new(hub);

    let reply = send(
        &app,
        post_json("/api/customer-subscription-plan", &signup_body()),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.json(),
        json!({"ok": true, "message": "Transaction successful"})
    );
    assert_eq!(app.store.contents().orders.len(), 1);
    assert_eq!(app.invoices.sent().len(), 1);
}

#[tokio::test]
async fn test_subscription_plan_validation_lists_fields() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::new(hub);
    let mut body = signup_body();
    body["first_name"] = json!("J");

    let reply = send(&app, post_json("/api/customer-subscription-plan", &body)).await;

    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    let json = reply.json();
    assert_eq!(json["message"], "failed validation");
    assert_eq!(json["errors"]["first_name"], "must be at least 2 characters");
    assert!(app.gateway.calls().is_empty());
}

// ============================================================================
// Bearer auth
// ============================================================================

#[tokio::test]
async fn test_is_authenticated_with_valid_token() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::new(hub);
    let token = login(&app).await;

    let reply = send(&app, post_json_as("/api/is-authenticated", &token, &json!({}))).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.json(),
        json!({"error": false, "message": "authenticated user admin@example.com"})
    );
}

#[tokio::test]
async fn test_admin_routes_require_bearer() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::new(hub);

    for uri in [
        "/api/admin/all-users",
        "/api/admin/all-sales",
        "/api/admin/refund",
        "/api/admin/all-users/delete/3",
    ] {
        let reply = send(&app, post_json(uri, &json!({}))).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(
            reply.json(),
            json!({"error": true, "message": "Invalid Auth Credentials"}),
            "{uri}"
        );
    }
}

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::new(hub);

    let reply = send(
        &app,
        post_json_as(
            "/api/is-authenticated",
            "ABCDEFGHIJKLMNOPQRSTUVWXYZ",
            &json!({}),
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Admin
// ============================================================================

#[tokio::test]
async fn test_virtual_terminal_returns_transaction() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::new(hub);
    let token = login(&app).await;

    let reply = send(
        &app,
        post_json_as(
            "/api/admin/virtual-terminal-succeeded",
            &token,
            &json!({
                "amount": 4500,
                "currency": "cad",
                "payment_intent": "pi_terminal",
                "payment_method": "pm_terminal"
            }),
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["amount"], 4500);
    assert_eq!(body["last_four"], "4242");
    assert_eq!(body["bank_return_code"], "ch_test");
    assert_eq!(body["transaction_status_id"], 2);
}

#[tokio::test]
async fn test_refund_of_booked_order() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::new(hub);
    let token = login(&app).await;
    send(
        &app,
        post_json("/api/customer-subscription-plan", &signup_body()),
    )
    .await;
    let order_id = app.store.contents().orders[0].0;

    let reply = send(
        &app,
        post_json_as(
            "/api/admin/refund",
            &token,
            &json!({"id": order_id, "pi": "pi_test", "amount": 2000, "currency": "cad"}),
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.json(),
        json!({"error": false, "message": "Charge refunded"})
    );
}

#[tokio::test]
async fn test_refund_not_recorded_is_reported() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::new(hub);
    let token = login(&app).await;

    let reply = send(
        &app,
        post_json_as(
            "/api/admin/refund",
            &token,
            &json!({"id": 404, "pi": "pi_test", "amount": 2000, "currency": "cad"}),
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        reply.json()["message"],
        "the charge was refunded but the database could not be updated"
    );
}

#[tokio::test]
async fn test_cancel_subscription() {
    let (hub, _task) = Hub::spawn();
    let app = TestApp::new(hub);
    let token = login(&app).await;
    send(
        &app,
        post_json("/api/customer-subscription-plan", &signup_body()),
    )
    .await;
    let order_id = app.store.contents().orders[0].0;

    let reply = send(
        &app,
        post_json_as(
            "/api/admin/cancel-subscription",
            &token,
            &json!({"id": order_id, "pi": "sub_test", "currency": "cad"}),
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["message"], "Subscription cancelled");
    assert!(app.gateway.calls().contains(&GatewayCall::CancelSubscription));
}
