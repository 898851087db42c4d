// storefront/tests/http_handler_tests.rs

mod common;
use common::*;

use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use axis_store::errors::PAYMENT_VERIFICATION_FAILED;
use axis_store::models::DeliveryStatus;
use axis_store::services::credentials::hash_password;
use axis_store::services::notifier::MessageKind;
use axis_store::store::Store;
use axis_store::web::configure_app_routes;

const ADMIN_EMAIL: &str = "admin@axissmp.in";
const ADMIN_PASSWORD: &str = "s3cret-pass";

macro_rules! init_app {
  ($h:expr) => {
    test::init_service(
      App::new()
        .app_data(web::Data::new($h.state.clone()))
        .configure(configure_app_routes),
    )
    .await
  };
}

/// Signs in through the HTTP route and yields the bearer token.
macro_rules! sign_in {
  ($app:expr) => {{
    let resp = test::call_service(
      &$app,
      test::TestRequest::post()
        .uri("/api/v1/admin/signin")
        .set_json(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    body["token"].as_str().unwrap().to_string()
  }};
}

async fn body_json(resp: ServiceResponse) -> Value {
  test::read_body_json(resp).await
}

fn callback_json(callback: &axis_store::services::payment_verifier::GatewayCallback) -> Value {
  json!({
    "order_code": callback.order_code,
    "gateway_order_id": callback.gateway_order_id,
    "gateway_payment_id": callback.gateway_payment_id,
    "signature": callback.signature,
  })
}

#[actix_rt::test]
async fn test_health() {
  setup_tracing();
  let h = harness();
  let app = init_app!(h);
  let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/health").to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(body_json(resp).await["status"], "ok");
}

#[actix_rt::test]
async fn test_verified_payment_reports_delivery() {
  setup_tracing();
  let h = harness();
  let order = insert_order(&h, new_order("rank", "Mythic Rank", "Steve123")).await;
  let app = init_app!(h);

  let req = test::TestRequest::post()
    .uri("/api/v1/payments/verify")
    .set_json(callback_json(&signed_callback(&order, "pay_http_1")))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  assert_eq!(body["success"], true);
  assert_eq!(body["orderCode"], order.order_code.as_str());
  assert_eq!(body["paymentStatus"], "delivered");
  assert_eq!(body["deliveryStatus"], "delivered");
}

#[actix_rt::test]
async fn test_pending_delivery_is_still_a_successful_callback() {
  setup_tracing();
  let h = harness_with(test_config(), ScriptedExecutor::failing("connection refused"));
  let order = insert_order(&h, new_order("rank", "Mythic Rank", "Steve123")).await;
  let app = init_app!(h);

  let req = test::TestRequest::post()
    .uri("/api/v1/payments/verify")
    .set_json(callback_json(&signed_callback(&order, "pay_http_2")))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  assert_eq!(body["paymentStatus"], "paid");
  assert_eq!(body["deliveryStatus"], "pending");
}

#[actix_rt::test]
async fn test_forged_and_unknown_callbacks_share_one_response() {
  setup_tracing();
  let h = harness();
  let order = insert_order(&h, new_order("rank", "Mythic Rank", "Steve123")).await;
  let app = init_app!(h);

  let mut forged = signed_callback(&order, "pay_http_3");
  forged.signature = "0".repeat(64);
  let resp = test::call_service(
    &app,
    test::TestRequest::post()
      .uri("/api/v1/payments/verify")
      .set_json(callback_json(&forged))
      .to_request(),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let forged_body = body_json(resp).await;

  let mut unknown = signed_callback(&order, "pay_http_3");
  unknown.order_code = "AXS-000000000000".to_string();
  let resp = test::call_service(
    &app,
    test::TestRequest::post()
      .uri("/api/v1/payments/verify")
      .set_json(callback_json(&unknown))
      .to_request(),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let unknown_body = body_json(resp).await;

  assert_eq!(forged_body, unknown_body);
  assert_eq!(forged_body["error"], PAYMENT_VERIFICATION_FAILED);
  assert!(h.executor.commands().is_empty());
}

#[actix_rt::test]
async fn test_admin_routes_require_a_session() {
  setup_tracing();
  let h = harness();
  let app = init_app!(h);

  let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/admin/logs").to_request()).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

  let resp = test::call_service(
    &app,
    test::TestRequest::post()
      .uri("/api/v1/admin/orders/AXS-000000000000/retry-delivery")
      .insert_header(("Authorization", "Bearer not-a-token"))
      .to_request(),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_admin_can_retry_delivery_and_read_logs() {
  setup_tracing();
  let h = harness_with(test_config(), ScriptedExecutor::failing("connection refused"));
  h.store.seed_admin(ADMIN_EMAIL, Some(&hash_password(ADMIN_PASSWORD).unwrap()));
  let order = insert_order(&h, new_order("rank", "Mythic Rank", "Steve123")).await;
  let app = init_app!(h);

  test::call_service(
    &app,
    test::TestRequest::post()
      .uri("/api/v1/payments/verify")
      .set_json(callback_json(&signed_callback(&order, "pay_http_4")))
      .to_request(),
  )
  .await;

  let token = sign_in!(app);
  let resp = test::call_service(
    &app,
    test::TestRequest::post()
      .uri(&format!("/api/v1/admin/orders/{}/retry-delivery", order.order_code))
      .insert_header(("Authorization", format!("Bearer {}", token)))
      .to_request(),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  assert_eq!(body["delivery"]["status"], "delivered");

  let stored = h.store.find_order_by_code(&order.order_code).await.unwrap().unwrap();
  assert_eq!(stored.delivery_status, DeliveryStatus::Delivered);

  let resp = test::call_service(
    &app,
    test::TestRequest::get()
      .uri("/api/v1/admin/logs?limit=2")
      .insert_header(("Authorization", format!("Bearer {}", token)))
      .to_request(),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  let logs = body["logs"].as_array().unwrap();
  assert_eq!(logs.len(), 2);
  // Newest first.
  assert_eq!(logs[0]["category"], "delivery");
  assert_eq!(logs[1]["category"], "admin");
}

#[actix_rt::test]
async fn test_bulk_email_reaches_every_customer() {
  setup_tracing();
  let h = harness();
  h.store.seed_admin(ADMIN_EMAIL, Some(&hash_password(ADMIN_PASSWORD).unwrap()));
  insert_order(&h, new_order("rank", "Mythic Rank", "Steve123")).await;
  insert_order(&h, new_order("crate", "Vote Crate", "Alex_99")).await;
  insert_order(&h, new_order("crate", "Vote Crate", "Alex_99")).await;
  let app = init_app!(h);
  let token = sign_in!(app);

  let resp = test::call_service(
    &app,
    test::TestRequest::post()
      .uri("/api/v1/admin/emails/bulk")
      .insert_header(("Authorization", format!("Bearer {}", token)))
      .set_json(json!({ "subject": "Season 4 launch", "body": "New map this Friday." }))
      .to_request(),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  assert_eq!(body["report"]["recipients"], 2);
  assert_eq!(body["report"]["sent"], 2);
  assert_eq!(h.notifier.sent_of(MessageKind::Bulk).len(), 2);
  assert!(log_categories(&h.store).contains(&"email".to_string()));
}

#[actix_rt::test]
async fn test_cron_trigger_checks_secret() {
  setup_tracing();
  let h = harness();
  let app = init_app!(h);

  let resp = test::call_service(
    &app,
    test::TestRequest::post().uri("/api/v1/cron/rank-sweep").to_request(),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

  let resp = test::call_service(
    &app,
    test::TestRequest::post()
      .uri("/api/v1/cron/rank-sweep")
      .insert_header(("Authorization", "Bearer wrong-secret"))
      .to_request(),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

  let resp = test::call_service(
    &app,
    test::TestRequest::post()
      .uri("/api/v1/cron/rank-sweep")
      .insert_header(("Authorization", format!("Bearer {}", CRON_SECRET)))
      .to_request(),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  assert_eq!(body["summary"]["processed"], 0);
}

#[actix_rt::test]
async fn test_cron_trigger_is_hidden_without_secret() {
  setup_tracing();
  let mut config = test_config();
  config.cron_secret = None;
  let h = harness_with(config, ScriptedExecutor::new());
  let app = init_app!(h);

  let resp = test::call_service(
    &app,
    test::TestRequest::post()
      .uri("/api/v1/cron/rank-sweep")
      .insert_header(("Authorization", format!("Bearer {}", CRON_SECRET)))
      .to_request(),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
