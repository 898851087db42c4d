// storefront/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::models::DeliveryStatus;
use crate::pipelines::verify_payment;
use crate::services::payment_verifier::GatewayCallback;
use crate::state::AppState;

#[instrument(
  name = "handler::verify_payment",
  skip(app_state, req_payload),
  fields(order_code = %req_payload.order_code)
)]
pub async fn verify_payment_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<GatewayCallback>,
) -> Result<HttpResponse, AppError> {
  let confirmation = verify_payment(app_state.get_ref(), req_payload.into_inner()).await?;
  info!(
    delivery_status = confirmation.delivery_status.as_str(),
    "Payment callback handled."
  );

  let message = match confirmation.delivery_status {
    DeliveryStatus::Delivered => "Payment verified. Your items have been delivered in-game.",
    DeliveryStatus::Pending => "Payment verified. Delivery is pending and will be retried shortly.",
    DeliveryStatus::Failed => "Payment verified, but delivery needs attention. Our team has been notified.",
  };
  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "message": message,
    "orderCode": confirmation.order_code,
    "paymentStatus": confirmation.payment_status,
    "deliveryStatus": confirmation.delivery_status,
  })))
}
