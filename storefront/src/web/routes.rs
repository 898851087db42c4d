// storefront/src/web/routes.rs

use actix_web::web;

use crate::web::handlers::{admin_handlers, cron_handlers, payment_handlers};

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/payments").route("/verify", web::post().to(payment_handlers::verify_payment_handler)),
      )
      .service(
        web::scope("/admin")
          .route("/signin", web::post().to(admin_handlers::admin_signin_handler))
          .route(
            "/orders/{order_code}/retry-delivery",
            web::post().to(admin_handlers::retry_delivery_handler),
          )
          .route("/logs", web::get().to(admin_handlers::recent_logs_handler))
          .route("/emails/bulk", web::post().to(admin_handlers::bulk_email_handler)),
      )
      .service(web::scope("/cron").route("/rank-sweep", web::post().to(cron_handlers::rank_sweep_handler))),
  );
}
