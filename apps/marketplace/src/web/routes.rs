// apps/marketplace/src/web/routes.rs

use actix_web::{error::InternalError, web, HttpRequest, HttpResponse};

use crate::errors::AppError;
use crate::web::handlers::{cart_handlers, internal_handlers, market_handlers, rental_handlers};

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Malformed bodies and path ids get the same JSON error shape as
/// everything else.
fn json_error_handler(err: actix_web::error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
  let app_err = AppError::Validation(err.to_string());
  InternalError::from_response(err, actix_web::ResponseError::error_response(&app_err)).into()
}

fn path_error_handler(err: actix_web::error::PathError, _req: &HttpRequest) -> actix_web::Error {
  let app_err = AppError::Validation(err.to_string());
  InternalError::from_response(err, actix_web::ResponseError::error_response(&app_err)).into()
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .app_data(web::JsonConfig::default().error_handler(json_error_handler))
    .app_data(web::PathConfig::default().error_handler(path_error_handler))
    .service(
      web::scope("/api/v1")
        .route("/health", web::get().to(health_check_handler))
        .service(
          web::scope("/cart")
            .route("", web::get().to(cart_handlers::view_cart_handler))
            .route("/items", web::post().to(cart_handlers::add_to_cart_handler))
            .route(
              "/reservations/{reservation_id}/extend",
              web::post().to(cart_handlers::extend_reservation_handler),
            )
            .route(
              "/reservations/{reservation_id}",
              web::delete().to(cart_handlers::remove_from_cart_handler),
            ),
        )
        .service(
          web::scope("/markets/{market_id}")
            .route("/availability", web::get().to(market_handlers::market_availability_handler))
            .route("/registrations", web::post().to(market_handlers::register_for_market_handler))
            .route("/hanger-rentals", web::post().to(rental_handlers::create_hanger_rental_handler)),
        )
        .service(
          web::scope("/hanger-rentals")
            .route("/{rental_id}", web::patch().to(rental_handlers::resize_hanger_rental_handler))
            .route("/{rental_id}", web::delete().to(rental_handlers::cancel_hanger_rental_handler)),
        )
        .service(
          web::scope("/internal")
            .route(
              "/sweeps/expired-reservations",
              web::post().to(internal_handlers::sweep_expired_reservations_handler),
            )
            .route(
              "/sweeps/overdue-rentals",
              web::post().to(internal_handlers::sweep_overdue_rentals_handler),
            )
            .route(
              "/hanger-rentals/{rental_id}/confirm",
              web::post().to(internal_handlers::confirm_hanger_rental_handler),
            ),
        ),
    );
}
