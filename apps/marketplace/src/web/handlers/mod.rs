// apps/marketplace/src/web/handlers/mod.rs

pub mod cart_handlers;
pub mod internal_handlers;
pub mod market_handlers;
pub mod rental_handlers;

use actix_web::HttpResponse;
use serde::Serialize;
use serde_json::json;

/// `200 { "success": true, "data": ... }`
pub(crate) fn ok<T: Serialize>(data: T) -> HttpResponse {
  HttpResponse::Ok().json(json!({ "success": true, "data": data }))
}

/// `201 { "success": true, "data": ... }`
pub(crate) fn created<T: Serialize>(data: T) -> HttpResponse {
  HttpResponse::Created().json(json!({ "success": true, "data": data }))
}
