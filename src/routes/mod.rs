use actix_web::HttpResponse;
use serde::Serialize;
use serde_json::json;

pub mod admin;
pub mod auth;
pub mod comments;
pub mod public;
pub mod users;

/// `200 { "success": true, "data": ... }`
pub(crate) fn ok_json<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "data": data }))
}

pub(crate) fn created_json<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Created().json(json!({ "success": true, "data": data }))
}

pub(crate) fn message_json(message: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "message": message }))
}
