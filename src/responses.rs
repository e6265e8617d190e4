use actix_web::HttpResponse;
use serde::Serialize;

use crate::errors::EconomyError;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error_code: &'a str,
    message: String,
}

pub fn ok_json(data: impl Serialize) -> HttpResponse {
    HttpResponse::Ok().json(data)
}

pub fn bad_parameter_http_response(name: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorBody {
        error_code: "BAD_PARAMETER",
        message: format!("missing or invalid parameter: {name}"),
    })
}

/// Validation kinds become structured 4xx bodies the client can branch on;
/// anything else is a plain 500 with no internals leaked.
pub fn economy_error_http_response(err: &EconomyError) -> HttpResponse {
    let body = ErrorBody {
        error_code: err.error_code(),
        message: err.to_string(),
    };
    match err {
        EconomyError::GiftNotFound | EconomyError::PackageNotFound => HttpResponse::NotFound().json(body),
        EconomyError::Db(_) => HttpResponse::InternalServerError().json(ErrorBody {
            error_code: "INTERNAL",
            message: "internal error".to_string(),
        }),
        _ => HttpResponse::BadRequest().json(body),
    }
}

/// The gateway only ever needs a 2xx; processing problems are logged, never
/// echoed back, so a permanently-unprocessable event cannot retry forever.
pub fn webhook_ack() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "received": true }))
}
