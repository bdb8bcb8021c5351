mod auth;
mod donations;
mod partners;
mod webhook;

use actix_web::{HttpResponse, Responder, Scope, error::InternalError, get, http::StatusCode, web};
use common::ServiceError;
use serde::Serialize;

pub use auth::*;
pub use donations::*;
pub use partners::*;
pub use webhook::*;

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: String,
    code: &'a str,
}

#[derive(Serialize)]
struct Created<T: Serialize> {
    message: &'static str,
    data: T,
}

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().body("Welcome to the Pix Donations service!")
}

/// Registers the routes open to anyone together with the JSON extractor settings.
///
/// Must be registered before [`protected_routes`], whose scope matches every path.
pub fn configure_public(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(index)
        .service(login)
        .service(create_donation)
        .service(webhook_check)
        .service(pix_webhook);
}

/// Routes that expose donor or partner data. Mounted behind the operator session check.
pub fn protected_routes() -> Scope {
    web::scope("")
        .service(get_donation_by_id)
        .service(get_donation_by_tx_id)
        .service(get_donations_by_donor)
        .service(get_donations_by_cpf)
        .service(create_partner)
        .service(search_partners)
        .service(get_partner_by_id)
}

/// Malformed JSON bodies are answered like any other validation failure.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let body = ErrorBody {
            message: format!("Invalid request body: {err}"),
            code: "ValidationError",
        };
        InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    })
}

/// Turns a service failure into a `{message, code}` response and logs it.
pub(crate) fn service_error(context: &str, error: ServiceError) -> actix_web::Error {
    let status = match &error {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ServiceError::External(_) => StatusCode::BAD_GATEWAY,
    };

    let message = match &error {
        ServiceError::Database(_) => {
            log::error!("{}: {}", context, error);
            format!("{context}. Please try again later.")
        }
        ServiceError::External(_) => {
            log::error!("{}: {}", context, error);
            error.to_string()
        }
        ServiceError::Validation(_) | ServiceError::NotFound(_) => {
            log::warn!("{}: {}", context, error);
            error.to_string()
        }
    };

    let body = ErrorBody {
        message,
        code: error.code(),
    };
    InternalError::from_response(error, HttpResponse::build(status).json(body)).into()
}
