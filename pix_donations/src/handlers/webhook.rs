use actix_web::{
    Error, HttpRequest, HttpResponse, error::InternalError, http::StatusCode, post, web,
};
use common::{ServiceError, parse_webhook_body, process_notifications, verify_signature};

use super::service_error;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// The gateway calls this when the webhook is registered.
#[post("/webhook")]
pub async fn webhook_check() -> HttpResponse {
    HttpResponse::Ok().body("Webhook configured. Notifications are accepted at /webhook/pix.")
}

#[post("/webhook/pix")]
pub async fn pix_webhook(
    req: HttpRequest,
    body: web::Bytes,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    if let Some(secret) = app_state.webhook_secret.as_deref() {
        let signature = req
            .headers()
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());

        match signature {
            None => {
                log::warn!("Webhook received without {} header", SIGNATURE_HEADER);
                return Err(InternalError::new(
                    "Forbidden: missing signature.",
                    StatusCode::FORBIDDEN,
                )
                .into());
            }
            Some(signature) if !verify_signature(secret.as_bytes(), &body, signature) => {
                log::warn!("Webhook signature did not match the payload");
                return Err(InternalError::new(
                    "Forbidden: invalid signature.",
                    StatusCode::FORBIDDEN,
                )
                .into());
            }
            Some(_) => {}
        }
    }

    let entries = parse_webhook_body(&body).map_err(|e| {
        service_error(
            "Rejected webhook delivery",
            ServiceError::validation(format!("Invalid JSON payload: {e}")),
        )
    })?;

    let report = process_notifications(&app_state.donations, &entries).await;
    Ok(HttpResponse::Ok().json(report))
}

#[cfg(test)]
mod tests {
    use actix_jwt_auth_middleware::use_jwt::UseJWTOnApp;
    use actix_web::{App, http::StatusCode, test, web};
    use common::sign;
    use serde_json::{Value, json};

    use super::SIGNATURE_HEADER;
    use crate::handlers::test_support::{
        PAID_TX, login_request, session_cookies, session_get, state_with_operator, test_authority,
        test_state,
    };
    use crate::handlers::{configure_public, protected_routes};

    const UNKNOWN_TX: &str = "unknown7978c0c97ea847e78e884963";

    #[actix_web::test]
    async fn batch_is_acknowledged_with_per_entry_outcomes() {
        let state = web::Data::new(state_with_operator(vec![PAID_TX]).await);
        let app = test::init_service(
            App::new()
                .app_data(state)
                .configure(configure_public)
                .use_jwt(test_authority(), protected_routes()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/webhook/pix")
            .set_json(json!({"pix": [
                {"txid": PAID_TX, "endToEndId": "E1", "valor": "50.00"},
                {"endToEndId": "E2"},
                {"txid": UNKNOWN_TX},
                {"txid": format!("{PAID_TX}#1")}
            ]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let report: Value = test::read_body_json(resp).await;
        assert_eq!(report["processed"], 1);
        assert_eq!(report["skipped"], 1);
        assert_eq!(report["failed"][0]["txid"], UNKNOWN_TX);
        assert_eq!(report["failed"][0]["code"], "ExternalError");
        assert_eq!(report["failed"][1]["code"], "ValidationError");

        let resp = test::call_service(&app, login_request().to_request()).await;
        let cookies = session_cookies(&resp);
        let req = session_get(&format!("/donations/tx/{PAID_TX}"), &cookies).to_request();
        let donation: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(donation["status"], "PAID");
        assert_eq!(donation["donorName"], "Ana");
        assert_eq!(donation["amount"], 50.0);
    }

    #[actix_web::test]
    async fn empty_and_malformed_deliveries() {
        let state = web::Data::new(test_state(vec![], None).await);
        let app = test::init_service(
            App::new()
                .app_data(state)
                .configure(configure_public)
                .use_jwt(test_authority(), protected_routes()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/webhook/pix")
            .set_json(json!({"evento": "teste_webhook"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri("/webhook/pix")
            .set_payload("not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post().uri("/webhook").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn signed_deliveries_are_verified() {
        let state = web::Data::new(test_state(vec![PAID_TX], Some("s3cret")).await);
        let app = test::init_service(
            App::new()
                .app_data(state)
                .configure(configure_public)
                .use_jwt(test_authority(), protected_routes()),
        )
        .await;
        let payload = r#"{"pix":[{"txid":"7978c0c97ea847e78e8849634473c1f1"}]}"#;

        let req = test::TestRequest::post()
            .uri("/webhook/pix")
            .set_payload(payload)
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::FORBIDDEN
        );

        let req = test::TestRequest::post()
            .uri("/webhook/pix")
            .insert_header((SIGNATURE_HEADER, sign(b"wrong", payload.as_bytes())))
            .set_payload(payload)
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::FORBIDDEN
        );

        let req = test::TestRequest::post()
            .uri("/webhook/pix")
            .insert_header((SIGNATURE_HEADER, sign(b"s3cret", payload.as_bytes())))
            .set_payload(payload)
            .to_request();
        let report: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(report["processed"], 1);
    }
}
