use actix_jwt_auth_middleware::TokenSigner;
use actix_web::{Error, HttpResponse, error::InternalError, http::StatusCode, post, web};
use jwt_compact::alg::Ed25519;
use serde::Deserialize;

use super::service_error;
use crate::auth::OperatorClaims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub username: String,
    pub password: String,
}

/// Exchanges operator credentials for access and refresh cookies.
#[post("/login")]
pub async fn login(
    login_data: web::Json<LoginData>,
    app_state: web::Data<AppState>,
    cookie_signer: web::Data<TokenSigner<OperatorClaims, Ed25519>>,
) -> Result<HttpResponse, Error> {
    let operator = app_state
        .operators
        .authenticate(&login_data.username, &login_data.password)
        .await
        .map_err(|e| service_error("Failed to log in", e))?
        .ok_or_else(|| {
            InternalError::new("Invalid username or password", StatusCode::UNAUTHORIZED)
        })?;

    let claims = OperatorClaims {
        id: operator.id,
        username: operator.username,
    };
    let access_cookie = cookie_signer.create_access_cookie(&claims).map_err(|err| {
        log::error!("Failed to create access token: {:?}", err);
        InternalError::new("Token error", StatusCode::INTERNAL_SERVER_ERROR)
    })?;
    let refresh_cookie = cookie_signer.create_refresh_cookie(&claims).map_err(|err| {
        log::error!("Failed to create refresh token: {:?}", err);
        InternalError::new("Token error", StatusCode::INTERNAL_SERVER_ERROR)
    })?;

    log::info!("Operator {} logged in", claims.username);
    Ok(HttpResponse::Ok()
        .cookie(access_cookie)
        .cookie(refresh_cookie)
        .body("Login successful."))
}
