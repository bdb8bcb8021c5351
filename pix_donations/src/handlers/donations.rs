use actix_web::{Error, HttpResponse, get, post, web};
use common::{DonationRequest, ServiceError};

use super::{Created, service_error};
use crate::state::AppState;

#[post("/donations")]
pub async fn create_donation(
    body: web::Json<DonationRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let descriptor = app_state
        .donations
        .initiate(body.into_inner())
        .await
        .map_err(|e| service_error("Failed to create Pix charge", e))?;

    Ok(HttpResponse::Created().json(Created {
        message: "Pix charge created. Awaiting payment.",
        data: descriptor,
    }))
}

#[get("/donations/id/{id}")]
pub async fn get_donation_by_id(
    path: web::Path<i64>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let id = path.into_inner();
    let donation = app_state
        .donations
        .donation_by_id(id)
        .await
        .map_err(|e| service_error(&format!("Failed to get donation {id}"), e))?;

    Ok(HttpResponse::Ok().json(donation))
}

#[get("/donations/tx/{tx_id}")]
pub async fn get_donation_by_tx_id(
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let tx_id = path.into_inner();
    let donation = app_state
        .donations
        .donation_by_tx_id(&tx_id)
        .await
        .map_err(|e| service_error(&format!("Failed to get donation tx_id={tx_id}"), e))?;

    Ok(HttpResponse::Ok().json(donation))
}

#[get("/donations/donor/{name}")]
pub async fn get_donations_by_donor(
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let name = path.into_inner();
    let donations = app_state
        .donations
        .donations_by_donor_name(&name)
        .await
        .and_then(|found| non_empty(found, "No donations found for this donor"))
        .map_err(|e| service_error("Failed to get donations by donor", e))?;

    Ok(HttpResponse::Ok().json(donations))
}

#[get("/donations/cpf/{cpf}")]
pub async fn get_donations_by_cpf(
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let cpf = path.into_inner();
    let donations = app_state
        .donations
        .donations_by_donor_cpf(&cpf)
        .await
        .and_then(|found| non_empty(found, "No donations found for this CPF"))
        .map_err(|e| service_error("Failed to get donations by CPF", e))?;

    Ok(HttpResponse::Ok().json(donations))
}

fn non_empty<T>(found: Vec<T>, message: &str) -> Result<Vec<T>, ServiceError> {
    if found.is_empty() {
        return Err(ServiceError::not_found(message));
    }
    Ok(found)
}
