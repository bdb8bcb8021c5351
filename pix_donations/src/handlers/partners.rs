use actix_web::{Error, HttpResponse, get, post, web};
use common::PartnerRequest;

use super::{Created, service_error};
use crate::auth::OperatorClaims;
use crate::state::AppState;

#[post("/partners")]
pub async fn create_partner(
    body: web::Json<PartnerRequest>,
    app_state: web::Data<AppState>,
    operator: OperatorClaims,
) -> Result<HttpResponse, Error> {
    log::info!("Operator {} is registering a partner", operator.username);
    let partner = app_state
        .partners
        .create(body.into_inner())
        .await
        .map_err(|e| service_error("Failed to register partner", e))?;

    Ok(HttpResponse::Created().json(Created {
        message: "Partner registered.",
        data: partner,
    }))
}

#[get("/partners/{id}")]
pub async fn get_partner_by_id(
    path: web::Path<i64>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let id = path.into_inner();
    let partner = app_state
        .partners
        .by_id(id)
        .await
        .map_err(|e| service_error(&format!("Failed to get partner {id}"), e))?;

    Ok(HttpResponse::Ok().json(partner))
}

#[get("/partners/search/{term}")]
pub async fn search_partners(
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let term = path.into_inner();
    let partners = app_state
        .partners
        .search(&term)
        .await
        .map_err(|e| service_error("Failed to search partners", e))?;

    Ok(HttpResponse::Ok().json(partners))
}

#[cfg(test)]
mod tests {
    use actix_jwt_auth_middleware::use_jwt::UseJWTOnApp;
    use actix_web::{App, http::StatusCode, test, web};
    use serde_json::{Value, json};

    use crate::handlers::test_support::{
        login_request, session_cookies, session_get, session_post, state_with_operator,
        test_authority, test_state,
    };
    use crate::handlers::{configure_public, protected_routes};

    fn partner() -> Value {
        json!({
            "cpf": "123.456.789-09",
            "name": "Carla",
            "cim": "CIM-77",
            "degree": "Master",
            "profession": "Engineer"
        })
    }

    #[actix_web::test]
    async fn register_and_find_partner() {
        let state = web::Data::new(state_with_operator(vec![]).await);
        let app = test::init_service(
            App::new()
                .app_data(state)
                .configure(configure_public)
                .use_jwt(test_authority(), protected_routes()),
        )
        .await;
        let resp = test::call_service(&app, login_request().to_request()).await;
        let cookies = session_cookies(&resp);

        let req = session_post("/partners", &cookies).set_json(partner()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        let id = created["data"]["id"].as_i64().unwrap();
        assert_eq!(created["data"]["cpf"], "12345678909");

        let req = session_get(&format!("/partners/{id}"), &cookies).to_request();
        let found: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(found["name"], "Carla");

        let req = session_get("/partners/search/Carla", &cookies).to_request();
        let results: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(results.as_array().map(Vec::len), Some(1));

        let req = session_post("/partners", &cookies).set_json(partner()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn missing_partner_is_not_found() {
        let state = web::Data::new(state_with_operator(vec![]).await);
        let app = test::init_service(
            App::new()
                .app_data(state)
                .configure(configure_public)
                .use_jwt(test_authority(), protected_routes()),
        )
        .await;
        let resp = test::call_service(&app, login_request().to_request()).await;
        let cookies = session_cookies(&resp);

        let req = session_get("/partners/7", &cookies).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "NotFoundError");
    }

    #[actix_web::test]
    async fn partner_registry_requires_a_session() {
        let state = web::Data::new(test_state(vec![], None).await);
        let app = test::init_service(
            App::new()
                .app_data(state)
                .configure(configure_public)
                .use_jwt(test_authority(), protected_routes()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/partners")
            .set_json(partner())
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::UNAUTHORIZED
        );

        for uri in ["/partners/1", "/partners/search/Carla"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }
}
