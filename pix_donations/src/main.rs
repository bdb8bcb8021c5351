mod auth;
mod config;
mod handlers;
mod state;

use actix_jwt_auth_middleware::use_jwt::UseJWTOnApp;
use actix_web::{App, HttpServer, middleware::Logger, web};
use dotenv::dotenv;
use ed25519_compact::KeyPair;
use pretty_env_logger::env_logger::{Builder, Env};

use crate::config::AppConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    if cli::run_cli().await {
        return Ok(());
    }

    let logger_env = Env::default().default_filter_or("info");
    let mut logger_builder = Builder::from_env(logger_env);
    logger_builder.init();

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Application initialization failed: {:#}", e);
        std::io::Error::other(e.to_string())
    })?;

    let state = config.create_app_state().await.map_err(|e| {
        log::error!("Application initialization failed: {:#}", e);
        std::io::Error::other(e.to_string())
    })?;

    log::info!("App state initialized successfully");

    if let Some(webhook_url) = &config.webhook_url {
        match state.donations.register_webhook(webhook_url).await {
            Ok(()) => log::info!("Webhook registered at {}", webhook_url),
            Err(e) => log::warn!("Webhook registration failed, continuing without it: {}", e),
        }
    }

    let data = web::Data::new(state);

    //Authorization
    let keys = KeyPair::generate();
    auth::authority(&keys).map_err(|e| {
        log::error!("Authorization setup failed: {:#}", e);
        std::io::Error::other(e.to_string())
    })?;

    log::info!("Listening on {}:{}", config.bind_address, config.port);
    HttpServer::new(move || {
        let authority = auth::authority(&keys).expect("authority was built once at startup");

        App::new()
            .app_data(data.clone())
            .wrap(Logger::new("%a %t %r %s  %{Referer}i %Dms"))
            .configure(handlers::configure_public)
            .use_jwt(authority, handlers::protected_routes())
    })
    .bind((config.bind_address.as_str(), config.port))?
    .run()
    .await
}
