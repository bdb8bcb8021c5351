use std::sync::Arc;

use anyhow::Context;
use common::{Database, EfiConfig, EfiPixClient};

use crate::state::AppState;

pub struct AppConfig {
    pub database_url: String,
    pub bind_address: String,
    pub port: u16,
    pub efi: EfiConfig,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = match std::env::var("PORT") {
            Ok(port) => port.parse().context("PORT must be a valid port number")?,
            Err(_) => 8080,
        };

        let efi = EfiConfig::from_env().context("Invalid gateway configuration")?;

        let webhook_url = std::env::var("GN_WEBHOOK_URL").ok();
        let webhook_secret = std::env::var("WEBHOOK_SECRET")
            .ok()
            .filter(|secret| !secret.is_empty());

        Ok(Self {
            database_url,
            bind_address,
            port,
            efi,
            webhook_url,
            webhook_secret,
        })
    }

    pub async fn create_app_state(&self) -> anyhow::Result<AppState> {
        let db = Database::new(&self.database_url)
            .await
            .context("Failed to initialize the database")?;
        log::info!("Database initialized successfully!");

        let gateway =
            EfiPixClient::new(self.efi.clone()).context("Failed to build the gateway client")?;

        Ok(AppState::new(
            Arc::new(db),
            Arc::new(gateway),
            self.efi.timeout,
            self.webhook_secret.clone(),
        ))
    }
}
