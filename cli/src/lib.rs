mod args;

use std::sync::Arc;

use anyhow::Context;
pub use args::{Args, Commands, CreateOperatorArgs, ReconcileArgs, RegisterWebhookArgs};
use clap::Parser;
use common::{
    ChargeGateway, Database, Donation, DonationService, EfiConfig, EfiPixClient, OperatorService,
    PixNotification,
};

/// Runs the CLI command parser and executes the selected command.
/// Returns true if a CLI command was handled, false otherwise.
pub async fn run_cli() -> bool {
    let args = Args::parse();
    match &args.command {
        Some(Commands::RegisterWebhook(webhook_args)) => {
            match register_webhook(webhook_args.url.as_deref()).await {
                Ok(url) => println!("Webhook registered: {url}"),
                Err(e) => eprintln!("Failed to register webhook: {e:#}"),
            }
            true
        }
        Some(Commands::Reconcile(reconcile_args)) => {
            match reconcile(&reconcile_args.txid).await {
                Ok(Some(donation)) => println!(
                    "Donation id={} tx_id={} status={} amount={}",
                    donation.id, donation.tx_id, donation.status, donation.amount
                ),
                Ok(None) => println!(
                    "Nothing stored for {}: the gateway has not confirmed payment",
                    reconcile_args.txid
                ),
                Err(e) => eprintln!("Failed to reconcile {}: {e:#}", reconcile_args.txid),
            }
            true
        }
        Some(Commands::CreateOperator(operator_args)) => {
            let CreateOperatorArgs { username, password } = operator_args;
            if let Err(e) = create_operator(username, password).await {
                eprintln!("Failed to create operator: {e:#}");
            }
            true
        }
        None => false,
    }
}

/// Registers `url`, or GN_WEBHOOK_URL when absent. Returns the registered URL.
async fn register_webhook(url: Option<&str>) -> anyhow::Result<String> {
    let url = match url {
        Some(url) => url.to_string(),
        None => std::env::var("GN_WEBHOOK_URL")
            .context("Pass --url or set GN_WEBHOOK_URL")?,
    };
    let config = EfiConfig::from_env()?;
    let gateway = EfiPixClient::new(config)?;

    gateway.register_webhook(&url).await?;
    Ok(url)
}

async fn reconcile(txid: &str) -> anyhow::Result<Option<Donation>> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let config = EfiConfig::from_env()?;
    let timeout = config.timeout;

    let db = Database::new(&database_url)
        .await
        .context("Failed to open the database")?;
    let gateway = EfiPixClient::new(config)?;
    let service = DonationService::new(Arc::new(db), Arc::new(gateway), timeout);

    let donation = service.reconcile(&PixNotification::for_tx(txid)).await?;
    Ok(donation)
}

/// Creates an operator: validates input, hashes the password and saves it to the DB.
async fn create_operator(username: &str, password: &str) -> anyhow::Result<()> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let db = Database::new(&database_url)
        .await
        .context("Failed to open the database")?;

    OperatorService::new(Arc::new(db))
        .create(username, password)
        .await?;
    println!("Operator '{}' created successfully.", username);
    Ok(())
}
