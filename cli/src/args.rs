use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Pix Donations - donation server and operator commands"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register the webhook URL for the configured Pix key with the gateway
    ///
    /// Falls back to GN_WEBHOOK_URL when no URL is given.
    RegisterWebhook(RegisterWebhookArgs),

    /// Reconcile one transaction against the gateway
    ///
    /// Recovers a notification that failed while the webhook batch was processed.
    Reconcile(ReconcileArgs),

    /// Create an operator account for the protected API routes
    CreateOperator(CreateOperatorArgs),
}

#[derive(ClapArgs, Debug)]
pub struct RegisterWebhookArgs {
    #[arg(short, long, help = "Public URL the gateway should notify")]
    pub url: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct ReconcileArgs {
    #[arg(short, long, help = "Gateway transaction id")]
    pub txid: String,
}

#[derive(ClapArgs, Debug)]
pub struct CreateOperatorArgs {
    /// Username for the operator
    #[arg(short, long, help = "Username for the operator")]
    pub username: String,

    /// Password for the operator
    #[arg(short, long, help = "Password for the operator")]
    pub password: String,
}
