use std::sync::Arc;
use std::time::Duration;

use common::{ChargeGateway, Database, DonationService, OperatorService, PartnerService};

pub struct AppState {
    pub donations: DonationService,
    pub partners: PartnerService,
    pub operators: OperatorService,
    /// HMAC key for webhook deliveries; signatures are not checked when unset.
    pub webhook_secret: Option<String>,
}

impl AppState {
    pub fn new(
        db: Arc<Database>,
        gateway: Arc<dyn ChargeGateway>,
        gateway_timeout: Duration,
        webhook_secret: Option<String>,
    ) -> Self {
        AppState {
            donations: DonationService::new(db.clone(), gateway, gateway_timeout),
            partners: PartnerService::new(db.clone()),
            operators: OperatorService::new(db),
            webhook_secret,
        }
    }
}
