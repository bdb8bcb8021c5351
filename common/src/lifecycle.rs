use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::db::{DonationStore, Insertion};
use crate::errors::{ServiceError, ServiceResult};
use crate::helpers::{normalize_cpf, require_text, validate_tx_id};
use crate::locks::KeyedLocks;
use crate::pix::{ChargeDetails, ChargeGateway, ChargeRequest};
use crate::schema::{
    Amount, ChargeDescriptor, Donation, DonationRequest, DonationStatus, NewDonation,
    PixNotification,
};

/// Creates charges for pledges and reconciles gateway notifications against
/// stored donations.
pub struct DonationService {
    store: Arc<dyn DonationStore>,
    gateway: Arc<dyn ChargeGateway>,
    gateway_timeout: Duration,
    locks: KeyedLocks,
}

impl DonationService {
    pub fn new(
        store: Arc<dyn DonationStore>,
        gateway: Arc<dyn ChargeGateway>,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            gateway_timeout,
            locks: KeyedLocks::new(),
        }
    }

    /// Validates a pledge and asks the gateway for an immediate charge.
    ///
    /// Nothing is stored: the returned descriptor only tells the payer how to pay.
    pub async fn initiate(&self, request: DonationRequest) -> ServiceResult<ChargeDescriptor> {
        let donor_cpf = normalize_cpf(require_text(request.donor_cpf.as_deref(), "donorCPF")?)?;
        let donor_name = require_text(request.donor_name.as_deref(), "donorName")?.to_string();
        let amount = request
            .amount
            .ok_or_else(|| ServiceError::validation("`amount` is required"))?;
        if !amount.is_positive() {
            return Err(ServiceError::validation("`amount` must be greater than zero"));
        }

        let charge_request = ChargeRequest {
            payer_cpf: donor_cpf.clone(),
            payer_name: donor_name.clone(),
            amount,
        };
        let charge = self
            .call_gateway("create charge", self.gateway.create_charge(&charge_request))
            .await?
            .into_created()?;
        log::info!(
            "Charge created tx_id={} amount={} donor={}",
            charge.tx_id,
            amount,
            donor_name
        );

        Ok(ChargeDescriptor {
            donor_cpf,
            donor_name,
            amount,
            tx_id: charge.tx_id,
            location_id: charge.location_id,
            qr_code: charge.qr_code,
            copy_paste: charge.copy_paste,
            status: DonationStatus::AwaitingPayment,
            created_at: charge.created_at,
        })
    }

    /// Brings the stored donation for the notified transaction in line with
    /// the gateway's view of the charge.
    ///
    /// The notification only names the transaction; its own status is never
    /// trusted. A paid donation is never changed, and a record is created only
    /// when the gateway confirms payment. Returns `None` when there is nothing
    /// to store. Malformed txids are rejected before the gateway is asked.
    pub async fn reconcile(
        &self,
        notification: &PixNotification,
    ) -> ServiceResult<Option<Donation>> {
        let tx_id = notification
            .tx_id()
            .ok_or_else(|| ServiceError::validation("`txid` is required"))?;
        let tx_id = validate_tx_id(tx_id)?;
        let _guard = self.locks.lock(tx_id).await;

        let existing = self.store.find_by_tx_id(tx_id).await?;
        let charge = self
            .call_gateway("charge lookup", self.gateway.charge_details(tx_id))
            .await?;
        if charge.tx_id != tx_id {
            log::error!(
                "Gateway answered for tx_id={} when asked for tx_id={}",
                charge.tx_id,
                tx_id
            );
            return Err(ServiceError::external("gateway answered for a different transaction"));
        }
        let official = DonationStatus::from_provider(&charge.status);

        if let Some(hint) = notification.status.as_deref() {
            if hint != charge.status {
                log::debug!(
                    "Notification for tx_id={} claimed status {}, gateway reports {}",
                    tx_id,
                    hint,
                    charge.status
                );
            }
        }

        match existing {
            Some(record) if record.status.is_paid() => {
                log::debug!("Donation tx_id={} already paid, nothing to do", tx_id);
                Ok(Some(record))
            }
            Some(record) if record.status == official => Ok(Some(record)),
            Some(record) => self.move_to(record, official).await.map(Some),
            None if official.is_paid() => self.record_payment(tx_id, charge).await.map(Some),
            None => {
                log::info!(
                    "No donation for tx_id={} and gateway status is {}, skipping",
                    tx_id,
                    charge.status
                );
                Ok(None)
            }
        }
    }

    pub async fn register_webhook(&self, url: &str) -> ServiceResult<()> {
        self.call_gateway("webhook registration", self.gateway.register_webhook(url))
            .await
    }

    pub async fn donation_by_id(&self, id: i64) -> ServiceResult<Donation> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Donation {id} not found")))
    }

    pub async fn donation_by_tx_id(&self, tx_id: &str) -> ServiceResult<Donation> {
        self.store.find_by_tx_id(tx_id).await?.ok_or_else(|| {
            ServiceError::not_found(format!("Donation with txId {tx_id} not found"))
        })
    }

    pub async fn donations_by_donor_name(&self, donor_name: &str) -> ServiceResult<Vec<Donation>> {
        let donor_name = require_text(Some(donor_name), "donorName")?;
        self.store.find_by_donor_name(donor_name).await
    }

    pub async fn donations_by_donor_cpf(&self, donor_cpf: &str) -> ServiceResult<Vec<Donation>> {
        let donor_cpf = normalize_cpf(donor_cpf)?;
        self.store.find_by_donor_cpf(&donor_cpf).await
    }

    async fn move_to(&self, record: Donation, status: DonationStatus) -> ServiceResult<Donation> {
        match self.store.update_status(record.id, &status).await? {
            Some(updated) => {
                log::info!(
                    "Donation tx_id={} moved from {} to {}",
                    updated.tx_id,
                    record.status,
                    updated.status
                );
                Ok(updated)
            }
            // Paid by another writer between our read and the update.
            None => Ok(self.store.find_by_id(record.id).await?.unwrap_or(record)),
        }
    }

    async fn record_payment(&self, tx_id: &str, charge: ChargeDetails) -> ServiceResult<Donation> {
        let incomplete = |e: ServiceError| {
            ServiceError::validation(format!(
                "Confirmed charge tx_id={tx_id} lacks payer data: {e}"
            ))
        };
        let donor_cpf = require_text(charge.payer_cpf.as_deref(), "devedor.cpf")
            .and_then(normalize_cpf)
            .map_err(incomplete)?;
        let donor_name = require_text(charge.payer_name.as_deref(), "devedor.nome")
            .map_err(incomplete)?
            .to_string();
        let amount: Amount = require_text(charge.amount.as_deref(), "valor.original")
            .and_then(|raw| raw.parse::<Amount>())
            .map_err(incomplete)?;
        if !amount.is_positive() {
            return Err(incomplete(ServiceError::validation(format!(
                "amount {amount} is not positive"
            ))));
        }

        let donation = NewDonation {
            donor_cpf,
            donor_name,
            amount,
            tx_id: tx_id.to_string(),
            location_id: charge.location_id,
            qr_code: charge.qr_code,
            copy_paste: charge.copy_paste,
            status: DonationStatus::Paid,
        };

        match self.store.insert_if_absent(&donation).await? {
            Insertion::Created(record) => {
                log::info!(
                    "Recorded paid donation id={} tx_id={} amount={}",
                    record.id,
                    tx_id,
                    record.amount
                );
                Ok(record)
            }
            Insertion::Existing(record) => {
                log::warn!("Donation tx_id={} was recorded by another writer", tx_id);
                Ok(record)
            }
        }
    }

    async fn call_gateway<T>(
        &self,
        operation: &str,
        call: impl Future<Output = ServiceResult<T>>,
    ) -> ServiceResult<T> {
        match tokio::time::timeout(self.gateway_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                log::error!(
                    "Gateway {} timed out after {:?}",
                    operation,
                    self.gateway_timeout
                );
                Err(ServiceError::external(format!(
                    "gateway {operation} timed out after {}s",
                    self.gateway_timeout.as_secs_f64()
                )))
            }
        }
    }
}
