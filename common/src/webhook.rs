use serde::Serialize;

use crate::errors::ServiceError;
use crate::lifecycle::DonationService;
use crate::schema::PixNotification;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedNotification {
    pub txid: String,
    pub code: &'static str,
    pub reason: String,
}

impl FailedNotification {
    /// Only input faults are echoed back. Store and gateway details stay in the logs.
    fn new(txid: &str, error: &ServiceError) -> Self {
        let reason = match error {
            ServiceError::Validation(message) | ServiceError::NotFound(message) => message.clone(),
            ServiceError::Database(_) => "The notification could not be stored".to_string(),
            ServiceError::External(_) => {
                "The charge could not be confirmed with the payment gateway".to_string()
            }
        };
        Self {
            txid: txid.to_string(),
            code: error.code(),
            reason,
        }
    }
}

/// Outcome of one webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub message: String,
    pub processed: usize,
    pub skipped: usize,
    pub failed: Vec<FailedNotification>,
}

impl BatchReport {
    pub fn empty() -> Self {
        Self {
            message: "No notifications to process".to_string(),
            processed: 0,
            skipped: 0,
            failed: Vec::new(),
        }
    }
}

/// Reconciles every entry of a batch. A failing entry is logged and reported,
/// it never stops the remaining entries.
pub async fn process_notifications(
    service: &DonationService,
    entries: &[PixNotification],
) -> BatchReport {
    if entries.is_empty() {
        return BatchReport::empty();
    }

    let mut processed = 0;
    let mut skipped = 0;
    let mut failed = Vec::new();

    for entry in entries {
        let Some(txid) = entry.tx_id() else {
            skipped += 1;
            continue;
        };

        match service.reconcile(entry).await {
            Ok(_) => processed += 1,
            Err(e) => {
                log::error!("Failed to reconcile tx_id={}: {}", txid, e);
                failed.push(FailedNotification::new(txid, &e));
            }
        }
    }

    let message = match (processed, failed.len()) {
        (0, 0) => "No notification carried a transaction id".to_string(),
        (_, 0) => "Pix notifications processed successfully".to_string(),
        (0, _) => "All Pix notifications failed".to_string(),
        (ok, bad) => format!("{ok} notifications processed, {bad} failed"),
    };
    log::info!(
        "Webhook batch: processed={} skipped={} failed={}",
        processed,
        skipped,
        failed.len()
    );

    BatchReport {
        message,
        processed,
        skipped,
        failed,
    }
}
