use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Amount;

/// Status of a donation. Provider statuses without a counterpart here are
/// mirrored verbatim through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DonationStatus {
    AwaitingPayment,
    Paid,
    Other(String),
}

impl DonationStatus {
    /// Provider status of a charge that has been paid.
    pub const PROVIDER_COMPLETED: &'static str = "CONCLUIDA";
    /// Provider status of a charge still waiting for the payer.
    pub const PROVIDER_ACTIVE: &'static str = "ATIVA";

    /// Maps a raw gateway status onto the donation vocabulary.
    ///
    /// A raw status spelled like one of ours maps to that variant, so the
    /// stored form always reads back as the same status.
    pub fn from_provider(raw: &str) -> Self {
        match raw.trim() {
            Self::PROVIDER_COMPLETED | "PAID" => DonationStatus::Paid,
            Self::PROVIDER_ACTIVE | "AWAITING_PAYMENT" => DonationStatus::AwaitingPayment,
            other => DonationStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DonationStatus::AwaitingPayment => "AWAITING_PAYMENT",
            DonationStatus::Paid => "PAID",
            DonationStatus::Other(raw) => raw,
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, DonationStatus::Paid)
    }
}

impl From<String> for DonationStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "AWAITING_PAYMENT" => DonationStatus::AwaitingPayment,
            "PAID" => DonationStatus::Paid,
            _ => DonationStatus::Other(value),
        }
    }
}

impl From<DonationStatus> for String {
    fn from(status: DonationStatus) -> Self {
        match status {
            DonationStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted donation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: i64,
    #[serde(rename = "donorCPF")]
    pub donor_cpf: String,
    pub donor_name: String,
    pub amount: Amount,
    pub tx_id: String,
    pub location_id: Option<String>,
    pub qr_code: Option<String>,
    pub copy_paste: Option<String>,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A donation about to be inserted; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDonation {
    pub donor_cpf: String,
    pub donor_name: String,
    pub amount: Amount,
    pub tx_id: String,
    pub location_id: Option<String>,
    pub qr_code: Option<String>,
    pub copy_paste: Option<String>,
    pub status: DonationStatus,
}

/// Payment instructions for a pledge that has not been paid yet. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeDescriptor {
    #[serde(rename = "donorCPF")]
    pub donor_cpf: String,
    pub donor_name: String,
    pub amount: Amount,
    pub tx_id: String,
    pub location_id: String,
    pub qr_code: String,
    pub copy_paste: String,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
}

/// Pledge as submitted by a donor. Fields are optional so that missing ones
/// are reported as validation failures rather than parse errors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationRequest {
    #[serde(default, rename = "donorCPF", alias = "donorCpf")]
    pub donor_cpf: Option<String>,
    #[serde(default)]
    pub donor_name: Option<String>,
    #[serde(default)]
    pub amount: Option<Amount>,
}
