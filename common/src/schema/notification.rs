use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of a provider webhook batch. Only `txid` matters for
/// reconciliation; the rest is kept for logging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PixNotification {
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "endToEndId")]
    pub end_to_end_id: Option<String>,
    #[serde(default)]
    pub valor: Option<String>,
}

impl PixNotification {
    pub fn for_tx(txid: impl Into<String>) -> Self {
        PixNotification {
            txid: Some(txid.into()),
            ..Default::default()
        }
    }

    /// Transaction id, if present and not blank.
    pub fn tx_id(&self) -> Option<&str> {
        self.txid
            .as_deref()
            .map(str::trim)
            .filter(|txid| !txid.is_empty())
    }
}

/// Extracts the notification entries from a raw webhook body.
///
/// A body without a `pix` array yields no entries. Entries that are not
/// well-formed objects become empty notifications, which the ingress skips.
pub fn parse_webhook_body(body: &[u8]) -> Result<Vec<PixNotification>, serde_json::Error> {
    let payload: Value = serde_json::from_slice(body)?;
    let entries = match payload.get("pix") {
        Some(Value::Array(entries)) => entries,
        _ => return Ok(Vec::new()),
    };

    Ok(entries
        .iter()
        .map(|entry| {
            serde_json::from_value(entry.clone()).unwrap_or_else(|e| {
                log::warn!("Malformed webhook entry {}: {}", entry, e);
                PixNotification::default()
            })
        })
        .collect())
}
