use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: i64,
    pub cpf: String,
    pub name: String,
    pub cim: String,
    pub degree: String,
    pub profession: String,
    pub created_at: DateTime<Utc>,
}

/// Validated partner data ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPartner {
    pub cpf: String,
    pub name: String,
    pub cim: String,
    pub degree: String,
    pub profession: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartnerRequest {
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cim: Option<String>,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub profession: Option<String>,
}
