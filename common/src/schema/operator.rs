use chrono::{DateTime, Utc};
use serde::Serialize;

/// An account allowed to read donor data and manage partners.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Operator {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOperator {
    pub username: String,
    pub password_hash: String,
}
