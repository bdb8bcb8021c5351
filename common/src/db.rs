use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::errors::{ServiceError, ServiceResult};
use crate::schema::{
    Amount, Donation, DonationStatus, NewDonation, NewOperator, NewPartner, Operator, Partner,
};

/// Result of an insert that must not duplicate a transaction id.
#[derive(Debug, Clone, PartialEq)]
pub enum Insertion {
    /// The row was written by this call.
    Created(Donation),
    /// Another writer got there first; this is its row, left untouched.
    Existing(Donation),
}

impl Insertion {
    pub fn into_inner(self) -> Donation {
        match self {
            Insertion::Created(donation) | Insertion::Existing(donation) => donation,
        }
    }
}

/// Persistence of donation records.
///
/// Both writes are conditional so that concurrent reconcilers cannot create a
/// second row for a transaction id or move a paid donation back.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DonationStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> ServiceResult<Option<Donation>>;

    async fn find_by_tx_id(&self, tx_id: &str) -> ServiceResult<Option<Donation>>;

    async fn find_by_donor_name(&self, donor_name: &str) -> ServiceResult<Vec<Donation>>;

    async fn find_by_donor_cpf(&self, donor_cpf: &str) -> ServiceResult<Vec<Donation>>;

    /// Inserts unless a row with the same transaction id already exists.
    async fn insert_if_absent(&self, donation: &NewDonation) -> ServiceResult<Insertion>;

    /// Sets the status of a row that is not `PAID`. Returns `None` when the
    /// row is missing or already paid.
    async fn update_status(
        &self,
        id: i64,
        status: &DonationStatus,
    ) -> ServiceResult<Option<Donation>>;
}

#[async_trait]
pub trait PartnerStore: Send + Sync {
    /// Inserts a partner; a duplicate CPF is a validation failure.
    async fn insert_partner(&self, partner: &NewPartner) -> ServiceResult<Partner>;

    async fn partner_by_id(&self, id: i64) -> ServiceResult<Option<Partner>>;

    async fn partner_by_cpf(&self, cpf: &str) -> ServiceResult<Option<Partner>>;

    async fn partners_by_name(&self, name: &str) -> ServiceResult<Vec<Partner>>;
}

#[async_trait]
pub trait OperatorStore: Send + Sync {
    /// Inserts an operator; a taken username is a validation failure.
    async fn insert_operator(&self, operator: &NewOperator) -> ServiceResult<Operator>;

    async fn operator_by_username(&self, username: &str) -> ServiceResult<Option<Operator>>;
}

#[derive(sqlx::FromRow)]
struct DonationRow {
    id: i64,
    donor_cpf: String,
    donor_name: String,
    amount_cents: i64,
    tx_id: String,
    location_id: Option<String>,
    qr_code: Option<String>,
    copy_paste: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DonationRow> for Donation {
    fn from(row: DonationRow) -> Self {
        Donation {
            id: row.id,
            donor_cpf: row.donor_cpf,
            donor_name: row.donor_name,
            amount: Amount::from_cents(row.amount_cents),
            tx_id: row.tx_id,
            location_id: row.location_id,
            qr_code: row.qr_code,
            copy_paste: row.copy_paste,
            status: DonationStatus::from(row.status),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connects to the SQLite database at `database_url` and applies pending migrations.
    pub async fn new(database_url: &str) -> ServiceResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        // Every connection to `:memory:` opens its own database, so keep exactly one.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        sqlx::migrate!().run(&pool).await?;
        log::debug!("Database ready at {}", database_url);

        Ok(Self { pool })
    }

    pub async fn in_memory() -> ServiceResult<Self> {
        Self::new("sqlite::memory:").await
    }
}

#[async_trait]
impl DonationStore for Database {
    async fn find_by_id(&self, id: i64) -> ServiceResult<Option<Donation>> {
        let row = sqlx::query_as::<_, DonationRow>("SELECT * FROM donations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Donation::from))
    }

    async fn find_by_tx_id(&self, tx_id: &str) -> ServiceResult<Option<Donation>> {
        let row = sqlx::query_as::<_, DonationRow>("SELECT * FROM donations WHERE tx_id = ?")
            .bind(tx_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Donation::from))
    }

    async fn find_by_donor_name(&self, donor_name: &str) -> ServiceResult<Vec<Donation>> {
        let rows = sqlx::query_as::<_, DonationRow>(
            "SELECT * FROM donations WHERE donor_name = ? ORDER BY created_at",
        )
        .bind(donor_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Donation::from).collect())
    }

    async fn find_by_donor_cpf(&self, donor_cpf: &str) -> ServiceResult<Vec<Donation>> {
        let rows = sqlx::query_as::<_, DonationRow>(
            "SELECT * FROM donations WHERE donor_cpf = ? ORDER BY created_at",
        )
        .bind(donor_cpf)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Donation::from).collect())
    }

    async fn insert_if_absent(&self, donation: &NewDonation) -> ServiceResult<Insertion> {
        let now = Utc::now();
        let inserted = sqlx::query_as::<_, DonationRow>(
            r#"
            INSERT INTO donations (
                donor_cpf, donor_name, amount_cents, tx_id, location_id,
                qr_code, copy_paste, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tx_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&donation.donor_cpf)
        .bind(&donation.donor_name)
        .bind(donation.amount.cents())
        .bind(&donation.tx_id)
        .bind(&donation.location_id)
        .bind(&donation.qr_code)
        .bind(&donation.copy_paste)
        .bind(donation.status.as_str())
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(Insertion::Created(row.into()));
        }

        let existing = self.find_by_tx_id(&donation.tx_id).await?.ok_or_else(|| {
            ServiceError::Database(format!(
                "insert of tx_id={} conflicted but no row was found",
                donation.tx_id
            ))
        })?;
        Ok(Insertion::Existing(existing))
    }

    async fn update_status(
        &self,
        id: i64,
        status: &DonationStatus,
    ) -> ServiceResult<Option<Donation>> {
        let row = sqlx::query_as::<_, DonationRow>(
            r#"
            UPDATE donations
            SET status = ?, updated_at = ?
            WHERE id = ? AND status <> 'PAID'
            RETURNING *
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Donation::from))
    }
}

#[async_trait]
impl PartnerStore for Database {
    async fn insert_partner(&self, partner: &NewPartner) -> ServiceResult<Partner> {
        let inserted = sqlx::query_as::<_, Partner>(
            r#"
            INSERT INTO partners (cpf, name, cim, degree, profession, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(cpf) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&partner.cpf)
        .bind(&partner.name)
        .bind(&partner.cim)
        .bind(&partner.degree)
        .bind(&partner.profession)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        inserted.ok_or_else(|| ServiceError::validation("A partner with this CPF already exists"))
    }

    async fn partner_by_id(&self, id: i64) -> ServiceResult<Option<Partner>> {
        let partner = sqlx::query_as::<_, Partner>("SELECT * FROM partners WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(partner)
    }

    async fn partner_by_cpf(&self, cpf: &str) -> ServiceResult<Option<Partner>> {
        let partner = sqlx::query_as::<_, Partner>("SELECT * FROM partners WHERE cpf = ?")
            .bind(cpf)
            .fetch_optional(&self.pool)
            .await?;
        Ok(partner)
    }

    async fn partners_by_name(&self, name: &str) -> ServiceResult<Vec<Partner>> {
        let partners =
            sqlx::query_as::<_, Partner>("SELECT * FROM partners WHERE name = ? ORDER BY id")
                .bind(name)
                .fetch_all(&self.pool)
                .await?;
        Ok(partners)
    }
}

#[async_trait]
impl OperatorStore for Database {
    async fn insert_operator(&self, operator: &NewOperator) -> ServiceResult<Operator> {
        let inserted = sqlx::query_as::<_, Operator>(
            r#"
            INSERT INTO operators (username, password_hash, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(username) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&operator.username)
        .bind(&operator.password_hash)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        inserted.ok_or_else(|| ServiceError::validation("This username is already taken"))
    }

    async fn operator_by_username(&self, username: &str) -> ServiceResult<Option<Operator>> {
        let operator =
            sqlx::query_as::<_, Operator>("SELECT * FROM operators WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        Ok(operator)
    }
}
