use std::sync::Arc;

use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use fancy_regex::Regex;
use once_cell::sync::Lazy;

use crate::db::OperatorStore;
use crate::errors::{ServiceError, ServiceResult};
use crate::schema::{NewOperator, Operator};

static USERNAME: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]{3,}$").ok());
static PASSWORD: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(?=.*[a-z])(?=.*[A-Z])(?=.*\d).{8,}$").ok());

pub struct OperatorService {
    store: Arc<dyn OperatorStore>,
}

impl OperatorService {
    pub fn new(store: Arc<dyn OperatorStore>) -> Self {
        Self { store }
    }

    /// Validates the credentials, hashes the password and stores the account.
    pub async fn create(&self, username: &str, password: &str) -> ServiceResult<Operator> {
        if !matches_pattern(&USERNAME, username) {
            return Err(ServiceError::validation(
                "Username needs at least 3 characters: letters, digits or underscores",
            ));
        }
        if !matches_pattern(&PASSWORD, password) {
            return Err(ServiceError::validation(
                "Password needs 8+ characters with lower and upper case letters and a digit",
            ));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ServiceError::validation(format!("Failed to hash password: {e}")))?
            .to_string();

        let operator = self
            .store
            .insert_operator(&NewOperator {
                username: username.to_string(),
                password_hash,
            })
            .await?;
        log::info!("Created operator {}", operator.username);
        Ok(operator)
    }

    /// Returns the operator when the password matches, `None` otherwise.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> ServiceResult<Option<Operator>> {
        let Some(operator) = self.store.operator_by_username(username).await? else {
            log::warn!("Login attempt for unknown operator {}", username);
            return Ok(None);
        };

        let verified = PasswordHash::new(&operator.password_hash)
            .and_then(|hash| Argon2::default().verify_password(password.as_bytes(), &hash));
        match verified {
            Ok(()) => Ok(Some(operator)),
            Err(e) => {
                log::warn!("Invalid password for operator {}: {}", username, e);
                Ok(None)
            }
        }
    }
}

fn matches_pattern(pattern: &Lazy<Option<Regex>>, value: &str) -> bool {
    match &**pattern {
        Some(re) => re.is_match(value).unwrap_or(false),
        None => {
            log::error!("Credential regex failed to compile. Rejecting all input.");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn service() -> OperatorService {
        OperatorService::new(Arc::new(Database::in_memory().await.unwrap()))
    }

    #[tokio::test]
    async fn stored_password_is_hashed_and_verifiable() {
        let service = service().await;
        let operator = service.create("treasurer", "Secret123").await.unwrap();

        assert_ne!(operator.password_hash, "Secret123");
        assert!(operator.password_hash.starts_with("$argon2"));
        assert_eq!(
            service.authenticate("treasurer", "Secret123").await.unwrap(),
            Some(operator)
        );
        assert!(service.authenticate("treasurer", "secret123").await.unwrap().is_none());
        assert!(service.authenticate("nobody", "Secret123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn weak_credentials_are_rejected() {
        let service = service().await;

        for (username, password) in [
            ("ab", "Secret123"),
            ("bad name", "Secret123"),
            ("treasurer", "short1A"),
            ("treasurer", "alllowercase1"),
            ("treasurer", "NoDigitsHere"),
        ] {
            assert!(
                matches!(
                    service.create(username, password).await,
                    Err(ServiceError::Validation(_))
                ),
                "{username}/{password}"
            );
        }
    }

    #[tokio::test]
    async fn serialized_operator_omits_password_hash() {
        let service = service().await;
        let operator = service.create("treasurer", "Secret123").await.unwrap();

        let json = serde_json::to_value(&operator).unwrap();
        assert_eq!(json["username"], "treasurer");
        assert!(json.get("passwordHash").is_none());
    }
}
