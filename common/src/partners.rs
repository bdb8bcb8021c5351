use std::sync::Arc;

use crate::db::PartnerStore;
use crate::errors::{ServiceError, ServiceResult};
use crate::helpers::{normalize_cpf, require_text};
use crate::schema::{NewPartner, Partner, PartnerRequest};

pub struct PartnerService {
    store: Arc<dyn PartnerStore>,
}

impl PartnerService {
    pub fn new(store: Arc<dyn PartnerStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, request: PartnerRequest) -> ServiceResult<Partner> {
        let cpf = normalize_cpf(require_text(request.cpf.as_deref(), "cpf")?)?;
        let partner = NewPartner {
            cpf,
            name: require_text(request.name.as_deref(), "name")?.to_string(),
            cim: require_text(request.cim.as_deref(), "cim")?.to_string(),
            degree: require_text(request.degree.as_deref(), "degree")?.to_string(),
            profession: require_text(request.profession.as_deref(), "profession")?.to_string(),
        };

        if self.store.partner_by_cpf(&partner.cpf).await?.is_some() {
            return Err(ServiceError::validation(
                "A partner with this CPF already exists",
            ));
        }

        let saved = self.store.insert_partner(&partner).await?;
        log::info!("Registered partner id={} name={}", saved.id, saved.name);
        Ok(saved)
    }

    pub async fn by_id(&self, id: i64) -> ServiceResult<Partner> {
        self.store
            .partner_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Partner {id} not found")))
    }

    pub async fn by_cpf(&self, cpf: &str) -> ServiceResult<Option<Partner>> {
        self.store.partner_by_cpf(&normalize_cpf(cpf)?).await
    }

    pub async fn by_name(&self, name: &str) -> ServiceResult<Vec<Partner>> {
        let name = require_text(Some(name), "name")?;
        self.store.partners_by_name(name).await
    }

    /// Looks a partner up by id, then by CPF, then by exact name.
    pub async fn search(&self, term: &str) -> ServiceResult<Vec<Partner>> {
        let term = require_text(Some(term), "term")?;

        if let Ok(id) = term.parse::<i64>() {
            if let Some(partner) = self.store.partner_by_id(id).await? {
                return Ok(vec![partner]);
            }
        }
        if let Ok(cpf) = normalize_cpf(term) {
            if let Some(partner) = self.store.partner_by_cpf(&cpf).await? {
                return Ok(vec![partner]);
            }
        }
        self.store.partners_by_name(term).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn request(cpf: &str, name: &str) -> PartnerRequest {
        PartnerRequest {
            cpf: Some(cpf.to_string()),
            name: Some(name.to_string()),
            cim: Some("CIM-77".to_string()),
            degree: Some("Master".to_string()),
            profession: Some("Engineer".to_string()),
        }
    }

    async fn service() -> PartnerService {
        PartnerService::new(Arc::new(Database::in_memory().await.unwrap()))
    }

    #[tokio::test]
    async fn creates_partner_with_normalized_cpf() {
        let service = service().await;
        let partner = service
            .create(request("123.456.789-09", "Carla"))
            .await
            .unwrap();

        assert_eq!(partner.cpf, "12345678909");
        assert_eq!(service.by_id(partner.id).await.unwrap(), partner);
        assert_eq!(
            service.by_cpf("123.456.789-09").await.unwrap(),
            Some(partner)
        );
    }

    #[tokio::test]
    async fn rejects_missing_fields_bad_cpf_and_duplicates() {
        let service = service().await;

        let mut missing_cim = request("12345678909", "Carla");
        missing_cim.cim = None;
        assert!(matches!(
            service.create(missing_cim).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.create(request("123", "Carla")).await,
            Err(ServiceError::Validation(_))
        ));

        service.create(request("12345678909", "Carla")).await.unwrap();
        let err = service
            .create(request("123.456.789-09", "Other"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "A partner with this CPF already exists");
    }

    #[tokio::test]
    async fn search_tries_id_cpf_then_name() {
        let service = service().await;
        let carla = service.create(request("12345678909", "Carla")).await.unwrap();
        service.create(request("98765432100", "Davi")).await.unwrap();

        assert_eq!(service.search(&carla.id.to_string()).await.unwrap(), vec![carla.clone()]);
        assert_eq!(service.search("123.456.789-09").await.unwrap(), vec![carla.clone()]);
        assert_eq!(service.search("Carla").await.unwrap(), vec![carla]);
        assert!(service.search("Nobody").await.unwrap().is_empty());
        assert!(matches!(
            service.search(" ").await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(service.by_id(999).await, Err(ServiceError::NotFound(_))));
    }
}
