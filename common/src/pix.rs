use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::errors::{ServiceError, ServiceResult};
use crate::schema::Amount;

const PRODUCTION_URL: &str = "https://pix.api.efipay.com.br";
const SANDBOX_URL: &str = "https://pix-h.api.efipay.com.br";

/// Tokens are renewed this long before the gateway says they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Payer and amount of an immediate charge. The CPF is already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub payer_cpf: String,
    pub payer_name: String,
    pub amount: Amount,
}

/// Charge as returned by the gateway on creation. Every field may be absent;
/// [`ChargeResponse::into_created`] decides whether the reply is usable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChargeResponse {
    pub tx_id: Option<String>,
    pub location_id: Option<String>,
    pub qr_code: Option<String>,
    pub copy_paste: Option<String>,
    pub created_at: Option<String>,
}

/// A charge whose creation reply carried every required field.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedCharge {
    pub tx_id: String,
    pub location_id: String,
    pub qr_code: String,
    pub copy_paste: String,
    pub created_at: DateTime<Utc>,
}

impl ChargeResponse {
    pub fn into_created(self) -> ServiceResult<CreatedCharge> {
        fn required(value: Option<String>, field: &str) -> ServiceResult<String> {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    ServiceError::external(format!(
                        "incomplete charge response from gateway: missing `{field}`"
                    ))
                })
        }

        let tx_id = required(self.tx_id, "txid")?;
        let location_id = required(self.location_id, "loc.id")?;
        let qr_code = required(self.qr_code, "location")?;
        let copy_paste = required(self.copy_paste, "pixCopiaECola")?;
        let created_at = required(self.created_at, "calendario.criacao")?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| {
                ServiceError::external(format!(
                    "gateway returned an invalid creation time `{created_at}`: {e}"
                ))
            })?
            .with_timezone(&Utc);

        Ok(CreatedCharge {
            tx_id,
            location_id,
            qr_code,
            copy_paste,
            created_at,
        })
    }
}

/// Authoritative state of a charge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChargeDetails {
    pub tx_id: String,
    pub status: String,
    pub amount: Option<String>,
    pub payer_cpf: Option<String>,
    pub payer_name: Option<String>,
    pub location_id: Option<String>,
    pub qr_code: Option<String>,
    pub copy_paste: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChargeGateway: Send + Sync {
    async fn create_charge(&self, request: &ChargeRequest) -> ServiceResult<ChargeResponse>;

    async fn charge_details(&self, tx_id: &str) -> ServiceResult<ChargeDetails>;

    /// Points the gateway's notifications for the configured Pix key at `url`.
    async fn register_webhook(&self, url: &str) -> ServiceResult<()>;
}

#[derive(Debug, Clone)]
pub struct EfiConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub pix_key: String,
    pub certificate_path: Option<PathBuf>,
    pub timeout: Duration,
    pub charge_expiration_secs: u64,
}

impl EfiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let sandbox = std::env::var("GN_SANDBOX")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let default_url = if sandbox { SANDBOX_URL } else { PRODUCTION_URL };
        let base_url = std::env::var("GN_BASE_URL").unwrap_or_else(|_| default_url.to_string());

        let timeout = match std::env::var("GATEWAY_TIMEOUT_SECS") {
            Ok(v) => v.parse().context("GATEWAY_TIMEOUT_SECS must be a number")?,
            Err(_) => 10,
        };
        let charge_expiration_secs = match std::env::var("CHARGE_EXPIRATION_SECS") {
            Ok(v) => v.parse().context("CHARGE_EXPIRATION_SECS must be a number")?,
            Err(_) => 3600,
        };

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: std::env::var("GN_CLIENT_ID").context("GN_CLIENT_ID must be set")?,
            client_secret: std::env::var("GN_CLIENT_SECRET")
                .context("GN_CLIENT_SECRET must be set")?,
            pix_key: std::env::var("GN_PIX_KEY").context("GN_PIX_KEY must be set")?,
            certificate_path: std::env::var("GN_CERTIFICATE_PATH").ok().map(PathBuf::from),
            timeout: Duration::from_secs(timeout),
            charge_expiration_secs,
        })
    }
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Client for the Efí Pix API.
pub struct EfiPixClient {
    http: reqwest::Client,
    config: EfiConfig,
    token: Mutex<Option<AccessToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct ApiError {
    nome: Option<String>,
    name: Option<String>,
    mensagem: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Cob {
    txid: Option<String>,
    status: Option<String>,
    loc: Option<CobLocation>,
    location: Option<String>,
    #[serde(rename = "pixCopiaECola")]
    pix_copia_e_cola: Option<String>,
    calendario: Option<CobCalendar>,
    devedor: Option<CobDebtor>,
    valor: Option<CobValue>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CobLocation {
    id: Option<Value>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CobCalendar {
    criacao: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CobDebtor {
    cpf: Option<String>,
    nome: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CobValue {
    original: Option<String>,
}

impl Cob {
    fn location_id(&self) -> Option<String> {
        match self.loc.as_ref()?.id.as_ref()? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

impl EfiPixClient {
    pub fn new(config: EfiConfig) -> ServiceResult<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);

        if let Some(path) = &config.certificate_path {
            let pem = std::fs::read(path).map_err(|e| {
                ServiceError::external(format!(
                    "failed to read gateway certificate {}: {e}",
                    path.display()
                ))
            })?;
            builder = builder.identity(reqwest::Identity::from_pem(&pem)?);
        }

        Ok(Self {
            http: builder.build()?,
            config,
            token: Mutex::new(None),
        })
    }

    pub fn pix_key(&self) -> &str {
        &self.config.pix_key
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Appends each segment to the base URL, percent-encoding it as a single path segment.
    fn resource_url(&self, segments: &[&str]) -> ServiceResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.config.base_url)
            .map_err(|e| ServiceError::external(format!("invalid gateway base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::external("gateway base URL cannot take a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn access_token(&self) -> ServiceResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        log::debug!("Requesting a new gateway access token");
        let response = self
            .http
            .post(self.url("/oauth/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .json(&json!({ "grant_type": "client_credentials" }))
            .send()
            .await?;
        let token: TokenResponse = read_json(response).await?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        let value = token.access_token;
        *cached = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(value)
    }
}

#[async_trait]
impl ChargeGateway for EfiPixClient {
    async fn create_charge(&self, request: &ChargeRequest) -> ServiceResult<ChargeResponse> {
        let token = self.access_token().await?;
        let body = json!({
            "calendario": { "expiracao": self.config.charge_expiration_secs },
            "devedor": { "cpf": request.payer_cpf, "nome": request.payer_name },
            "valor": { "original": request.amount.to_string() },
            "chave": self.config.pix_key,
            "solicitacaoPagador": format!("Doação realizada por: {}", request.payer_name),
        });

        let response = self
            .http
            .post(self.url("/v2/cob"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let cob: Cob = read_json(response).await?;
        log::info!(
            "Gateway created charge tx_id={}",
            cob.txid.as_deref().unwrap_or("<missing>")
        );

        Ok(ChargeResponse {
            location_id: cob.location_id(),
            tx_id: cob.txid,
            qr_code: cob.location,
            copy_paste: cob.pix_copia_e_cola,
            created_at: cob.calendario.and_then(|c| c.criacao),
        })
    }

    async fn charge_details(&self, tx_id: &str) -> ServiceResult<ChargeDetails> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(self.resource_url(&["v2", "cob", tx_id])?)
            .bearer_auth(token)
            .send()
            .await?;
        let cob: Cob = read_json(response).await?;

        match cob.txid.as_deref() {
            Some(reported) if reported == tx_id => {}
            reported => {
                return Err(ServiceError::external(format!(
                    "gateway answered for txid {} when asked for {tx_id}",
                    reported.unwrap_or("<missing>")
                )));
            }
        }

        let location_id = cob.location_id();
        let status = cob.status.ok_or_else(|| {
            ServiceError::external(format!("gateway reported no status for tx_id={tx_id}"))
        })?;
        let (payer_cpf, payer_name) = cob
            .devedor
            .map(|d| (d.cpf, d.nome))
            .unwrap_or_default();

        Ok(ChargeDetails {
            tx_id: tx_id.to_string(),
            status,
            amount: cob.valor.and_then(|v| v.original),
            payer_cpf,
            payer_name,
            location_id,
            qr_code: cob.location,
            copy_paste: cob.pix_copia_e_cola,
        })
    }

    async fn register_webhook(&self, url: &str) -> ServiceResult<()> {
        let token = self.access_token().await?;
        let response = self
            .http
            .put(self.resource_url(&["v2", "webhook", self.config.pix_key.as_str()])?)
            .bearer_auth(token)
            .header("x-skip-mtls-checking", "true")
            .json(&json!({ "webhookUrl": url }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }
        log::info!("Registered webhook {} for the configured Pix key", url);
        Ok(())
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> ServiceResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(api_error(status, &body));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| ServiceError::external(format!("unexpected gateway response: {e}")))
}

fn api_error(status: StatusCode, body: &str) -> ServiceError {
    let parsed = serde_json::from_str::<ApiError>(body).ok();
    let (name, detail) = match parsed {
        Some(error) => (error.nome.or(error.name), error.mensagem.or(error.message)),
        None => (None, None),
    };

    ServiceError::external(format!(
        "{} - {} (status {})",
        name.unwrap_or_else(|| "Unknown gateway error".to_string()),
        detail.unwrap_or_else(|| body.to_string()),
        status.as_u16()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_response() -> ChargeResponse {
        ChargeResponse {
            tx_id: Some("abc123".into()),
            location_id: Some("42".into()),
            qr_code: Some("pix.example.com/qr/v2/42".into()),
            copy_paste: Some("00020101021226".into()),
            created_at: Some("2024-05-01T12:00:00.358Z".into()),
        }
    }

    #[test]
    fn complete_response_is_accepted() {
        let created = complete_response().into_created().unwrap();
        assert_eq!(created.tx_id, "abc123");
        assert_eq!(created.created_at.to_rfc3339(), "2024-05-01T12:00:00.358+00:00");
    }

    #[test]
    fn any_missing_field_rejects_the_response() {
        let missing_qr = ChargeResponse {
            qr_code: None,
            ..complete_response()
        };
        let blank_copy_paste = ChargeResponse {
            copy_paste: Some(" ".into()),
            ..complete_response()
        };
        let bad_timestamp = ChargeResponse {
            created_at: Some("yesterday".into()),
            ..complete_response()
        };

        for response in [missing_qr, blank_copy_paste, bad_timestamp] {
            assert!(matches!(
                response.into_created(),
                Err(ServiceError::External(_))
            ));
        }
    }

    #[test]
    fn api_errors_carry_name_detail_and_status() {
        let err = api_error(
            StatusCode::BAD_REQUEST,
            r#"{"nome":"valor_invalido","mensagem":"Valor deve ser positivo"}"#,
        );
        assert_eq!(
            err.to_string(),
            "gateway error: valor_invalido - Valor deve ser positivo (status 400)"
        );

        let err = api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(err.to_string().contains("upstream down (status 502)"));
    }

    #[test]
    fn location_id_accepts_numbers_and_strings() {
        let cob: Cob = serde_json::from_str(r#"{"loc":{"id":7}}"#).unwrap();
        assert_eq!(cob.location_id().as_deref(), Some("7"));
        let cob: Cob = serde_json::from_str(r#"{"loc":{"id":"7"}}"#).unwrap();
        assert_eq!(cob.location_id().as_deref(), Some("7"));
    }
}
