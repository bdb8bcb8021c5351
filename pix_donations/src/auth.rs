use std::future::{Ready, ready};

use actix_jwt_auth_middleware::{Authority, TokenSigner};
use ed25519_compact::KeyPair;
use jwt_compact::alg::Ed25519;
use serde::{Deserialize, Serialize};

/// Claims carried by the session cookies of a logged in operator.
#[derive(Debug, Clone, Serialize, Deserialize, actix_jwt_auth_middleware::FromRequest)]
pub struct OperatorClaims {
    pub id: i64,
    pub username: String,
}

type RefreshAuthorizer = fn() -> Ready<Result<(), actix_web::Error>>;

pub type OperatorAuthority = Authority<OperatorClaims, Ed25519, RefreshAuthorizer, ()>;

fn allow_refresh() -> Ready<Result<(), actix_web::Error>> {
    ready(Ok(()))
}

/// Builds the authority that signs and verifies operator sessions with `keys`.
pub fn authority(keys: &KeyPair) -> anyhow::Result<OperatorAuthority> {
    let token_signer = TokenSigner::new()
        .signing_key(keys.sk.clone())
        .algorithm(Ed25519)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to generate TokenSigner: {e}"))?;

    Authority::<OperatorClaims, Ed25519, RefreshAuthorizer, ()>::new()
        .refresh_authorizer(allow_refresh as RefreshAuthorizer)
        .token_signer(Some(token_signer))
        .verifying_key(keys.pk)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create Authority: {e}"))
}
