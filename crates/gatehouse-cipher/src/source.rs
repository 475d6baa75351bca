//! Where public key material comes from.

use std::future::Future;
use std::sync::Arc;

use gatehouse_http::{HttpClient, RequestOptions};
use gatehouse_protocol::PublicKeyMaterial;

use crate::CipherError;

/// Endpoint issuing fresh key material. Called without a bearer token.
pub const PUBLIC_KEY_PATH: &str = "/api/account/getpublickey";

/// Supplies fresh public key material on demand.
///
/// Every call is expected to hit the server: the material carries a
/// timestamp the server validates, so it must not be reused.
pub trait PublicKeySource: Send + Sync + 'static {
    fn fetch_public_key(
        &self,
    ) -> impl Future<Output = Result<PublicKeyMaterial, CipherError>> + Send;
}

impl PublicKeySource for HttpClient {
    async fn fetch_public_key(&self) -> Result<PublicKeyMaterial, CipherError> {
        let material: PublicKeyMaterial = self
            .request_json(PUBLIC_KEY_PATH, RequestOptions::post())
            .await?;
        tracing::debug!(timestamp = material.timestamp, "public key fetched");
        Ok(material)
    }
}

impl<S: PublicKeySource> PublicKeySource for Arc<S> {
    fn fetch_public_key(
        &self,
    ) -> impl Future<Output = Result<PublicKeyMaterial, CipherError>> + Send {
        (**self).fetch_public_key()
    }
}
