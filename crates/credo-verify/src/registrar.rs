//! # HTTP Registrar Client
//!
//! Implements both collaborator traits against a registrar service:
//! DID resolution (`/resolve/{did}`), verified organizational profiles
//! (`/organizations/{did}/verified-profile`) and credential-type metadata
//! (`/credential-types/{type}`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use credo_core::Did;

use crate::resolve::{
    CredentialTypeMetadata, DidDocument, DidResolver, IssuerRegistry, ResolutionError,
    VerifiedProfile,
};

/// Typed client for the registrar collaborator.
#[derive(Debug, Clone)]
pub struct HttpRegistrar {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpRegistrar {
    /// Create a registrar client for the given base URL.
    pub fn new(base_url: Url) -> Result<Self, ResolutionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ResolutionError::Unavailable(e.to_string()))?;
        Ok(Self { base_url, http })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ResolutionError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ResolutionError::Malformed("registrar base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        subject: &str,
    ) -> Result<T, ResolutionError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ResolutionError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ResolutionError::NotFound(subject.to_string())),
            status if !status.is_success() => Err(ResolutionError::Unavailable(format!(
                "registrar answered {status} for {subject}"
            ))),
            _ => response
                .json::<T>()
                .await
                .map_err(|e| ResolutionError::Malformed(e.to_string())),
        }
    }
}

#[async_trait]
impl DidResolver for HttpRegistrar {
    async fn resolve(&self, did: &Did) -> Result<DidDocument, ResolutionError> {
        let url = self.endpoint(&["resolve", did.as_str()])?;
        self.get_json(url, did.as_str()).await
    }
}

#[async_trait]
impl IssuerRegistry for HttpRegistrar {
    async fn organization_verified_profile(
        &self,
        did: &Did,
    ) -> Result<VerifiedProfile, ResolutionError> {
        let url = self.endpoint(&["organizations", did.as_str(), "verified-profile"])?;
        self.get_json(url, did.as_str()).await
    }

    async fn credential_type_metadata(
        &self,
        credential_type: &str,
    ) -> Result<CredentialTypeMetadata, ResolutionError> {
        let url = self.endpoint(&["credential-types", credential_type])?;
        self.get_json(url, credential_type).await
    }
}
