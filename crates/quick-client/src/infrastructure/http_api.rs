//! HTTP implementation of [`SessionApi`].
//!
//! One `POST /quick?assetId=<id>&mode=<mode>` per session.  The response body
//! is the `{code, message?, data?}` envelope; its interpretation belongs to
//! `application::bootstrap`, this module only moves bytes.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tracing::debug;
use url::Url;

use quick_core::{SessionEnvelope, SessionMode};

use crate::application::bootstrap::SessionApi;
use crate::application::error::ClientError;

/// Upper bound for the whole bootstrap exchange.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `reqwest`-backed session endpoint.
pub struct HttpSessionApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpSessionApi {
    /// # Errors
    ///
    /// Fails only if the HTTP client cannot be constructed (TLS backend
    /// initialisation).
    pub fn new(base: Url) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, base })
    }

    /// The bootstrap URL for one asset.
    pub fn session_url(&self, asset_id: &str, mode: SessionMode) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("quick");
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("assetId", asset_id)
            .append_pair("mode", mode.as_str());
        url
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn create_session(
        &self,
        asset_id: &str,
        mode: SessionMode,
    ) -> Result<SessionEnvelope, ClientError> {
        let url = self.session_url(asset_id, mode);
        debug!(asset = %asset_id, mode = mode.as_str(), "requesting session");

        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        let status = response.status();
        response
            .json::<SessionEnvelope>()
            .await
            .map_err(|e| ClientError::Http(format!("HTTP {status}: {e}")))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
