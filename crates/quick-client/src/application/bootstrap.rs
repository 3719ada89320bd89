//! Session bootstrap: exchanges an asset identity for an ephemeral session.
//!
//! One request per session start.  The [`SessionApi`] trait is the seam
//! between this use case and the HTTP client in
//! `infrastructure::http_api`, so the decision logic can be tested without a
//! server.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use quick_core::{SessionDescriptor, SessionEnvelope, SessionMode};

use crate::application::error::ClientError;

/// Backend endpoint that mints sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Performs `POST /quick?assetId=<asset_id>&mode=<mode>` and returns the
    /// parsed envelope.
    async fn create_session(
        &self,
        asset_id: &str,
        mode: SessionMode,
    ) -> Result<SessionEnvelope, ClientError>;
}

/// Why no session was established.
///
/// The `Display` text is what follows "Failed to create session, ".
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The backend answered with a non-success code.
    #[error("{}", rejection(.code, .message))]
    Rejected { code: i64, message: Option<String> },
    /// The backend answered with success but without a usable session id.
    #[error("empty session")]
    NotEstablished,
    /// The request itself failed.
    #[error(transparent)]
    Transport(#[from] ClientError),
}

fn rejection(code: &i64, message: &Option<String>) -> String {
    match message {
        Some(m) => m.clone(),
        None => format!("code {code}"),
    }
}

impl BootstrapError {
    /// Text shown to the user after "Failed to create session, ".
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// The bootstrap use case.
pub struct SessionBootstrap<A: SessionApi> {
    api: A,
}

impl<A: SessionApi> SessionBootstrap<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Requests a session and explains any failure.
    pub async fn try_create(
        &self,
        asset_id: &str,
        mode: SessionMode,
    ) -> Result<SessionDescriptor, BootstrapError> {
        let envelope = self
            .api
            .create_session(asset_id, mode)
            .await
            .map_err(BootstrapError::Transport)?;

        let code = envelope.code;
        let message = envelope.message.clone();
        match envelope.into_session() {
            Some(session) => {
                info!(asset = %asset_id, mode = mode.as_str(), "session established");
                Ok(session)
            }
            None if code != quick_core::session::SUCCESS_CODE => {
                Err(BootstrapError::Rejected { code, message })
            }
            None => Err(BootstrapError::NotEstablished),
        }
    }

    /// Requests a session.  Every failure is logged and yields `None`.
    pub async fn create(&self, asset_id: &str, mode: SessionMode) -> Option<SessionDescriptor> {
        match self.try_create(asset_id, mode).await {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(asset = %asset_id, "session not created: {e}");
                None
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
