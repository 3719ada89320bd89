//! Launch parameters.
//!
//! A session is started from an access link such as
//!
//! ```text
//! https://gw.example.com/#/term?payload=eyJob3N0IjoiMTAuMC4wLjUiLCJwb3J0IjoyMn0=
//! https://gw.example.com/access?payload=...&width=1280&height=720
//! ```
//!
//! or from the same values given as individual flags.  The route (`access`
//! for the graphical tunnel, `term` for the terminal) may sit in the path or
//! in a hash-route fragment.  Query parameters inside the fragment take
//! precedence over those of the outer URL.

use thiserror::Error;
use url::Url;

use quick_core::{ConnectionDescriptor, SessionMode};

/// Which adapter hosts the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Graphical session through the display tunnel (`/access`).
    Access,
    /// Terminal session through the text message protocol (`/term`).
    Term,
}

impl Route {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "access" => Some(Route::Access),
            "term" => Some(Route::Term),
            _ => None,
        }
    }

    /// Route used when the link does not name one: `ssh` targets open a
    /// terminal, every other protocol opens the graphical tunnel.
    pub fn default_for(descriptor: &ConnectionDescriptor) -> Self {
        if descriptor.protocol == "ssh" {
            Route::Term
        } else {
            Route::Access
        }
    }

    /// Session mode requested from the backend for this route.
    pub fn session_mode(self) -> SessionMode {
        match self {
            Route::Access => SessionMode::Guacd,
            Route::Term => SessionMode::Native,
        }
    }
}

/// Errors produced while reading an access link.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LaunchError {
    #[error("invalid access URL: {0}")]
    InvalidUrl(String),

    #[error("unknown route '{0}'")]
    UnknownRoute(String),
}

/// Raw launch parameters, exactly as found in the link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchParams {
    pub route: Option<Route>,
    pub payload: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
}

impl LaunchParams {
    /// Reads the route and parameters from an access link.
    ///
    /// # Errors
    ///
    /// [`LaunchError::InvalidUrl`] if `raw` is not an absolute URL, and
    /// [`LaunchError::UnknownRoute`] if the path names anything other than
    /// `access` or `term`.
    pub fn from_access_url(raw: &str) -> Result<Self, LaunchError> {
        let url = Url::parse(raw.trim()).map_err(|e| LaunchError::InvalidUrl(e.to_string()))?;

        let mut params = Self::default();
        if let Some(query) = url.query() {
            params.merge_query(query);
        }
        params.route = route_from_path(url.path())?;

        // Hash routes: `#/term?payload=...`
        if let Some(fragment) = url.fragment().filter(|f| f.starts_with('/')) {
            let (path, query) = fragment.split_once('?').unwrap_or((fragment, ""));
            if let Some(route) = route_from_path(path)? {
                params.route = Some(route);
            }
            params.merge_query(query);
        }
        Ok(params)
    }

    /// Parameters from a bare `key=value&...` query string.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        params.merge_query(query.trim_start_matches('?'));
        params
    }

    fn merge_query(&mut self, query: &str) {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "payload" => self.payload = Some(value.into_owned()),
                "width" => self.width = Some(value.into_owned()),
                "height" => self.height = Some(value.into_owned()),
                _ => {}
            }
        }
    }

    /// Explicit route, or the protocol-based default.
    pub fn resolve_route(&self, descriptor: &ConnectionDescriptor) -> Route {
        self.route.unwrap_or_else(|| Route::default_for(descriptor))
    }
}

fn route_from_path(path: &str) -> Result<Option<Route>, LaunchError> {
    match path.trim_matches('/').rsplit('/').next() {
        None | Some("") => Ok(None),
        Some(segment) => Route::from_segment(segment)
            .map(Some)
            .ok_or_else(|| LaunchError::UnknownRoute(segment.to_string())),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
