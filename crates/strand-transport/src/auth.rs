//! Credential headers and the refresh seam.

use crate::TransportError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};

/// Credentials attached to every request for one server.
#[derive(Debug, Clone, Default)]
pub struct AuthHeaders {
    /// Bearer token, sent as `Authorization: Bearer <token>`.
    pub bearer: Option<String>,
    /// Additional header name/value pairs.
    pub extra: Vec<(String, String)>,
}

impl AuthHeaders {
    /// No credentials.
    pub fn none() -> Self {
        Self::default()
    }

    /// Bearer-token credentials.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
            extra: Vec::new(),
        }
    }

    /// Add an extra header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    /// Render into a reqwest header map.
    pub(crate) fn header_map(&self) -> Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.bearer {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::Config(format!("invalid bearer token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        for (name, value) in &self.extra {
            let name = name
                .parse::<HeaderName>()
                .map_err(|e| TransportError::Config(format!("invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Config(format!("invalid header value: {e}")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

/// Source of fresh credentials, called once per concurrent-401 burst.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Obtain new credentials for the server.
    async fn refresh(&self) -> Result<AuthHeaders, TransportError>;
}

/// Provider that always returns the same credentials.
///
/// Suits servers without credential expiry and tests.
pub struct StaticTokenProvider(pub AuthHeaders);

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn refresh(&self) -> Result<AuthHeaders, TransportError> {
        Ok(self.0.clone())
    }
}
