//! HTTP transport for pushing queued changes to the calai sync server.
//!
//! Each queue item is posted as JSON to `<server>/sync/<type>`, authenticated
//! with the API key as a bearer token.

use async_trait::async_trait;
use calai_core::{SyncItemKind, SyncQueueItem};

use crate::config::SyncConfig;

/// Errors that can occur while sending an item.
#[derive(Debug)]
pub enum TransportError {
    /// Sync is not configured
    NotConfigured,
    /// Failed to reach the server
    ConnectionError(String),
    /// The server answered with a non-success status
    Rejected(u16),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::NotConfigured => write!(
                f,
                "Sync not configured. Add server_url and api_key to config."
            ),
            TransportError::ConnectionError(e) => write!(f, "Connection error: {}", e),
            TransportError::Rejected(status) => write!(f, "Server returned status {}", status),
        }
    }
}

impl std::error::Error for TransportError {}

/// Delivers one queue item to the server.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn send(&self, item: &SyncQueueItem) -> Result<(), TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    server_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(server_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            server_url,
            api_key,
        }
    }

    /// Creates a transport from config, failing if sync is not configured.
    pub fn from_config(config: &SyncConfig) -> Result<Self, TransportError> {
        let server_url = config
            .server_url
            .clone()
            .ok_or(TransportError::NotConfigured)?;
        let api_key = config
            .api_key
            .clone()
            .ok_or(TransportError::NotConfigured)?;
        Ok(Self::new(server_url, api_key))
    }

    /// Builds the endpoint for `kind`, normalizing the server URL to HTTP(S).
    pub fn endpoint(&self, kind: &SyncItemKind) -> String {
        let base = self.server_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("wss://") {
            format!("https://{}", rest)
        } else if let Some(rest) = base.strip_prefix("ws://") {
            format!("http://{}", rest)
        } else if base.starts_with("http://") || base.starts_with("https://") {
            base.to_string()
        } else {
            format!("http://{}", base)
        };
        format!("{}/sync/{}", base, kind)
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn send(&self, item: &SyncQueueItem) -> Result<(), TransportError> {
        let response = self
            .client
            .post(self.endpoint(&item.kind))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(item)
            .send()
            .await
            .map_err(|e| TransportError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(url: &str) -> HttpTransport {
        HttpTransport::new(url.to_string(), "test-key".to_string())
    }

    #[test]
    fn test_endpoint_with_https() {
        let url = transport("https://sync.example.com").endpoint(&SyncItemKind::Meal);
        assert_eq!(url, "https://sync.example.com/sync/meal");
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let url = transport("http://localhost:8080/").endpoint(&SyncItemKind::MealUpdate);
        assert_eq!(url, "http://localhost:8080/sync/meal_update");
    }

    #[test]
    fn test_endpoint_with_ws() {
        let url = transport("wss://sync.example.com").endpoint(&SyncItemKind::Profile);
        assert_eq!(url, "https://sync.example.com/sync/profile");
    }

    #[test]
    fn test_endpoint_bare_host() {
        let url = transport("localhost:8080")
            .endpoint(&SyncItemKind::Other("water_log".to_string()));
        assert_eq!(url, "http://localhost:8080/sync/water_log");
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = SyncConfig {
            server_url: Some("https://sync.example.com".to_string()),
            ..SyncConfig::default()
        };
        assert!(matches!(
            HttpTransport::from_config(&config),
            Err(TransportError::NotConfigured)
        ));
    }
}
