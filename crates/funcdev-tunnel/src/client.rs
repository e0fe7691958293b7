//! Wire protocol for the tunnel control plane.
//!
//! Registration and renewal are the same call: `POST {base}/api/proxy`
//! with the project id and local port, authenticated by an API key.
//! Deregistration is `POST {base}/api/unproxy`. The control plane answers
//! 200 with a JSON body carrying a human-readable `message`; any other
//! status is a rejection.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use funcdev_common::{TunnelConfig, TunnelError};

/// Credentials identifying the project at the control plane.
#[derive(Debug, Clone)]
pub struct TunnelCredentials {
    /// API key, sent as `Authorization: API <key>`.
    pub api_key: String,
    /// Project identifier the tunnel routes to.
    pub project_id: String,
}

/// HTTP client for the tunnel control plane.
#[derive(Debug, Clone)]
pub struct TunnelClient {
    http: reqwest::Client,
    api_base: String,
    credentials: TunnelCredentials,
}

#[derive(Serialize)]
struct ProxyRequest<'a> {
    project_id: &'a str,
    port: u16,
}

#[derive(Serialize)]
struct UnproxyRequest<'a> {
    project_id: &'a str,
}

#[derive(Deserialize, Default)]
struct ControlPlaneResponse {
    #[serde(default)]
    message: String,
}

impl TunnelClient {
    /// Create a client for the configured control plane.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        config: &TunnelConfig,
        credentials: TunnelCredentials,
    ) -> Result<Self, TunnelError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("funcdev/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TunnelError::transport(e.to_string()))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Register or renew the lease mapping the project to `port`.
    ///
    /// The control plane treats registration and renewal identically, so
    /// this call is safe to repeat for as long as the tunnel should stay
    /// open.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::Rejected`] on a non-success status and
    /// [`TunnelError::Transport`] if the control plane is unreachable.
    pub async fn announce(&self, port: u16) -> Result<String, TunnelError> {
        let body = ProxyRequest {
            project_id: &self.credentials.project_id,
            port,
        };

        let message = self.post("/api/proxy", &body).await?;
        debug!(port, %message, "tunnel lease announced");
        Ok(message)
    }

    /// Release the lease.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::Rejected`] on a non-success status and
    /// [`TunnelError::Transport`] if the control plane is unreachable.
    pub async fn deregister(&self) -> Result<(), TunnelError> {
        let body = UnproxyRequest {
            project_id: &self.credentials.project_id,
        };

        self.post("/api/unproxy", &body).await?;
        debug!("tunnel lease released");
        Ok(())
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<String, TunnelError> {
        let url = format!("{}{path}", self.api_base);

        let response = self
            .http
            .post(&url)
            .header(
                "Authorization",
                format!("API {}", self.credentials.api_key),
            )
            .json(body)
            .send()
            .await
            .map_err(|e| TunnelError::transport(e.to_string()))?;

        let status = response.status();
        let parsed: ControlPlaneResponse = response.json().await.unwrap_or_default();

        if status.is_success() {
            Ok(parsed.message)
        } else {
            Err(TunnelError::rejected(status.as_u16(), parsed.message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::tests::{spawn_control_plane, FakeControlPlane};

    fn client_for(base: &str) -> TunnelClient {
        let config = TunnelConfig::default().with_api_base(base);
        TunnelClient::new(
            &config,
            TunnelCredentials {
                api_key: "test-key".to_string(),
                project_id: "proj-123".to_string(),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_announce_sends_credentials_and_port() {
        let plane = FakeControlPlane::default();
        let base = spawn_control_plane(plane.clone()).await;

        let message = client_for(&base).announce(4646).await.unwrap();

        assert_eq!(message, "proxied");
        assert_eq!(plane.proxy_calls(), 1);
        let seen = plane.last_proxy();
        assert_eq!(seen.authorization, "API test-key");
        assert_eq!(seen.project_id, "proj-123");
        assert_eq!(seen.port, 4646);
    }

    #[tokio::test]
    async fn test_rejection_carries_status_and_message() {
        let plane = FakeControlPlane::default();
        plane.reject_with(401, "invalid api key");
        let base = spawn_control_plane(plane).await;

        let err = client_for(&base).announce(4646).await.unwrap_err();
        match err {
            TunnelError::Rejected { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid api key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_control_plane_is_transport_error() {
        // Nothing listens on this port
        let err = client_for("http://127.0.0.1:1")
            .announce(4646)
            .await
            .unwrap_err();
        assert!(matches!(err, TunnelError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_deregister_names_the_project() {
        let plane = FakeControlPlane::default();
        let base = spawn_control_plane(plane.clone()).await;

        client_for(&base).deregister().await.unwrap();

        assert_eq!(plane.unproxy_calls(), 1);
        assert_eq!(plane.last_unproxy_project(), "proj-123");
    }
}
