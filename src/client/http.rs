//! HTTP client for the automation service
//!
//! Thin async wrapper over the service endpoints. Holds no session state;
//! every call is a plain request/response.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use url::Url;

use crate::client::traits::AutomationApi;
use crate::client::wire::{
    Acknowledgement, AgentStepRequest, AgentStepResponse, AgentTaskRequest, AgentTaskResponse,
    CommandStatusResponse, ExecuteCommandRequest, ExecuteCommandResponse, SessionStatusResponse,
    StartSessionResponse,
};
use crate::core::{Config, Result, SessionOptions, WebpilotError};

/// Automation service API client
#[derive(Clone)]
pub struct HttpAutomationClient {
    client: Client,
    base_url: Url,
}

impl HttpAutomationClient {
    /// Create a client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_base_url(config.server_url(), config.server.timeout_secs)
    }

    /// Create a client with a custom base URL
    pub fn with_base_url(base_url: impl AsRef<str>, timeout_secs: u64) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|e| WebpilotError::config(format!("Invalid server URL: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| WebpilotError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Base URL the client talks to
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| WebpilotError::config(format!("Invalid endpoint path {}: {}", path, e)))
    }

    /// Map a reqwest error into a transport error tagged with the operation
    fn transport_err(operation: &str, base_url: &Url, err: reqwest::Error) -> WebpilotError {
        if err.is_connect() {
            WebpilotError::transport(
                operation,
                format!("Cannot connect to automation service at {}", base_url),
            )
        } else if err.is_timeout() {
            WebpilotError::transport(operation, "request timed out")
        } else {
            WebpilotError::transport(operation, err.to_string())
        }
    }

    /// Check the status code and deserialize the body
    ///
    /// A 404 on a session-scoped call means the server no longer knows the
    /// session; callers treat that as session-lost and tear down local state.
    async fn read_json<T: serde::de::DeserializeOwned>(
        operation: &str,
        session_id: Option<&str>,
        response: Response,
    ) -> Result<T> {
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            if let Some(session_id) = session_id {
                return Err(WebpilotError::session_lost(session_id, operation));
            }
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WebpilotError::transport(
                operation,
                format!("service returned {}: {}", status, body),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| WebpilotError::transport(operation, e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| {
            WebpilotError::transport(operation, format!("failed to parse response: {}", e))
        })
    }
}

#[async_trait]
impl AutomationApi for HttpAutomationClient {
    async fn start_session(&self, options: &SessionOptions) -> Result<StartSessionResponse> {
        const OP: &str = "start session";

        let mut url = self.endpoint("/start_browser")?;
        url.query_pairs_mut()
            .append_pair("browser_type", options.browser_type.as_str())
            .append_pair("headless", if options.headless { "true" } else { "false" })
            .append_pair("timeout", &options.timeout_secs.to_string());

        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| Self::transport_err(OP, &self.base_url, e))?;

        Self::read_json(OP, None, response).await
    }

    async fn stop_session(&self, session_id: &str) -> Result<Acknowledgement> {
        const OP: &str = "stop session";

        let url = self.endpoint(&format!("/stop_browser/{}", session_id))?;
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| Self::transport_err(OP, &self.base_url, e))?;

        Self::read_json(OP, Some(session_id), response).await
    }

    async fn session_status(&self, session_id: &str) -> Result<SessionStatusResponse> {
        const OP: &str = "session status refresh";

        let url = self.endpoint(&format!("/session/{}", session_id))?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::transport_err(OP, &self.base_url, e))?;

        Self::read_json(OP, Some(session_id), response).await
    }

    async fn execute_command(
        &self,
        session_id: &str,
        request: &ExecuteCommandRequest,
    ) -> Result<ExecuteCommandResponse> {
        const OP: &str = "execute command";

        let url = self.endpoint(&format!("/interact/{}", session_id))?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| Self::transport_err(OP, &self.base_url, e))?;

        Self::read_json(OP, Some(session_id), response).await
    }

    async fn command_status(
        &self,
        session_id: &str,
        command_id: &str,
    ) -> Result<CommandStatusResponse> {
        const OP: &str = "command status";

        let url = self.endpoint(&format!("/command_status/{}/{}", session_id, command_id))?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::transport_err(OP, &self.base_url, e))?;

        Self::read_json(OP, Some(session_id), response).await
    }

    async fn resolve_captcha(&self, session_id: &str) -> Result<Acknowledgement> {
        const OP: &str = "resolve captcha";

        let url = self.endpoint(&format!("/resolve_captcha/{}", session_id))?;
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| Self::transport_err(OP, &self.base_url, e))?;

        Self::read_json(OP, Some(session_id), response).await
    }

    async fn execute_task(&self, request: &AgentTaskRequest) -> Result<AgentTaskResponse> {
        const OP: &str = "execute agent task";

        let url = self.endpoint("/browser-agent/execute")?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| Self::transport_err(OP, &self.base_url, e))?;

        Self::read_json(OP, None, response).await
    }

    async fn execute_step(&self, request: &AgentStepRequest) -> Result<AgentStepResponse> {
        const OP: &str = "execute agent step";

        let url = self.endpoint("/browser-agent/step")?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| Self::transport_err(OP, &self.base_url, e))?;

        Self::read_json(OP, Some(&request.session_id), response).await
    }

    async fn cleanup_task(&self, session_id: &str) -> Result<Acknowledgement> {
        const OP: &str = "cleanup agent session";

        let url = self.endpoint(&format!("/browser-agent/session/{}", session_id))?;
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| Self::transport_err(OP, &self.base_url, e))?;

        Self::read_json(OP, Some(session_id), response).await
    }

    async fn fetch_screenshot(&self, filename: &str) -> Result<Vec<u8>> {
        const OP: &str = "fetch screenshot";

        let url = self.endpoint(&format!("/screenshots/{}", filename))?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::transport_err(OP, &self.base_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebpilotError::transport(
                OP,
                format!("service returned {}", status),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| WebpilotError::transport(OP, e.to_string()))?;

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = Config::default();
        let client = HttpAutomationClient::from_config(&config).unwrap();
        assert_eq!(client.base_url.as_str(), "http://localhost:8000/");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(HttpAutomationClient::with_base_url("not a url", 10).is_err());
    }

    #[test]
    fn test_endpoint_join() {
        let client = HttpAutomationClient::with_base_url("http://localhost:8000", 10).unwrap();
        let url = client.endpoint("/command_status/s-1/c-1").unwrap();
        assert_eq!(url.path(), "/command_status/s-1/c-1");
    }
}
