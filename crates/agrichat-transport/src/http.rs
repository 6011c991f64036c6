//! HTTP+JSON implementation of [`BackendGateway`].

use std::sync::Arc;

use agrichat_core::{
    BackendGateway, ChatError, CredentialProvider, QuickAnswer, SendReceipt, Session,
    SessionHistory, SessionId, SessionUpdate,
};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, header};
use serde::{Serialize, de::DeserializeOwned};
use url::Url;

use crate::{
    config::{ConfigError, GatewayConfig},
    protocol::{
        self, CreateSessionRequest, MessagesResponse, QuickAskRequest, QuickAskResponse,
        SendMessageRequest, SendMessageResponse, SessionListResponse, SessionResponse,
    },
};

/// Raw response: status, content type, body.
struct RawResponse {
    status: u16,
    content_type: Option<String>,
    body: Vec<u8>,
}

/// Bearer-authenticated gateway over `reqwest`.
///
/// The credential is read on every call; a missing token fails locally
/// without a request. Nothing is retried.
pub struct HttpGateway {
    client: reqwest::Client,
    config: GatewayConfig,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpGateway {
    /// Create a gateway.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(
        config: GatewayConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    /// The configured API root.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> Result<Url, ChatError> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| ChatError::unreachable(format!("invalid request path {path}: {e}")))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ChatError> {
        let token = self
            .credentials
            .bearer_token()
            .ok_or_else(ChatError::missing_token)?;
        let url = self.url(path)?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json"))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<RawResponse, ChatError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(transport_error)?.to_vec();

        tracing::debug!(status, bytes = body.len(), "chat backend responded");
        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }

    async fn call<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ChatError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let mut request = self.request(method.clone(), path)?;
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(%method, path, "chat backend request");
        let raw = self.execute(request).await?;
        protocol::decode(raw.status, raw.content_type.as_deref(), &raw.body)
            .inspect_err(|e| log_failure(&method, path, e))
    }
}

fn transport_error(err: reqwest::Error) -> ChatError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "unable to connect to server".to_string()
    } else {
        err.to_string()
    };
    ChatError::Transport {
        status: err.status().map(|s| s.as_u16()),
        message,
    }
}

fn log_failure(method: &Method, path: &str, err: &ChatError) {
    tracing::warn!(%method, path, class = %err.class(), "chat backend call failed: {err}");
}

/// No request body.
const NO_BODY: Option<&()> = None;

#[async_trait]
impl BackendGateway for HttpGateway {
    async fn list_sessions(&self) -> Result<Vec<Session>, ChatError> {
        let resp: SessionListResponse = self.call(Method::GET, "sessions", NO_BODY).await?;
        Ok(resp.sessions)
    }

    async fn create_session(&self, title: &str) -> Result<Session, ChatError> {
        let body = CreateSessionRequest { title };
        let resp: SessionResponse = self.call(Method::POST, "sessions", Some(&body)).await?;
        Ok(resp.session)
    }

    async fn load_messages(&self, id: SessionId) -> Result<SessionHistory, ChatError> {
        let path = format!("sessions/{id}/messages");
        let resp: MessagesResponse = self.call(Method::GET, &path, NO_BODY).await?;
        Ok(resp.into())
    }

    async fn send_message(&self, id: SessionId, text: &str) -> Result<SendReceipt, ChatError> {
        let path = format!("sessions/{id}/messages");
        let body = SendMessageRequest::text(text);
        let resp: SendMessageResponse = self.call(Method::POST, &path, Some(&body)).await?;
        Ok(resp.into())
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), ChatError> {
        let path = format!("sessions/{id}");
        let request = self.request(Method::DELETE, &path)?;
        let raw = self.execute(request).await?;
        protocol::expect_success(raw.status, raw.content_type.as_deref(), &raw.body)
            .inspect_err(|e| log_failure(&Method::DELETE, &path, e))
    }

    async fn update_session(
        &self,
        id: SessionId,
        update: &SessionUpdate,
    ) -> Result<Session, ChatError> {
        let path = format!("sessions/{id}");
        let resp: SessionResponse = self.call(Method::PUT, &path, Some(update)).await?;
        Ok(resp.session)
    }

    async fn quick_ask(&self, text: &str) -> Result<QuickAnswer, ChatError> {
        let body = QuickAskRequest { message: text };
        let resp: QuickAskResponse = self.call(Method::POST, "quick-ask", Some(&body)).await?;
        Ok(resp.into())
    }
}
