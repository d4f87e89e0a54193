//! HTTP backend.
//!
//! JSON requests go through `reqwest`; the realtime stream is read as a
//! `text/event-stream` body and decoded with [`SseDecoder`].

use crate::backend::{Backend, EventStream};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use varsclip_core::{
    AdminOverview, Credentials, FileUpload, ItemId, SessionInfo, SessionItem, SessionStats,
};
use varsclip_protocol::routes::{self, session_path};
use varsclip_protocol::{
    CleanupSessionRequest, CleanupSessionResponse, ClearTextResponse, ErrorBody,
    ExtendSessionRequest, ExtendSessionResponse, GrantAccessRequest, HasAccessResponse,
    ItemsResponse, RealtimeMessage, SseDecoder, SuccessResponse, TrackAnalyticsRequest,
    UpdateSettingsRequest, UpdateSettingsResponse, UploadFileRequest, UpsertTextRequest,
    VerifySessionRequest, VerifySessionResponse, ADMIN_SECRET_HEADER, PASSWORD_HEADER,
};

/// Talks to a varsclip server over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: ClientConfig,
}

impl HttpBackend {
    /// Creates a backend for the configured server.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .user_agent(config.client_label.clone())
            .connect_timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Checks that the server is up.
    pub async fn health(&self) -> ClientResult<()> {
        let request = self.client.get(self.config.url(routes::HEALTH));
        self.execute(request).await.map(drop)
    }

    /// Fetches the admin overview. Needs an admin secret in the config.
    pub async fn admin_data(&self) -> ClientResult<AdminOverview> {
        if self.config.admin_secret.is_none() {
            return Err(ClientError::Invalid("admin secret not configured".into()));
        }
        self.send(self.post(routes::GET_ADMIN_DATA)).await
    }

    /// Returns usage figures for a session.
    pub async fn session_stats(&self, code: &str, creds: &Credentials) -> ClientResult<SessionStats> {
        let request = self.get(&session_path(routes::STATS, code));
        self.send(with_credentials(request, creds)).await
    }

    /// Grants an email address access to a session.
    pub async fn grant_access(&self, code: &str, creds: &Credentials, email: &str) -> ClientResult<()> {
        let request = self
            .post(&session_path(routes::ACCESS, code))
            .json(&GrantAccessRequest {
                email: email.to_string(),
            });
        self.send::<SuccessResponse>(with_credentials(request, creds))
            .await
            .map(drop)
    }

    /// Returns true if `email` was granted access.
    pub async fn has_access(&self, code: &str, email: &str) -> ClientResult<bool> {
        let request = self
            .get(&session_path(routes::ACCESS, code))
            .query(&[("email", email)]);
        let response: HasAccessResponse = self.send(request).await?;
        Ok(response.has_access)
    }

    /// Downloads a file from a link returned in an item.
    pub async fn download(&self, url: &str) -> ClientResult<Vec<u8>> {
        let response = self.execute(self.client.get(url)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.with_admin(self.client.get(self.config.url(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.with_admin(self.client.post(self.config.url(path)))
    }

    fn with_admin(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.admin_secret {
            Some(secret) => request.header(ADMIN_SECRET_HEADER, secret),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> ClientResult<Response> {
        let response = request.timeout(self.config.timeout).send().await?;
        check(response).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = self.execute(request).await?;
        Ok(response.json().await?)
    }
}

fn with_credentials(mut request: RequestBuilder, creds: &Credentials) -> RequestBuilder {
    if let Some(token) = &creds.token {
        request = request.bearer_auth(token);
    }
    if let Some(password) = &creds.password {
        request = request.header(PASSWORD_HEADER, password);
    }
    request
}

async fn check(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.json::<ErrorBody>().await.unwrap_or_else(|_| {
        ErrorBody::new(status.canonical_reason().unwrap_or("Request failed"))
    });
    tracing::debug!(status = status.as_u16(), error = %body.error, "request rejected");
    Err(ClientError::api(status.as_u16(), body))
}

#[async_trait]
impl Backend for HttpBackend {
    async fn verify_session(
        &self,
        request: VerifySessionRequest,
    ) -> ClientResult<VerifySessionResponse> {
        self.send(self.post(routes::VERIFY_SESSION_PASSWORD).json(&request))
            .await
    }

    async fn extend_session(
        &self,
        request: ExtendSessionRequest,
    ) -> ClientResult<ExtendSessionResponse> {
        self.send(self.post(routes::EXTEND_SESSION).json(&request))
            .await
    }

    async fn update_settings(
        &self,
        request: UpdateSettingsRequest,
    ) -> ClientResult<UpdateSettingsResponse> {
        self.send(self.post(routes::UPDATE_SESSION_SETTINGS).json(&request))
            .await
    }

    async fn cleanup_session(
        &self,
        request: CleanupSessionRequest,
    ) -> ClientResult<CleanupSessionResponse> {
        self.send(self.post(routes::CLEANUP_EXPIRED_SESSION).json(&request))
            .await
    }

    async fn session_info(&self, code: &str) -> ClientResult<SessionInfo> {
        self.send(self.get(&session_path(routes::SESSION, code)))
            .await
    }

    async fn track(
        &self,
        code: &str,
        action: &str,
        metadata: Option<serde_json::Value>,
    ) -> ClientResult<()> {
        let request = TrackAnalyticsRequest {
            session_code: code.to_string(),
            action: action.to_string(),
            metadata,
        };
        self.send::<SuccessResponse>(self.post(routes::TRACK_ANALYTICS).json(&request))
            .await
            .map(drop)
    }

    async fn list_items(&self, code: &str, creds: &Credentials) -> ClientResult<Vec<SessionItem>> {
        let request = self.get(&session_path(routes::ITEMS, code));
        let response: ItemsResponse = self.send(with_credentials(request, creds)).await?;
        Ok(response.items)
    }

    async fn upsert_text(
        &self,
        code: &str,
        creds: &Credentials,
        content: &str,
    ) -> ClientResult<SessionItem> {
        let request = self
            .with_admin(self.client.put(self.config.url(&session_path(routes::TEXT, code))))
            .json(&UpsertTextRequest {
                content: content.to_string(),
            });
        self.send(with_credentials(request, creds)).await
    }

    async fn add_file(
        &self,
        code: &str,
        creds: &Credentials,
        upload: FileUpload,
    ) -> ClientResult<SessionItem> {
        let request = self
            .post(&session_path(routes::FILES, code))
            .json(&UploadFileRequest::from_upload(&upload));
        self.send(with_credentials(request, creds)).await
    }

    async fn remove_item(
        &self,
        code: &str,
        creds: &Credentials,
        item_id: ItemId,
    ) -> ClientResult<()> {
        let path = session_path(routes::ITEM, code).replace("{id}", &item_id.to_string());
        let request = self.with_admin(self.client.delete(self.config.url(&path)));
        self.send::<SuccessResponse>(with_credentials(request, creds))
            .await
            .map(drop)
    }

    async fn clear_text(&self, code: &str, creds: &Credentials) -> ClientResult<usize> {
        let request = self.with_admin(
            self.client
                .delete(self.config.url(&session_path(routes::TEXT, code))),
        );
        let response: ClearTextResponse = self.send(with_credentials(request, creds)).await?;
        Ok(response.removed)
    }

    async fn subscribe(&self, code: &str, creds: &Credentials) -> ClientResult<EventStream> {
        // No request timeout: the body stays open for the life of the stream.
        let request = self
            .get(&session_path(routes::EVENTS, code))
            .header(reqwest::header::ACCEPT, "text/event-stream");
        let response = check(with_credentials(request, creds).send().await?).await?;
        tracing::debug!(session = code, "event stream connected");

        let body = response.bytes_stream().boxed();
        let events = stream::unfold(
            (body, SseDecoder::new(), VecDeque::new()),
            |(mut body, mut decoder, mut pending)| async move {
                loop {
                    if let Some(frame) = pending.pop_front() {
                        let message = RealtimeMessage::from_frame(&frame).map_err(ClientError::from);
                        return Some((message, (body, decoder, pending)));
                    }
                    match body.next().await? {
                        Ok(chunk) => pending.extend(decoder.push(&chunk)),
                        Err(e) => return Some((Err(e.into()), (body, decoder, pending))),
                    }
                }
            },
        );
        Ok(events.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_data_needs_a_secret() {
        let backend = HttpBackend::new(ClientConfig::new("http://127.0.0.1:9")).unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let err = runtime.block_on(backend.admin_data()).unwrap_err();
        assert!(matches!(err, ClientError::Invalid(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let config = ClientConfig::new("http://127.0.0.1:9")
            .with_timeout(std::time::Duration::from_millis(500));
        let backend = HttpBackend::new(config).unwrap();
        let err = backend.health().await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(err.status(), None);
    }
}
