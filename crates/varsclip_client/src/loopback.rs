//! In-process backend.

use crate::backend::{Backend, EventStream};
use crate::error::ClientResult;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use varsclip_core::{
    AccessMode, AccessRequest, ClientInfo, CoreResult, Credentials, FileUpload, ItemId,
    SessionInfo, SessionItem, SessionService, SettingsChange,
};
use varsclip_protocol::{
    CleanupSessionRequest, CleanupSessionResponse, ExtendSessionRequest, ExtendSessionResponse,
    RealtimeMessage, UpdateSettingsRequest, UpdateSettingsResponse, VerifySessionRequest,
    VerifySessionResponse,
};

/// Calls a [`SessionService`] directly, without HTTP.
///
/// Service calls run on the blocking pool, as the server does them.
#[derive(Debug, Clone)]
pub struct LoopbackBackend {
    service: Arc<SessionService>,
    client: ClientInfo,
}

impl LoopbackBackend {
    /// Creates a backend over `service`.
    pub fn new(service: Arc<SessionService>) -> Self {
        Self {
            service,
            client: ClientInfo::new("127.0.0.1", "varsclip-loopback"),
        }
    }

    /// Sets the identity recorded with analytics events.
    #[must_use]
    pub fn with_client_info(mut self, client: ClientInfo) -> Self {
        self.client = client;
        self
    }

    /// Returns the service.
    pub fn service(&self) -> &Arc<SessionService> {
        &self.service
    }

    async fn run<T, F>(&self, f: F) -> ClientResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SessionService) -> CoreResult<T> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        Ok(tokio::task::spawn_blocking(move || f(&service)).await??)
    }
}

fn credentials(token: Option<String>, password: Option<String>) -> Credentials {
    Credentials::none().with_token(token).with_password(password)
}

#[async_trait]
impl Backend for LoopbackBackend {
    async fn verify_session(
        &self,
        request: VerifySessionRequest,
    ) -> ClientResult<VerifySessionResponse> {
        let access = AccessRequest::new(request.session_code)
            .with_password(request.password)
            .with_mode(AccessMode::from_flag(request.is_creating))
            .with_duration_minutes(request.duration_minutes);
        let granted = self.run(move |svc| svc.access(access)).await?;
        Ok(granted.into())
    }

    async fn extend_session(
        &self,
        request: ExtendSessionRequest,
    ) -> ClientResult<ExtendSessionResponse> {
        let creds = credentials(request.token, request.password);
        let info = self
            .run(move |svc| svc.extend(&request.session_code, &creds, request.extend_minutes))
            .await?;
        Ok(ExtendSessionResponse {
            success: true,
            message: "Session extended successfully".into(),
            expires_at: info.expires_at,
        })
    }

    async fn update_settings(
        &self,
        request: UpdateSettingsRequest,
    ) -> ClientResult<UpdateSettingsResponse> {
        let change = SettingsChange::from_request(request.new_password, request.make_public)?;
        let creds = credentials(request.token, None);
        let info = self
            .run(move |svc| svc.update_settings(&request.session_code, &creds, change))
            .await?;
        Ok(UpdateSettingsResponse {
            success: true,
            message: "Session settings updated successfully".into(),
            is_public: info.is_public,
        })
    }

    async fn cleanup_session(
        &self,
        request: CleanupSessionRequest,
    ) -> ClientResult<CleanupSessionResponse> {
        let creds = credentials(request.token, request.password);
        let report = self
            .run(move |svc| svc.delete_session(&request.session_code, &creds, request.force_delete))
            .await?;
        Ok(report.into())
    }

    async fn session_info(&self, code: &str) -> ClientResult<SessionInfo> {
        let code = code.to_string();
        self.run(move |svc| svc.session_info(&code)).await
    }

    async fn track(
        &self,
        code: &str,
        action: &str,
        metadata: Option<serde_json::Value>,
    ) -> ClientResult<()> {
        let (code, action, client) = (code.to_string(), action.to_string(), self.client.clone());
        self.run(move |svc| svc.track(&code, &action, &client, metadata))
            .await
    }

    async fn list_items(&self, code: &str, creds: &Credentials) -> ClientResult<Vec<SessionItem>> {
        let (code, creds) = (code.to_string(), creds.clone());
        self.run(move |svc| svc.list_items(&code, &creds)).await
    }

    async fn upsert_text(
        &self,
        code: &str,
        creds: &Credentials,
        content: &str,
    ) -> ClientResult<SessionItem> {
        let (code, creds, content) = (code.to_string(), creds.clone(), content.to_string());
        self.run(move |svc| svc.upsert_text(&code, &creds, &content))
            .await
    }

    async fn add_file(
        &self,
        code: &str,
        creds: &Credentials,
        upload: FileUpload,
    ) -> ClientResult<SessionItem> {
        let (code, creds) = (code.to_string(), creds.clone());
        self.run(move |svc| svc.add_file(&code, &creds, upload)).await
    }

    async fn remove_item(
        &self,
        code: &str,
        creds: &Credentials,
        item_id: ItemId,
    ) -> ClientResult<()> {
        let (code, creds) = (code.to_string(), creds.clone());
        self.run(move |svc| svc.remove_item(&code, &creds, item_id))
            .await
    }

    async fn clear_text(&self, code: &str, creds: &Credentials) -> ClientResult<usize> {
        let (code, creds) = (code.to_string(), creds.clone());
        self.run(move |svc| svc.clear_text(&code, &creds)).await
    }

    async fn subscribe(&self, code: &str, creds: &Credentials) -> ClientResult<EventStream> {
        let (code, creds) = (code.to_string(), creds.clone());
        let subscription = self.run(move |svc| svc.subscribe(&code, &creds)).await?;
        let events = stream::unfold(subscription, |mut subscription| async move {
            let event = subscription.recv().await?;
            Some((Ok(RealtimeMessage::from(event)), subscription))
        });
        Ok(events.boxed())
    }
}
