//! Request handlers.
//!
//! Handlers translate HTTP into [`SessionService`] calls. Service calls
//! may hash passwords, so they run on the blocking pool.

use crate::auth::{client_info, header_credentials, AdminGate};
use crate::error::{ServerError, ServerResult};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::{self, Stream};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use varsclip_core::{
    AccessMode, AccessRequest, AdminOverview, Credentials, ItemId, SessionInfo, SessionService,
    SessionStats, SettingsChange,
};
use varsclip_protocol::{
    CleanupSessionRequest, CleanupSessionResponse, ClearTextResponse, ExtendSessionRequest,
    ExtendSessionResponse, GrantAccessRequest, HasAccessResponse, ItemsResponse, RealtimeMessage,
    SuccessResponse, TrackAnalyticsRequest, UpdateSettingsRequest, UpdateSettingsResponse,
    UploadFileRequest, UpsertTextRequest, VerifySessionRequest, VerifySessionResponse,
};

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The session service.
    pub service: Arc<SessionService>,
    /// Admin secret check.
    pub admin: AdminGate,
}

impl AppState {
    /// Creates handler state.
    pub fn new(service: Arc<SessionService>, admin: AdminGate) -> Self {
        Self { service, admin }
    }

    /// Runs a service call on the blocking pool.
    pub async fn run<T, F>(&self, f: F) -> ServerResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SessionService) -> varsclip_core::CoreResult<T> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        Ok(tokio::task::spawn_blocking(move || f(&service)).await??)
    }
}

fn body_credentials(token: Option<String>, password: Option<String>) -> Credentials {
    Credentials::none()
        .with_token(token)
        .with_password(password)
}

// ── Lifecycle functions ────────────────────────────────────────────

/// `POST /functions/verify-session-password`
pub async fn verify_session_password(
    State(state): State<AppState>,
    payload: Result<Json<VerifySessionRequest>, JsonRejection>,
) -> ServerResult<Json<VerifySessionResponse>> {
    let Json(req) = payload?;
    let request = AccessRequest::new(req.session_code)
        .with_password(req.password)
        .with_mode(AccessMode::from_flag(req.is_creating))
        .with_duration_minutes(req.duration_minutes);
    let granted = state.run(move |svc| svc.access(request)).await?;
    Ok(Json(granted.into()))
}

/// `POST /functions/extend-session`
pub async fn extend_session(
    State(state): State<AppState>,
    payload: Result<Json<ExtendSessionRequest>, JsonRejection>,
) -> ServerResult<Json<ExtendSessionResponse>> {
    let Json(req) = payload?;
    let creds = body_credentials(req.token, req.password);
    let info = state
        .run(move |svc| svc.extend(&req.session_code, &creds, req.extend_minutes))
        .await?;
    Ok(Json(ExtendSessionResponse {
        success: true,
        message: "Session extended successfully".into(),
        expires_at: info.expires_at,
    }))
}

/// `POST /functions/update-session-settings`
pub async fn update_session_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<UpdateSettingsRequest>, JsonRejection>,
) -> ServerResult<Json<UpdateSettingsResponse>> {
    let Json(req) = payload?;
    let change = SettingsChange::from_request(req.new_password, req.make_public)?;
    let creds = Credentials {
        admin: state.admin.is_admin(&headers),
        ..body_credentials(req.token, None)
    };
    let info = state
        .run(move |svc| svc.update_settings(&req.session_code, &creds, change))
        .await?;
    Ok(Json(UpdateSettingsResponse {
        success: true,
        message: "Session settings updated successfully".into(),
        is_public: info.is_public,
    }))
}

/// `POST /functions/cleanup-expired-session`
pub async fn cleanup_expired_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CleanupSessionRequest>, JsonRejection>,
) -> ServerResult<Json<CleanupSessionResponse>> {
    let Json(req) = payload?;
    let creds = Credentials {
        admin: state.admin.is_admin(&headers),
        ..body_credentials(req.token, req.password)
    };
    let report = state
        .run(move |svc| svc.delete_session(&req.session_code, &creds, req.force_delete))
        .await?;
    Ok(Json(report.into()))
}

/// `POST /functions/get-admin-data`
pub async fn get_admin_data(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ServerResult<Json<AdminOverview>> {
    let creds = state.admin.require(&headers)?;
    let overview = state.run(move |svc| svc.admin_overview(&creds)).await?;
    Ok(Json(overview))
}

/// `POST /functions/track-analytics`
pub async fn track_analytics(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TrackAnalyticsRequest>, JsonRejection>,
) -> ServerResult<Json<SuccessResponse>> {
    let Json(req) = payload?;
    let client = client_info(&headers);
    state
        .run(move |svc| svc.track(&req.session_code, &req.action, &client, req.metadata))
        .await?;
    Ok(Json(SuccessResponse::OK))
}

// ── Sessions and items ─────────────────────────────────────────────

/// `GET /sessions/{code}`
pub async fn session_info(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ServerResult<Json<SessionInfo>> {
    let info = state.run(move |svc| svc.session_info(&code)).await?;
    Ok(Json(info))
}

/// `GET /sessions/{code}/items`
pub async fn list_items(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> ServerResult<Json<ItemsResponse>> {
    let creds = header_credentials(&headers, &state.admin);
    let items = state.run(move |svc| svc.list_items(&code, &creds)).await?;
    Ok(Json(ItemsResponse { items }))
}

/// `PUT /sessions/{code}/items/text`
pub async fn upsert_text(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<UpsertTextRequest>, JsonRejection>,
) -> ServerResult<impl IntoResponse> {
    let Json(req) = payload?;
    let creds = header_credentials(&headers, &state.admin);
    let item = state
        .run(move |svc| svc.upsert_text(&code, &creds, &req.content))
        .await?;
    Ok(Json(item))
}

/// `DELETE /sessions/{code}/items/text`
pub async fn clear_text(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> ServerResult<Json<ClearTextResponse>> {
    let creds = header_credentials(&headers, &state.admin);
    let removed = state.run(move |svc| svc.clear_text(&code, &creds)).await?;
    Ok(Json(ClearTextResponse { removed }))
}

/// `DELETE /sessions/{code}/items/{id}`
pub async fn remove_item(
    State(state): State<AppState>,
    Path((code, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ServerResult<Json<SuccessResponse>> {
    let item_id: ItemId = id.parse()?;
    let creds = header_credentials(&headers, &state.admin);
    state
        .run(move |svc| svc.remove_item(&code, &creds, item_id))
        .await?;
    Ok(Json(SuccessResponse::OK))
}

/// `POST /sessions/{code}/files`
pub async fn upload_file(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<UploadFileRequest>, JsonRejection>,
) -> ServerResult<impl IntoResponse> {
    let Json(req) = payload?;
    let upload = req
        .into_upload()
        .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
    let creds = header_credentials(&headers, &state.admin);
    let item = state
        .run(move |svc| svc.add_file(&code, &creds, upload))
        .await?;
    Ok(Json(item))
}

/// `GET /sessions/{code}/stats`
pub async fn session_stats(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> ServerResult<Json<SessionStats>> {
    let creds = header_credentials(&headers, &state.admin);
    let stats = state
        .run(move |svc| svc.session_stats(&code, &creds))
        .await?;
    Ok(Json(stats))
}

/// `POST /sessions/{code}/access`
pub async fn grant_access(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<GrantAccessRequest>, JsonRejection>,
) -> ServerResult<Json<SuccessResponse>> {
    let Json(req) = payload?;
    let creds = header_credentials(&headers, &state.admin);
    state
        .run(move |svc| svc.grant_access(&code, &creds, &req.email))
        .await?;
    Ok(Json(SuccessResponse::OK))
}

/// Query of an access check.
#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    email: String,
}

/// `GET /sessions/{code}/access?email=...`
pub async fn has_access(
    State(state): State<AppState>,
    Path(code): Path<String>,
    query: Result<Query<AccessQuery>, QueryRejection>,
) -> ServerResult<Json<HasAccessResponse>> {
    let Query(query) = query?;
    let has_access = state
        .run(move |svc| svc.has_access(&code, &query.email))
        .await?;
    Ok(Json(HasAccessResponse { has_access }))
}

/// `GET /sessions/{code}/events`
///
/// Streams [`RealtimeMessage`]s until the client disconnects or the
/// session is deleted. The connection counts as one peer while open.
pub async fn events(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> ServerResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let creds = header_credentials(&headers, &state.admin);
    let subscription = state.run(move |svc| svc.subscribe(&code, &creds)).await?;
    tracing::debug!(session = %subscription.session_id(), "event stream opened");

    let stream = stream::unfold(subscription, |mut subscription| async move {
        let message = RealtimeMessage::from(subscription.recv().await?);
        let event = match message.to_json() {
            Ok(json) => Event::default().event(message.event_name()).data(json),
            Err(e) => {
                tracing::error!(error = %e, "encoding realtime message failed");
                Event::default().comment("encoding error")
            }
        };
        Some((Ok(event), subscription))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Query of a signed file link.
#[derive(Debug, Deserialize)]
pub struct FileQuery {
    expires: Option<i64>,
    signature: Option<String>,
}

/// `GET /files/{*path}`
pub async fn download_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    query: Result<Query<FileQuery>, QueryRejection>,
) -> ServerResult<impl IntoResponse> {
    let Query(query) = query?;
    let blob = state
        .run(move |svc| {
            let signature = match (query.expires, query.signature.as_deref()) {
                (Some(expires), Some(signature)) => Some((expires, signature)),
                _ => None,
            };
            svc.fetch_file(&path, signature)
        })
        .await?;
    Ok((
        [
            (CONTENT_TYPE, blob.content_type),
            (CACHE_CONTROL, "private, max-age=300".to_string()),
        ],
        blob.data,
    ))
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}
