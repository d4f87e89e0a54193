//! Analytics, access grants, statistics and the admin overview.

use super::{parse_code, Credentials, SessionInfo, SessionService};
use crate::error::{CoreError, CoreResult};
use crate::types::{AccessGrant, AnalyticsEvent, ClientInfo, ItemKind, Session};
use crate::validation::{normalize_email, validate_action};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Usage figures for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Distinct caller IPs seen in analytics.
    pub unique_visitors: usize,
    /// Number of text items.
    pub text_items: usize,
    /// Number of image items.
    pub image_items: usize,
    /// Number of other file items.
    pub file_items: usize,
    /// File sizes plus UTF-8 text bytes.
    pub total_data_bytes: u64,
    /// Subscribers connected right now.
    pub peers: usize,
}

/// One row of the admin overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Session metadata.
    #[serde(flatten)]
    pub info: SessionInfo,
    /// Usage figures.
    #[serde(flatten)]
    pub stats: SessionStats,
}

/// Everything the admin dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOverview {
    /// Most recent sessions, newest first.
    pub sessions: Vec<SessionSummary>,
    /// Most recent analytics events, newest first.
    pub recent_activity: Vec<AnalyticsEvent>,
}

impl SessionService {
    /// Records an analytics event against a session.
    ///
    /// Metadata that is not a JSON object is stored as `{}`.
    pub fn track(
        &self,
        code: &str,
        action: &str,
        client: &ClientInfo,
        metadata: Option<serde_json::Value>,
    ) -> CoreResult<()> {
        validate_action(action)?;
        let session = self.active_session(&parse_code(code)?)?;
        let metadata = metadata
            .filter(serde_json::Value::is_object)
            .unwrap_or_else(|| serde_json::json!({}));

        self.store.insert_event(AnalyticsEvent {
            id: Uuid::new_v4(),
            session_id: session.id,
            action: action.to_string(),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            metadata,
            created_at: self.now(),
        })?;
        tracing::debug!(session = %session.code, action, ip = %client.ip_address, "analytics recorded");
        Ok(())
    }

    /// Grants an email address access to a session.
    pub fn grant_access(
        &self,
        code: &str,
        creds: &Credentials,
        email: &str,
    ) -> CoreResult<AccessGrant> {
        let email = normalize_email(email)?;
        let session = self.authorized_session(code, creds)?;
        let grant = AccessGrant {
            session_id: session.id,
            email,
            created_at: self.now(),
        };
        self.store.insert_access(grant.clone())?;
        tracing::info!(session = %session.code, email = %grant.email, "access granted");
        Ok(grant)
    }

    /// Returns true if `email` has been granted access to the session.
    pub fn has_access(&self, code: &str, email: &str) -> CoreResult<bool> {
        let email = normalize_email(email)?;
        let session = self.active_session(&parse_code(code)?)?;
        self.store.has_access(session.id, &email)
    }

    /// Returns usage figures for one session.
    pub fn session_stats(&self, code: &str, creds: &Credentials) -> CoreResult<SessionStats> {
        let session = self.authorized_session(code, creds)?;
        self.stats_for(&session)
    }

    /// Returns the admin overview.
    ///
    /// # Errors
    ///
    /// Returns 401 unless `creds` are administrator credentials.
    pub fn admin_overview(&self, creds: &Credentials) -> CoreResult<AdminOverview> {
        if !creds.admin {
            return Err(CoreError::unauthorized("Admin access required"));
        }
        let sessions = self
            .store
            .list_sessions(self.config.admin_session_limit)?
            .iter()
            .map(|session| {
                Ok(SessionSummary {
                    info: SessionInfo::from(session),
                    stats: self.stats_for(session)?,
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;
        let recent_activity = self.store.recent_events(self.config.admin_activity_limit)?;

        Ok(AdminOverview {
            sessions,
            recent_activity,
        })
    }

    fn stats_for(&self, session: &Session) -> CoreResult<SessionStats> {
        let mut stats = SessionStats {
            peers: self.feed.peer_count(session.id),
            ..SessionStats::default()
        };
        for item in self.store.items_for_session(session.id)? {
            match item.kind {
                ItemKind::Text => stats.text_items += 1,
                ItemKind::Image => stats.image_items += 1,
                ItemKind::File => stats.file_items += 1,
            }
            stats.total_data_bytes += item.data_bytes();
        }
        stats.unique_visitors = self
            .store
            .events_for_session(session.id)?
            .iter()
            .map(|event| event.ip_address.as_str())
            .collect::<HashSet<_>>()
            .len();
        Ok(stats)
    }
}
