use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{OrganizationId, SessionId};

/// Generated narrative for a session, stored verbatim. At most one per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeReport {
    pub session_id: SessionId,
    pub organization_id: OrganizationId,
    pub content: String,
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
}
