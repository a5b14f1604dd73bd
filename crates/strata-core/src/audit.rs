//! Audit stamping for metadata entities.
//!
//! Every mutation records who performed it and when. The creator fields are
//! written once at creation; the modifier fields are rewritten on each
//! successful mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Creator/modifier stamps carried by every entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    /// Principal that created the entity.
    pub creator: String,
    /// Creation timestamp.
    pub create_time: DateTime<Utc>,
    /// Principal of the last successful mutation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modifier: Option<String>,
    /// Timestamp of the last successful mutation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_time: Option<DateTime<Utc>>,
}

impl AuditInfo {
    /// Creates audit info stamped with the given creator and the current time.
    #[must_use]
    pub fn new(creator: impl Into<String>) -> Self {
        Self {
            creator: creator.into(),
            create_time: Utc::now(),
            last_modifier: None,
            last_modified_time: None,
        }
    }

    /// Stamps the modifier fields for a mutation performed now.
    pub fn mark_modified(&mut self, principal: impl Into<String>) {
        self.last_modifier = Some(principal.into());
        self.last_modified_time = Some(Utc::now());
    }
}
