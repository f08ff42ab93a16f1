use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One label predicate of a silence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matcher {
    pub name: String,
    pub value: String,
    pub is_regex: bool,
    #[serde(default = "default_is_equal")]
    pub is_equal: bool,
}

fn default_is_equal() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SilenceState {
    Active,
    Pending,
    Expired,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SilenceStatus {
    pub state: SilenceState,
}

/// A silence as listed by `GET /api/v2/silences`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Silence {
    pub id: String,
    pub status: SilenceStatus,
    pub created_by: String,
    pub comment: String,
    #[serde(default)]
    pub matchers: Vec<Matcher>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl Silence {
    pub fn is_expired(&self) -> bool {
        self.status.state == SilenceState::Expired
    }
}

/// Response of `POST /api/v2/silences`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSilence {
    #[serde(rename = "silenceID")]
    pub silence_id: String,
}

/// Shape of the rendered `_matchers` fragment once wrapped in braces.
#[derive(Debug, Deserialize)]
pub struct MatcherSet {
    pub matchers: Vec<Matcher>,
}
