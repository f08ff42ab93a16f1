use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{PluginError, Result};
use crate::fingerprint::SilenceFingerprint;

/// Build variables Drone always exports; a run without any of them is refused.
pub const REQUIRED_VARIABLES: [&str; 8] = [
    "DRONE_REPO_OWNER",
    "DRONE_REPO_NAME",
    "DRONE_BUILD_LINK",
    "DRONE_BUILD_NUMBER",
    "DRONE_BUILD_STARTED",
    "DRONE_BUILD_FINISHED",
    "DRONE_BUILD_EVENT",
    "DRONE_STAGE_NAME",
];

pub const TOTAL_TIME_VAR: &str = "DRONE_BUILD_TOTALTIME";
pub const QUEUED_TIME_VAR: &str = "DRONE_BUILD_QUEUEDTIME";
pub const COMMENT_VAR: &str = "SILENCE_COMMENT";
pub const CREATED_BY_VAR: &str = "SILENCE_CREATED_BY";
pub const STARTS_AT_VAR: &str = "SILENCE_STARTS_AT";
pub const ENDS_AT_VAR: &str = "SILENCE_ENDS_AT";
pub const DEPLOY_TO_VAR: &str = "DRONE_DEPLOY_TO";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildEvent {
    Push,
    Tag,
    Cron,
    PullRequest,
    Promote,
    Rollback,
    Custom,
}

impl BuildEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Tag => "tag",
            Self::Cron => "cron",
            Self::PullRequest => "pull_request",
            Self::Promote => "promote",
            Self::Rollback => "rollback",
            Self::Custom => "custom",
        }
    }

    /// Events that carry a deploy target.
    pub fn is_deployment(self) -> bool {
        matches!(self, Self::Promote | Self::Rollback)
    }
}

impl FromStr for BuildEvent {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "push" => Ok(Self::Push),
            "tag" => Ok(Self::Tag),
            "cron" => Ok(Self::Cron),
            "pull_request" => Ok(Self::PullRequest),
            "promote" => Ok(Self::Promote),
            "rollback" => Ok(Self::Rollback),
            "custom" => Ok(Self::Custom),
            other => Err(PluginError::UnknownEvent(other.to_string())),
        }
    }
}

impl fmt::Display for BuildEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct BuildContext {
    pub repo_owner: String,
    pub repo_name: String,
    pub build_link: String,
    pub build_number: String,
    pub event: BuildEvent,
    pub stage_name: String,
    pub created: Option<i64>,
    pub started: Option<i64>,
    pub finished: Option<i64>,
    pub deploy_target: Option<String>,
}

impl BuildContext {
    pub fn from_env(env: &IndexMap<String, String>) -> Result<Self> {
        if let Some(missing) = REQUIRED_VARIABLES
            .iter()
            .find(|key| !env.contains_key(**key))
        {
            return Err(PluginError::MissingVariable((*missing).to_string()));
        }

        let get = |key: &str| env.get(key).cloned().unwrap_or_default();

        Ok(Self {
            repo_owner: get("DRONE_REPO_OWNER"),
            repo_name: get("DRONE_REPO_NAME"),
            build_link: get("DRONE_BUILD_LINK"),
            build_number: get("DRONE_BUILD_NUMBER"),
            event: get("DRONE_BUILD_EVENT").parse()?,
            stage_name: get("DRONE_STAGE_NAME"),
            created: parse_timestamp(env, "DRONE_BUILD_CREATED")?,
            started: parse_timestamp(env, "DRONE_BUILD_STARTED")?,
            finished: parse_timestamp(env, "DRONE_BUILD_FINISHED")?,
            deploy_target: env.get(DEPLOY_TO_VAR).filter(|v| !v.is_empty()).cloned(),
        })
    }

    pub fn total_time(&self) -> Option<String> {
        Some(format_elapsed(self.finished? - self.started?))
    }

    pub fn queued_time(&self) -> Option<String> {
        Some(format_elapsed(self.started? - self.created?))
    }
}

fn parse_timestamp(env: &IndexMap<String, String>, key: &str) -> Result<Option<i64>> {
    match env.get(key).map(|v| v.trim()) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| {
            PluginError::Config(format!("{key} must be a unix timestamp, got \"{raw}\""))
        }),
    }
}

/// Formats a signed number of seconds the way Python prints a `timedelta`:
/// `H:MM:SS`, prefixed by `D day(s), ` when the span crosses a day boundary.
pub fn format_elapsed(seconds: i64) -> String {
    let days = seconds.div_euclid(86_400);
    let rest = seconds.rem_euclid(86_400);
    let clock = format!("{}:{:02}:{:02}", rest / 3600, rest % 3600 / 60, rest % 60);

    match days {
        0 => clock,
        1 | -1 => format!("{days} day, {clock}"),
        _ => format!("{days} days, {clock}"),
    }
}

/// Formats an instant for Alertmanager: UTC, microsecond precision, trailing `Z`.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Start and end of a silence created now.
#[derive(Debug, Clone)]
pub struct SilenceWindow {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl SilenceWindow {
    pub fn starting_at(starts_at: DateTime<Utc>, duration_secs: u64) -> Self {
        let ends_at = i64::try_from(duration_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|span| starts_at.checked_add_signed(span))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self { starts_at, ends_at }
    }

    pub fn from_now(duration_secs: u64) -> Self {
        Self::starting_at(Utc::now(), duration_secs)
    }
}

/// Everything a template can reference: the whole environment plus derived build values.
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    #[serde(skip)]
    pub build: BuildContext,
    #[serde(flatten)]
    pub vars: IndexMap<String, String>,
}

impl RenderContext {
    pub fn new(
        build: BuildContext,
        env: IndexMap<String, String>,
        fingerprint: &SilenceFingerprint,
    ) -> Self {
        let mut vars = env;

        if let Some(total) = build.total_time() {
            vars.insert(TOTAL_TIME_VAR.to_string(), total);
        }
        if let Some(queued) = build.queued_time() {
            vars.insert(QUEUED_TIME_VAR.to_string(), queued);
        }
        vars.insert(COMMENT_VAR.to_string(), fingerprint.comment.clone());
        vars.insert(CREATED_BY_VAR.to_string(), fingerprint.created_by.clone());

        Self { build, vars }
    }

    pub fn with_window(&self, window: &SilenceWindow) -> Self {
        let mut context = self.clone();
        context
            .vars
            .insert(STARTS_AT_VAR.to_string(), format_instant(window.starts_at));
        context
            .vars
            .insert(ENDS_AT_VAR.to_string(), format_instant(window.ends_at));
        context
    }
}
