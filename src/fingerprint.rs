use crate::alertmanager::{Matcher, Silence};
use crate::context::BuildContext;

/// Author recorded on every silence this plugin creates, also sent as User-Agent.
pub const PLUGIN_USER_AGENT: &str = "drone/alertmanager";

/// Fields that identify the silence created for a build. No silence ID is ever
/// stored, so a later run recognises its silence by these values alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SilenceFingerprint {
    pub created_by: String,
    pub comment: String,
    pub matchers: Option<Vec<Matcher>>,
}

impl SilenceFingerprint {
    pub fn for_build(build: &BuildContext) -> Self {
        Self {
            created_by: PLUGIN_USER_AGENT.to_string(),
            comment: format!(
                "Created for build#{} of {}/{}, see {}",
                build.build_number, build.repo_owner, build.repo_name, build.build_link
            ),
            matchers: None,
        }
    }

    /// Tightens matching so that the silence matcher list must be identical too.
    pub fn with_matchers(mut self, matchers: Vec<Matcher>) -> Self {
        self.matchers = Some(matchers);
        self
    }

    pub fn matches(&self, silence: &Silence) -> bool {
        if silence.is_expired()
            || silence.created_by != self.created_by
            || silence.comment != self.comment
        {
            return false;
        }

        self.matchers
            .as_ref()
            .map_or(true, |expected| *expected == silence.matchers)
    }
}
