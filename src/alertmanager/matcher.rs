use log::{debug, info, log, Level};
use reqwest::Method;

use super::client::HttpGateway;
use super::models::Silence;
use super::silences_url;
use crate::error::{PluginError, Result};
use crate::fingerprint::SilenceFingerprint;

/// Looks up the silences a previous run created for the current build.
pub struct SilenceMatcher<'a> {
    gateway: &'a HttpGateway,
    fingerprint: &'a SilenceFingerprint,
}

impl<'a> SilenceMatcher<'a> {
    pub fn new(gateway: &'a HttpGateway, fingerprint: &'a SilenceFingerprint) -> Self {
        Self {
            gateway,
            fingerprint,
        }
    }

    /// IDs of non-expired silences matching the fingerprint. Lookup failures are
    /// logged and yield no matches.
    pub async fn find(&self, target: &str) -> Vec<String> {
        match self.try_find(target).await {
            Ok(ids) => ids,
            Err(err) => {
                log!(
                    failure_level(&err),
                    "Searching for silence on {target} failed with an error:\n{err}"
                );
                Vec::new()
            }
        }
    }

    async fn try_find(&self, target: &str) -> Result<Vec<String>> {
        info!(
            "Searching for non-expired silences (strict_match={})",
            self.fingerprint.matchers.is_some()
        );

        let response = self
            .gateway
            .send(Method::GET, &silences_url(target), None)
            .await?;
        response.require_json()?;

        let silences: Vec<Silence> = response.json()?;
        let ids = silences
            .into_iter()
            .filter(|silence| self.fingerprint.matches(silence))
            .map(|silence| {
                debug!(
                    "Found matching silence with ID {} ({:?} - {:?})",
                    silence.id, silence.starts_at, silence.ends_at
                );
                silence.id
            })
            .collect();

        Ok(ids)
    }
}

/// The server answered but not with a silence list: a warning. Everything else is an error.
fn failure_level(err: &PluginError) -> Level {
    match err {
        PluginError::UnexpectedContentType(_) | PluginError::UnexpectedStatus { .. } => Level::Warn,
        _ => Level::Error,
    }
}
