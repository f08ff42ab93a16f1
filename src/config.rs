use clap::ValueEnum;
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{PluginError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionKind {
    Create,
    Delete,
}

/// What a run does on every target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilenceAction {
    Create { duration_secs: u64 },
    Delete,
}

impl SilenceAction {
    pub fn from_settings(kind: ActionKind, duration: Option<u64>) -> Result<Self> {
        match (kind, duration) {
            (ActionKind::Create, Some(duration_secs)) if duration_secs > 0 => {
                Ok(Self::Create { duration_secs })
            }
            (ActionKind::Create, _) => Err(PluginError::Config(
                "Parameter \"duration\" is missing or wrong value specified".to_string(),
            )),
            (ActionKind::Delete, _) => Ok(Self::Delete),
        }
    }
}

/// Alertmanager base URLs in the order they were configured.
pub fn parse_targets(urls: &[String]) -> Result<Vec<String>> {
    let targets: Vec<String> = urls
        .iter()
        .map(|url| url.trim())
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect();

    if targets.is_empty() {
        return Err(PluginError::Config(
            "You should set Alertmanager's URLs via \"urls\" in settings".to_string(),
        ));
    }
    Ok(targets)
}

/// Parses `Name:Value,Name:Value` into a header map.
pub fn parse_headers(raw: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    for entry in raw.split(',').filter(|e| !e.trim().is_empty()) {
        let (name, value) = entry.split_once(':').ok_or_else(|| {
            PluginError::Config(format!("Header \"{entry}\" must look like Name:Value"))
        })?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| PluginError::Config(format!("Invalid header name \"{name}\": {e}")))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| PluginError::Config(format!("Invalid value for header {name}: {e}")))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

/// Snapshot of the process environment, in the order the OS reports it.
pub fn environment() -> IndexMap<String, String> {
    std::env::vars().collect()
}
