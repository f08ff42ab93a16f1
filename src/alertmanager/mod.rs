mod client;
mod matcher;
mod models;

pub use client::{HttpGateway, RequestOptions};
pub use matcher::SilenceMatcher;
pub use models::{CreatedSilence, Matcher, MatcherSet, Silence};

const SILENCES_PATH: &str = "api/v2/silences";
const SILENCE_PATH: &str = "api/v2/silence";

/// Collection endpoint used to list and create silences.
pub fn silences_url(target: &str) -> String {
    format!("{}/{SILENCES_PATH}", target.trim_end_matches('/'))
}

/// Endpoint of a single silence, used to expire it.
pub fn silence_url(target: &str, id: &str) -> String {
    format!("{}/{SILENCE_PATH}/{id}", target.trim_end_matches('/'))
}
