use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Can't find {0} in environment")]
    MissingVariable(String),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Can't read template from {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("Template rendering failed with an error:\n{0}")]
    TemplateRender(String),

    #[error("{0}")]
    DeployTarget(String),

    #[error(transparent)]
    Transport(#[from] TransportFailure),

    #[error("Request failed with HTTP/{status}, received response below:\n{body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Got \"{0}\" as Content-Type instead of expected \"application/json\"")]
    UnexpectedContentType(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal failures of a single HTTP exchange. None of them is retried.
#[derive(Error, Debug)]
pub enum TransportFailure {
    #[error("Unable to resolve the host name given for URI: {0}")]
    HostNotFound(String),

    #[error("A 3xx redirect response code was provided but no Location: header was provided to point to the new location")]
    RedirectMissingLocation,

    #[error("The maximum number of redirections was reached without coming to a final URI")]
    RedirectLimit,

    #[error("The headers claimed that the content of the response was compressed but the decompression algorithm applied to the content failed")]
    Decompression,

    #[error("A relative, as opposed to an absolute URI, was passed into request: {0}")]
    RelativeUri(String),

    #[error("Timeout exceeded after {0} seconds, request aborted")]
    Timeout(u64),

    #[error("Request failed with an error: {0}")]
    Other(String),
}

impl From<handlebars::RenderError> for PluginError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::TemplateRender(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PluginError>;
