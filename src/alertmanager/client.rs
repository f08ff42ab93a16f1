use std::time::Duration;

use log::{debug, info};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, LOCATION, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::Credentials;
use crate::error::{PluginError, Result, TransportFailure};
use crate::fingerprint::PLUGIN_USER_AGENT;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
const MAX_REDIRECTS: usize = 5;

/// Transport policy shared by every request of a run.
#[derive(Debug)]
pub struct RequestOptions {
    pub skip_verify: bool,
    pub follow_redirects: bool,
    pub timeout: Duration,
    pub headers: HeaderMap,
    pub credentials: Option<Credentials>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            skip_verify: false,
            follow_redirects: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            headers: Self::base_headers(),
            credentials: None,
        }
    }
}

impl RequestOptions {
    pub fn base_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=UTF-8"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(PLUGIN_USER_AGENT));
        headers
    }

    /// Custom headers replace base headers of the same name.
    pub fn with_headers(mut self, custom: HeaderMap) -> Self {
        for (name, value) in &custom {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    // The follow-redirects setting is only honoured together with credentials.
    fn redirect_policy(&self) -> Policy {
        if self.credentials.is_some() && !self.follow_redirects {
            Policy::none()
        } else {
            Policy::limited(MAX_REDIRECTS)
        }
    }

    fn follows_redirects(&self) -> bool {
        self.credentials.is_none() || self.follow_redirects
    }
}

#[derive(Debug)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl GatewayResponse {
    pub fn content_type(&self) -> &str {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    /// Media type comparison, parameters such as charset are ignored.
    pub fn is_json(&self) -> bool {
        self.content_type()
            .split(';')
            .next()
            .is_some_and(|media| media.trim().eq_ignore_ascii_case(JSON_CONTENT_TYPE))
    }

    pub fn require_json(&self) -> Result<()> {
        if self.is_json() {
            Ok(())
        } else {
            Err(PluginError::UnexpectedContentType(
                self.content_type().to_string(),
            ))
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub struct HttpGateway {
    client: Client,
    options: RequestOptions,
}

impl HttpGateway {
    pub fn new(options: RequestOptions) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(options.skip_verify)
            .redirect(options.redirect_policy())
            .timeout(options.timeout)
            .build()
            .map_err(|e| PluginError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, options })
    }

    /// Performs one request. Anything but HTTP/200 is an error; nothing is retried.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
    ) -> Result<GatewayResponse> {
        let url = parse_url(url)?;

        debug!("Target URL is {url}");
        debug!("Method is {method}");
        debug!("SkipVerify is {}", self.options.skip_verify);
        debug!("FollowRedirects is {}", self.options.follows_redirects());
        debug!("Timeout is {}", self.options.timeout.as_secs());
        debug!("Headers are {:?}", self.options.headers);
        debug!("Credentials are {:?}", self.options.credentials);
        if let Some(body) = &body {
            debug!("Here is a message:\n{body}");
        }

        let mut request = self
            .client
            .request(method, url.clone())
            .headers(self.options.headers.clone());
        if let Some(credentials) = &self.options.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        info!("Sending request to {url}");
        let response = request
            .send()
            .await
            .map_err(|e| self.classify(&e, &url))?;

        let status = response.status();
        if status.is_redirection() && !response.headers().contains_key(LOCATION) {
            return Err(TransportFailure::RedirectMissingLocation.into());
        }

        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify(&e, &url))?
            .to_vec();
        let response = GatewayResponse {
            status,
            headers,
            body,
        };

        debug!(
            "Here is a response: HTTP/{} {:?}",
            response.status.as_u16(),
            response.headers
        );
        debug!("And here is a body of response:\n{}", response.text());

        if status != StatusCode::OK {
            return Err(PluginError::UnexpectedStatus {
                status: status.as_u16(),
                body: response.text(),
            });
        }

        info!(
            "Request successfully sent to {url}, we got HTTP/{}",
            status.as_u16()
        );
        Ok(response)
    }

    fn classify(&self, err: &reqwest::Error, url: &Url) -> TransportFailure {
        if err.is_timeout() {
            TransportFailure::Timeout(self.options.timeout.as_secs())
        } else if err.is_redirect() {
            TransportFailure::RedirectLimit
        } else if err.is_decode() {
            TransportFailure::Decompression
        } else if err.is_connect() && is_dns_failure(err) {
            TransportFailure::HostNotFound(url.to_string())
        } else {
            TransportFailure::Other(err.to_string())
        }
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| match e {
        url::ParseError::RelativeUrlWithoutBase => {
            TransportFailure::RelativeUri(raw.to_string()).into()
        }
        other => PluginError::Config(format!("Invalid URL {raw}: {other}")),
    })
}

// hyper-util's HttpConnector wraps resolver failures in a ConnectError whose message is
// "dns error"; the type itself is private, so the source chain is matched by message.
fn is_dns_failure(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(current) = source {
        if current.to_string().contains("dns error") {
            return true;
        }
        source = current.source();
    }
    false
}
