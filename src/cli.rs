use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::alertmanager::{HttpGateway, RequestOptions};
use crate::auth::Credentials;
use crate::config::{self, ActionKind, SilenceAction};
use crate::context::{BuildContext, RenderContext};
use crate::fingerprint::SilenceFingerprint;
use crate::orchestrator::Orchestrator;
use crate::template::{TemplateRenderer, DEFAULT_TEMPLATE_SET};

/// Every option is bound to the variable Drone exports for the matching plugin setting.
#[derive(Parser)]
#[command(name = "drone-alertmanager")]
#[command(author, version, about = "Drone plugin for Alertmanager silences", long_about = None)]
pub struct Cli {
    /// Alertmanager base URLs, comma separated
    #[arg(long, env = "PLUGIN_URLS", value_delimiter = ',', required = true)]
    urls: Vec<String>,

    /// Whether to create a silence or delete the ones created for this build
    #[arg(long, env = "PLUGIN_ACTION", value_enum)]
    action: ActionKind,

    /// Silence duration in seconds, required for create
    #[arg(long, env = "PLUGIN_DURATION")]
    duration: Option<u64>,

    /// Template set to render
    #[arg(long, env = "PLUGIN_TEMPLATE")]
    template: Option<String>,

    /// Inline silence template, overrides the template set
    #[arg(long, env = "PLUGIN_CUSTOM_TEMPLATE")]
    custom_template: Option<String>,

    /// Directory holding the template sets
    #[arg(long, env = "TEMPLATES_PATH", default_value = "/templates")]
    templates_path: PathBuf,

    /// Require silence matchers to equal the rendered matchers template on delete
    #[arg(long, env = "PLUGIN_STRICT_MATCH", action = ArgAction::Set,
        value_parser = BoolishValueParser::new(), default_value_t = false)]
    strict_match: bool,

    /// Extra request headers as Name:Value, comma separated
    #[arg(long, env = "PLUGIN_HEADERS")]
    headers: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, env = "PLUGIN_SKIP_VERIFY", action = ArgAction::Set,
        value_parser = BoolishValueParser::new(), default_value_t = false)]
    skip_verify: bool,

    /// Follow redirects, only applied when credentials are set
    #[arg(long, env = "PLUGIN_FOLLOW_REDIRECTS", action = ArgAction::Set,
        value_parser = BoolishValueParser::new(), default_value_t = true)]
    follow_redirects: bool,

    /// Request timeout in seconds
    #[arg(long, env = "PLUGIN_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Basic auth username
    #[arg(long, env = "PLUGIN_USERNAME")]
    username: Option<String>,

    /// Basic auth password
    #[arg(long, env = "PLUGIN_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Verbose logging, including the environment and every request
    #[arg(long, env = "PLUGIN_DEBUG", action = ArgAction::Set,
        value_parser = BoolishValueParser::new(), default_value_t = false)]
    debug: bool,
}

impl Cli {
    pub fn debug(&self) -> bool {
        self.debug
    }

    pub async fn execute(&self) -> Result<()> {
        let env = config::environment();
        if self.debug {
            dump_environment(&env);
        }

        let action = SilenceAction::from_settings(self.action, self.duration)?;
        let targets = config::parse_targets(&self.urls)?;

        let template_set = self.template.as_deref().filter(|t| !t.is_empty());
        let custom_template = self.custom_template.clone().filter(|t| !t.is_empty());
        if template_set.is_none() && custom_template.is_none() {
            warn!("Settings template and custom_template are missing, rendering default");
        }

        let build = BuildContext::from_env(&env)?;
        info!(
            "Build #{} of {}/{} ({} event, stage {})",
            build.build_number, build.repo_owner, build.repo_name, build.event, build.stage_name
        );
        let mut fingerprint = SilenceFingerprint::for_build(&build);
        let context = RenderContext::new(build, env, &fingerprint);
        let renderer = TemplateRenderer::new(
            &self.templates_path,
            template_set.unwrap_or(DEFAULT_TEMPLATE_SET),
            custom_template,
        );

        if self.strict_match && action == SilenceAction::Delete {
            fingerprint = fingerprint.with_matchers(renderer.render_matchers(&context)?);
        }

        let gateway = HttpGateway::new(self.request_options()?)?;
        let orchestrator = Orchestrator::new(gateway, renderer, context, fingerprint, targets);
        orchestrator.run(action).await?;

        Ok(())
    }

    fn request_options(&self) -> crate::error::Result<RequestOptions> {
        let custom_headers = match &self.headers {
            Some(raw) => config::parse_headers(raw)?,
            None => Default::default(),
        };

        Ok(RequestOptions {
            skip_verify: self.skip_verify,
            follow_redirects: self.follow_redirects,
            timeout: Duration::from_secs(self.timeout),
            credentials: Credentials::from_parts(
                self.username.as_deref(),
                self.password.as_deref(),
            ),
            ..RequestOptions::default()
        }
        .with_headers(custom_headers))
    }
}

fn dump_environment(env: &IndexMap<String, String>) {
    debug!("Here is our environment:");
    for (key, value) in env {
        if key == "PLUGIN_PASSWORD" {
            debug!("{key} => <redacted>");
        } else {
            debug!("{key} => {value}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("drone-alertmanager").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["--urls", "http://am:9093", "--action", "delete"]);

        assert_eq!(cli.urls, vec!["http://am:9093"]);
        assert_eq!(cli.action, ActionKind::Delete);
        assert_eq!(cli.timeout, 60);
        assert!(cli.follow_redirects);
        assert!(!cli.skip_verify);
        assert!(!cli.strict_match);
    }

    #[test]
    fn test_urls_are_comma_delimited() {
        let cli = parse(&["--urls", "http://a:9093,http://b:9093", "--action", "create"]);

        assert_eq!(cli.urls, vec!["http://a:9093", "http://b:9093"]);
    }

    #[test]
    fn test_boolean_settings_accept_drone_spelling() {
        let cli = parse(&[
            "--urls",
            "http://am:9093",
            "--action",
            "delete",
            "--strict-match",
            "TRUE",
            "--follow-redirects",
            "false",
        ]);

        assert!(cli.strict_match);
        assert!(!cli.follow_redirects);
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let result = Cli::try_parse_from([
            "drone-alertmanager",
            "--urls",
            "http://am:9093",
            "--action",
            "expire",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn test_request_options_from_settings() {
        let cli = parse(&[
            "--urls",
            "http://am:9093",
            "--action",
            "delete",
            "--timeout",
            "5",
            "--headers",
            "X-Scope-OrgID:team-a",
            "--username",
            "drone",
            "--password",
            "hunter2",
        ]);

        let options = cli.request_options().unwrap();

        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.headers["x-scope-orgid"], "team-a");
        assert_eq!(options.headers["user-agent"], "drone/alertmanager");
        assert!(options.credentials.is_some());
    }
}
