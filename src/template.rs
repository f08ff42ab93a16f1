mod helpers;

use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use log::debug;
use serde_json::Value;

use crate::alertmanager::{Matcher, MatcherSet};
use crate::context::{BuildContext, RenderContext};
use crate::error::{PluginError, Result};

pub const DEFAULT_TEMPLATE_SET: &str = "default";
pub const CREATE_TEMPLATE: &str = "create";
pub const MATCHERS_TEMPLATE: &str = "_matchers";
pub const TEMPLATE_EXTENSION: &str = "hbs";

/// Left in the payload by rendering and filled in afterwards for deployments.
pub const DEPLOY_TARGET_PLACEHOLDER: &str = "{{deploy_target}}";
const DEPLOY_TARGET_KEY: &str = "deploy_target";

pub struct TemplateRenderer {
    registry: Handlebars<'static>,
    templates_path: PathBuf,
    template_set: String,
    custom_template: Option<String>,
}

impl TemplateRenderer {
    pub fn new(
        templates_path: impl Into<PathBuf>,
        template_set: impl Into<String>,
        custom_template: Option<String>,
    ) -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_escape_fn(handlebars::no_escape);
        helpers::register(&mut registry);

        Self {
            registry,
            templates_path: templates_path.into(),
            template_set: template_set.into(),
            custom_template: custom_template.filter(|t| !t.is_empty()),
        }
    }

    pub fn template_path(&self, name: &str) -> PathBuf {
        self.templates_path
            .join(&self.template_set)
            .join(format!("{name}.{TEMPLATE_EXTENSION}"))
    }

    /// Renders `{template_set}/{name}` from the templates directory.
    pub fn render(&self, name: &str, context: &RenderContext) -> Result<String> {
        let path = self.template_path(name);
        let source = read_template(&path)?;
        debug!("Rendering template {}", path.display());
        self.render_source(&source, context)
    }

    /// Renders the silence body; an inline template wins over the template set.
    pub fn render_payload(&self, context: &RenderContext) -> Result<String> {
        match &self.custom_template {
            Some(source) => {
                debug!("Rendering custom template from settings");
                self.render_source(source, context)
            }
            None => self.render(CREATE_TEMPLATE, context),
        }
    }

    /// Renders the matcher fragment used for strict matching.
    pub fn render_matchers(&self, context: &RenderContext) -> Result<Vec<Matcher>> {
        let fragment = self.render(MATCHERS_TEMPLATE, context)?;
        let set: MatcherSet = serde_json::from_str(&format!("{{{fragment}}}")).map_err(|e| {
            PluginError::TemplateRender(format!(
                "Template {} did not produce a valid matchers list: {e}",
                self.template_path(MATCHERS_TEMPLATE).display()
            ))
        })?;
        Ok(set.matchers)
    }

    fn render_source(&self, source: &str, context: &RenderContext) -> Result<String> {
        let mut data = serde_json::to_value(context)?;
        if let Value::Object(vars) = &mut data {
            vars.entry(DEPLOY_TARGET_KEY)
                .or_insert_with(|| Value::String(DEPLOY_TARGET_PLACEHOLDER.to_string()));
        }

        let rendered = self.registry.render_template(source, &data)?;
        replace_macros(rendered, &context.build)
    }
}

fn read_template(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(PluginError::TemplateNotFound(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Substitutes `{{deploy_target}}`, which only exists for promote and rollback builds.
pub fn replace_macros(payload: String, build: &BuildContext) -> Result<String> {
    if !payload.contains(DEPLOY_TARGET_PLACEHOLDER) {
        return Ok(payload);
    }

    if !build.event.is_deployment() {
        return Err(PluginError::DeployTarget(format!(
            "Tag \"{DEPLOY_TARGET_PLACEHOLDER}\" is available only for promote and rollback events"
        )));
    }

    let target = build.deploy_target.as_deref().ok_or_else(|| {
        PluginError::DeployTarget(format!(
            "Can't replace \"{DEPLOY_TARGET_PLACEHOLDER}\", because \"DRONE_DEPLOY_TO\" is empty or unavailable in environment"
        ))
    })?;

    Ok(payload.replace(DEPLOY_TARGET_PLACEHOLDER, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::build_env;
    use crate::context::SilenceWindow;
    use crate::fingerprint::SilenceFingerprint;
    use indexmap::IndexMap;
    use std::fs;
    use tempfile::TempDir;

    fn context_from(env: IndexMap<String, String>) -> RenderContext {
        let build = BuildContext::from_env(&env).unwrap();
        let fingerprint = SilenceFingerprint::for_build(&build);
        RenderContext::new(build, env, &fingerprint)
    }

    fn context(event: &str) -> RenderContext {
        context_from(build_env(event))
    }

    fn template_dir(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, body) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        dir
    }

    #[test]
    fn test_render_named_template() {
        let dir = template_dir(&[(
            "default/create.hbs",
            r#"{"comment": "{{SILENCE_COMMENT}}", "took": "{{DRONE_BUILD_TOTALTIME}}"}"#,
        )]);
        let renderer = TemplateRenderer::new(dir.path(), "default", None);

        let payload = renderer.render("create", &context("push")).unwrap();

        assert_eq!(
            payload,
            r#"{"comment": "Created for build#42 of octocat/hello-world, see https://drone.example.com/octocat/hello-world/42", "took": "0:44:21"}"#
        );
    }

    #[test]
    fn test_missing_template_is_reported_with_path() {
        let dir = template_dir(&[]);
        let renderer = TemplateRenderer::new(dir.path(), "custom-set", None);

        let err = renderer.render("create", &context("push")).unwrap_err();

        match err {
            PluginError::TemplateNotFound(path) => {
                assert!(path.ends_with("custom-set/create.hbs"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_inline_template_takes_precedence() {
        let dir = template_dir(&[("default/create.hbs", "from file")]);
        let renderer = TemplateRenderer::new(
            dir.path(),
            "default",
            Some("inline {{DRONE_BUILD_NUMBER}}".to_string()),
        );

        assert_eq!(renderer.render_payload(&context("push")).unwrap(), "inline 42");
    }

    #[test]
    fn test_empty_inline_template_falls_back_to_set() {
        let dir = template_dir(&[("default/create.hbs", "from file")]);
        let renderer = TemplateRenderer::new(dir.path(), "default", Some(String::new()));

        assert_eq!(renderer.render_payload(&context("push")).unwrap(), "from file");
    }

    #[test]
    fn test_values_are_not_html_escaped() {
        let renderer = TemplateRenderer::new(
            "/nonexistent",
            "default",
            Some("{{DRONE_BUILD_LINK}}&<>".to_string()),
        );

        assert_eq!(
            renderer.render_payload(&context("push")).unwrap(),
            "https://drone.example.com/octocat/hello-world/42&<>"
        );
    }

    #[test]
    fn test_mandatory_names_plugin_setting() {
        let renderer = TemplateRenderer::new(
            "/nonexistent",
            "default",
            Some("{{mandatory PLUGIN_FOO}}".to_string()),
        );

        let err = renderer.render_payload(&context("push")).unwrap_err();

        assert!(matches!(err, PluginError::TemplateRender(_)));
        assert!(err
            .to_string()
            .contains("Mandatory option \"foo\" is not defined in plugin settings"));
    }

    #[test]
    fn test_mandatory_names_environment_variable() {
        let renderer = TemplateRenderer::new(
            "/nonexistent",
            "default",
            Some("{{mandatory BAR}}".to_string()),
        );

        let err = renderer.render_payload(&context("push")).unwrap_err();

        assert!(err
            .to_string()
            .contains("Mandatory variable \"BAR\" is not defined via environment"));
    }

    #[test]
    fn test_helpers_compose() {
        let mut env = build_env("tag");
        env.insert("DRONE_TAG".to_string(), "v1.4.0".to_string());
        let renderer = TemplateRenderer::new(
            "/nonexistent",
            "default",
            Some("{{strip_version (mandatory DRONE_TAG)}}".to_string()),
        );

        assert_eq!(renderer.render_payload(&context_from(env)).unwrap(), "1.4.0");
    }

    #[test]
    fn test_deploy_target_substituted_for_promote() {
        let mut env = build_env("promote");
        env.insert("DRONE_DEPLOY_TO".to_string(), "prod".to_string());
        let renderer = TemplateRenderer::new(
            "/nonexistent",
            "default",
            Some(r#"{"value": "{{deploy_target}}"}"#.to_string()),
        );

        assert_eq!(
            renderer.render_payload(&context_from(env)).unwrap(),
            r#"{"value": "prod"}"#
        );
    }

    #[test]
    fn test_deploy_target_rejected_for_push() {
        let mut env = build_env("push");
        env.insert("DRONE_DEPLOY_TO".to_string(), "prod".to_string());
        let renderer = TemplateRenderer::new(
            "/nonexistent",
            "default",
            Some("{{deploy_target}}".to_string()),
        );

        let err = renderer.render_payload(&context_from(env)).unwrap_err();

        assert!(matches!(err, PluginError::DeployTarget(_)));
        assert!(err.to_string().contains("only for promote and rollback events"));
    }

    #[test]
    fn test_deploy_target_requires_value() {
        let renderer = TemplateRenderer::new(
            "/nonexistent",
            "default",
            Some("{{deploy_target}}".to_string()),
        );

        let err = renderer.render_payload(&context("rollback")).unwrap_err();

        assert!(err.to_string().contains("DRONE_DEPLOY_TO"));
    }

    #[test]
    fn test_payload_without_placeholder_ignores_event() {
        let build = BuildContext::from_env(&build_env("push")).unwrap();

        assert_eq!(
            replace_macros("no macros here".to_string(), &build).unwrap(),
            "no macros here"
        );
    }

    #[test]
    fn test_render_matchers_fragment() {
        let dir = template_dir(&[(
            "default/_matchers.hbs",
            r#""matchers": [{"name": "repo", "value": "{{DRONE_REPO_NAME}}", "isRegex": false}]"#,
        )]);
        let renderer = TemplateRenderer::new(dir.path(), "default", None);

        let matchers = renderer.render_matchers(&context("push")).unwrap();

        assert_eq!(
            matchers,
            vec![Matcher {
                name: "repo".to_string(),
                value: "hello-world".to_string(),
                is_regex: false,
                is_equal: true,
            }]
        );
    }

    #[test]
    fn test_shipped_default_set_is_consistent() {
        let renderer = TemplateRenderer::new(
            Path::new(env!("CARGO_MANIFEST_DIR")).join("templates"),
            DEFAULT_TEMPLATE_SET,
            None,
        );
        let start = chrono::Utc::now();
        let context = context("push").with_window(&SilenceWindow::starting_at(start, 60));

        let payload: Value =
            serde_json::from_str(&renderer.render_payload(&context).unwrap()).unwrap();
        let matchers = renderer.render_matchers(&context).unwrap();

        assert_eq!(payload["createdBy"], "drone/alertmanager");
        assert_eq!(payload["comment"], context.vars["SILENCE_COMMENT"].as_str());
        assert_eq!(
            serde_json::from_value::<Vec<Matcher>>(payload["matchers"].clone()).unwrap(),
            matchers
        );
        assert_eq!(matchers[0].value, "octocat/hello-world");
    }

    #[test]
    fn test_render_matchers_rejects_invalid_json() {
        let dir = template_dir(&[("default/_matchers.hbs", r#""matchers": [oops]"#)]);
        let renderer = TemplateRenderer::new(dir.path(), "default", None);

        assert!(matches!(
            renderer.render_matchers(&context("push")),
            Err(PluginError::TemplateRender(_))
        ));
    }
}
