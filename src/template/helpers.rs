use std::sync::LazyLock;

use handlebars::{
    handlebars_helper, Context, Handlebars, Helper, HelperResult, JsonRender, Output,
    RenderContext, RenderErrorReason,
};
use regex::Regex;

static VERSION_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v[0-9]+\.[0-9]+\.[0-9]+").expect("version tag regex"));

/// Drops the `v` of `vX.Y.Z` tags, anything else is returned as is.
pub fn trim_version_prefix(input: &str) -> &str {
    if VERSION_TAG.is_match(input) {
        &input[1..]
    } else {
        input
    }
}

/// Doubles backslashes so the value can sit inside a JSON string literal.
pub fn escape_backslashes(input: &str) -> String {
    input.replace('\\', "\\\\")
}

/// Message raised when a `mandatory` value is not set. `PLUGIN_*` variables come
/// from pipeline settings, so they are reported by their settings name.
pub fn missing_message(name: &str) -> String {
    match name.strip_prefix("PLUGIN_") {
        Some(option) => format!(
            "Mandatory option \"{}\" is not defined in plugin settings",
            option.to_lowercase()
        ),
        None => format!("Mandatory variable \"{name}\" is not defined via environment"),
    }
}

fn mandatory(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h
        .param(0)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("mandatory", 0))?;

    if param.is_value_missing() || param.value().is_null() {
        let message = match h.param(1).and_then(|m| m.value().as_str()) {
            Some(custom) => custom.to_string(),
            None => missing_message(param.relative_path().map_or("", String::as_str)),
        };
        return Err(RenderErrorReason::Other(message).into());
    }

    out.write(&param.value().render())?;
    Ok(())
}

pub fn register(registry: &mut Handlebars<'_>) {
    // The struct name is what handlebars reports in parameter errors.
    handlebars_helper!(strip_version: |input: str| trim_version_prefix(input).to_string());
    handlebars_helper!(escape_for_json: |input: str| escape_backslashes(input));

    registry.register_helper("strip_version", Box::new(strip_version));
    registry.register_helper("escape_for_json", Box::new(escape_for_json));
    registry.register_helper("mandatory", Box::new(mandatory));
}
