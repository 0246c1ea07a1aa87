//! Pre-flight check of a collection against the loaded variables

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Method;

use crate::models::{Collection, FlatRequest, Listen, ParameterSet, RequestTemplate};
use crate::variables::{find_variables, CarriedVariables, RunScope, VariableLookup, VariableStore};

static SCRIPT_SET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"pm\.(?:environment|globals)\.set\(\s*["']([^"']+)["']"#).expect("Invalid script set regex")
});

/// Check every request for tokens no scope can resolve
///
/// Tokens that an earlier script sets are only warnings, their value is not
/// known until the run. Returns the warnings on success and the errors
/// otherwise.
pub fn validate(
    collection: &Collection,
    params: &[ParameterSet],
    store: &VariableStore,
) -> Result<Vec<String>, Vec<String>> {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    let requests = collection.requests();
    if requests.is_empty() {
        errors.push("Collection has no requests".to_string());
    }

    let first_param = params.iter().find(|p| p.enabled);
    if first_param.is_none() {
        warnings.push("No enabled parameter set; origin and destination are unresolved".to_string());
    }

    let carried = CarriedVariables::new();
    let scope = RunScope::new(&carried, first_param, store);
    let mut script_keys: HashSet<String> = HashSet::new();

    for request in &requests {
        let prefix = format!("Request {} ({})", request.index, request.path);

        if request.request.method.to_uppercase().parse::<Method>().is_err() {
            errors.push(format!("{}: Invalid HTTP method '{}'", prefix, request.request.method));
        }
        if request.request.url.as_ref().and_then(|u| u.template()).is_none() {
            errors.push(format!("{}: Invalid URL format in request", prefix));
        }

        if let Some(source) = request.item.script(Listen::Prerequest) {
            script_keys.extend(script_writes(&source));
        }

        for token in request_tokens(request.request) {
            if scope.lookup(&token).is_some() {
                continue;
            }
            if script_keys.contains(&token) {
                warnings.push(format!("{}: '{}' is set by a script (resolved at runtime)", prefix, token));
            } else {
                errors.push(format!("{}: Unresolved variable '{}'", prefix, token));
            }
        }

        if let Some(source) = request.item.script(Listen::Test) {
            script_keys.extend(script_writes(&source));
        }
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(errors)
    }
}

/// Keys a script sets through `pm.environment.set` / `pm.globals.set`
pub fn script_writes(source: &str) -> Vec<String> {
    SCRIPT_SET_RE.captures_iter(source)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Distinct tokens referenced by a request, in order of appearance
fn request_tokens(template: &RequestTemplate) -> Vec<String> {
    let mut texts: Vec<&str> = vec![template.method.as_str()];
    let url = template.url.as_ref().and_then(|u| u.template());
    if let Some(url) = &url {
        texts.push(url);
    }
    texts.extend(template.header.iter().filter(|h| h.is_enabled()).map(|h| h.value.as_str()));
    if let Some(body) = &template.body {
        if let Some(raw) = &body.raw {
            texts.push(raw);
        }
        texts.extend(
            body.urlencoded.iter()
                .chain(body.formdata.iter())
                .filter(|p| !p.disabled)
                .map(|p| p.value.as_str()),
        );
    }
    let credentials = template.auth.as_ref().and_then(|a| a.basic_credentials());
    if let Some((user, password)) = &credentials {
        texts.push(user);
        texts.push(password);
    }

    let mut seen = HashSet::new();
    texts.into_iter()
        .flat_map(find_variables)
        .filter(|token| seen.insert(token.clone()))
        .collect()
}

/// Printable list of the requests a run would send
pub fn describe_plan(requests: &[FlatRequest<'_>]) -> Vec<String> {
    requests.iter()
        .map(|r| format!("{:>3}. {} {}", r.index, r.request.method.to_uppercase(), r.path))
        .collect()
}
