//! `{{name}}` template substitution

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static VARIABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{([^}]+)\}\}").expect("Invalid variable regex")
});

/// Anything that can answer "what is the value of this variable?"
pub trait VariableLookup {
    fn lookup(&self, name: &str) -> Option<String>;
}

impl<F> VariableLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn lookup(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Replace every `{{name}}` token with its value
///
/// Names are trimmed before lookup. Unknown names leave the token untouched,
/// so a template without tokens comes back unchanged. Substituted values are
/// never rescanned.
pub fn resolve(template: &str, lookup: &(impl VariableLookup + ?Sized)) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }

    VARIABLE_RE
        .replace_all(template, |caps: &Captures| {
            lookup.lookup(caps[1].trim()).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Distinct token names in order of first appearance
pub fn find_variables(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in VARIABLE_RE.captures_iter(template) {
        let name = caps[1].trim().to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}
