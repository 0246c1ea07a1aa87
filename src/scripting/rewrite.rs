//! City declaration rewriting for origin/destination test scripts
//!
//! Collections built for one city pair hardcode the city in their test
//! scripts (`const cidade = "Recife";`). Before a test script runs, the first
//! such declaration is pointed at the city of the current parameter set.
//!
//! This is a textual patch, not a parser: it only recognises a string literal
//! assigned with `const`, `var` or `let`, and it will happily rewrite a match
//! inside a comment.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::models::params::is_numeric;
use crate::variables::VariableLookup;

static CIDADE_DECLARATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(const|var|let)(\s+cidade\s*=\s*)(?:"([^"]*)"|'([^']*)')"#)
        .expect("Invalid cidade declaration regex")
});

/// Which end of the trip a script validates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptRole {
    Origin,
    Destination,
}

/// Result of [`rewrite_city_declaration`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub script: String,
    pub modified: bool,
}

impl Rewrite {
    fn unchanged(script: &str) -> Self {
        Self { script: script.to_string(), modified: false }
    }
}

/// Classify a script by request name, then by content
///
/// The name wins when it mentions either end; origin wins over destination.
pub fn detect_role(script: &str, request_name: &str) -> Option<ScriptRole> {
    let name = request_name.to_uppercase();
    if name.contains("ORIGEM") || name.contains("ORIGIN") {
        return Some(ScriptRole::Origin);
    }
    if name.contains("DESTINO") || name.contains("DESTINATION") {
        return Some(ScriptRole::Destination);
    }

    let declares_city = CIDADE_DECLARATION_RE.is_match(script);
    if script.contains("SALVAR ORIGEM") || (declares_city && script.contains("origin")) {
        Some(ScriptRole::Origin)
    } else if script.contains("SALVAR DESTINO") || (declares_city && script.contains("destination")) {
        Some(ScriptRole::Destination)
    } else {
        None
    }
}

/// City to inject for a role: the `*Name` variable, else a non-numeric id
fn city_for(role: ScriptRole, lookup: &(impl VariableLookup + ?Sized)) -> Option<String> {
    let (name_var, id_var) = match role {
        ScriptRole::Origin => ("originName", "origin"),
        ScriptRole::Destination => ("destinationName", "destination"),
    };

    lookup.lookup(name_var)
        .filter(|v| !v.is_empty())
        .or_else(|| lookup.lookup(id_var).filter(|v| !v.is_empty() && !is_numeric(v)))
}

fn escape(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Point the first `cidade` declaration at the current parameter set's city
pub fn rewrite_city_declaration(
    script: &str,
    request_name: &str,
    lookup: &(impl VariableLookup + ?Sized),
) -> Rewrite {
    let Some(role) = detect_role(script, request_name) else {
        return Rewrite::unchanged(script);
    };
    let Some(city) = city_for(role, lookup) else {
        debug!(?role, "No city value available, script left unchanged");
        return Rewrite::unchanged(script);
    };
    if !CIDADE_DECLARATION_RE.is_match(script) {
        debug!(?role, "No cidade declaration found, script left unchanged");
        return Rewrite::unchanged(script);
    }

    let rewritten = CIDADE_DECLARATION_RE.replacen(script, 1, |caps: &Captures| {
        let quote = if caps.get(3).is_some() { '"' } else { '\'' };
        format!("{}{}{q}{}{q}", &caps[1], &caps[2], escape(&city, quote), q = quote)
    });

    debug!(?role, city = %city, "Rewrote cidade declaration");
    let modified = rewritten != script;
    Rewrite { script: rewritten.into_owned(), modified }
}
