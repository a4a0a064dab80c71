//! Environment variable resolver
//!
//! Handles `${VAR}` and `${VAR:-default}` in configuration values. `$${VAR}`
//! is an escape that leaves a literal `${VAR}`.

use crate::{ConfigError, Result};
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

static VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\$?)\{([^}]+)\}").expect("variable pattern is valid"));

/// Context for resolving variables
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    /// Values taking precedence over the process environment
    pub env_vars: HashMap<String, String>,
    /// Whether to fall back to the process environment
    pub use_process_env: bool,
}

impl ResolutionContext {
    /// Context reading the process environment
    pub fn new() -> Self {
        Self {
            env_vars: HashMap::new(),
            use_process_env: true,
        }
    }

    /// Context seeing only the given variables
    pub fn isolated<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            env_vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            use_process_env: false,
        }
    }

    /// Add or update a variable
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env_vars.insert(key.into(), value.into());
    }

    fn lookup(&self, name: &str) -> Option<String> {
        self.env_vars.get(name).cloned().or_else(|| {
            if self.use_process_env {
                std::env::var(name).ok()
            } else {
                None
            }
        })
    }
}

/// Resolve all variables in a string.
///
/// Every missing variable without a default is reported at once.
pub fn resolve_string(input: &str, context: &ResolutionContext) -> Result<String> {
    let mut missing = BTreeSet::new();
    let resolved = resolve_collecting(input, context, &mut missing);
    missing_to_result(missing)?;
    Ok(resolved)
}

/// Resolve `input`, recording variables that have neither a value nor a
/// default in `missing` (they resolve to nothing)
pub(crate) fn resolve_collecting(
    input: &str,
    context: &ResolutionContext,
    missing: &mut BTreeSet<String>,
) -> String {
    VAR_RE
        .replace_all(input, |cap: &regex::Captures<'_>| {
            if !cap[1].is_empty() {
                return format!("${{{}}}", &cap[2]);
            }
            let (name, default) = split_default(&cap[2]);
            match context.lookup(name) {
                Some(value) => value,
                None => match default {
                    Some(default) => default.to_string(),
                    None => {
                        missing.insert(name.to_string());
                        String::new()
                    }
                },
            }
        })
        .into_owned()
}

pub(crate) fn missing_to_result(missing: BTreeSet<String>) -> Result<()> {
    if missing.is_empty() {
        return Ok(());
    }
    Err(ConfigError::EnvVarNotFound(
        missing.into_iter().collect::<Vec<_>>().join(", "),
    ))
}

/// Names of variables referenced without a default
pub fn required_variables(input: &str) -> BTreeSet<String> {
    VAR_RE
        .captures_iter(input)
        .filter(|cap| cap[1].is_empty())
        .filter_map(|cap| match split_default(&cap[2]) {
            (name, None) => Some(name.to_string()),
            (_, Some(_)) => None,
        })
        .collect()
}

fn split_default(expr: &str) -> (&str, Option<&str>) {
    match expr.find(":-") {
        Some(pos) => (&expr[..pos], Some(&expr[pos + 2..])),
        None => (expr, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_env_vars() {
        let context = ResolutionContext::isolated([("IMAGE", "debian:bookworm")]);

        assert_eq!(
            resolve_string("image: ${IMAGE}", &context).unwrap(),
            "image: debian:bookworm"
        );
        assert_eq!(
            resolve_string("tag: ${TAG:-latest}", &context).unwrap(),
            "tag: latest"
        );
        assert_eq!(resolve_string("no vars", &context).unwrap(), "no vars");
    }

    #[test]
    fn test_missing_vars_are_all_reported() {
        let context = ResolutionContext::isolated(Vec::<(String, String)>::new());
        let err = resolve_string("${B} ${A} ${B}", &context).unwrap_err();
        match err {
            ConfigError::EnvVarNotFound(names) => assert_eq!(names, "A, B"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_context_overrides_process_env() {
        let mut context = ResolutionContext::new();
        context.set_env("PATH", "overridden");
        assert_eq!(resolve_string("${PATH}", &context).unwrap(), "overridden");
    }

    #[test]
    fn test_escaped_reference_is_left_literal() {
        let context = ResolutionContext::isolated([("ARG", "set")]);
        assert_eq!(
            resolve_string("RUN echo $${ARG} ${ARG}", &context).unwrap(),
            "RUN echo ${ARG} set"
        );
        assert_eq!(
            resolve_string("$${UNSET}", &ResolutionContext::isolated(Vec::<(String, String)>::new()))
                .unwrap(),
            "${UNSET}"
        );
    }

    #[test]
    fn test_required_variables() {
        let vars = required_variables("${A} ${B:-x} ${C} $${D}");
        assert_eq!(vars.into_iter().collect::<Vec<_>>(), ["A", "C"]);
    }
}
