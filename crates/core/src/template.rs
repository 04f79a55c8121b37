//! Prompt Templates
//!
//! Templates are plain text with `{{name}}` placeholders. Rendering is pure
//! substitution from a variables map; there is no control flow.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Variables substituted into a template, keyed by placeholder name.
pub type PromptVars = BTreeMap<String, String>;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder pattern is valid"))
}

/// A named prompt template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Short identifier used in logs and usage records
    pub name: String,
    /// Template body with `{{name}}` placeholders
    pub content: String,
}

impl PromptTemplate {
    /// Create a new template
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Distinct placeholder names in order of first appearance
    pub fn variables(&self) -> Vec<String> {
        let mut vars: Vec<String> = Vec::new();
        for caps in placeholder_regex().captures_iter(&self.content) {
            let name = caps[1].to_string();
            if !vars.contains(&name) {
                vars.push(name);
            }
        }
        vars
    }

    /// Substitute every placeholder from `vars`.
    ///
    /// Fails if any placeholder has no value. Extra variables are ignored.
    pub fn render(&self, vars: &PromptVars) -> CoreResult<String> {
        let missing: Vec<String> = self
            .variables()
            .into_iter()
            .filter(|v| !vars.contains_key(v))
            .collect();

        if !missing.is_empty() {
            return Err(CoreError::template(format!(
                "template '{}' is missing variables: {}",
                self.name,
                missing.join(", ")
            )));
        }

        let rendered = placeholder_regex().replace_all(&self.content, |caps: &regex::Captures| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        });

        Ok(rendered.into_owned())
    }
}

/// Build a `PromptVars` map from `(name, value)` pairs.
pub fn prompt_vars<I, K, V>(pairs: I) -> PromptVars
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
