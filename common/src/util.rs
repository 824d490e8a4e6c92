use std::{collections::BTreeMap, fmt::Display};

use eyre::{Result, bail};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// A value substituted into `{name}` placeholders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Display for TemplateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateValue::Int(x) => write!(f, "{x}"),
            TemplateValue::Float(x) => write!(f, "{x}"),
            TemplateValue::Text(x) => f.write_str(x),
        }
    }
}

impl From<i64> for TemplateValue {
    fn from(value: i64) -> Self {
        TemplateValue::Int(value)
    }
}

impl From<f64> for TemplateValue {
    fn from(value: f64) -> Self {
        TemplateValue::Float(value)
    }
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        TemplateValue::Text(value.to_owned())
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        TemplateValue::Text(value)
    }
}

pub type Vars = BTreeMap<String, TemplateValue>;

/// Copy of `vars` with `name` set to `value`
pub fn with_var<V: Into<TemplateValue>>(vars: &Vars, name: &str, value: V) -> Vars {
    let mut vars = vars.clone();
    vars.insert(name.to_owned(), value.into());
    vars
}

/// Replaces every `{name}` in `template` with its value from `vars`.
/// `{{` and `}}` are not special; placeholders must be identifiers.
pub fn fill_template(template: &str, vars: &Vars) -> Result<String> {
    let placeholder = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}")?;
    let mut missing = Vec::new();
    let filled = placeholder.replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
        Some(value) => value.to_string(),
        None => {
            missing.push(caps[1].to_owned());
            String::new()
        }
    });
    if !missing.is_empty() {
        bail!(
            "Unknown template variables {} in {template:?}",
            missing.join(", ")
        );
    }
    Ok(filled.into_owned())
}
