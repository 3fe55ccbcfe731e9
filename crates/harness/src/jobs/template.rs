//! Rendering of capability config templates.
//!
//! Templates reference values with `{{.Key}}`. Every placeholder must resolve; a rendered config
//! that still contains one is rejected.

use cre_types::ConfigMap;
use toml::Value;

/// Template rendering errors.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// placeholders without a value
    #[error("{flag} template has unresolved placeholders: {}", .keys.join(", "))]
    Unresolved {
        /// capability flag of the template
        flag: String,
        /// keys without a value
        keys: Vec<String>,
    },
    /// `{{` without a matching `}}` or not of the form `{{.Key}}`
    #[error("{flag} template has a malformed placeholder at byte {offset}")]
    Malformed {
        /// capability flag of the template
        flag: String,
        /// byte offset of the opening braces
        offset: usize,
    },
}

/// Fill keys missing from `config` with `runtime` values. Configured values take precedence.
pub fn apply_runtime_values(mut config: ConfigMap, runtime: ConfigMap) -> ConfigMap {
    for (key, value) in runtime {
        config.entry(key).or_insert(value);
    }

    config
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Datetime(d) => d.to_string(),
        Value::Array(_) | Value::Table(_) => value.to_string(),
    }
}

/// Render `template` for capability `flag` with `values`.
pub fn render(flag: &str, template: &str, values: &ConfigMap) -> Result<String, Error> {
    let mut out = String::with_capacity(template.len());
    let mut missing = Vec::new();
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let open = offset + start;
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| Error::Malformed { flag: flag.to_string(), offset: open })?;

        let key = after[..end]
            .trim()
            .strip_prefix('.')
            .filter(|k| !k.is_empty() && !k.contains(char::is_whitespace))
            .ok_or_else(|| Error::Malformed { flag: flag.to_string(), offset: open })?;

        match values.get(key) {
            Some(value) => out.push_str(&format_value(value)),
            None => {
                if !missing.iter().any(|m| m == key) {
                    missing.push(key.to_string());
                }
            }
        }

        let consumed = start + 2 + end + 2;
        rest = &rest[consumed..];
        offset += consumed;
    }
    out.push_str(rest);

    if !missing.is_empty() {
        return Err(Error::Unresolved { flag: flag.to_string(), keys: missing });
    }

    Ok(out)
}
