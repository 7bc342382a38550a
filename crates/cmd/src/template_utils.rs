//! Tera expansion of configuration files.
//!
//! A configuration file is rendered as a template before it is parsed, so
//! roots and locations can come from `-v key=value` pairs or the environment:
//!
//! ```text
//! catalog:
//!   ncml_root:
//!     path: ncml
//!     location: "{{ env(name='NCML_ROOT', default='/srv/ncml') }}"
//!   data_root:
//!     path: data
//!     location: "{{ data_root }}"
//! ```

use anyhow::Result;
use std::collections::HashMap;
use tera::{Tera, Value};

/// Render `yaml_content` with `variables` and the `env` function.
pub fn expand_yaml_template(
    yaml_content: &str,
    variables: &HashMap<String, String>,
) -> Result<String> {
    let mut tera = Tera::default();
    tera.register_function("env", env_function);

    let mut context = tera::Context::new();
    for (key, value) in variables {
        context.insert(key, value);
    }

    tera.render_str(yaml_content, &context).map_err(|e| {
        let mut parts = vec![format!("Configuration template failed: {}", e)];
        parts.extend(collect_error_chain(&e).into_iter().skip(1).map(|m| format!("  → {}", m)));
        if variables.is_empty() {
            parts.push("No template variables provided (use -v key=value to provide)".to_string());
        } else {
            let mut names: Vec<&String> = variables.keys().collect();
            names.sort();
            parts.push(format!("Available variables: {:?}", names));
        }
        anyhow::anyhow!("{}", parts.join("\n"))
    })
}

fn collect_error_chain(err: &dyn std::error::Error) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut source = err.source();
    while let Some(err) = source {
        chain.push(err.to_string());
        source = err.source();
    }
    chain
}

/// `{{ env(name="VAR") }}`, or `{{ env(name="VAR", default="x") }}`.
fn env_function(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let var_name = args
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| tera::Error::msg("env function requires 'name' parameter"))?;
    let default_value = args.get("default").and_then(|v| v.as_str());

    match std::env::var(var_name) {
        Ok(value) => Ok(Value::String(value)),
        Err(std::env::VarError::NotPresent) => default_value
            .map(|d| Value::String(d.to_string()))
            .ok_or_else(|| {
                tera::Error::msg(format!(
                    "Environment variable '{}' not set and no default provided",
                    var_name
                ))
            }),
        Err(e) => Err(tera::Error::msg(format!(
            "Failed to read environment variable '{}': {}",
            var_name, e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_variables() {
        let yaml = "catalog:\n  name: \"{{ name }}\"\n";
        let vars = HashMap::from([("name".to_string(), "cmip5".to_string())]);
        let out = expand_yaml_template(yaml, &vars).expect("expands");
        assert_eq!(out, "catalog:\n  name: \"cmip5\"\n");
    }

    #[test]
    fn test_env_default() {
        let yaml = "location: \"{{ env(name='TDSPU_SURELY_UNSET_VAR', default='/srv/data') }}\"";
        let out = expand_yaml_template(yaml, &HashMap::new()).expect("expands");
        assert_eq!(out, "location: \"/srv/data\"");
    }

    #[test]
    fn test_env_missing_is_error() {
        let yaml = "location: \"{{ env(name='TDSPU_SURELY_UNSET_VAR') }}\"";
        let err = expand_yaml_template(yaml, &HashMap::new()).expect_err("unset");
        let msg = format!("{:#}", err);
        assert!(msg.contains("TDSPU_SURELY_UNSET_VAR"), "{msg}");
        assert!(msg.contains("use -v key=value"), "{msg}");
    }

    #[test]
    fn test_plain_yaml_unchanged() {
        let yaml = "drs: [project, model, variable]\nconcurrency: 4\n";
        assert_eq!(expand_yaml_template(yaml, &HashMap::new()).expect("expands"), yaml);
    }

    #[test]
    fn test_missing_variable_lists_available() {
        let vars = HashMap::from([("root".to_string(), "/data".to_string())]);
        let err = expand_yaml_template("x: {{ nope }}", &vars).expect_err("undefined");
        assert!(format!("{:#}", err).contains("Available variables: [\"root\"]"));
    }
}
