//! Tool configuration for toolup.
//!
//! Tools are declared in a YAML file (default `tools.yaml`):
//!
//! ```yaml
//! tools:
//!   - name: yq
//!     version: v4.44.1
//!     arch: amd64
//!     url_pattern: https://github.com/mikefarah/yq/releases/download/{version}/yq_linux_{arch}.tar.gz
//!     executable: ./yq_linux_amd64
//! ```
//!
//! `name`, `version`, `url_pattern` and `executable` are required. Any other
//! scalar key is kept and can be referenced from `url_pattern`. Numbers and
//! booleans are accepted wherever a string is expected, so `version: 1.7`
//! renders as `1.7`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

use crate::errors::ToolupError;
use crate::template::{self, TemplateError};

/// Parsed contents of the tools configuration file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Tools in installation order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tools: Vec<ToolDescriptor>,
}

impl Config {
    /// Reads and parses the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolupError::ConfigError`] if the file cannot be read or is
    /// not a valid tools configuration.
    pub fn load(path: &Path) -> Result<Self, ToolupError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ToolupError::config_error(path, format!("failed to read config file: {e}"))
        })?;
        let config = Self::parse(&content, path)?;
        tracing::debug!(path = %path.display(), tools = config.tools.len(), "Loaded config");
        Ok(config)
    }

    /// Parses configuration text. `path` is only used for error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ToolupError::ConfigError`] if the YAML is invalid.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ToolupError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| ToolupError::config_error(path, e.to_string()))
    }

    /// Returns the named tools in configuration order.
    ///
    /// An empty `names` selects every tool.
    ///
    /// # Errors
    ///
    /// Returns the first requested name that is not configured.
    pub fn select<'a>(&'a self, names: &[String]) -> Result<Vec<&'a ToolDescriptor>, String> {
        if let Some(unknown) = names
            .iter()
            .find(|n| !self.tools.iter().any(|t| &t.name == *n))
        {
            return Err(unknown.clone());
        }
        Ok(self
            .tools
            .iter()
            .filter(|t| names.is_empty() || names.contains(&t.name))
            .collect())
    }
}

/// One installable tool.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawToolDescriptor")]
pub struct ToolDescriptor {
    pub name: String,
    pub version: String,
    /// Download URL template, see [`crate::template`].
    pub url_pattern: String,
    /// Path of the executable inside the archive. Also used, verbatim, as the
    /// destination path below the bin directory.
    pub executable: String,
    /// Additional scalar fields available to the URL template.
    pub extra: BTreeMap<String, String>,
}

impl ToolDescriptor {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        url_pattern: impl Into<String>,
        executable: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            url_pattern: url_pattern.into(),
            executable: executable.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Adds an extra template field.
    #[cfg(test)]
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Looks up a field by name, for template rendering.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        match key {
            "name" => Some(&self.name),
            "version" => Some(&self.version),
            "url_pattern" => Some(&self.url_pattern),
            "executable" => Some(&self.executable),
            other => self.extra.get(other).map(String::as_str),
        }
    }

    /// Renders the download URL from `url_pattern` and this tool's fields.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] if the pattern references an unknown field
    /// or has unbalanced braces.
    pub fn download_url(&self) -> Result<String, TemplateError> {
        template::render(&self.url_pattern, |key| self.field(key))
    }
}

/// Wire shape of a tool entry before scalar normalisation.
#[derive(Deserialize)]
struct RawToolDescriptor {
    name: Value,
    version: Value,
    url_pattern: Value,
    executable: Value,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl TryFrom<RawToolDescriptor> for ToolDescriptor {
    type Error = String;

    fn try_from(raw: RawToolDescriptor) -> Result<Self, Self::Error> {
        let required = |key: &str, value: &Value| {
            scalar_to_string(value)
                .ok_or_else(|| format!("field `{key}` must be a string, number or boolean"))
        };

        Ok(Self {
            name: required("name", &raw.name)?,
            version: required("version", &raw.version)?,
            url_pattern: required("url_pattern", &raw.url_pattern)?,
            executable: required("executable", &raw.executable)?,
            extra: raw
                .extra
                .iter()
                .filter_map(|(k, v)| scalar_to_string(v).map(|s| (k.clone(), s)))
                .collect(),
        })
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ToolDescriptor>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<ToolDescriptor>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<Config, ToolupError> {
        Config::parse(yaml, Path::new("tools.yaml"))
    }

    #[test]
    fn parses_tools_in_order() {
        let config = parse(
            r"
tools:
  - name: yq
    version: v4.44.1
    url_pattern: https://example.com/yq/{version}/yq.tar.gz
    executable: yq_linux_amd64
  - name: jq
    version: '1.7'
    url_pattern: https://example.com/jq-{version}.zip
    executable: jq
",
        )
        .expect("Should parse");

        let names: Vec<_> = config.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["yq", "jq"]);
        assert_eq!(config.tools[1].version, "1.7");
        assert_eq!(config.tools[0].executable, "yq_linux_amd64");
    }

    #[test]
    fn numeric_and_boolean_scalars_become_strings() {
        let config = parse(
            r"
tools:
  - name: tool
    version: 1.7
    musl: true
    build: 42
    url_pattern: https://x/{version}/{build}/{musl}
    executable: tool
",
        )
        .expect("Should parse");

        let tool = &config.tools[0];
        assert_eq!(tool.version, "1.7");
        assert_eq!(tool.field("build"), Some("42"));
        assert_eq!(
            tool.download_url().expect("Should render"),
            "https://x/1.7/42/true"
        );
    }

    #[test]
    fn extra_fields_feed_the_template() {
        let config = parse(
            r"
tools:
  - name: rg
    version: 14.1.0
    arch: x86_64
    url_pattern: https://x/{name}-{version}-{arch}.tar.gz
    executable: rg
",
        )
        .expect("Should parse");

        assert_eq!(
            config.tools[0].download_url().expect("Should render"),
            "https://x/rg-14.1.0-x86_64.tar.gz"
        );
    }

    #[test]
    fn non_scalar_extras_are_ignored() {
        let config = parse(
            r"
tools:
  - name: rg
    version: '1'
    url_pattern: https://x/{name}
    executable: rg
    notes: [a, b]
",
        )
        .expect("Should parse");
        assert_eq!(config.tools[0].field("notes"), None);
    }

    #[test]
    fn missing_required_field_is_a_config_error() {
        let err = parse(
            r"
tools:
  - name: rg
    version: '1'
    url_pattern: https://x/{name}
",
        )
        .expect_err("Should fail");

        assert!(matches!(err, ToolupError::ConfigError { .. }));
        assert!(err.to_string().contains("executable"), "{err}");
    }

    #[test]
    fn nested_value_for_required_field_is_rejected() {
        let err = parse(
            r"
tools:
  - name: [a, b]
    version: '1'
    url_pattern: https://x
    executable: rg
",
        )
        .expect_err("Should fail");
        assert!(err.to_string().contains("field `name`"), "{err}");
    }

    #[test]
    fn missing_or_null_tools_is_empty() {
        assert!(parse("").expect("Should parse").tools.is_empty());
        assert!(parse("other: 1\n").expect("Should parse").tools.is_empty());
        assert!(parse("tools:\n").expect("Should parse").tools.is_empty());
    }

    #[test]
    fn invalid_yaml_is_a_config_error() {
        let err = parse("tools: [").expect_err("Should fail");
        assert!(matches!(err, ToolupError::ConfigError { .. }));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let path = dir.path().join("tools.yaml");
        let err = Config::load(&path).expect_err("Should fail");
        assert!(err.to_string().contains("failed to read config file"), "{err}");
    }

    #[test]
    fn select_keeps_config_order() {
        let config = Config {
            tools: vec![
                ToolDescriptor::new("a", "1", "u", "a"),
                ToolDescriptor::new("b", "1", "u", "b"),
                ToolDescriptor::new("c", "1", "u", "c"),
            ],
        };

        let picked = config
            .select(&["c".to_string(), "a".to_string()])
            .expect("Should select");
        let names: Vec<_> = picked.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);

        assert_eq!(config.select(&[]).expect("Should select").len(), 3);
        assert_eq!(
            config.select(&["zz".to_string()]).expect_err("Should fail"),
            "zz"
        );
    }

    #[test]
    fn builtin_fields_are_available() {
        let tool = ToolDescriptor::new("t", "2", "{executable}@{name}", "bin/t").with_field("os", "linux");
        assert_eq!(tool.field("url_pattern"), Some("{executable}@{name}"));
        assert_eq!(tool.field("os"), Some("linux"));
        assert_eq!(tool.download_url().expect("Should render"), "bin/t@t");
    }
}
