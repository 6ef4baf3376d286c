use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Mapper settings, parsed from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapperConfig {
    /// Label attached to every log event of the mapper.
    #[serde(default = "default_name")]
    pub name: String,

    /// Log every field a registration can never copy at `warn` instead of
    /// `debug`. Mapping results are the same either way.
    #[serde(default)]
    pub strict: bool,
}

fn default_name() -> String {
    "default".to_string()
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            strict: false,
        }
    }
}

impl MapperConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = MapperConfig::parse("").unwrap();
        assert_eq!(config, MapperConfig::default());
        assert_eq!(config.name, "default");
        assert!(!config.strict);
    }

    #[test]
    fn parses_all_keys() {
        let config = MapperConfig::parse("name = \"api\"\nstrict = true\n").unwrap();
        assert_eq!(config.name, "api");
        assert!(config.strict);
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = MapperConfig::parse("stirct = true").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("stirct"));
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(MapperConfig::parse("strict = \"yes\"").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "strict = true").unwrap();

        let config = MapperConfig::load(file.path()).unwrap();
        assert!(config.strict);
        assert_eq!(config.name, "default");
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = MapperConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }
}
