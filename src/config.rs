use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct MutationConfig {
    /// Operator names; empty runs every registered operator.
    #[serde(default)]
    pub operators: Vec<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub pretty: bool,
    /// Generate at most this many mutants per operator, picked at random.
    pub sample: Option<usize>,
    pub seed: Option<u64>,
}

pub fn default_output_dir() -> PathBuf {
    PathBuf::from("./mutants")
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            operators: Vec::new(),
            output_dir: default_output_dir(),
            pretty: false,
            sample: None,
            seed: None,
        }
    }
}

/// Values given on the command line; set fields win over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub operators: Vec<String>,
    pub output_dir: Option<PathBuf>,
    pub pretty: bool,
    pub sample: Option<usize>,
    pub seed: Option<u64>,
}

impl MutationConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content, path)
    }

    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_overrides(mut self, cli: ConfigOverrides) -> Self {
        if !cli.operators.is_empty() {
            self.operators = cli.operators;
        }
        if let Some(dir) = cli.output_dir {
            self.output_dir = dir;
        }
        self.pretty |= cli.pretty;
        self.sample = cli.sample.or(self.sample);
        self.seed = cli.seed.or(self.seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_kebab_case_fields() {
        let cfg = MutationConfig::from_toml(
            r#"
            operators = ["InAx1-Operator", "AxDCT-Operator"]
            output-dir = "out"
            sample = 3
            seed = 9
            "#,
            Path::new("mutation.toml"),
        )
        .unwrap();
        assert_eq!(cfg.operators, ["InAx1-Operator", "AxDCT-Operator"]);
        assert_eq!(cfg.output_dir, PathBuf::from("out"));
        assert_eq!(cfg.sample, Some(3));
        assert!(!cfg.pretty);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = MutationConfig::from_toml("threads = 4", Path::new("m.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = MutationConfig::from_toml("", Path::new("m.toml")).unwrap();
        assert_eq!(cfg, MutationConfig::default());
    }

    #[test]
    fn command_line_wins() {
        let file = MutationConfig {
            operators: vec!["InAx1-Operator".into()],
            seed: Some(1),
            sample: Some(2),
            ..Default::default()
        };
        let merged = file.with_overrides(ConfigOverrides {
            output_dir: Some("elsewhere".into()),
            seed: Some(5),
            ..Default::default()
        });
        assert_eq!(merged.operators, ["InAx1-Operator"]);
        assert_eq!(merged.output_dir, PathBuf::from("elsewhere"));
        assert_eq!(merged.seed, Some(5));
        assert_eq!(merged.sample, Some(2));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MutationConfig::load_from_file(&dir.path().join("none.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
