use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use spec_core::ParamsConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment prefix for overrides, e.g. `RECORDS__QUERY__MAX_PAGE_SIZE=20`.
pub const ENV_PREFIX: &str = "RECORDS__";

/// Application configuration: logging, query parameter limits and the dataset.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Base directory for relative paths (log files, dataset). Empty means
    /// the current directory.
    #[serde(default)]
    pub home_dir: String,
    /// Logging configuration (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
    /// Page-size defaults applied to incoming query parameters.
    #[serde(default)]
    pub query: ParamsConfig,
    #[serde(default)]
    pub data: DataConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    /// JSON dataset file (visitors, visits, employees, orders).
    pub dataset: Option<String>,
}

/// Logging configuration - maps subsystem names to their logging settings.
/// Key "default" is the catch-all for logs that don't match explicit subsystems.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    pub console_level: String, // "info", "debug", "error", "off"
    #[serde(default)]
    pub file: String, // "logs/records.log"
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_backups: Option<usize>, // How many files to keep
    #[serde(default)]
    pub max_size_mb: Option<u64>, // Max size of the file in MB
}

/// Create a default logging configuration.
pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        "default".to_string(),
        Section {
            console_level: "warn".to_string(),
            file: String::new(),
            file_level: "debug".to_string(),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            home_dir: String::new(),
            logging: Some(default_logging_config()),
            query: ParamsConfig::default(),
            data: DataConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration with layered loading: defaults → YAML file → environment variables.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        Self::load_layered_with_prefix(config_path, ENV_PREFIX)
    }

    fn load_layered_with_prefix<P: AsRef<Path>>(config_path: P, prefix: &str) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        let path = config_path.as_ref();
        if !path.is_file() {
            anyhow::bail!("config file not found: {}", path.display());
        }

        // Optional sections stay None unless YAML/ENV provide them.
        let base = AppConfig {
            logging: None,
            ..AppConfig::default()
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(prefix).split("__"));

        figment
            .extract()
            .with_context(|| format!("Failed to extract config from {}", path.display()))
    }

    /// Load configuration from file or fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => Ok(Self::default()),
        }
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Apply overrides from command line arguments.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(data) = &args.data {
            self.data.dataset = Some(data.clone());
        }

        // Set logging level based on verbose flags for "default" section.
        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut("default") {
            default_section.console_level = match args.verbose {
                0 => default_section.console_level.clone(), // keep
                1 => "info".to_string(),
                2 => "debug".to_string(),
                _ => "trace".to_string(),
            };
        }
    }

    /// Base directory relative paths are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        if self.home_dir.trim().is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(&self.home_dir)
        }
    }

    /// Dataset path resolved against [`Self::base_dir`], if one is configured.
    pub fn dataset_path(&self) -> Option<PathBuf> {
        self.data
            .dataset
            .as_deref()
            .map(|p| resolve_path(p, &self.base_dir()))
    }
}

/// Absolute paths are kept as-is; relative paths are joined with `base_dir`.
pub fn resolve_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

/// Command line arguments structure.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub data: Option<String>,
    pub print_config: bool,
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};
    use tempfile::tempdir;

    #[test]
    fn test_default_config_structure() {
        let config = AppConfig::default();

        assert_eq!(config.home_dir, "");
        assert_eq!(config.query.default_page_size, 8);
        assert_eq!(config.query.max_page_size, 50);
        assert!(config.data.dataset.is_none());

        let logging = config.logging.as_ref().unwrap();
        let default_section = &logging["default"];
        assert_eq!(default_section.console_level, "warn");
        assert_eq!(default_section.file, "");
    }

    #[test]
    fn test_load_layered_reads_sections() {
        let tmp = tempdir().unwrap();
        let cfg_path = tmp.path().join("cfg.yaml");

        let yaml = r#"
home_dir: "/srv/records"

query:
  default_page_size: 10
  max_page_size: 25

data:
  dataset: "data/records.json"

logging:
  default:
    console_level: debug
    file: "logs/records.log"
"#;
        fs::write(&cfg_path, yaml).unwrap();

        let config = AppConfig::load_layered(&cfg_path).unwrap();

        assert_eq!(config.query.default_page_size, 10);
        assert_eq!(config.query.max_page_size, 25);
        assert_eq!(
            config.dataset_path().unwrap(),
            PathBuf::from("/srv/records/data/records.json")
        );

        let logging = config.logging.as_ref().unwrap();
        let def = &logging["default"];
        assert_eq!(def.console_level, "debug");
        assert_eq!(def.file, "logs/records.log");
    }

    #[test]
    fn test_minimal_yaml_config() {
        let tmp = tempdir().unwrap();
        let cfg_path = tmp.path().join("cfg.yaml");
        fs::write(&cfg_path, "query:\n  max_page_size: 30\n").unwrap();

        let config = AppConfig::load_layered(&cfg_path).unwrap();

        // Missing keys fall back to defaults; optional sections stay None
        assert_eq!(config.query.max_page_size, 30);
        assert_eq!(config.query.default_page_size, 8);
        assert!(config.logging.is_none());
        assert!(config.data.dataset.is_none());
    }

    #[test]
    fn test_env_overrides_yaml() {
        let tmp = tempdir().unwrap();
        let cfg_path = tmp.path().join("cfg.yaml");
        fs::write(&cfg_path, "query:\n  max_page_size: 30\n").unwrap();

        // Unique prefix so parallel tests never observe it.
        env::set_var("RECORDS_ENV_TEST__QUERY__MAX_PAGE_SIZE", "12");
        let config =
            AppConfig::load_layered_with_prefix(&cfg_path, "RECORDS_ENV_TEST__").unwrap();
        env::remove_var("RECORDS_ENV_TEST__QUERY__MAX_PAGE_SIZE");

        assert_eq!(config.query.max_page_size, 12);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let tmp = tempdir().unwrap();
        let err = AppConfig::load_layered(tmp.path().join("nope.yaml")).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let tmp = tempdir().unwrap();
        let cfg_path = tmp.path().join("cfg.yaml");
        fs::write(&cfg_path, "server:\n  port: 1\n").unwrap();

        assert!(AppConfig::load_layered(&cfg_path).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();

        let args = CliArgs {
            data: Some("other.json".into()),
            verbose: 2,
            ..CliArgs::default()
        };

        config.apply_cli_overrides(&args);

        assert_eq!(config.data.dataset.as_deref(), Some("other.json"));
        let logging = config.logging.as_ref().unwrap();
        assert_eq!(logging["default"].console_level, "debug");
    }

    #[test]
    fn test_cli_verbose_levels_matrix() {
        for (verbose_level, expected_log_level) in
            [(0, "warn"), (1, "info"), (2, "debug"), (3, "trace"), (7, "trace")]
        {
            let mut config = AppConfig::default();
            let args = CliArgs {
                verbose: verbose_level,
                ..CliArgs::default()
            };

            config.apply_cli_overrides(&args);

            let logging = config.logging.as_ref().unwrap();
            assert_eq!(logging["default"].console_level, expected_log_level);
        }
    }

    #[test]
    fn test_to_yaml_roundtrip_basic() {
        let config = AppConfig::default();
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("query:"));
        assert!(yaml.contains("logging:"));

        let roundtrip: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(roundtrip.query, config.query);
    }
}
