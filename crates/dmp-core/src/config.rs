//! Primitive configuration.
//!
//! Every tuning constant of a movement primitive lives here with an explicit
//! default. Nothing in the engine reads module-level mutable state; a
//! [`DmpConfig`] is passed at construction and validated once.
//!
//! Configuration can be loaded from TOML and overridden through `DMP_*`
//! environment variables:
//!
//! ```toml
//! n_dmps = 2
//! n_bfs = 50
//! dt = 0.01
//! spring_constant = 25.0
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

/// Tuning constants of a single movement primitive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DmpConfig {
    /// Number of independent trajectory dimensions
    pub n_dmps: usize,
    /// Number of basis functions per dimension
    pub n_bfs: usize,
    /// Integration step (seconds)
    pub dt: f64,
    /// Spring constant `ay` of the transformation system
    pub spring_constant: f64,
    /// Damping constant `by`; `None` means `ay / 4` (critical damping)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damping_constant: Option<f64>,
    /// Decay rate `ax` of the discrete canonical system
    pub decay_rate: f64,
    /// Phase velocity of the rhythmic canonical system (rad/s)
    pub angular_rate: f64,
    /// Run time of one rollout; `None` means the pattern default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_time: Option<f64>,
    /// Temporal scaling; values above 1 slow execution down
    pub tau: f64,
    /// Guard added to regression and forcing-term denominators
    pub regression_epsilon: f64,
    /// Start/goal coincidence tolerance, also used as the goal nudge
    pub offset_epsilon: f64,
    /// Discrete phase value below which a rollout is considered done
    pub done_threshold: f64,
    /// Start position per dimension (defaults to 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y0: Option<Vec<f64>>,
    /// Goal per dimension (defaults to 1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<Vec<f64>>,
}

impl Default for DmpConfig {
    fn default() -> Self {
        Self {
            n_dmps: 1,
            n_bfs: 10,
            dt: 0.01,
            spring_constant: 25.0,
            damping_constant: None,
            decay_rate: 1.0,
            angular_rate: 1.0,
            run_time: None,
            tau: 1.0,
            regression_epsilon: 1e-10,
            offset_epsilon: 1e-4,
            done_threshold: 1e-3,
            y0: None,
            goal: None,
        }
    }
}

impl DmpConfig {
    pub fn new(n_dmps: usize, n_bfs: usize) -> Self {
        Self {
            n_dmps,
            n_bfs,
            ..Default::default()
        }
    }

    /// Damping constant, falling back to critical damping `ay / 4`.
    pub fn damping(&self) -> f64 {
        self.damping_constant
            .unwrap_or(self.spring_constant / 4.0)
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: DmpConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    /// Variables are prefixed with `DMP_`, e.g. `DMP_N_BFS=100`.
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DMP_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_value("DMP_N_BFS")? {
            self.n_bfs = v;
        }
        if let Some(v) = env_value("DMP_DT")? {
            self.dt = v;
        }
        if let Some(v) = env_value("DMP_SPRING_CONSTANT")? {
            self.spring_constant = v;
        }
        if let Some(v) = env_value("DMP_DAMPING_CONSTANT")? {
            self.damping_constant = Some(v);
        }
        if let Some(v) = env_value("DMP_DECAY_RATE")? {
            self.decay_rate = v;
        }
        if let Some(v) = env_value("DMP_ANGULAR_RATE")? {
            self.angular_rate = v;
        }
        if let Some(v) = env_value("DMP_TAU")? {
            self.tau = v;
        }
        if let Some(v) = env_value("DMP_RUN_TIME")? {
            self.run_time = Some(v);
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_dmps == 0 {
            return Err(ConfigError::Validation("n_dmps must be > 0".to_string()));
        }
        if self.n_bfs == 0 {
            return Err(ConfigError::Validation("n_bfs must be > 0".to_string()));
        }
        positive("dt", self.dt)?;
        positive("spring_constant", self.spring_constant)?;
        positive("decay_rate", self.decay_rate)?;
        positive("angular_rate", self.angular_rate)?;
        positive("tau", self.tau)?;
        positive("regression_epsilon", self.regression_epsilon)?;
        positive("offset_epsilon", self.offset_epsilon)?;
        positive("done_threshold", self.done_threshold)?;
        if let Some(by) = self.damping_constant {
            if !by.is_finite() || by < 0.0 {
                return Err(ConfigError::Validation(
                    "damping_constant must be finite and non-negative".to_string(),
                ));
            }
        }
        if let Some(run_time) = self.run_time {
            positive("run_time", run_time)?;
            if self.dt >= run_time {
                return Err(ConfigError::Validation(
                    "dt must be smaller than run_time".to_string(),
                ));
            }
        }
        for (name, values) in [("y0", &self.y0), ("goal", &self.goal)] {
            if let Some(values) = values {
                if values.len() != self.n_dmps {
                    return Err(ConfigError::Validation(format!(
                        "{} must have exactly n_dmps = {} elements (got {})",
                        name,
                        self.n_dmps,
                        values.len()
                    )));
                }
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(ConfigError::Validation(format!(
                        "{} must contain finite values",
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Export configuration to TOML string
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self
            .to_toml_string()
            .map_err(|e| ConfigError::Validation(format!("TOML serialization error: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be finite and positive (got {})",
            name, value
        )));
    }
    Ok(())
}

fn env_value<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Validation(format!("Invalid {}", key))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // the process environment is shared by every test thread
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config_valid() {
        let config = DmpConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.damping(), 6.25);
    }

    #[test]
    fn test_config_validation_counts() {
        let mut config = DmpConfig::default();
        config.n_dmps = 0;
        assert!(config.validate().is_err());

        config.n_dmps = 2;
        config.n_bfs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rates() {
        let mut config = DmpConfig::default();
        config.dt = 0.0;
        assert!(config.validate().is_err());

        config.dt = 0.01;
        config.tau = f64::NAN;
        assert!(config.validate().is_err());

        config.tau = 1.0;
        config.run_time = Some(0.005);
        assert!(config.validate().is_err());

        config.run_time = Some(2.0);
        config.damping_constant = Some(-1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_vectors() {
        let mut config = DmpConfig::new(2, 10);
        config.y0 = Some(vec![0.0]);
        assert!(config.validate().is_err());

        config.y0 = Some(vec![0.0, 1.0]);
        config.goal = Some(vec![1.0, f64::INFINITY]);
        assert!(config.validate().is_err());

        config.goal = Some(vec![1.0, 2.0]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml_string() {
        let toml_str = r#"
            n_dmps = 2
            n_bfs = 50
            dt = 0.005
            spring_constant = 30.0
            goal = [1.0, -1.0]
        "#;
        let config: DmpConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.n_dmps, 2);
        assert_eq!(config.n_bfs, 50);
        assert_eq!(config.damping(), 7.5);
        assert_eq!(config.tau, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_roundtrip() {
        let mut config = DmpConfig::new(3, 25);
        config.run_time = Some(2.0);
        config.y0 = Some(vec![0.0, 0.5, 1.0]);

        let file = NamedTempFile::new().unwrap();
        config.save_to_file(file.path()).unwrap();
        let loaded = DmpConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_from_invalid_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "n_dmps = 0\n").unwrap();
        assert!(matches!(
            DmpConfig::from_file(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_config_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var("DMP_N_BFS", "42");
        env::set_var("DMP_TAU", "2.5");
        env::set_var("DMP_DAMPING_CONSTANT", "5.0");

        let mut config = DmpConfig::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.n_bfs, 42);
        assert_eq!(config.tau, 2.5);
        assert_eq!(config.damping(), 5.0);

        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "n_dmps = 3\nn_bfs = 7\n").unwrap();
        let loaded = DmpConfig::from_file_with_env(file.path()).unwrap();
        assert_eq!(loaded.n_dmps, 3);
        assert_eq!(loaded.n_bfs, 42);
        assert_eq!(loaded.tau, 2.5);

        env::remove_var("DMP_N_BFS");
        env::remove_var("DMP_TAU");
        env::remove_var("DMP_DAMPING_CONSTANT");
    }

    #[test]
    fn test_invalid_env_var_handling() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var("DMP_TAU", "fast");

        let mut config = DmpConfig::default();
        let result = config.apply_env_overrides();
        env::remove_var("DMP_TAU");

        assert!(matches!(result, Err(ConfigError::Validation(_))));
        assert_eq!(config.tau, 1.0);
    }
}
