use serde::{Deserialize, Serialize};

use crate::core::{DbError, Result};

/// Mapper configuration
///
/// Controls how resources coordinate with their repositories. Every field has
/// a default, so a partial JSON document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Repository used by models that do not name one
    pub default_repository: String,

    /// Register created resources in (and remove destroyed ones from) the
    /// repository's identity map
    pub identity_map: bool,

    /// Cascade save/reload to associated resources
    pub cascade: bool,

    /// Reject allow-listed updates that carry names outside the allow-list
    pub strict_mass_assignment: bool,
}

impl MapperConfig {
    pub fn new() -> Self {
        Self {
            default_repository: "default".to_string(),
            identity_map: true,
            cascade: true,
            strict_mass_assignment: false,
        }
    }

    /// Set the default repository name
    pub fn default_repository(mut self, name: &str) -> Self {
        self.default_repository = name.to_string();
        self
    }

    /// Enable or disable identity map coordination
    pub fn identity_map(mut self, enabled: bool) -> Self {
        self.identity_map = enabled;
        self
    }

    /// Enable or disable association cascades
    pub fn cascade(mut self, enabled: bool) -> Self {
        self.cascade = enabled;
        self
    }

    /// Enable or disable strict mass assignment
    pub fn strict_mass_assignment(mut self, enabled: bool) -> Self {
        self.strict_mass_assignment = enabled;
        self
    }

    /// Parse from a JSON document
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a mapper URL
    ///
    /// Format: "rustmemorm://repository?identity_map=true&cascade=false"
    ///
    /// # Examples
    ///
    /// ```
    /// # use rustmemorm::MapperConfig;
    /// let config = MapperConfig::from_url("rustmemorm://archive?cascade=false").unwrap();
    /// assert_eq!(config.default_repository, "archive");
    /// assert!(!config.cascade);
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let Some(rest) = url.strip_prefix("rustmemorm://") else {
            return Err(DbError::Configuration(
                "URL must start with 'rustmemorm://'".to_string(),
            ));
        };

        let (repository, params) = match rest.split_once('?') {
            Some((repository, params)) => (repository, params),
            None => (rest, ""),
        };

        let mut config = Self::new();
        if !repository.is_empty() {
            config = config.default_repository(repository);
        }

        for pair in params.split('&').filter(|pair| !pair.is_empty()) {
            let Some((key, raw)) = pair.split_once('=') else {
                return Err(DbError::Configuration(format!(
                    "Invalid parameter '{}'",
                    pair
                )));
            };
            let flag = parse_flag(key, raw)?;
            config = match key {
                "identity_map" => config.identity_map(flag),
                "cascade" => config.cascade(flag),
                "strict_mass_assignment" => config.strict_mass_assignment(flag),
                other => {
                    return Err(DbError::Configuration(format!(
                        "Unknown parameter '{}'",
                        other
                    )));
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Convert to mapper URL
    pub fn to_url(&self) -> String {
        format!(
            "rustmemorm://{}?identity_map={}&cascade={}&strict_mass_assignment={}",
            self.default_repository, self.identity_map, self.cascade, self.strict_mass_assignment
        )
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.default_repository.trim().is_empty() {
            return Err(DbError::Configuration(
                "default_repository cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(DbError::Configuration(format!(
            "Parameter '{}' expects a boolean, got '{}'",
            key, raw
        ))),
    }
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self::new()
    }
}
