//! Configuration for the entity cache.
use crate::compute::validation::DEFAULT_MAX_RESULTS;
use serde::de::Error;

/// Cache configuration
///
/// ```rust
/// use locus::Config;
///
/// let config = Config::from_json(r#"{ "max_results": 50 }"#)?;
/// assert_eq!(config.max_results, 50);
/// assert!(config.rebuild_stale_ratio.is_none());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Largest `k` accepted by nearest-neighbor queries.
    #[serde(default = "Config::default_max_results")]
    pub max_results: usize,

    /// Rebuild the tree after a write once stale nodes exceed this share of all
    /// nodes. `None` disables automatic rebuilds.
    #[serde(default)]
    pub rebuild_stale_ratio: Option<f64>,

    /// Minimum number of stale nodes before an automatic rebuild is considered.
    #[serde(default = "Config::default_rebuild_min_stale")]
    pub rebuild_min_stale: usize,
}

impl Config {
    const fn default_max_results() -> usize {
        DEFAULT_MAX_RESULTS
    }

    const fn default_rebuild_min_stale() -> usize {
        1024
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        assert!(max_results > 0, "Max results must be greater than zero");

        if max_results > 10_000 {
            log::warn!(
                "max_results of {} is very large; each query may hold that many candidates",
                max_results
            );
        }

        self.max_results = max_results;
        self
    }

    pub fn with_auto_rebuild(mut self, stale_ratio: f64, min_stale: usize) -> Self {
        assert!(
            stale_ratio > 0.0 && stale_ratio < 1.0,
            "Stale ratio must be within (0.0, 1.0)"
        );
        self.rebuild_stale_ratio = Some(stale_ratio);
        self.rebuild_min_stale = min_stale;
        self
    }

    pub fn without_auto_rebuild(mut self) -> Self {
        self.rebuild_stale_ratio = None;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_results == 0 {
            return Err("Max results must be greater than zero".to_string());
        }

        if let Some(ratio) = self.rebuild_stale_ratio
            && !(ratio > 0.0 && ratio < 1.0)
        {
            return Err(format!("Stale ratio must be within (0.0, 1.0), got {}", ratio));
        }

        Ok(())
    }

    /// True when `stale` of `total` nodes warrants an automatic rebuild.
    pub(crate) fn should_rebuild(&self, stale: usize, total: usize) -> bool {
        match self.rebuild_stale_ratio {
            Some(ratio) => stale >= self.rebuild_min_stale && stale as f64 > ratio * total as f64,
            None => false,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_results: Self::default_max_results(),
            rebuild_stale_ratio: None,
            rebuild_min_stale: Self::default_rebuild_min_stale(),
        }
    }
}
