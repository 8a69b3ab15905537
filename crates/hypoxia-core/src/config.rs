//! Configuration loading and typed config sections for the hypoxia hazard.
//!
//! The host keeps one YAML document. Each component reads its own section
//! out of it by dotted path (`caverns.hypoxia`,
//! `integration.placeholders.hypoxia-chance`), so sections can be added or
//! omitted independently. A missing file, a missing section, or a missing
//! key all fall back to the defaults below.

use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_yml::Value;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A section was present but did not match its expected shape.
    #[error("invalid config section `{path}`: {source}")]
    Section {
        /// Dotted path of the offending section.
        path: &'static str,
        /// The underlying deserialization error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// A typed configuration section living at a fixed dotted path.
pub trait Section: DeserializeOwned + Default {
    /// Dotted path of the section inside the document, e.g. `caverns.hypoxia`.
    const PATH: &'static str;
}

/// Raw configuration document.
///
/// Holds the parsed YAML tree; typed sections are extracted on demand with
/// [`Configuration::section`]. Rebuilt wholesale on every reload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    root: Value,
}

impl Configuration {
    /// Load the document from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse the document from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_yml::from_str(yaml)?;
        Ok(Self { root })
    }

    /// Look up a raw value by dotted path.
    pub fn value(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.root, |node, key| node.get(key))
    }

    /// Deserialize the section `T` lives at, or its default when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Section`] if the section exists but has the
    /// wrong shape (for example a string where a number is expected).
    pub fn section<T: Section>(&self) -> Result<T, ConfigError> {
        match self.value(T::PATH) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => serde_yml::from_value(value.clone()).map_err(|source| {
                ConfigError::Section {
                    path: T::PATH,
                    source,
                }
            }),
        }
    }
}

/// Hazard settings under `caverns.hypoxia`.
///
/// Chances are written as percentages (0-100) and converted to
/// probabilities when the hazard reloads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HypoxiaConfig {
    /// Explicit on/off switch.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Percent chance that the hazard attempts to trigger at all per tick.
    #[serde(default = "default_try_chance")]
    pub try_chance: f64,

    /// Upper bound of the depth/load chance, in percent.
    #[serde(default = "default_chance_max")]
    pub chance_max: f64,

    /// Lower bound of the depth/load chance, in percent.
    #[serde(default = "default_chance_min")]
    pub chance_min: f64,

    /// Depth ceiling: players above this Y are never affected.
    #[serde(default = "default_y_max")]
    pub y_max: i32,

    /// Show messages on the action bar instead of chat.
    #[serde(default = "default_true")]
    pub actionbar: bool,

    /// Message templates; one is picked at random per affliction.
    /// `%player` is replaced with the player's name, `&` color codes are
    /// translated.
    #[serde(default)]
    pub messages: Vec<String>,

    /// Worlds the hazard runs in. `"*"` means every world.
    #[serde(default)]
    pub worlds: Vec<String>,

    /// Chance expression over the variables `depth` and `inventory`.
    #[serde(default = "default_chance_formula")]
    pub chance_formula: String,
}

impl Default for HypoxiaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            try_chance: default_try_chance(),
            chance_max: default_chance_max(),
            chance_min: default_chance_min(),
            y_max: default_y_max(),
            actionbar: true,
            messages: Vec::new(),
            worlds: Vec::new(),
            chance_formula: default_chance_formula(),
        }
    }
}

impl Section for HypoxiaConfig {
    const PATH: &'static str = "caverns.hypoxia";
}

/// Live chance placeholder settings under
/// `integration.placeholders.hypoxia-chance`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChancePlaceholderConfig {
    /// Whether the chance cache is maintained at all.
    #[serde(default)]
    pub enabled: bool,

    /// Report the compounded try-gate and severity-gate chance instead of
    /// the severity chance alone.
    #[serde(default = "default_true")]
    pub respect_try_chance: bool,

    /// Period of the independent sampler in game ticks (0 or less = off).
    #[serde(default = "default_schedule")]
    pub schedule: i64,
}

impl ChancePlaceholderConfig {
    /// Sampler period in ticks, or `None` when periodic sampling is off.
    pub fn period(&self) -> Option<u32> {
        u32::try_from(self.schedule).ok().filter(|ticks| *ticks > 0)
    }
}

impl Default for ChancePlaceholderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            respect_try_chance: true,
            schedule: default_schedule(),
        }
    }
}

impl Section for ChancePlaceholderConfig {
    const PATH: &'static str = "integration.placeholders.hypoxia-chance";
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_true() -> bool {
    true
}

const fn default_try_chance() -> f64 {
    60.0
}

const fn default_chance_max() -> f64 {
    90.0
}

const fn default_chance_min() -> f64 {
    10.0
}

const fn default_y_max() -> i32 {
    42
}

fn default_chance_formula() -> String {
    "depth*inventory".to_owned()
}

const fn default_schedule() -> i64 {
    200
}
