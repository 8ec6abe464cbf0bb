//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/sortree/sortree.toml`
//! 3. Local config: an explicit file passed by the caller
//! 4. Environment variables: `SORTREE_*` prefix

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::application::{ApplicationError, ApplicationResult};

/// Horizontal layout of rows; right-to-left mirrors pointer offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowDirection {
    #[default]
    Ltr,
    Rtl,
}

impl fmt::Display for RowDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowDirection::Ltr => write!(f, "ltr"),
            RowDirection::Rtl => write!(f, "rtl"),
        }
    }
}

impl FromStr for RowDirection {
    type Err = ApplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ltr" => Ok(RowDirection::Ltr),
            "rtl" => Ok(RowDirection::Rtl),
            other => Err(ApplicationError::Config {
                message: format!("row_direction must be 'ltr' or 'rtl', got '{other}'"),
            }),
        }
    }
}

/// Behavior knobs of a tree view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TreeSettings {
    /// Indentation width of one depth level, in pixels
    pub scaffold_block_px_width: f64,
    pub row_direction: RowDirection,
    /// Deepest level a dragged subtree may reach (unset: unlimited)
    pub max_depth: Option<usize>,
    /// Collapse everything before a search expands the match paths
    pub only_expand_searched_nodes: bool,
    /// Also load lazy children of collapsed nodes
    pub load_collapsed_lazy_children: bool,
    /// Keep the source tree intact when a node is dropped onto another tree
    pub should_copy_on_outside_drop: bool,
    /// Minimum spacing between hover recomputations
    pub frame_interval_ms: u64,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            scaffold_block_px_width: 44.0,
            row_direction: RowDirection::Ltr,
            max_depth: None,
            only_expand_searched_nodes: false,
            load_collapsed_lazy_children: false,
            should_copy_on_outside_drop: false,
            frame_interval_ms: 16,
        }
    }
}

/// Raw settings for intermediate parsing (`None` = not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawTreeSettings {
    pub scaffold_block_px_width: Option<f64>,
    pub row_direction: Option<RowDirection>,
    pub max_depth: Option<usize>,
    pub only_expand_searched_nodes: Option<bool>,
    pub load_collapsed_lazy_children: Option<bool>,
    pub should_copy_on_outside_drop: Option<bool>,
    pub frame_interval_ms: Option<u64>,
}

/// Get the XDG config directory for sortree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "sortree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("sortree.toml"))
}

/// Load a TOML file into RawTreeSettings for manual merging.
fn load_raw_settings(path: &Path) -> ApplicationResult<RawTreeSettings> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl TreeSettings {
    /// Overlay wins wherever it specifies a value.
    pub fn merge_with(&self, overlay: &RawTreeSettings) -> Self {
        Self {
            scaffold_block_px_width: overlay
                .scaffold_block_px_width
                .unwrap_or(self.scaffold_block_px_width),
            row_direction: overlay.row_direction.unwrap_or(self.row_direction),
            max_depth: overlay.max_depth.or(self.max_depth),
            only_expand_searched_nodes: overlay
                .only_expand_searched_nodes
                .unwrap_or(self.only_expand_searched_nodes),
            load_collapsed_lazy_children: overlay
                .load_collapsed_lazy_children
                .unwrap_or(self.load_collapsed_lazy_children),
            should_copy_on_outside_drop: overlay
                .should_copy_on_outside_drop
                .unwrap_or(self.should_copy_on_outside_drop),
            frame_interval_ms: overlay.frame_interval_ms.unwrap_or(self.frame_interval_ms),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local` - Optional settings file layered over the global one
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. Global config: `$XDG_CONFIG_HOME/sortree/sortree.toml`
    /// 3. Local config file (must exist when given)
    /// 4. Environment variables: `SORTREE_*` prefix
    #[instrument(level = "debug")]
    pub fn load(local: Option<&Path>) -> ApplicationResult<Self> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!(path = %global_path.display(), "applying global config");
                current = current.merge_with(&load_raw_settings(&global_path)?);
            }
        }

        if let Some(local_path) = local {
            debug!(path = %local_path.display(), "applying local config");
            current = current.merge_with(&load_raw_settings(local_path)?);
        }

        current = Self::apply_env_overrides(current)?;
        current.validate()?;
        Ok(current)
    }

    /// Apply SORTREE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> ApplicationResult<Self> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("SORTREE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        if let Some(val) = env_value(config.get_float("scaffold_block_px_width"))? {
            settings.scaffold_block_px_width = val;
        }
        if let Some(val) = env_value(config.get_string("row_direction"))? {
            settings.row_direction = val.parse()?;
        }
        if let Some(val) = env_value(config.get_int("max_depth"))? {
            settings.max_depth = Some(usize::try_from(val).map_err(|_| ApplicationError::Config {
                message: format!("max_depth must not be negative, got {val}"),
            })?);
        }
        if let Some(val) = env_value(config.get_bool("only_expand_searched_nodes"))? {
            settings.only_expand_searched_nodes = val;
        }
        if let Some(val) = env_value(config.get_bool("load_collapsed_lazy_children"))? {
            settings.load_collapsed_lazy_children = val;
        }
        if let Some(val) = env_value(config.get_bool("should_copy_on_outside_drop"))? {
            settings.should_copy_on_outside_drop = val;
        }
        if let Some(val) = env_value(config.get_int("frame_interval_ms"))? {
            settings.frame_interval_ms = u64::try_from(val).map_err(|_| ApplicationError::Config {
                message: format!("frame_interval_ms must not be negative, got {val}"),
            })?;
        }

        Ok(settings)
    }

    pub fn validate(&self) -> ApplicationResult<()> {
        if !(self.scaffold_block_px_width.is_finite() && self.scaffold_block_px_width > 0.0) {
            return Err(ApplicationError::Config {
                message: format!(
                    "scaffold_block_px_width must be positive, got {}",
                    self.scaffold_block_px_width
                ),
            });
        }
        if self.max_depth == Some(0) {
            return Err(ApplicationError::Config {
                message: "max_depth must be at least 1".into(),
            });
        }
        if self.frame_interval_ms == 0 {
            return Err(ApplicationError::Config {
                message: "frame_interval_ms must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> ApplicationResult<String> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# sortree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/sortree/sortree.toml
#   Local:  file passed with --config
#   Env:    SORTREE_* environment variables

# Indentation width of one depth level, in pixels
# scaffold_block_px_width = 44.0

# "ltr" or "rtl"; rtl mirrors horizontal drag offsets
# row_direction = "ltr"

# Deepest level a dragged subtree may reach (unset: unlimited)
# max_depth = 5

# Collapse the whole tree before a search expands the match paths
# only_expand_searched_nodes = false

# Also load lazy children of collapsed nodes
# load_collapsed_lazy_children = false

# Keep the source tree intact when a node is dropped onto another tree
# should_copy_on_outside_drop = false

# Minimum spacing between hover recomputations, in milliseconds
# frame_interval_ms = 16
"#
        .to_string()
    }
}

/// An unset variable is `None`; a value of the wrong type is an error.
fn env_value<T>(result: Result<T, ConfigError>) -> ApplicationResult<Option<T>> {
    match result {
        Ok(val) => Ok(Some(val)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(config_err(e)),
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_defaults_when_validating_then_ok() {
        let settings = TreeSettings::default();
        assert_eq!(settings.scaffold_block_px_width, 44.0);
        assert_eq!(settings.frame_interval_ms, 16);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn given_overlay_when_merging_then_only_specified_fields_change() {
        let base = TreeSettings::default();
        let overlay = RawTreeSettings {
            max_depth: Some(3),
            row_direction: Some(RowDirection::Rtl),
            ..RawTreeSettings::default()
        };

        let result = base.merge_with(&overlay);

        assert_eq!(result.max_depth, Some(3));
        assert_eq!(result.row_direction, RowDirection::Rtl);
        assert_eq!(result.scaffold_block_px_width, 44.0);
        assert!(!result.only_expand_searched_nodes);
    }

    #[test]
    fn given_zero_max_depth_when_validating_then_config_error() {
        let settings = TreeSettings {
            max_depth: Some(0),
            ..TreeSettings::default()
        };
        assert!(matches!(settings.validate(), Err(ApplicationError::Config { .. })));
    }

    #[test]
    fn given_negative_indent_when_validating_then_config_error() {
        let settings = TreeSettings {
            scaffold_block_px_width: -1.0,
            ..TreeSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn given_direction_strings_when_parsing_then_case_insensitive() {
        assert_eq!("RTL".parse::<RowDirection>().unwrap(), RowDirection::Rtl);
        assert!("up".parse::<RowDirection>().is_err());
    }

    #[test]
    fn given_template_when_parsing_then_yields_defaults() {
        let raw: RawTreeSettings = toml::from_str(&TreeSettings::template()).unwrap();
        assert_eq!(TreeSettings::default().merge_with(&raw), TreeSettings::default());
    }
}
