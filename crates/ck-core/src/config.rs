//! Configuration for ck-core
//!
//! Loaded from TOML:
//!
//! ```toml
//! bib_dir = "~/papers/bib"
//! tag_dir = "~/papers/tags"
//! key_policy = "initials-short-year"
//! recursive_list = false
//! ```
//!
//! The file is looked up at `$CK_CONFIG`, then at
//! `<config dir>/citekeys/config.toml`. A missing default file means
//! defaults; a missing explicit file is an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::citekey::KeyPolicy;
use crate::error::{CkError, IoResultExt, Result};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CK_CONFIG";

/// Library-wide configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CkConfig {
    /// Flat directory holding `<CK>.pdf` / `<CK>.bib` files
    pub bib_dir: PathBuf,
    /// Root of the tag symlink tree
    pub tag_dir: PathBuf,
    /// Policy used when deriving keys for new papers
    pub key_policy: KeyPolicy,
    /// Whether listing keys descends into subdirectories of `bib_dir`
    pub recursive_list: bool,
}

impl Default for CkConfig {
    fn default() -> Self {
        Self {
            bib_dir: PathBuf::from("~/papers/bib"),
            tag_dir: PathBuf::from("~/papers/tags"),
            key_policy: KeyPolicy::default(),
            recursive_list: false,
        }
    }
}

impl CkConfig {
    /// Load configuration from `path`, `$CK_CONFIG`, or the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        let config = config.expand_home();
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).at(path)?;
        tracing::debug!("Loaded config from {:?}", path);
        Self::from_toml(&text)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| CkError::Config(e.to_string()))
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CkError::Config(e.to_string()))
    }

    /// Replace a leading `~` in both directories with the home directory.
    pub fn expand_home(mut self) -> Self {
        self.bib_dir = expand_tilde(&self.bib_dir);
        self.tag_dir = expand_tilde(&self.tag_dir);
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.bib_dir.as_os_str().is_empty() || self.tag_dir.as_os_str().is_empty() {
            return Err(CkError::Config(
                "bib_dir and tag_dir must both be set".to_string(),
            ));
        }

        if self.bib_dir == self.tag_dir {
            return Err(CkError::Config(
                "bib_dir and tag_dir must be different directories".to_string(),
            ));
        }

        // A recursive listing of bib_dir would pick up every tag link.
        if self.recursive_list && self.tag_dir.starts_with(&self.bib_dir) {
            return Err(CkError::Config(
                "tag_dir may not live inside bib_dir when recursive_list is set".to_string(),
            ));
        }

        Ok(())
    }
}

/// `<config dir>/citekeys/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("citekeys").join("config.toml"))
}

fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
