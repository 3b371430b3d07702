//! Repository configuration: `conf/config.toml` and `conf/externals.toml`.
pub mod externals;
pub mod prefixes;
pub mod toml_loader;
pub mod validation;
pub mod variables;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use externals::ExternalSpec;
use prefixes::PrefixTable;
use variables::{DetectRule, Variables};

/// Directory under the repository root holding the source tree.
pub const SOURCE_DIR: &str = "home";

/// Directory under the repository root holding configuration files.
pub const CONF_DIR: &str = "conf";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TemplateSection {
    suffix: Option<String>,
}

/// Raw shape of `conf/config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    template: TemplateSection,
    prefixes: BTreeMap<String, String>,
    flags: BTreeMap<String, bool>,
    detect: BTreeMap<String, DetectRule>,
    palette: BTreeMap<String, String>,
    data: toml::Table,
}

/// All loaded configuration for a dotfiles repository.
#[derive(Debug, Clone)]
pub struct Config {
    /// Repository root.
    pub root: PathBuf,
    /// Registered prefix tokens and template suffix.
    pub prefixes: PrefixTable,
    /// Template variables.
    pub variables: Variables,
    /// External archive declarations.
    pub externals: Vec<ExternalSpec>,
}

impl Config {
    /// Load all configuration from the `conf/` directory under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be read, does not parse, or
    /// declares invalid prefix tokens or externals.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let conf = root.join(CONF_DIR);

        let file: ConfigFile = toml_loader::load_config(&conf.join("config.toml"))?;
        let prefixes = PrefixTable::from_config(&file.prefixes, file.template.suffix.as_deref())?;
        let variables = Variables {
            flags: file.flags,
            detect: file.detect,
            palette: file.palette,
            data: Variables::data_from_toml(file.data)?,
        };
        let externals = externals::load(&conf.join("externals.toml"))?;

        Ok(Self {
            root: root.to_path_buf(),
            prefixes,
            variables,
            externals,
        })
    }

    /// Path of the source tree.
    #[must_use]
    pub fn source_dir(&self) -> PathBuf {
        self.root.join(SOURCE_DIR)
    }
}
