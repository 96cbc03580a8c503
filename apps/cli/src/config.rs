use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracker_app::TrackerConfig;

use crate::paths::default_config_path;

/// Contents of the CLI config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PathBuf>,
    pub tracker: TrackerConfig,
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: CliConfig,
    pub file: PathBuf,
    pub created: bool,
}

/// Reads the config file. An explicitly requested file must exist; the
/// default one is created with defaults on first run.
pub fn load_or_create(explicit: Option<&Path>) -> Result<ConfigLoad, String> {
    if let Some(file) = explicit {
        let config = read_config(file)?;
        return Ok(ConfigLoad {
            config,
            file: file.to_path_buf(),
            created: false,
        });
    }

    let file = default_config_path()?;
    if file.exists() {
        let config = read_config(&file)?;
        return Ok(ConfigLoad {
            config,
            file,
            created: false,
        });
    }

    let config = CliConfig::default();
    write_config(&file, &config)?;
    Ok(ConfigLoad {
        config,
        file,
        created: true,
    })
}

fn read_config(file: &Path) -> Result<CliConfig, String> {
    let contents = fs::read_to_string(file)
        .map_err(|err| format!("read config {}: {}", file.display(), err))?;
    toml::from_str(&contents).map_err(|err| format!("parse config {}: {}", file.display(), err))
}

fn write_config(file: &Path, config: &CliConfig) -> Result<(), String> {
    if let Some(dir) = file.parent() {
        fs::create_dir_all(dir)
            .map_err(|err| format!("create config dir {}: {}", dir.display(), err))?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|err| format!("serialize config: {}", err))?;
    fs::write(file, contents).map_err(|err| format!("write config {}: {}", file.display(), err))
}
