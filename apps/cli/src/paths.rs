use std::path::PathBuf;

const CONFIG_DIR_NAME: &str = "usage-tracker";
const CONFIG_FILE_NAME: &str = "config.toml";

/// `<platform config dir>/usage-tracker/config.toml`
pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or_else(|| "could not resolve a config directory for this platform".to_string())
}
