//! Loading `config.toml`.
//!
//! Problems with the file never stop the program: they come back as warnings
//! and the defaults are used instead.

use directories::ProjectDirs;
use serde::Deserialize;
use sheetcalc_engine::engine::EngineConfig;
use std::path::{Path, PathBuf};

const MAX_CONFIG_FILE_BYTES: u64 = 1_048_576; // 1 MiB

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Evaluation limits.
    pub engine: EngineConfig,
    /// Default log filter (`RUST_LOG` syntax), used when `RUST_LOG` is unset.
    pub log: Option<String>,
}

/// Load the config from `config_file`, or from the user config dir when no
/// file is given. A missing user config is not a warning; a missing explicit
/// file is.
pub fn load_config(config_file: Option<&PathBuf>) -> (ConfigFile, Vec<String>) {
    let mut warnings = Vec::new();
    let Some(path) = config_file.cloned().or_else(user_config_path) else {
        return (ConfigFile::default(), warnings);
    };

    if !path.exists() {
        if config_file.is_some() {
            warnings.push(format!("Config file not found: {}", path.display()));
        }
        return (ConfigFile::default(), warnings);
    }

    match read_config(&path) {
        Ok(config) => (config, warnings),
        Err(warning) => {
            warnings.push(warning);
            (ConfigFile::default(), warnings)
        }
    }
}

fn read_config(path: &Path) -> Result<ConfigFile, String> {
    let meta = std::fs::metadata(path)
        .map_err(|err| format!("Failed to read metadata for {}: {}", path.display(), err))?;
    if meta.len() > MAX_CONFIG_FILE_BYTES {
        return Err(format!(
            "Refusing to read {}: file too large ({} bytes, max {})",
            path.display(),
            meta.len(),
            MAX_CONFIG_FILE_BYTES
        ));
    }
    let content = std::fs::read_to_string(path)
        .map_err(|err| format!("Failed to read {}: {}", path.display(), err))?;
    toml::from_str::<ConfigFile>(&content)
        .map_err(|err| format!("Failed to parse {}: {}", path.display(), err))
}

fn user_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "sheetcalc")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}
