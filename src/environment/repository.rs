use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{from_slice, to_string_pretty};

use super::error::{Error, Result};
use super::types::Config;

const CONFIG_PATH: &str = "config.json";

/// Reads and writes the client configuration in a directory,
/// by default the platform config dir
#[derive(Clone, Debug)]
pub struct Repository {
    directory: PathBuf,
}

impl Repository {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn from_default_directory() -> Result<Self> {
        Ok(Self::new(data_directory()?))
    }

    pub fn config_path(&self) -> PathBuf {
        self.directory.join(CONFIG_PATH)
    }

    /// The stored config, or the defaults if nothing was saved yet
    pub fn config(&self) -> Result<Config> {
        Ok(read(&self.config_path())?.unwrap_or_default())
    }

    pub fn set_config(&self, config: &Config) -> Result<()> {
        std::fs::create_dir_all(&self.directory)?;
        write(&self.config_path(), config)
    }
}

pub fn read<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    };
    let data = std::fs::read(path)
        .map_err(|e| Error::Io(format!("Could not read {}: {e}", path.display())))?;
    let obj: T = from_slice(&data)
        .map_err(|e| Error::Config(format!("Could not parse {}: {e}", path.display())))?;
    Ok(Some(obj))
}

fn write<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = to_string_pretty(&value)?;
    std::fs::write(path, data)
        .map_err(|e| Error::Io(format!("Could not write to {}: {e}", path.display())))?;
    Ok(())
}

fn data_directory() -> Result<PathBuf> {
    use directories_next::ProjectDirs;
    ProjectDirs::from("org", "inveniosoftware", "requests-feed")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| Error::Config("Couldn't find a folder for the configuration".to_string()))
}
