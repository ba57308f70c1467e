//! General utility functions.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::Result;

/// Name of the data-home folder
pub const HOME_FOLDER: &str = ".epigraph";

/// Get data-home directory
fn get_home_dir(temp_name: &str) -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let temp_path = cwd.join(temp_name);

    // If .epigraph folder exists in current working directory, use it
    if temp_path.exists() {
        return temp_path;
    }

    // Otherwise use home path
    let home_path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let temp_path = home_path.join(temp_name);

    if !temp_path.exists() {
        let _ = fs::create_dir_all(&temp_path);
    }

    temp_path
}

/// Data-home directory
pub static HOME_DIR: LazyLock<PathBuf> = LazyLock::new(|| get_home_dir(HOME_FOLDER));

/// Get path for file with filename inside the data home
pub fn get_file_path(filename: &str) -> PathBuf {
    HOME_DIR.join(filename)
}

/// Get path for folder with folder name inside the data home
pub fn get_folder_path(folder_name: &str) -> PathBuf {
    let folder_path = HOME_DIR.join(folder_name);
    if !folder_path.exists() {
        let _ = fs::create_dir_all(&folder_path);
    }
    folder_path
}

/// Load a JSON document from path
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Save a value as pretty JSON into path
pub fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(data)?;
    fs::write(path, json)?;
    Ok(())
}
