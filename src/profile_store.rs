use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::profile::Profile;

pub const PROFILES_FILE: &str = "profiles.json";

#[derive(Debug, Error)]
pub enum ProfileStoreError {
    #[error("Failed to create profile directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("Failed to serialize profiles: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to write profiles to {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// JSON file holding the ordered profile list.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(PROFILES_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved profiles. Never fails: a missing, unreadable, corrupt or
    /// empty file gives back the single built-in profile.
    pub fn load(&self) -> Vec<Profile> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No profiles at {}, using default", self.path.display());
                return vec![Profile::builtin_default()];
            }
            Err(e) => {
                warn!("Failed to read {}: {}, using default", self.path.display(), e);
                return vec![Profile::builtin_default()];
            }
        };

        match serde_json::from_str::<Vec<Profile>>(&contents) {
            Ok(profiles) if !profiles.is_empty() => {
                debug!("Loaded {} profile(s) from {}", profiles.len(), self.path.display());
                profiles
            }
            Ok(_) => {
                warn!("{} holds no profiles, using default", self.path.display());
                vec![Profile::builtin_default()]
            }
            Err(e) => {
                warn!("Failed to parse {}: {}, using default", self.path.display(), e);
                vec![Profile::builtin_default()]
            }
        }
    }

    /// Write the full list, pretty-printed. The file is replaced atomically
    /// so a crash mid-write leaves the previous version intact.
    pub fn save(&self, profiles: &[Profile]) -> Result<(), ProfileStoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| ProfileStoreError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(profiles)?;
        let tmp = self.path.with_extension("json.tmp");
        let write_err = |source| ProfileStoreError::Write {
            path: self.path.clone(),
            source,
        };

        fs::write(&tmp, json).map_err(write_err)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(write_err(e));
        }

        debug!("Saved {} profile(s) to {}", profiles.len(), self.path.display());
        Ok(())
    }
}
